use thiserror::Error;

/// Top-level error taxonomy for the gatewatch pipeline.
///
/// Every variant maps to one of the recovery policies in the error handling
/// design: transient transport errors are retried locally, permanent errors
/// are dropped with a warning, and sticky errors (`AuthBan`) pause the
/// affected edge until an operator intervenes. No variant here is meant to
/// terminate the process.
#[derive(Debug, Error)]
pub enum GatewatchError {
    /// A network/transport failure that is expected to be transient.
    #[error("transport error: {0}")]
    Transport(String),

    /// The upstream responded with a redirect that must be followed.
    #[error("redirect to {0}")]
    Redirect(String),

    /// The upstream payload did not match the expected shape.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// The upstream has banned this client; requires operator intervention.
    #[error("auth ban: {0}")]
    AuthBan(String),

    /// A fetch that is safe to retry (rate limit, 5xx, timeout).
    #[error("retryable: {0}")]
    Retryable(String),

    /// The requested resource does not exist upstream.
    #[error("not found")]
    NotFound,

    /// A fetch failure that will never succeed on retry.
    #[error("permanent error: {0}")]
    Permanent(String),

    /// A profile file failed to load; isolated to that profile.
    #[error("profile load error: {0}")]
    ProfileLoad(String),

    /// The persistent store failed to complete a write.
    #[error("store error: {0}")]
    Store(String),

    /// Configuration is missing or malformed.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Catch-all for errors that don't merit their own variant.
    #[error("{0}")]
    Other(String),
}

impl GatewatchError {
    /// Whether this error represents a condition worth retrying without
    /// operator intervention.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Redirect(_) | Self::Retryable(_)
        )
    }

    /// Whether this error is sticky and should pause the affected edge until
    /// an operator clears it.
    #[must_use]
    pub fn is_sticky(&self) -> bool {
        matches!(self, Self::AuthBan(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_is_retryable() {
        assert!(GatewatchError::Transport("timeout".into()).is_retryable());
        assert!(!GatewatchError::NotFound.is_retryable());
    }

    #[test]
    fn auth_ban_is_sticky() {
        assert!(GatewatchError::AuthBan("420".into()).is_sticky());
        assert!(!GatewatchError::Transport("x".into()).is_sticky());
    }
}

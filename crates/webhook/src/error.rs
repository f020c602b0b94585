//! Errors produced sending a single alert to a webhook endpoint.

use std::time::Duration;

use thiserror::Error;

/// A single webhook send attempt's failure, classified per the
/// retry policy.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Transport-level failure (connect/timeout/DNS); retried with backoff.
    #[error("transport error: {0}")]
    Transport(String),

    /// 5xx response; retried with backoff.
    #[error("server error: status {status}")]
    ServerError { status: u16 },

    /// 429 response. `retry_after` is honored literally when present and
    /// does not count against the attempt budget.
    #[error("rate limited, retry_after={retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    /// 401/403: never retried; marks the endpoint suspect.
    #[error("unauthorized: status {status}")]
    Unauthorized { status: u16 },

    /// Any other 4xx: dropped after a single attempt.
    #[error("client error: status {status}")]
    ClientError { status: u16 },
}

impl DispatchError {
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::ServerError { .. })
    }

    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }

    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_error_and_transport_are_retryable() {
        assert!(DispatchError::ServerError { status: 503 }.is_retryable());
        assert!(DispatchError::Transport("timeout".into()).is_retryable());
        assert!(!DispatchError::ClientError { status: 400 }.is_retryable());
    }

    #[test]
    fn unauthorized_is_not_retryable_but_flagged() {
        let err = DispatchError::Unauthorized { status: 401 };
        assert!(!err.is_retryable());
        assert!(err.is_unauthorized());
    }

    #[test]
    fn rate_limited_surfaces_retry_after() {
        let err = DispatchError::RateLimited {
            retry_after: Some(Duration::from_secs(10)),
        };
        assert_eq!(err.retry_after(), Some(Duration::from_secs(10)));
        assert!(!err.is_retryable());
    }
}

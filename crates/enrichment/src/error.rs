use thiserror::Error;

/// Enrichment-specific failure classification.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The enrichment API's error-budget has been exhausted (HTTP 420 or
    /// equivalent header); the whole fetcher should pause for 60s.
    #[error("enrichment API rate limit exhausted")]
    RateLimited,

    /// Transient failure; safe to requeue the ref to the head of the
    /// backlog for a later retry.
    #[error("retryable fetch error: {0}")]
    Retryable(String),

    /// The event no longer exists upstream; drop silently.
    #[error("event not found upstream")]
    NotFound,

    /// Will never succeed on retry; drop with a warning.
    #[error("permanent fetch error: {0}")]
    Permanent(String),
}

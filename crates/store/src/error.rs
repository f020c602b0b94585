use thiserror::Error;

/// Errors raised by the event store.
///
/// A store write error is retried once by the caller; if it
/// persists the caller pauses writes and surfaces the error via health. This
/// crate only classifies the failure — the retry-once policy lives in the
/// component driving inserts (enrichment fetcher, backfill service).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("malformed row data: {0}")]
    Corrupt(String),

    #[error("migration failed: {0}")]
    Migration(String),
}

impl StoreError {
    /// Whether retrying the same operation once is worthwhile.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

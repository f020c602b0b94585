use thiserror::Error;

/// Top-level error for the orchestrator binary and control surface.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store error: {0}")]
    Store(#[from] gatewatch_store::StoreError),

    #[error("backfill error: {0}")]
    Backfill(#[from] gatewatch_backfill::BackfillError),
}

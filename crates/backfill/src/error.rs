use thiserror::Error;

use gatewatch_store::StoreError;

#[derive(Debug, Error)]
pub enum BackfillError {
    #[error("secondary history API transport error: {0}")]
    Transport(String),

    #[error("malformed secondary history API response: {0}")]
    InvalidPayload(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

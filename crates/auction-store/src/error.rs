//! Store error taxonomy.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis connection error: {0}")]
    Connection(#[from] redis::RedisError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("encryption error: {0}")]
    Crypto(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("store is disconnected and has no fallback entry for {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

impl From<StoreError> for auction_core::CoreError {
    fn from(e: StoreError) -> Self {
        auction_core::CoreError::Store(e.to_string())
    }
}

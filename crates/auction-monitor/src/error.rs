//! Monitor error taxonomy.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("auction {0} is already monitored")]
    AlreadyMonitored(String),

    #[error("auction {0} is not monitored")]
    NotMonitored(String),

    #[error("auction_id does not carry a numeric marketplace product id: {0}")]
    InvalidProductId(String),

    #[error("store error: {0}")]
    Store(#[from] auction_store::StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type MonitorResult<T> = std::result::Result<T, MonitorError>;

impl From<MonitorError> for auction_core::CoreError {
    fn from(e: MonitorError) -> Self {
        match e {
            MonitorError::AlreadyMonitored(id) => {
                auction_core::CoreError::Validation(format!("already monitored: {id}"))
            }
            MonitorError::NotMonitored(id) => {
                auction_core::CoreError::Validation(format!("not monitored: {id}"))
            }
            MonitorError::InvalidProductId(id) => {
                auction_core::CoreError::Validation(format!("invalid product id: {id}"))
            }
            MonitorError::Store(e) => auction_core::CoreError::Store(e.to_string()),
            MonitorError::Internal(msg) => auction_core::CoreError::Internal(msg),
        }
    }
}

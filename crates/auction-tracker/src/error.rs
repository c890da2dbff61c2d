//! Top-level application error type: every subcrate's error folds into
//! this one at the transport boundary, where it becomes a REST/WS
//! `{success:false, error, code}` body or a process exit code.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("auth error: {0}")]
    Auth(String),

    #[error("core error: {0}")]
    Core(#[from] auction_core::CoreError),

    #[error("store error: {0}")]
    Store(#[from] auction_store::StoreError),

    #[error("upstream error: {0}")]
    Upstream(#[from] auction_upstream::UpstreamError),

    #[error("monitor error: {0}")]
    Monitor(#[from] auction_monitor::MonitorError),

    #[error("broadcast error: {0}")]
    Broadcast(#[from] auction_broadcast::BroadcastError),

    #[error("telemetry error: {0}")]
    Telemetry(#[from] auction_telemetry::TelemetryError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("shutdown requested")]
    Shutdown,
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Stable wire code for the `{success:false, error, code}` shape.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG_ERROR",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Auth(_) => "AUTH_ERROR",
            Self::Core(e) => e.code(),
            Self::Store(_) => "STORE_ERROR",
            Self::Upstream(_) => "BID_ERROR",
            Self::Monitor(_) => "VALIDATION_ERROR",
            Self::Broadcast(_) => "INTERNAL_ERROR",
            Self::Telemetry(_) => "INTERNAL_ERROR",
            Self::Io(_) => "INTERNAL_ERROR",
            Self::Shutdown => "INTERNAL_ERROR",
        }
    }

    /// HTTP status this error maps to.
    pub fn status(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Auth(_) => StatusCode::UNAUTHORIZED,
            Self::Core(auction_core::CoreError::Validation(_)) => StatusCode::BAD_REQUEST,
            Self::Core(auction_core::CoreError::Auth(_)) => StatusCode::UNAUTHORIZED,
            Self::Monitor(auction_monitor::MonitorError::AlreadyMonitored(_))
            | Self::Monitor(auction_monitor::MonitorError::NotMonitored(_))
            | Self::Monitor(auction_monitor::MonitorError::InvalidProductId(_)) => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

//! Shared error taxonomy for the auction tracking core.

use thiserror::Error;

/// Caller-visible sub-kind of a failed bid attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BidErrorKind {
    DuplicateAmount,
    BidTooLow,
    AuctionEnded,
    Outbid,
    ServerError,
    ConnectionError,
    BreakerOpen,
    Unknown,
}

impl BidErrorKind {
    /// `ConnectionError` and `ServerError` are retryable; others are terminal.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConnectionError | Self::ServerError)
    }
}

impl std::fmt::Display for BidErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::DuplicateAmount => "DUPLICATE_AMOUNT",
            Self::BidTooLow => "BID_TOO_LOW",
            Self::AuctionEnded => "AUCTION_ENDED",
            Self::Outbid => "OUTBID",
            Self::ServerError => "SERVER_ERROR",
            Self::ConnectionError => "CONNECTION_ERROR",
            Self::BreakerOpen => "BREAKER_OPEN",
            Self::Unknown => "UNKNOWN",
        };
        write!(f, "{s}")
    }
}

/// Top-level error kind shared across the workspace.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("auth error: {0}")]
    Auth(String),

    #[error("bid error [{kind}]: {message}")]
    Bid { kind: BidErrorKind, message: String },

    #[error("store error: {0}")]
    Store(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Stable error code used in the `{success:false, error, code}` wire shape.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Auth(_) => "AUTH_ERROR",
            Self::Bid { .. } => "BID_ERROR",
            Self::Store(_) => "STORE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;

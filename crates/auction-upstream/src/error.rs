//! Upstream error taxonomy; every failure collapses into a [`BidErrorKind`]
//! for callers that only care about retryability.

use auction_core::BidErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("marketplace returned unexpected status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("response parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("bid rejected: {kind} — {message}")]
    Bid { kind: BidErrorKind, message: String },

    #[error("circuit breaker open, tripped at {tripped_at_ms}")]
    BreakerOpen { tripped_at_ms: i64 },

    #[error("session invalid or expired")]
    SessionInvalid,
}

impl UpstreamError {
    /// Collapse to the caller-visible [`BidErrorKind`].
    pub fn kind(&self) -> BidErrorKind {
        match self {
            Self::Http(_) => BidErrorKind::ConnectionError,
            Self::UnexpectedStatus { status, .. } if *status >= 500 => BidErrorKind::ServerError,
            Self::UnexpectedStatus { .. } => BidErrorKind::Unknown,
            Self::Parse(_) => BidErrorKind::Unknown,
            Self::Bid { kind, .. } => *kind,
            Self::BreakerOpen { .. } => BidErrorKind::BreakerOpen,
            Self::SessionInvalid => BidErrorKind::Unknown,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

pub type UpstreamResult<T> = std::result::Result<T, UpstreamError>;

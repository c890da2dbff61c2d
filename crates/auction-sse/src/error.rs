//! SSE client error taxonomy.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SseError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("stream ended unexpectedly")]
    StreamEnded,

    #[error("malformed event payload: {0}")]
    MalformedPayload(String),
}

pub type SseResult<T> = std::result::Result<T, SseError>;

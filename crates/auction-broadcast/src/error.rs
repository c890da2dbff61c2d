//! Broadcaster error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("session {0} is not registered")]
    UnknownSession(uuid::Uuid),

    #[error("session {0} has not authenticated")]
    NotAuthenticated(uuid::Uuid),

    #[error("payload exceeds the {0} byte frame cap")]
    PayloadTooLarge(usize),

    #[error("session outbound queue is full, message dropped")]
    QueueFull,

    #[error("session channel is closed")]
    ChannelClosed,
}

pub type BroadcastResult<T> = std::result::Result<T, BroadcastError>;

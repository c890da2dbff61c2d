//! Hand-rolled Server-Sent Events client for per-product live auction
//! updates, multiplexed over a single reconnecting connection.

pub mod client;
pub mod error;
pub mod events;
pub mod parser;

pub use client::{ClientEvent, SseClient, SseConfig};
pub use error::{SseError, SseResult};
pub use events::SseEvent;
pub use parser::{RawSseEvent, SseLineParser};

//! Subscriber session registry and state fan-out for the auction tracking
//! core. Sits downstream of [`auction_monitor::Monitor`].

pub mod accept_limiter;
pub mod broadcaster;
pub mod error;
pub mod message;
pub mod session;

pub use accept_limiter::AcceptLimiter;
pub use broadcaster::{Broadcaster, DEFAULT_QUEUE_CAPACITY, MAX_PAYLOAD_BYTES};
pub use error::{BroadcastError, BroadcastResult};
pub use message::{ClientFrame, ServerFrame};
pub use session::{Session, TrySendOutcome, ALL_AUCTIONS};

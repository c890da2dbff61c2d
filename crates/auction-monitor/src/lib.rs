//! Per-auction state machine, scheduler, recovery pass and cleanup sweep
//! for the auction tracking core.

pub mod cleanup;
pub mod command;
pub mod error;
pub mod events;
pub mod monitor;
pub mod recovery;
pub mod registry;
pub mod task;

pub use command::{Command, TaskEvent};
pub use error::{MonitorError, MonitorResult};
pub use events::MonitorEvent;
pub use monitor::Monitor;
pub use recovery::recover;
pub use registry::Registry;

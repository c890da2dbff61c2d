//! Messages fed into a per-auction task's single fold queue.

use auction_core::PartialAuctionConfig;
use auction_sse::SseEvent;
use tokio::sync::oneshot;

use crate::error::MonitorResult;

/// External requests a caller can make against one running auction task.
#[derive(Debug)]
pub enum Command {
    UpdateConfig(PartialAuctionConfig),
    ManualBid {
        amount: i64,
        reply: oneshot::Sender<MonitorResult<()>>,
    },
    Remove,
}

/// Everything a per-auction task folds serially: forwarded SSE traffic,
/// the fallback signal, and boundary commands. The task itself is the
/// fold queue — there is no separate queue data structure.
#[derive(Debug)]
pub enum TaskEvent {
    Sse(SseEvent),
    SseFallback,
    Command(Command),
}

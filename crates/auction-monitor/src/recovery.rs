//! Startup recovery pass: re-attach tasks to every non-ended auction
//! already persisted in the store, after a process restart.

use std::sync::Arc;

use auction_core::AuctionStatus;
use tracing::{info, warn};

use crate::error::MonitorResult;
use crate::monitor::Monitor;

/// Load every persisted auction and resume monitoring the ones still in
/// flight. Returns the number of auctions recovered.
pub async fn recover(monitor: &Arc<Monitor>) -> MonitorResult<usize> {
    let ids = monitor.store_list_auction_ids().await?;
    let mut recovered = 0;

    for auction_id in ids {
        match monitor.store_get_auction(&auction_id).await {
            Ok(Some(auction)) if auction.status != AuctionStatus::Ended => {
                monitor.resume(auction);
                recovered += 1;
            }
            Ok(_) => {}
            Err(e) => warn!(auction_id, error = %e, "failed to load auction during recovery"),
        }
    }

    info!(recovered, "recovery pass complete");
    Ok(recovered)
}

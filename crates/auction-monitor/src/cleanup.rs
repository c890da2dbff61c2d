//! Periodic cleanup sweep: remove auctions that ended more than
//! `retention` ago.

use std::sync::Arc;
use std::time::Duration;

use auction_telemetry::Metrics;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::monitor::Monitor;

/// Default sweep cadence.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);
/// Default grace period after `ended_at_ms` before an auction is removed.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(60);

pub async fn run(
    monitor: Arc<Monitor>,
    interval: Duration,
    retention: Duration,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = cancel.cancelled() => return,
        }

        let removed = sweep_once(&monitor, retention).await;
        if removed > 0 {
            info!(removed, "cleanup sweep removed stale auctions");
            Metrics::cleanup_removed(removed as u64);
        } else {
            debug!("cleanup sweep found nothing to remove");
        }
    }
}

async fn sweep_once(monitor: &Arc<Monitor>, retention: Duration) -> usize {
    let now = now_ms();
    let retention_ms = retention.as_millis() as i64;
    let mut removed = 0;

    for auction in monitor.get_monitored() {
        // The normal case: status already flipped to `ended` and we have an
        // exact timestamp for when that happened.
        let stale_since = auction.ended_at_ms.or_else(|| {
            // Defensive fallback: also sweeps auctions whose snapshot
            // reached time_remaining_s == 0 without the fold ever
            // flipping `status`, e.g. a stuck SSE feed that stopped
            // delivering before the terminal event arrived.
            auction
                .data
                .as_ref()
                .filter(|d| d.time_remaining_s == 0)
                .map(|_| auction.last_update_ms)
        });

        let Some(stale_since) = stale_since else {
            continue;
        };
        if now.saturating_sub(stale_since) > retention_ms
            && monitor.remove(&auction.auction_id).await.is_ok()
        {
            removed += 1;
        }
    }

    removed
}

fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_have_expected_cadence() {
        assert_eq!(DEFAULT_SWEEP_INTERVAL, Duration::from_secs(300));
        assert_eq!(DEFAULT_RETENTION, Duration::from_secs(60));
    }
}

//! [`AuctionSnapshot`] — the immutable view of an auction's live state as
//! last retrieved from upstream.

use serde::{Deserialize, Serialize};

/// A point-in-time view of an auction's live state, as returned by
/// `UpstreamClient::fetch_auction` or carried on an SSE `bid_update` event.
///
/// (I5): `time_remaining_s` is always clamped to `>= 0` — upstream payloads
/// occasionally carry a negative value for an auction that has technically
/// already ended but not yet flipped `ended`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionSnapshot {
    pub current_bid: i64,
    /// Marketplace-suggested next bid, when it supplies one (BidEngine rule 4).
    pub next_bid: Option<i64>,
    pub bid_count: u32,
    pub watcher_count: u32,
    pub is_winning: bool,
    pub ended: bool,
    pub time_remaining_s: i64,
    pub end_time_ms: i64,
    pub retrieved_at_ms: i64,
}

impl AuctionSnapshot {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        current_bid: i64,
        next_bid: Option<i64>,
        bid_count: u32,
        watcher_count: u32,
        is_winning: bool,
        ended: bool,
        time_remaining_s: i64,
        end_time_ms: i64,
        retrieved_at_ms: i64,
    ) -> Self {
        Self {
            current_bid,
            next_bid,
            bid_count,
            watcher_count,
            is_winning,
            ended,
            time_remaining_s: time_remaining_s.max(0),
            end_time_ms,
            retrieved_at_ms,
        }
    }

    /// `true` once inside the sniping tail window relative to `snipe_timing_s`.
    pub fn in_tail_window(&self, snipe_timing_s: i64) -> bool {
        self.time_remaining_s <= snipe_timing_s.max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_time_remaining_is_clamped_to_zero() {
        let snapshot = AuctionSnapshot::new(10, None, 0, 0, false, false, -5, 0, 0);
        assert_eq!(snapshot.time_remaining_s, 0);
    }

    #[test]
    fn tail_window_is_inclusive() {
        let snapshot = AuctionSnapshot::new(10, None, 0, 0, false, false, 30, 0, 0);
        assert!(snapshot.in_tail_window(30));
        assert!(!snapshot.in_tail_window(29));
    }
}

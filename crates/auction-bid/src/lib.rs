//! Pure bid decision engine. No I/O: given an [`Auction`] and
//! the process-wide [`Settings`], decide whether to bid and for how much.

use auction_core::{exceeds_budget, safe_add, Auction, AuctionStatus, Settings, Strategy};

/// Why the engine chose not to bid, in the order its rule was checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoBidReason {
    AuctionEnded,
    AutoBidDisabled,
    ManualStrategy,
    OutsideSnipeWindow,
    AlreadyWinning,
    BudgetExceeded,
    NoSnapshotYet,
    /// `config.increment_amount <= 0` — a misconfigured auction never bids,
    /// even when the marketplace itself supplies a `next_bid` that would
    /// otherwise make the increment irrelevant.
    InvalidIncrement,
}

/// The engine's verdict for one evaluation pass over an auction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BidDecision {
    Bid { amount: i64 },
    Skip { reason: NoBidReason },
}

/// Evaluate the seven ordered bidding rules against the auction's current
/// snapshot and return a decision. Pure function: same inputs always
/// produce the same output.
pub fn decide(auction: &Auction, settings: &Settings) -> BidDecision {
    // Rule 1: a closed auction is never bid on.
    if auction.status == AuctionStatus::Ended {
        return BidDecision::Skip {
            reason: NoBidReason::AuctionEnded,
        };
    }

    // Rule 2: auto-bid must be explicitly enabled for this auction.
    if !auction.config.auto_bid {
        return BidDecision::Skip {
            reason: NoBidReason::AutoBidDisabled,
        };
    }

    // Rule 3: a manual strategy never bids automatically.
    if auction.config.strategy == Strategy::Manual {
        return BidDecision::Skip {
            reason: NoBidReason::ManualStrategy,
        };
    }

    let Some(data) = auction.data.as_ref() else {
        return BidDecision::Skip {
            reason: NoBidReason::NoSnapshotYet,
        };
    };

    // Rule 4: sniping only acts inside the tail window.
    if auction.config.strategy == Strategy::Sniping
        && !data.in_tail_window(settings.bidding.snipe_timing_s)
    {
        return BidDecision::Skip {
            reason: NoBidReason::OutsideSnipeWindow,
        };
    }

    // Rule 5: never re-bid while already holding the high bid.
    if data.is_winning {
        return BidDecision::Skip {
            reason: NoBidReason::AlreadyWinning,
        };
    }

    // Rule 6: a non-positive increment never bids, regardless of whether
    // the marketplace supplies its own `next_bid` — BidEngine treats the
    // configured increment as a standing sanity check, not just a
    // fallback input.
    if auction.config.increment_amount <= 0 {
        return BidDecision::Skip {
            reason: NoBidReason::InvalidIncrement,
        };
    }

    // Rule 7: compute the minimum acceptable next bid — the marketplace's
    // own suggestion if it supplies one, else current bid plus the
    // effective per-auction increment — then add the configured buffer.
    let base_amount = match data.next_bid {
        Some(next_bid) => next_bid,
        None => safe_add(data.current_bid, auction.config.effective_increment(settings)),
    };
    let amount = safe_add(base_amount, settings.bidding.bid_buffer);

    // Rule 8: a bid that would exceed the auction's own budget never goes out.
    if exceeds_budget(amount, auction.config.max_bid) {
        return BidDecision::Skip {
            reason: NoBidReason::BudgetExceeded,
        };
    }

    BidDecision::Bid { amount }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auction_core::{AuctionConfig, AuctionMetadata, AuctionSnapshot, PartialAuctionConfig};

    fn auction_with(
        data: Option<AuctionSnapshot>,
        config_overrides: PartialAuctionConfig,
        settings: &Settings,
    ) -> Auction {
        let config = AuctionConfig::from_partial_with_defaults(config_overrides, settings);
        let mut auction = Auction::new("abc123", AuctionMetadata::default(), config, 0);
        auction.data = data;
        auction
    }

    fn winning_snapshot(is_winning: bool, current_bid: i64, time_remaining_s: i64) -> AuctionSnapshot {
        AuctionSnapshot::new(current_bid, None, 1, 1, is_winning, false, time_remaining_s, 0, 0)
    }

    #[test]
    fn ended_auction_never_bids() {
        let settings = Settings::default();
        let mut auction = auction_with(
            Some(winning_snapshot(false, 50, 120)),
            PartialAuctionConfig {
                max_bid: Some(500),
                ..Default::default()
            },
            &settings,
        );
        auction.status = AuctionStatus::Ended;
        assert_eq!(
            decide(&auction, &settings),
            BidDecision::Skip { reason: NoBidReason::AuctionEnded }
        );
    }

    #[test]
    fn auto_bid_disabled_skips() {
        let settings = Settings::default();
        let auction = auction_with(
            Some(winning_snapshot(false, 50, 120)),
            PartialAuctionConfig {
                max_bid: Some(500),
                auto_bid: Some(false),
                ..Default::default()
            },
            &settings,
        );
        assert_eq!(
            decide(&auction, &settings),
            BidDecision::Skip { reason: NoBidReason::AutoBidDisabled }
        );
    }

    #[test]
    fn manual_strategy_skips() {
        let settings = Settings::default();
        let auction = auction_with(
            Some(winning_snapshot(false, 50, 120)),
            PartialAuctionConfig {
                max_bid: Some(500),
                strategy: Some(Strategy::Manual),
                ..Default::default()
            },
            &settings,
        );
        assert_eq!(
            decide(&auction, &settings),
            BidDecision::Skip { reason: NoBidReason::ManualStrategy }
        );
    }

    #[test]
    fn sniping_outside_tail_window_skips() {
        let settings = Settings::default();
        let auction = auction_with(
            Some(winning_snapshot(false, 50, 120)),
            PartialAuctionConfig {
                max_bid: Some(500),
                strategy: Some(Strategy::Sniping),
                ..Default::default()
            },
            &settings,
        );
        assert_eq!(
            decide(&auction, &settings),
            BidDecision::Skip { reason: NoBidReason::OutsideSnipeWindow }
        );
    }

    #[test]
    fn sniping_inside_tail_window_bids() {
        let settings = Settings::default();
        let auction = auction_with(
            Some(winning_snapshot(false, 50, 10)),
            PartialAuctionConfig {
                max_bid: Some(500),
                strategy: Some(Strategy::Sniping),
                ..Default::default()
            },
            &settings,
        );
        assert!(matches!(decide(&auction, &settings), BidDecision::Bid { .. }));
    }

    #[test]
    fn already_winning_skips() {
        let settings = Settings::default();
        let auction = auction_with(
            Some(winning_snapshot(true, 50, 120)),
            PartialAuctionConfig {
                max_bid: Some(500),
                ..Default::default()
            },
            &settings,
        );
        assert_eq!(
            decide(&auction, &settings),
            BidDecision::Skip { reason: NoBidReason::AlreadyWinning }
        );
    }

    #[test]
    fn bids_current_bid_plus_increment_when_no_marketplace_suggestion() {
        let settings = Settings::default();
        let auction = auction_with(
            Some(winning_snapshot(false, 50, 120)),
            PartialAuctionConfig {
                max_bid: Some(500),
                increment_amount: Some(10),
                ..Default::default()
            },
            &settings,
        );
        assert_eq!(decide(&auction, &settings), BidDecision::Bid { amount: 60 });
    }

    #[test]
    fn uses_marketplace_suggested_next_bid_when_present() {
        let settings = Settings::default();
        let mut auction = auction_with(
            None,
            PartialAuctionConfig {
                max_bid: Some(500),
                ..Default::default()
            },
            &settings,
        );
        auction.data = Some(AuctionSnapshot::new(50, Some(75), 1, 1, false, false, 120, 0, 0));
        assert_eq!(decide(&auction, &settings), BidDecision::Bid { amount: 75 });
    }

    #[test]
    fn budget_exceeded_skips_and_is_deterministic() {
        let settings = Settings::default();
        let auction = auction_with(
            Some(winning_snapshot(false, 95, 120)),
            PartialAuctionConfig {
                max_bid: Some(100),
                increment_amount: Some(10),
                ..Default::default()
            },
            &settings,
        );
        assert_eq!(
            decide(&auction, &settings),
            BidDecision::Skip { reason: NoBidReason::BudgetExceeded }
        );
        // Pure function: repeated calls with the same input agree.
        assert_eq!(decide(&auction, &settings), decide(&auction, &settings));
    }

    #[test]
    fn non_positive_increment_skips_even_with_marketplace_next_bid() {
        let settings = Settings::default();
        let mut auction = auction_with(
            None,
            PartialAuctionConfig {
                max_bid: Some(500),
                increment_amount: Some(0),
                ..Default::default()
            },
            &settings,
        );
        auction.data = Some(AuctionSnapshot::new(50, Some(75), 1, 1, false, false, 120, 0, 0));
        assert_eq!(
            decide(&auction, &settings),
            BidDecision::Skip { reason: NoBidReason::InvalidIncrement }
        );
    }

    #[test]
    fn no_snapshot_yet_skips() {
        let settings = Settings::default();
        let auction = auction_with(
            None,
            PartialAuctionConfig {
                max_bid: Some(500),
                ..Default::default()
            },
            &settings,
        );
        assert_eq!(
            decide(&auction, &settings),
            BidDecision::Skip { reason: NoBidReason::NoSnapshotYet }
        );
    }

    use proptest::prelude::*;

    proptest! {
        #[test]
        fn bid_amount_never_exceeds_max_bid(
            current_bid in 0i64..1000,
            increment in 0i64..50,
            max_bid in 0i64..1000,
        ) {
            let settings = Settings::default();
            let auction = auction_with(
                Some(winning_snapshot(false, current_bid, 120)),
                PartialAuctionConfig {
                    max_bid: Some(max_bid),
                    increment_amount: Some(increment),
                    ..Default::default()
                },
                &settings,
            );
            if let BidDecision::Bid { amount } = decide(&auction, &settings) {
                prop_assert!(amount <= max_bid);
            }
        }

        #[test]
        fn never_bids_with_non_positive_increment(
            current_bid in 0i64..1000,
            increment in -50i64..=0,
            max_bid in 0i64..1000,
        ) {
            let settings = Settings::default();
            let auction = auction_with(
                Some(winning_snapshot(false, current_bid, 120)),
                PartialAuctionConfig {
                    max_bid: Some(max_bid),
                    increment_amount: Some(increment),
                    ..Default::default()
                },
                &settings,
            );
            prop_assert!(!matches!(decide(&auction, &settings), BidDecision::Bid { .. }));
        }

        #[test]
        fn decide_is_pure(current_bid in 0i64..1000, max_bid in 0i64..1000) {
            let settings = Settings::default();
            let auction = auction_with(
                Some(winning_snapshot(false, current_bid, 120)),
                PartialAuctionConfig { max_bid: Some(max_bid), ..Default::default() },
                &settings,
            );
            prop_assert_eq!(decide(&auction, &settings), decide(&auction, &settings));
        }
    }
}

//! The [`Auction`] entity and its configuration.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::money::safe_next;
use crate::settings::{Settings, Strategy};
use crate::snapshot::AuctionSnapshot;

/// `/p/<slug>/<digits>` — the marketplace's own product URL shape. The
/// digits group is the id used on the SSE channel.
static PRODUCT_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/p/[^/]+/(\d+)").expect("static pattern is valid"));

/// Extract the SSE product id embedded in a marketplace product URL.
///
/// Returns `None` when the URL doesn't match the expected `/p/<slug>/<id>`
/// shape — callers fall back to polling-only transport in that case.
pub fn extract_sse_product_id(url: &str) -> Option<String> {
    PRODUCT_ID_PATTERN
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Lifecycle status of a monitored auction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuctionStatus {
    Monitoring,
    Ended,
    /// Advisory only: does not affect scheduling.
    Error,
}

/// Which upstream mechanism currently backs an auction's state updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Sse,
    Polling,
}

/// Per-auction bidding configuration. Defaults are overlaid from
/// [`Settings`] at creation time; later updates shallow-merge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuctionConfig {
    pub max_bid: i64,
    #[serde(default = "default_increment_amount")]
    pub increment_amount: i64,
    #[serde(default)]
    pub strategy: Strategy,
    #[serde(default = "default_true")]
    pub auto_bid: bool,
}

fn default_increment_amount() -> i64 {
    1
}
fn default_true() -> bool {
    true
}

/// A config as supplied by a caller before defaults are overlaid — every
/// field optional, matching `start_monitoring(auction_id, config?, ...)`
/// and the shallow-merge semantics of `update_config`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PartialAuctionConfig {
    pub max_bid: Option<i64>,
    pub increment_amount: Option<i64>,
    pub strategy: Option<Strategy>,
    pub auto_bid: Option<bool>,
}

impl AuctionConfig {
    /// Overlay [`Settings`] defaults onto a partial config supplied by the
    /// caller at creation time.
    pub fn from_partial_with_defaults(partial: PartialAuctionConfig, settings: &Settings) -> Self {
        Self {
            max_bid: partial
                .max_bid
                .unwrap_or(settings.general.default_max_bid)
                .clamp(0, crate::money::MAX_BID_CAP),
            increment_amount: partial
                .increment_amount
                .unwrap_or(settings.bidding.default_increment),
            strategy: partial.strategy.unwrap_or(settings.general.default_strategy),
            auto_bid: partial.auto_bid.unwrap_or(settings.general.auto_bid_default),
        }
    }

    /// Shallow-merge a partial update over this config: only fields
    /// present in `partial` are replaced.
    pub fn merge(&mut self, partial: PartialAuctionConfig) {
        if let Some(max_bid) = partial.max_bid {
            self.max_bid = max_bid.clamp(0, crate::money::MAX_BID_CAP);
        }
        if let Some(increment_amount) = partial.increment_amount {
            self.increment_amount = increment_amount;
        }
        if let Some(strategy) = partial.strategy {
            self.strategy = strategy;
        }
        if let Some(auto_bid) = partial.auto_bid {
            self.auto_bid = auto_bid;
        }
    }

    /// The increment to use when the upstream snapshot carries no
    /// marketplace-suggested `next_bid` (BidEngine rule 4): the per-auction
    /// increment if set, else the global default.
    pub fn effective_increment(&self, settings: &Settings) -> i64 {
        if self.increment_amount > 0 {
            self.increment_amount
        } else {
            settings.bidding.default_increment
        }
    }
}

/// A monitored auction.
///
/// Invariants upheld by construction/mutation helpers here, enforced by
/// Monitor at the call sites that actually transition state:
/// - (I3) `ended_at_ms.is_some() == (status == Ended)`
/// - (I4) `0 <= config.max_bid <= MAX_BID_CAP`
/// - (I5) `data.as_ref().map(|d| d.time_remaining_s) >= Some(0)` (enforced by
///   [`AuctionSnapshot`] itself)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Auction {
    pub auction_id: String,
    pub title: String,
    pub url: String,
    pub image_url: String,
    pub config: AuctionConfig,
    pub data: Option<AuctionSnapshot>,
    pub status: AuctionStatus,
    pub last_update_ms: i64,
    pub ended_at_ms: Option<i64>,
    pub transport: Transport,
    /// `true` once SSE has given up for this auction and the default/tail
    /// poll cadence has taken over as the sole source of truth.
    #[serde(default)]
    pub fallback_polling: bool,
    pub sse_product_id: Option<String>,
    pub last_bid_amount: Option<i64>,
    pub last_bid_time_ms: Option<i64>,
    pub max_bid_reached: bool,
}

/// Metadata supplied alongside `start_monitoring` — display data, opaque
/// to the core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuctionMetadata {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub image_url: String,
}

impl Auction {
    /// Construct a freshly registered auction, before transport selection.
    pub fn new(
        auction_id: impl Into<String>,
        metadata: AuctionMetadata,
        config: AuctionConfig,
        now_ms: i64,
    ) -> Self {
        let sse_product_id = extract_sse_product_id(&metadata.url);
        Self {
            auction_id: auction_id.into(),
            title: metadata.title,
            url: metadata.url,
            image_url: metadata.image_url,
            config,
            data: None,
            status: AuctionStatus::Monitoring,
            last_update_ms: now_ms,
            ended_at_ms: None,
            transport: Transport::Polling,
            fallback_polling: false,
            sse_product_id,
            last_bid_amount: None,
            last_bid_time_ms: None,
            max_bid_reached: false,
        }
    }

    /// Transition to `ended`, setting `ended_at_ms` (I3) and recording the
    /// final snapshot. Idempotent.
    pub fn mark_ended(&mut self, snapshot: AuctionSnapshot, now_ms: i64) {
        self.data = Some(snapshot);
        self.last_update_ms = now_ms;
        if self.status != AuctionStatus::Ended {
            self.status = AuctionStatus::Ended;
            self.ended_at_ms = Some(now_ms);
        }
    }

    /// Record a bid placement attempt in the auction's own bookkeeping
    /// (the append-only log itself lives in the store's bid history).
    pub fn record_bid(&mut self, amount: i64, now_ms: i64) {
        self.last_bid_amount = Some(amount);
        self.last_bid_time_ms = Some(now_ms);
    }

    /// Compute the minimum acceptable next bid given the current snapshot,
    /// per BidEngine rule 4 — exposed here since both BidEngine and Monitor
    /// (for display) need it.
    pub fn minimum_next_bid(&self, settings: &Settings) -> Option<i64> {
        let data = self.data.as_ref()?;
        Some(match data.next_bid {
            Some(next_bid) => next_bid,
            None => safe_next(data.current_bid, self.config.effective_increment(settings)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_product_id_from_url() {
        assert_eq!(
            extract_sse_product_id("https://www.example.com/p/vintage-lamp/123456"),
            Some("123456".to_string())
        );
        assert_eq!(
            extract_sse_product_id("https://www.example.com/search?q=lamp"),
            None
        );
    }

    #[test]
    fn partial_config_overlays_settings_defaults() {
        let settings = Settings::default();
        let config = AuctionConfig::from_partial_with_defaults(
            PartialAuctionConfig {
                max_bid: Some(250),
                ..Default::default()
            },
            &settings,
        );
        assert_eq!(config.max_bid, 250);
        assert_eq!(config.strategy, Strategy::Auto);
        assert_eq!(config.increment_amount, 5);
        assert!(config.auto_bid);
    }

    #[test]
    fn merge_only_touches_present_fields() {
        let settings = Settings::default();
        let mut config =
            AuctionConfig::from_partial_with_defaults(PartialAuctionConfig::default(), &settings);
        let original_max_bid = config.max_bid;
        config.merge(PartialAuctionConfig {
            strategy: Some(Strategy::Sniping),
            ..Default::default()
        });
        assert_eq!(config.strategy, Strategy::Sniping);
        assert_eq!(config.max_bid, original_max_bid);
    }

    #[test]
    fn mark_ended_sets_ended_at_once() {
        let settings = Settings::default();
        let config =
            AuctionConfig::from_partial_with_defaults(PartialAuctionConfig::default(), &settings);
        let mut auction = Auction::new(
            "abc123",
            AuctionMetadata::default(),
            config,
            1_000,
        );
        let snapshot = AuctionSnapshot::new(10, None, 1, 1, false, true, 0, 0, 0);
        auction.mark_ended(snapshot.clone(), 2_000);
        assert_eq!(auction.status, AuctionStatus::Ended);
        assert_eq!(auction.ended_at_ms, Some(2_000));

        // Idempotent: a second fold does not move ended_at_ms.
        auction.mark_ended(snapshot, 3_000);
        assert_eq!(auction.ended_at_ms, Some(2_000));
    }
}

//! Process-wide [`Settings`], persisted under a single store key.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

/// Bidding policy selecting when BidEngine is allowed to act.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Never bid automatically.
    Manual,
    /// Bid whenever not winning and within budget.
    Auto,
    /// Only bid inside the tail window (`bidding.snipe_timing_s`).
    Sniping,
}

impl Strategy {
    /// Parse a strategy value, mapping the legacy `"increment"` spelling to
    /// `Auto`: `auto` is canonical, `increment` is a legacy alias seen on
    /// read.
    pub fn parse_with_legacy_alias(raw: &str) -> Option<Self> {
        match raw {
            "manual" => Some(Self::Manual),
            "auto" => Some(Self::Auto),
            "sniping" => Some(Self::Sniping),
            "increment" => Some(Self::Auto),
            _ => None,
        }
    }
}

impl Default for Strategy {
    fn default() -> Self {
        Self::Auto
    }
}

/// Deserialize a [`Strategy`] tolerating the legacy `"increment"` value.
fn deserialize_strategy_legacy<'de, D>(deserializer: D) -> Result<Strategy, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Strategy::parse_with_legacy_alias(&raw)
        .ok_or_else(|| de::Error::custom(format!("unknown strategy: {raw}")))
}

/// `general.*` settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralSettings {
    /// Used when a new monitor omits `max_bid`.
    #[serde(default = "default_max_bid")]
    pub default_max_bid: i64,
    /// Default strategy for newly created auctions.
    #[serde(
        default = "default_strategy",
        deserialize_with = "deserialize_strategy_legacy"
    )]
    pub default_strategy: Strategy,
    #[serde(default = "default_auto_bid")]
    pub auto_bid_default: bool,
}

fn default_max_bid() -> i64 {
    100
}
fn default_strategy() -> Strategy {
    Strategy::Auto
}
fn default_auto_bid() -> bool {
    true
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            default_max_bid: default_max_bid(),
            default_strategy: default_strategy(),
            auto_bid_default: default_auto_bid(),
        }
    }
}

/// `bidding.*` settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BiddingSettings {
    /// Tail window (seconds) in which the `sniping` strategy becomes active.
    #[serde(default = "default_snipe_timing_s")]
    pub snipe_timing_s: i64,
    /// Added to the computed next bid.
    #[serde(default)]
    pub bid_buffer: i64,
    /// Used when `AuctionConfig.increment_amount` is absent.
    #[serde(default = "default_increment")]
    pub default_increment: i64,
    /// Retry budget for retryable bid failures, clamped to `[1, 10]`.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
}

fn default_snipe_timing_s() -> i64 {
    30
}
fn default_increment() -> i64 {
    5
}
fn default_retry_attempts() -> u32 {
    3
}

impl Default for BiddingSettings {
    fn default() -> Self {
        Self {
            snipe_timing_s: default_snipe_timing_s(),
            bid_buffer: 0,
            default_increment: default_increment(),
            retry_attempts: default_retry_attempts(),
        }
    }
}

impl BiddingSettings {
    /// Retry attempts clamped into the valid `[1, 10]` range, defensive
    /// against a hand-edited settings blob.
    pub fn retry_attempts_clamped(&self) -> u32 {
        self.retry_attempts.clamp(1, 10)
    }
}

/// Process-wide settings singleton, persisted under `nellis:system:settings`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub general: GeneralSettings,
    #[serde(default)]
    pub bidding: BiddingSettings,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_increment_maps_to_auto() {
        assert_eq!(
            Strategy::parse_with_legacy_alias("increment"),
            Some(Strategy::Auto)
        );
    }

    #[test]
    fn defaults_have_expected_values() {
        let s = Settings::default();
        assert_eq!(s.general.default_max_bid, 100);
        assert_eq!(s.general.default_strategy, Strategy::Auto);
        assert!(s.general.auto_bid_default);
        assert_eq!(s.bidding.snipe_timing_s, 30);
        assert_eq!(s.bidding.bid_buffer, 0);
        assert_eq!(s.bidding.default_increment, 5);
        assert_eq!(s.bidding.retry_attempts, 3);
    }

    #[test]
    fn settings_round_trip_json() {
        let s = Settings::default();
        let json = serde_json::to_string(&s).unwrap();
        let back: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(back.general.default_max_bid, s.general.default_max_bid);
    }
}

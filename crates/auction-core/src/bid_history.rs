//! [`BidHistoryEntry`] — an append-only record of a bid placement attempt,
//! capped per auction.

use serde::{Deserialize, Serialize};

use crate::error::BidErrorKind;
use crate::settings::Strategy;

/// Outcome of a single bid placement attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BidOutcome {
    Placed,
    Failed,
}

/// One entry in an auction's append-only bid history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BidHistoryEntry {
    pub auction_id: String,
    pub amount: i64,
    pub strategy: Strategy,
    pub outcome: BidOutcome,
    /// Populated when `outcome == Failed`.
    pub error_kind: Option<BidErrorKind>,
    pub placed_at_ms: i64,
}

impl BidHistoryEntry {
    pub fn placed(
        auction_id: impl Into<String>,
        amount: i64,
        strategy: Strategy,
        placed_at_ms: i64,
    ) -> Self {
        Self {
            auction_id: auction_id.into(),
            amount,
            strategy,
            outcome: BidOutcome::Placed,
            error_kind: None,
            placed_at_ms,
        }
    }

    pub fn failed(
        auction_id: impl Into<String>,
        amount: i64,
        strategy: Strategy,
        kind: BidErrorKind,
        placed_at_ms: i64,
    ) -> Self {
        Self {
            auction_id: auction_id.into(),
            amount,
            strategy,
            outcome: BidOutcome::Failed,
            error_kind: Some(kind),
            placed_at_ms,
        }
    }
}

// `BidErrorKind` has no serde impl of its own (it is a plain enum with a
// hand-rolled Display); history entries serialize it by its string code so
// persisted history stays human-readable.
impl Serialize for BidErrorKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for BidErrorKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.as_str() {
            "DUPLICATE_AMOUNT" => Self::DuplicateAmount,
            "BID_TOO_LOW" => Self::BidTooLow,
            "AUCTION_ENDED" => Self::AuctionEnded,
            "OUTBID" => Self::Outbid,
            "SERVER_ERROR" => Self::ServerError,
            "CONNECTION_ERROR" => Self::ConnectionError,
            "BREAKER_OPEN" => Self::BreakerOpen,
            _ => Self::Unknown,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_entry_round_trips_error_kind() {
        let entry = BidHistoryEntry::failed("abc123", 50, Strategy::Auto, BidErrorKind::Outbid, 1_000);
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("OUTBID"));
        let back: BidHistoryEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back.error_kind, Some(BidErrorKind::Outbid));
    }

    #[test]
    fn placed_entry_has_no_error_kind() {
        let entry = BidHistoryEntry::placed("abc123", 50, Strategy::Auto, 1_000);
        assert_eq!(entry.outcome, BidOutcome::Placed);
        assert!(entry.error_kind.is_none());
    }
}

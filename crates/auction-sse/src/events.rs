//! Typed SSE events the tracker reacts to.

use auction_core::AuctionSnapshot;
use serde::Deserialize;

use crate::error::{SseError, SseResult};
use crate::parser::RawSseEvent;

/// A decoded SSE event, already routed to the product id it concerns where
/// applicable.
#[derive(Debug, Clone, PartialEq)]
pub enum SseEvent {
    /// The connection handshake completed and the stream is live.
    Connected,
    /// A keepalive with no payload.
    Ping,
    /// `ch_product_bids:<product_id>` — a fresh snapshot for that product.
    BidUpdate {
        product_id: String,
        snapshot: AuctionSnapshot,
    },
    /// `ch_product_closed:<product_id>` — the auction ended.
    Closed { product_id: String },
    /// An event this client doesn't recognize; carried through so callers
    /// can log it rather than silently dropping it.
    Unknown { event: Option<String> },
}

#[derive(Debug, Deserialize)]
struct BidUpdatePayload {
    #[serde(rename = "currentBid")]
    current_bid: i64,
    #[serde(rename = "nextBid")]
    next_bid: Option<i64>,
    #[serde(rename = "bidCount", default)]
    bid_count: u32,
    #[serde(rename = "watchers", default)]
    watcher_count: u32,
    #[serde(rename = "isWinning", default)]
    is_winning: bool,
    #[serde(rename = "timeRemaining", default)]
    time_remaining_s: i64,
    #[serde(rename = "endTime", default)]
    end_time_ms: i64,
}

/// Decode a [`RawSseEvent`] into a typed [`SseEvent`], given the current
/// wall clock in milliseconds for the snapshot's `retrieved_at_ms`.
pub fn decode(raw: &RawSseEvent, now_ms: i64) -> SseResult<SseEvent> {
    let Some(event_name) = raw.event.as_deref() else {
        return Ok(SseEvent::Unknown { event: None });
    };

    if event_name == "connected" {
        return Ok(SseEvent::Connected);
    }
    if event_name == "ping" {
        return Ok(SseEvent::Ping);
    }
    // The marketplace's own wire names (`ch_product_bids:<id>` /
    // `ch_product_closed:<id>`); `bid_update:`/`closed:` are kept as
    // aliases for the shorter names some diagnostics tooling emits.
    if let Some(product_id) = event_name
        .strip_prefix("ch_product_bids:")
        .or_else(|| event_name.strip_prefix("bid_update:"))
    {
        let payload: BidUpdatePayload = serde_json::from_str(&raw.data)
            .map_err(|e| SseError::MalformedPayload(e.to_string()))?;
        // A bid_update never carries its own closed flag, but a countdown
        // that has already reached zero is still a terminal transition.
        let ended = payload.time_remaining_s <= 0;
        return Ok(SseEvent::BidUpdate {
            product_id: product_id.to_string(),
            snapshot: AuctionSnapshot::new(
                payload.current_bid,
                payload.next_bid,
                payload.bid_count,
                payload.watcher_count,
                payload.is_winning,
                ended,
                payload.time_remaining_s,
                payload.end_time_ms,
                now_ms,
            ),
        });
    }
    if let Some(product_id) = event_name
        .strip_prefix("ch_product_closed:")
        .or_else(|| event_name.strip_prefix("closed:"))
    {
        return Ok(SseEvent::Closed {
            product_id: product_id.to_string(),
        });
    }

    Ok(SseEvent::Unknown {
        event: Some(event_name.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_bid_update_for_its_product_id() {
        let raw = RawSseEvent {
            event: Some("ch_product_bids:555".to_string()),
            data: r#"{"currentBid":40,"nextBid":45,"bidCount":3,"watchers":2,"isWinning":false,"timeRemaining":120,"endTime":999}"#.to_string(),
            id: None,
        };
        let event = decode(&raw, 1_000).unwrap();
        match event {
            SseEvent::BidUpdate { product_id, snapshot } => {
                assert_eq!(product_id, "555");
                assert_eq!(snapshot.current_bid, 40);
                assert_eq!(snapshot.retrieved_at_ms, 1_000);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn decodes_closed_event() {
        let raw = RawSseEvent {
            event: Some("ch_product_closed:777".to_string()),
            data: String::new(),
            id: None,
        };
        assert_eq!(
            decode(&raw, 0).unwrap(),
            SseEvent::Closed { product_id: "777".to_string() }
        );
    }

    #[test]
    fn decodes_legacy_short_event_names() {
        let raw = RawSseEvent {
            event: Some("closed:777".to_string()),
            data: String::new(),
            id: None,
        };
        assert_eq!(
            decode(&raw, 0).unwrap(),
            SseEvent::Closed { product_id: "777".to_string() }
        );
    }

    #[test]
    fn unrecognized_event_name_falls_through() {
        let raw = RawSseEvent {
            event: Some("some_future_event".to_string()),
            data: String::new(),
            id: None,
        };
        assert_eq!(
            decode(&raw, 0).unwrap(),
            SseEvent::Unknown { event: Some("some_future_event".to_string()) }
        );
    }
}

//! [`UpstreamClient`] — the marketplace REST boundary.

use std::time::Duration;

use auction_core::{AuctionSnapshot, BidErrorKind};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::circuit::CircuitBreaker;
use crate::error::{UpstreamError, UpstreamResult};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
/// Substring the marketplace's "accepted but outbid" response carries in
/// its free-text message. Prefer the structured fields below when present;
/// this substring check is the fallback trigger.
const OUTBID_MESSAGE_NEEDLE: &str = "higher maximum bid";

/// Configuration for [`UpstreamClient::new`].
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub breaker_failure_threshold: u32,
    pub breaker_cooldown: Duration,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.example-marketplace.test".to_string(),
            breaker_failure_threshold: 5,
            breaker_cooldown: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawAuctionState {
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
    /// The marketplace's own closed flag; not authoritative by itself —
    /// `is_closed = response.is_closed || market_status == "sold" ||
    /// time_remaining_s == 0`.
    #[serde(rename = "isClosed", default)]
    is_closed: bool,
    #[serde(rename = "marketStatus", default)]
    market_status: Option<String>,
    #[serde(rename = "timeRemaining", default)]
    time_remaining_s: i64,
    #[serde(rename = "endTime", default)]
    end_time_ms: i64,
}

#[derive(Debug, Serialize)]
struct PlaceBidRequest {
    #[serde(rename = "productId")]
    product_id: i64,
    bid: i64,
}

#[derive(Debug, Deserialize)]
struct PlaceBidResponse {
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    data: Option<PlaceBidResponseEnvelope>,
}

#[derive(Debug, Deserialize)]
struct PlaceBidResponseEnvelope {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<OutbidReflexPayload>,
}

#[derive(Debug, Deserialize)]
struct OutbidReflexPayload {
    #[serde(rename = "currentAmount")]
    current_amount: i64,
    #[serde(rename = "minimumNextBid")]
    minimum_next_bid: i64,
    #[serde(rename = "bidCount", default)]
    bid_count: u32,
    #[serde(rename = "bidderCount", default)]
    bidder_count: u32,
}

/// The upstream's own account of a just-accepted bid that was immediately
/// outbid by another user's standing maximum. When the structured fields
/// are present they're authoritative; the free-text substring match is
/// only the trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutbidReflex {
    pub current_bid: i64,
    pub next_bid: i64,
    pub bid_count: u32,
    pub bidder_count: u32,
}

/// Outcome of a successful `place_bid` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaceBidOutcome {
    /// Set when the response indicates the "accepted but outbid" reflex
    /// should fire.
    pub outbid_reflex: Option<OutbidReflex>,
}

/// The marketplace REST client: fetch auction state, place bids, validate
/// the stored session — guarded by a circuit breaker that opens after
/// repeated connection/server failures.
pub struct UpstreamClient {
    http: Client,
    config: UpstreamConfig,
    breaker: CircuitBreaker,
}

impl UpstreamClient {
    pub fn new(config: UpstreamConfig) -> UpstreamResult<Self> {
        let http = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(UpstreamError::Http)?;
        let breaker =
            CircuitBreaker::new(config.breaker_failure_threshold, config.breaker_cooldown);
        Ok(Self {
            http,
            config,
            breaker,
        })
    }

    fn guard_breaker(&self) -> UpstreamResult<()> {
        if self.breaker.is_open() {
            return Err(UpstreamError::BreakerOpen {
                tripped_at_ms: self.breaker.opened_at_ms(),
            });
        }
        Ok(())
    }

    /// Fetch the live state of one auction.
    pub async fn fetch_auction(
        &self,
        auction_id: &str,
        cookie_header: &str,
    ) -> UpstreamResult<AuctionSnapshot> {
        self.guard_breaker()?;
        let url = format!("{}/api/auctions/{auction_id}", self.config.base_url);

        let result = self
            .http
            .get(&url)
            .header("Cookie", cookie_header)
            .send()
            .await;

        let response = match result {
            Ok(r) => r,
            Err(e) => {
                self.breaker.record_failure();
                return Err(UpstreamError::Http(e));
            }
        };

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(UpstreamError::SessionInvalid);
        }
        if !status.is_success() {
            if status.is_server_error() {
                self.breaker.record_failure();
            }
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }

        let raw: RawAuctionState = response.json().await.map_err(UpstreamError::Http)?;
        self.breaker.record_success();

        let retrieved_at_ms = now_ms();
        // is_closed is the OR of three independent signals, none of which
        // alone is trustworthy (a slow-to-update isClosed flag, a
        // marketStatus string, or a countdown that's already hit zero).
        let is_closed = raw.is_closed
            || raw.market_status.as_deref() == Some("sold")
            || raw.time_remaining_s <= 0;
        Ok(AuctionSnapshot::new(
            raw.current_bid,
            raw.next_bid,
            raw.bid_count,
            raw.watcher_count,
            raw.is_winning,
            is_closed,
            raw.time_remaining_s,
            raw.end_time_ms,
            retrieved_at_ms,
        ))
    }

    /// Fetch several auctions concurrently.
    pub async fn fetch_many(
        &self,
        auction_ids: &[String],
        cookie_header: &str,
    ) -> Vec<(String, UpstreamResult<AuctionSnapshot>)> {
        let futures = auction_ids.iter().map(|id| async move {
            let result = self.fetch_auction(id, cookie_header).await;
            (id.clone(), result)
        });
        futures_util::future::join_all(futures).await
    }

    /// Place a bid, retrying retryable failures up to `max_attempts` with
    /// linear backoff of `1s * attempt number`.
    pub async fn place_bid(
        &self,
        auction_id: &str,
        product_id: i64,
        amount: i64,
        cookie_header: &str,
        max_attempts: u32,
    ) -> UpstreamResult<PlaceBidOutcome> {
        let mut attempt: u32 = 0;
        loop {
            self.guard_breaker()?;
            attempt += 1;
            match self
                .place_bid_once(product_id, amount, cookie_header)
                .await
            {
                Ok(outcome) => {
                    self.breaker.record_success();
                    return Ok(outcome);
                }
                Err(e) => {
                    if e.is_retryable() {
                        self.breaker.record_failure();
                    }
                    if !e.is_retryable() || attempt >= max_attempts {
                        return Err(e);
                    }
                    let delay = Duration::from_secs(attempt as u64);
                    warn!(
                        auction_id,
                        attempt,
                        delay_ms = delay.as_millis(),
                        error = %e,
                        "retrying bid placement"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn place_bid_once(
        &self,
        product_id: i64,
        amount: i64,
        cookie_header: &str,
    ) -> UpstreamResult<PlaceBidOutcome> {
        let url = format!("{}/api/bid", self.config.base_url);
        let body = serde_json::to_string(&PlaceBidRequest {
            product_id,
            bid: amount,
        })
        .map_err(UpstreamError::Parse)?;

        let response = self
            .http
            .post(&url)
            .header("Cookie", cookie_header)
            .header("Content-Type", "text/plain;charset=UTF-8")
            .body(body)
            .send()
            .await
            .map_err(UpstreamError::Http)?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(UpstreamError::SessionInvalid);
        }
        if status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: PlaceBidResponse = response.json().await.map_err(UpstreamError::Http)?;
        if !(status == StatusCode::OK || status == StatusCode::CREATED) || !parsed.success {
            let kind = classify_bid_error(parsed.code.as_deref());
            return Err(UpstreamError::Bid {
                kind,
                message: parsed.error.unwrap_or_default(),
            });
        }

        debug!(product_id, amount, "bid placed");
        Ok(PlaceBidOutcome {
            outbid_reflex: outbid_reflex_from(&parsed),
        })
    }

    /// Validate the stored session is still accepted by the marketplace.
    pub async fn validate_session(&self, cookie_header: &str) -> UpstreamResult<bool> {
        self.guard_breaker()?;
        let url = format!("{}/api/session", self.config.base_url);
        let response = self
            .http
            .get(&url)
            .header("Cookie", cookie_header)
            .send()
            .await
            .map_err(UpstreamError::Http)?;

        Ok(response.status().is_success())
    }
}

fn classify_bid_error(code: Option<&str>) -> BidErrorKind {
    match code {
        Some("DUPLICATE_AMOUNT") => BidErrorKind::DuplicateAmount,
        Some("BID_TOO_LOW") => BidErrorKind::BidTooLow,
        Some("AUCTION_ENDED") => BidErrorKind::AuctionEnded,
        Some("OUTBID") => BidErrorKind::Outbid,
        _ => BidErrorKind::Unknown,
    }
}

/// Detect the "accepted but outbid" reflex trigger in a successful
/// response.
fn outbid_reflex_from(parsed: &PlaceBidResponse) -> Option<OutbidReflex> {
    let envelope = parsed.data.as_ref()?;
    let is_outbid_message = envelope
        .message
        .as_deref()
        .is_some_and(|m| m.contains(OUTBID_MESSAGE_NEEDLE));
    if !is_outbid_message {
        return None;
    }
    let inner = envelope.data.as_ref()?;
    Some(OutbidReflex {
        current_bid: inner.current_amount,
        next_bid: inner.minimum_next_bid,
        bid_count: inner.bid_count,
        bidder_count: inner.bidder_count,
    })
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
    fn classifies_known_bid_error_codes() {
        assert_eq!(
            classify_bid_error(Some("OUTBID")),
            BidErrorKind::Outbid
        );
        assert_eq!(classify_bid_error(Some("BID_TOO_LOW")), BidErrorKind::BidTooLow);
        assert_eq!(classify_bid_error(Some("NOT_A_CODE")), BidErrorKind::Unknown);
        assert_eq!(classify_bid_error(None), BidErrorKind::Unknown);
    }

    #[test]
    fn outbid_reflex_requires_both_message_and_structured_data() {
        let parsed = PlaceBidResponse {
            success: true,
            error: None,
            code: None,
            data: Some(PlaceBidResponseEnvelope {
                message: Some("another user has a higher maximum bid on this item".into()),
                data: Some(OutbidReflexPayload {
                    current_amount: 50,
                    minimum_next_bid: 55,
                    bid_count: 3,
                    bidder_count: 2,
                }),
            }),
        };
        let reflex = outbid_reflex_from(&parsed).expect("reflex should trigger");
        assert_eq!(reflex.current_bid, 50);
        assert_eq!(reflex.next_bid, 55);
    }

    #[test]
    fn no_reflex_without_the_message_substring() {
        let parsed = PlaceBidResponse {
            success: true,
            error: None,
            code: None,
            data: Some(PlaceBidResponseEnvelope {
                message: Some("bid accepted".into()),
                data: None,
            }),
        };
        assert!(outbid_reflex_from(&parsed).is_none());
    }
}

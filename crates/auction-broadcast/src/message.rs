//! Wire frame shapes for the subscriber WebSocket transport.
//!
//! A tagged-enum serde pattern, adapted to the exact mixed-case frame
//! type strings the wire protocol uses.

use auction_core::{Auction, BidErrorKind, PartialAuctionConfig};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A frame sent by a subscriber (browser extension, dashboard, CLI).
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ClientFrame {
    #[serde(rename = "authenticate")]
    Authenticate { token: String },
    #[serde(rename = "subscribe")]
    Subscribe { auction_ids: Vec<String> },
    #[serde(rename = "unsubscribe")]
    Unsubscribe { auction_ids: Vec<String> },
    #[serde(rename = "startMonitoring")]
    StartMonitoring {
        auction_id: String,
        #[serde(default)]
        title: String,
        #[serde(default)]
        url: String,
        #[serde(default)]
        image_url: String,
        #[serde(default)]
        config: PartialAuctionConfig,
    },
    #[serde(rename = "stopMonitoring")]
    StopMonitoring { auction_id: String },
    #[serde(rename = "updateConfig")]
    UpdateConfig {
        auction_id: String,
        config: PartialAuctionConfig,
    },
    #[serde(rename = "placeBid")]
    PlaceBid { auction_id: String, amount: i64 },
    #[serde(rename = "getMonitoredAuctions")]
    GetMonitoredAuctions,
    #[serde(rename = "ping")]
    Ping,
}

impl ClientFrame {
    /// Admission control: every frame requires prior
    /// `authenticate` except `authenticate` and `ping` themselves.
    pub fn requires_auth(&self) -> bool {
        !matches!(self, Self::Authenticate { .. } | Self::Ping)
    }
}

/// A frame sent to a subscriber.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ServerFrame {
    #[serde(rename = "connected")]
    Connected { session_id: Uuid },
    #[serde(rename = "authenticated")]
    Authenticated { success: bool },
    #[serde(rename = "auctionState")]
    AuctionState { auctions: Vec<Auction> },
    #[serde(rename = "auctionUpdate")]
    AuctionUpdate { auction: Auction },
    #[serde(rename = "response")]
    Response {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },
    #[serde(rename = "bidResult")]
    BidResult {
        auction_id: String,
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error_kind: Option<BidErrorKind>,
    },
    #[serde(rename = "error")]
    Error { message: String, code: String },
    #[serde(rename = "pong")]
    Pong,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authenticate_and_ping_bypass_admission_control() {
        assert!(!ClientFrame::Authenticate { token: "t".into() }.requires_auth());
        assert!(!ClientFrame::Ping.requires_auth());
        assert!(ClientFrame::GetMonitoredAuctions.requires_auth());
    }

    #[test]
    fn client_frame_tags_match_wire_names() {
        let raw = r#"{"type":"startMonitoring","auction_id":"123456"}"#;
        let frame: ClientFrame = serde_json::from_str(raw).unwrap();
        matches!(frame, ClientFrame::StartMonitoring { .. });
    }

    #[test]
    fn response_frame_omits_absent_fields() {
        let frame = ServerFrame::Response {
            success: true,
            error: None,
            code: None,
        };
        let json = serde_json::to_string(&frame).unwrap();
        assert!(!json.contains("error"));
        assert!(!json.contains("code"));
    }
}

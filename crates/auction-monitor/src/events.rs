//! [`MonitorEvent`] — lifecycle and state-change events broadcast to any
//! subscriber (e.g. the not-yet-connected fan-out broadcaster) so they stay
//! decoupled from Monitor's internals.

use auction_core::{Auction, BidErrorKind, Transport};

#[derive(Debug, Clone)]
pub enum MonitorEvent {
    Added(Auction),
    Updated(Auction),
    Ended(Auction),
    Removed { auction_id: String },
    BidPlaced { auction_id: String, amount: i64 },
    BidFailed { auction_id: String, kind: BidErrorKind },
    TransportChanged { auction_id: String, transport: Transport },
}

impl MonitorEvent {
    pub fn auction_id(&self) -> &str {
        match self {
            Self::Added(a) | Self::Updated(a) | Self::Ended(a) => &a.auction_id,
            Self::Removed { auction_id }
            | Self::BidPlaced { auction_id, .. }
            | Self::BidFailed { auction_id, .. }
            | Self::TransportChanged { auction_id, .. } => auction_id,
        }
    }
}

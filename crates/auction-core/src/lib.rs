//! Shared data model, error taxonomy, and safe arithmetic for the auction
//! tracking core. Every other crate in the workspace depends on this one.

pub mod auction;
pub mod bid_history;
pub mod error;
pub mod money;
pub mod settings;
pub mod snapshot;

pub use auction::{
    extract_sse_product_id, Auction, AuctionConfig, AuctionMetadata, AuctionStatus,
    PartialAuctionConfig, Transport,
};
pub use bid_history::{BidHistoryEntry, BidOutcome};
pub use error::{BidErrorKind, CoreError, CoreResult};
pub use money::{exceeds_budget, safe_add, safe_next, MAX_BID_CAP};
pub use settings::{BiddingSettings, GeneralSettings, Settings, Strategy};

//! In-memory view of every monitored auction, kept current by each
//! per-auction task. Gives readers a consistent, non-torn view.

use std::collections::HashMap;

use auction_core::Auction;
use parking_lot::RwLock;

#[derive(Default)]
pub struct Registry {
    auctions: RwLock<HashMap<String, Auction>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, auction: Auction) {
        self.auctions.write().insert(auction.auction_id.clone(), auction);
    }

    pub fn update(&self, auction: Auction) {
        self.auctions.write().insert(auction.auction_id.clone(), auction);
    }

    pub fn remove(&self, auction_id: &str) -> Option<Auction> {
        self.auctions.write().remove(auction_id)
    }

    pub fn get(&self, auction_id: &str) -> Option<Auction> {
        self.auctions.read().get(auction_id).cloned()
    }

    pub fn contains(&self, auction_id: &str) -> bool {
        self.auctions.read().contains_key(auction_id)
    }

    pub fn snapshot_all(&self) -> Vec<Auction> {
        self.auctions.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.auctions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auction_core::{AuctionConfig, AuctionMetadata, PartialAuctionConfig, Settings};

    fn auction(id: &str) -> Auction {
        let settings = Settings::default();
        let config = AuctionConfig::from_partial_with_defaults(PartialAuctionConfig::default(), &settings);
        Auction::new(id, AuctionMetadata::default(), config, 0)
    }

    #[test]
    fn insert_get_remove_round_trip() {
        let registry = Registry::new();
        registry.insert(auction("abc123"));
        assert!(registry.contains("abc123"));
        assert_eq!(registry.get("abc123").unwrap().auction_id, "abc123");
        assert_eq!(registry.remove("abc123").unwrap().auction_id, "abc123");
        assert!(!registry.contains("abc123"));
    }

    #[test]
    fn snapshot_all_reflects_every_insert() {
        let registry = Registry::new();
        registry.insert(auction("a"));
        registry.insert(auction("b"));
        assert_eq!(registry.snapshot_all().len(), 2);
    }
}

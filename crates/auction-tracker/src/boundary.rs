//! `BoundaryAPI`: the thin command surface REST and WebSocket
//! transports both dispatch into. Validation has already run by the time a
//! call reaches here — this module only orchestrates the core crates.

use std::sync::Arc;

use auction_core::{
    Auction, AuctionMetadata, BidHistoryEntry, BidOutcome, PartialAuctionConfig, Settings,
};
use auction_monitor::Monitor;
use auction_store::Store;
use auction_upstream::UpstreamClient;

use crate::error::AppResult;

/// Result of a manual `place_bid` call, assembled from the
/// freshest bid-history entry since [`Monitor::manual_bid`] only acks
/// acceptance of the command — the outcome itself lands asynchronously.
#[derive(Debug, Clone, serde::Serialize)]
pub struct BidResult {
    pub success: bool,
    pub amount: i64,
    pub outcome: Option<BidHistoryEntry>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct AuthStatus {
    pub authenticated: bool,
    pub cookie_count: usize,
}

pub struct BoundaryApi {
    monitor: Arc<Monitor>,
    store: Arc<Store>,
    upstream: Arc<UpstreamClient>,
}

impl BoundaryApi {
    pub fn new(monitor: Arc<Monitor>, store: Arc<Store>, upstream: Arc<UpstreamClient>) -> Self {
        Self {
            monitor,
            store,
            upstream,
        }
    }

    pub async fn start_monitoring(
        &self,
        auction_id: String,
        metadata: AuctionMetadata,
        partial_config: PartialAuctionConfig,
    ) -> AppResult<Auction> {
        Ok(self
            .monitor
            .add(auction_id, metadata, partial_config)
            .await?)
    }

    pub async fn stop_monitoring(&self, auction_id: &str) -> bool {
        self.monitor.remove(auction_id).await.is_ok()
    }

    pub async fn update_config(
        &self,
        auction_id: &str,
        partial: PartialAuctionConfig,
    ) -> AppResult<()> {
        Ok(self.monitor.update_config(auction_id, partial).await?)
    }

    /// `place_bid` bypasses strategy — used for manual bids.
    /// `Monitor::manual_bid` only confirms the command reached the
    /// auction's fold queue; we read back the freshest history entry it
    /// appended to report what actually happened.
    pub async fn place_bid(&self, auction_id: &str, amount: i64) -> AppResult<BidResult> {
        self.monitor.manual_bid(auction_id, amount).await?;
        let history = self.store.get_bid_history(auction_id).await?;
        let outcome = history
            .into_iter()
            .filter(|entry| entry.amount == amount)
            .last();
        let success = matches!(
            outcome.as_ref().map(|e| e.outcome),
            Some(BidOutcome::Placed)
        );
        Ok(BidResult {
            success,
            amount,
            outcome,
        })
    }

    pub fn get_monitored(&self) -> Vec<Auction> {
        self.monitor.get_monitored()
    }

    pub fn get_auction(&self, auction_id: &str) -> Option<Auction> {
        self.monitor.get(auction_id)
    }

    pub async fn get_bid_history(
        &self,
        auction_id: &str,
        limit: Option<usize>,
    ) -> AppResult<Vec<BidHistoryEntry>> {
        let mut history = self.store.get_bid_history(auction_id).await?;
        history.reverse(); // newest-first
        if let Some(limit) = limit {
            history.truncate(limit);
        }
        Ok(history)
    }

    /// `set_credentials`: persists the cookie string and
    /// triggers session validation against the marketplace.
    pub async fn set_credentials(&self, cookie_string: String) -> AppResult<bool> {
        self.store.save_cookies(&cookie_string).await?;
        let valid = self.upstream.validate_session(&cookie_string).await?;
        Ok(valid)
    }

    pub async fn check_auth(&self) -> AppResult<AuthStatus> {
        let cookies = self.store.get_cookies().await?;
        let cookie_count = cookies
            .as_deref()
            .map(|c| c.split(';').filter(|s| !s.trim().is_empty()).count())
            .unwrap_or(0);
        let authenticated = match cookies {
            Some(ref header) => self.upstream.validate_session(header).await.unwrap_or(false),
            None => false,
        };
        Ok(AuthStatus {
            authenticated,
            cookie_count,
        })
    }

    pub async fn get_settings(&self) -> AppResult<Settings> {
        Ok(self.store.get_settings().await?)
    }

    pub async fn save_settings(&self, settings: &Settings) -> AppResult<()> {
        Ok(self.store.save_settings(settings).await?)
    }
}

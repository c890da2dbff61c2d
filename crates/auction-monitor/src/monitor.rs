//! [`Monitor`] — the orchestrator owning every per-auction task, the
//! shared SSE connection's event router, and the registry readers query
//!.

use std::collections::HashMap;
use std::sync::Arc;

use auction_core::{Auction, AuctionConfig, AuctionMetadata, PartialAuctionConfig, Transport};
use auction_sse::{ClientEvent, SseClient, SseConfig, SseEvent};
use auction_store::Store;
use auction_upstream::UpstreamClient;
use parking_lot::RwLock;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::command::{Command, TaskEvent};
use crate::error::{MonitorError, MonitorResult};
use crate::events::MonitorEvent;
use crate::registry::Registry;
use crate::task::{self, AuctionTaskHandle};

pub struct Monitor {
    store: Arc<Store>,
    upstream: Arc<UpstreamClient>,
    sse: Arc<SseClient>,
    registry: Arc<Registry>,
    handles: RwLock<HashMap<String, AuctionTaskHandle>>,
    /// Maps an SSE product id back to the auction id it was registered
    /// under, since the two are not always the same string.
    product_index: RwLock<HashMap<String, String>>,
    events_tx: broadcast::Sender<MonitorEvent>,
    cancel: CancellationToken,
}

impl Monitor {
    pub fn new(
        store: Arc<Store>,
        upstream: Arc<UpstreamClient>,
        sse_config: SseConfig,
        cancel: CancellationToken,
    ) -> Arc<Self> {
        let (sse, sse_rx) = SseClient::new(sse_config);
        let (events_tx, _) = broadcast::channel(256);

        let monitor = Arc::new(Self {
            store,
            upstream,
            sse,
            registry: Arc::new(Registry::new()),
            handles: RwLock::new(HashMap::new()),
            product_index: RwLock::new(HashMap::new()),
            events_tx,
            cancel,
        });

        let router = monitor.clone();
        tokio::spawn(async move { router.run_sse_router(sse_rx).await });

        monitor
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<MonitorEvent> {
        self.events_tx.subscribe()
    }

    pub fn get_monitored(&self) -> Vec<Auction> {
        self.registry.snapshot_all()
    }

    pub fn get(&self, auction_id: &str) -> Option<Auction> {
        self.registry.get(auction_id)
    }

    /// Register and start monitoring a new auction. Persists immediately
    /// and spawns its task.
    pub async fn add(
        self: &Arc<Self>,
        auction_id: String,
        metadata: AuctionMetadata,
        partial_config: PartialAuctionConfig,
    ) -> MonitorResult<Auction> {
        if self.registry.contains(&auction_id) {
            return Err(MonitorError::AlreadyMonitored(auction_id));
        }

        let settings = self.store.get_settings().await?;
        let config = AuctionConfig::from_partial_with_defaults(partial_config, &settings);
        let mut auction = Auction::new(auction_id.clone(), metadata, config, now_ms());

        // Optimistic transport selection: assume SSE works until told
        // otherwise by a fallback signal — the multiplexed connection has
        // no synchronous connect handshake to confirm it upfront.
        if auction.sse_product_id.is_some() {
            auction.transport = Transport::Sse;
        }

        self.store.save_auction(&auction).await?;
        self.register_task(auction.clone());
        let _ = self.events_tx.send(MonitorEvent::Added(auction.clone()));
        Ok(auction)
    }

    /// Re-register an auction loaded from the store without re-persisting
    /// it or re-running the `AlreadyMonitored` guard.
    pub(crate) fn resume(self: &Arc<Self>, auction: Auction) {
        self.register_task(auction);
    }

    pub(crate) async fn store_list_auction_ids(&self) -> MonitorResult<Vec<String>> {
        Ok(self.store.list_auction_ids().await?)
    }

    pub(crate) async fn store_get_auction(&self, auction_id: &str) -> MonitorResult<Option<Auction>> {
        Ok(self.store.get_auction(auction_id).await?)
    }

    fn register_task(self: &Arc<Self>, auction: Auction) {
        let auction_id = auction.auction_id.clone();
        if let Some(product_id) = auction.sse_product_id.clone() {
            self.product_index.write().insert(product_id, auction_id.clone());
        }
        let handle = task::spawn(
            auction,
            self.store.clone(),
            self.upstream.clone(),
            self.sse.clone(),
            self.registry.clone(),
            self.events_tx.clone(),
            &self.cancel,
        );
        self.handles.write().insert(auction_id, handle);
    }

    pub async fn remove(&self, auction_id: &str) -> MonitorResult<()> {
        let handle = self
            .handles
            .write()
            .remove(auction_id)
            .ok_or_else(|| MonitorError::NotMonitored(auction_id.to_string()))?;

        let _ = handle.tx.send(TaskEvent::Command(Command::Remove)).await;
        handle.cancel.cancel();

        self.product_index.write().retain(|_, v| v != auction_id);
        self.registry.remove(auction_id);

        if let Err(e) = self.store.delete_auction(auction_id).await {
            warn!(auction_id, error = %e, "failed to delete auction from store");
        }

        let _ = self.events_tx.send(MonitorEvent::Removed {
            auction_id: auction_id.to_string(),
        });
        Ok(())
    }

    pub async fn update_config(
        &self,
        auction_id: &str,
        partial: PartialAuctionConfig,
    ) -> MonitorResult<()> {
        let tx = self.sender_for(auction_id)?;
        tx.send(TaskEvent::Command(Command::UpdateConfig(partial)))
            .await
            .map_err(|_| MonitorError::NotMonitored(auction_id.to_string()))
    }

    pub async fn manual_bid(&self, auction_id: &str, amount: i64) -> MonitorResult<()> {
        let tx = self.sender_for(auction_id)?;
        let (reply_tx, reply_rx) = oneshot::channel();
        tx.send(TaskEvent::Command(Command::ManualBid {
            amount,
            reply: reply_tx,
        }))
        .await
        .map_err(|_| MonitorError::NotMonitored(auction_id.to_string()))?;
        reply_rx
            .await
            .map_err(|_| MonitorError::Internal("auction task dropped manual bid reply".into()))?
    }

    fn sender_for(&self, auction_id: &str) -> MonitorResult<mpsc::Sender<TaskEvent>> {
        self.handles
            .read()
            .get(auction_id)
            .map(|h| h.tx.clone())
            .ok_or_else(|| MonitorError::NotMonitored(auction_id.to_string()))
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    async fn run_sse_router(&self, mut rx: mpsc::Receiver<ClientEvent>) {
        while let Some(event) = rx.recv().await {
            match event {
                ClientEvent::Wire(wire) => self.route_wire_event(wire).await,
                ClientEvent::FallbackSuggested { product_ids } => {
                    for product_id in product_ids {
                        self.route_fallback(&product_id).await;
                    }
                }
                ClientEvent::Disconnected => {}
            }
        }
    }

    async fn route_wire_event(&self, wire: SseEvent) {
        let product_id = match &wire {
            SseEvent::BidUpdate { product_id, .. } => Some(product_id.clone()),
            SseEvent::Closed { product_id } => Some(product_id.clone()),
            SseEvent::Connected | SseEvent::Ping | SseEvent::Unknown { .. } => None,
        };
        let Some(product_id) = product_id else {
            return;
        };
        let Some(auction_id) = self.product_index.read().get(&product_id).cloned() else {
            return;
        };
        let tx = self.handles.read().get(&auction_id).map(|h| h.tx.clone());
        if let Some(tx) = tx {
            let _ = tx.send(TaskEvent::Sse(wire)).await;
        }
    }

    async fn route_fallback(&self, product_id: &str) {
        let Some(auction_id) = self.product_index.read().get(product_id).cloned() else {
            return;
        };
        let tx = self.handles.read().get(&auction_id).map(|h| h.tx.clone());
        if let Some(tx) = tx {
            let _ = tx.send(TaskEvent::SseFallback).await;
        }
    }
}

fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_millis() as i64
}

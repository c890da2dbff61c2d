//! The per-auction actor: one task per monitored auction, folding poll
//! ticks, forwarded SSE events and boundary commands serially through a
//! single queue.

use std::sync::Arc;
use std::time::Duration;

use auction_bid::{decide, BidDecision, NoBidReason};
use auction_core::{
    Auction, AuctionStatus, BidHistoryEntry, Settings, Strategy, Transport,
};
use auction_sse::{SseClient, SseEvent};
use auction_store::Store;
use auction_telemetry::Metrics;
use auction_upstream::UpstreamClient;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::command::{Command, TaskEvent};
use crate::events::MonitorEvent;
use crate::registry::Registry;

/// Default poll cadence outside the tail window.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(6);
/// Poll cadence once inside the sniping tail window.
const TAIL_POLL_INTERVAL: Duration = Duration::from_secs(2);
/// Safety-net poll cadence while SSE is believed to be carrying updates.
const SSE_FALLBACK_POLL_INTERVAL: Duration = Duration::from_secs(30);
/// Idle cadence once an auction has ended; the cleanup sweep, not this
/// task, decides when it is actually removed.
const ENDED_IDLE_INTERVAL: Duration = Duration::from_secs(3600);
/// Delay before re-evaluating the bid engine after an "accepted but
/// outbid" reflex.
const OUTBID_REFLEX_DELAY: Duration = Duration::from_secs(2);
/// Defensive bound on consecutive reflex re-bids against one placement,
/// guarding against a pathological upstream ping-ponging the budget rule.
const MAX_OUTBID_REFLEX_ITERATIONS: u32 = 10;

pub struct AuctionTaskHandle {
    pub tx: mpsc::Sender<TaskEvent>,
    pub cancel: CancellationToken,
}

pub fn spawn(
    auction: Auction,
    store: Arc<Store>,
    upstream: Arc<UpstreamClient>,
    sse: Arc<SseClient>,
    registry: Arc<Registry>,
    events_tx: broadcast::Sender<MonitorEvent>,
    parent_cancel: &CancellationToken,
) -> AuctionTaskHandle {
    let (tx, rx) = mpsc::channel(64);
    let cancel = parent_cancel.child_token();

    let task = AuctionTask {
        auction,
        store,
        upstream,
        sse,
        registry,
        events_tx,
        cancel: cancel.clone(),
        rx,
    };

    tokio::spawn(task.run());

    AuctionTaskHandle { tx, cancel }
}

struct AuctionTask {
    auction: Auction,
    store: Arc<Store>,
    upstream: Arc<UpstreamClient>,
    sse: Arc<SseClient>,
    registry: Arc<Registry>,
    events_tx: broadcast::Sender<MonitorEvent>,
    cancel: CancellationToken,
    rx: mpsc::Receiver<TaskEvent>,
}

impl AuctionTask {
    async fn run(mut self) {
        info!(auction_id = %self.auction.auction_id, "auction task started");
        self.registry.insert(self.auction.clone());

        if self.auction.sse_product_id.is_some() && self.auction.transport == Transport::Sse {
            if let Some(product_id) = self.auction.sse_product_id.clone() {
                self.sse.subscribe(product_id);
            }
        }

        // Fetch an initial snapshot right away rather than waiting a full
        // poll interval, so newly added auctions show state immediately.
        if self.auction.status != AuctionStatus::Ended {
            self.poll_once().await;
        }

        loop {
            let settings = self.store.get_settings().await.unwrap_or_default();
            let delay = self.current_poll_delay(&settings);

            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    self.poll_once().await;
                }
                msg = self.rx.recv() => {
                    match msg {
                        Some(TaskEvent::Sse(event)) => self.on_sse_event(event).await,
                        Some(TaskEvent::SseFallback) => self.on_sse_fallback().await,
                        Some(TaskEvent::Command(cmd)) => {
                            if self.on_command(cmd).await {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = self.cancel.cancelled() => break,
            }
        }

        if let Some(product_id) = &self.auction.sse_product_id {
            self.sse.unsubscribe(product_id);
        }
        self.registry.remove(&self.auction.auction_id);
        info!(auction_id = %self.auction.auction_id, "auction task stopped");
    }

    fn current_poll_delay(&self, settings: &Settings) -> Duration {
        if self.auction.status == AuctionStatus::Ended {
            return ENDED_IDLE_INTERVAL;
        }
        let in_tail = self
            .auction
            .data
            .as_ref()
            .map(|d| d.in_tail_window(settings.bidding.snipe_timing_s))
            .unwrap_or(false);
        if in_tail {
            return TAIL_POLL_INTERVAL;
        }
        match self.auction.transport {
            Transport::Sse => SSE_FALLBACK_POLL_INTERVAL,
            Transport::Polling => DEFAULT_POLL_INTERVAL,
        }
    }

    async fn poll_once(&mut self) {
        let Some(cookie_header) = self.store.get_cookies().await.unwrap_or(None) else {
            warn!(auction_id = %self.auction.auction_id, "no session cookie stored, skipping poll");
            return;
        };
        match self
            .upstream
            .fetch_auction(&self.auction.auction_id, &cookie_header)
            .await
        {
            Ok(snapshot) => self.apply_snapshot(snapshot).await,
            Err(e) => {
                debug!(auction_id = %self.auction.auction_id, error = %e, "poll failed");
            }
        }
    }

    async fn on_sse_event(&mut self, event: SseEvent) {
        match event {
            SseEvent::BidUpdate { snapshot, .. } => self.apply_snapshot(snapshot).await,
            SseEvent::Closed { .. } => {
                if let Some(mut snapshot) = self.auction.data.clone() {
                    snapshot.ended = true;
                    self.apply_snapshot(snapshot).await;
                }
            }
            SseEvent::Connected | SseEvent::Ping | SseEvent::Unknown { .. } => {}
        }
    }

    async fn on_sse_fallback(&mut self) {
        if self.auction.transport == Transport::Polling {
            return;
        }
        warn!(auction_id = %self.auction.auction_id, "sse fallback triggered, switching to polling");
        self.auction.transport = Transport::Polling;
        self.auction.fallback_polling = true;
        Metrics::transport_set(&self.auction.auction_id, "polling");
        let _ = self.events_tx.send(MonitorEvent::TransportChanged {
            auction_id: self.auction.auction_id.clone(),
            transport: Transport::Polling,
        });
        self.persist().await;
    }

    async fn apply_snapshot(&mut self, snapshot: auction_core::AuctionSnapshot) {
        let now = now_ms();
        let was_ended = self.auction.status == AuctionStatus::Ended;
        if snapshot.ended {
            self.auction.mark_ended(snapshot, now);
        } else {
            self.auction.data = Some(snapshot);
            self.auction.last_update_ms = now;
        }
        self.persist().await;

        if !was_ended && self.auction.status == AuctionStatus::Ended {
            let _ = self.events_tx.send(MonitorEvent::Ended(self.auction.clone()));
        } else {
            let _ = self.events_tx.send(MonitorEvent::Updated(self.auction.clone()));
        }

        if self.auction.status != AuctionStatus::Ended {
            let settings = self.store.get_settings().await.unwrap_or_default();
            self.maybe_bid(&settings).await;
        }
    }

    async fn maybe_bid(&mut self, settings: &Settings) {
        let mut reflex_iterations = 0u32;
        loop {
            match decide(&self.auction, settings) {
                BidDecision::Skip { reason: NoBidReason::BudgetExceeded } => {
                    if !self.auction.max_bid_reached {
                        self.auction.max_bid_reached = true;
                        Metrics::max_bid_reached(strategy_label(self.auction.config.strategy));
                        self.persist().await;
                    }
                    return;
                }
                BidDecision::Skip { .. } => return,
                BidDecision::Bid { amount } => {
                    if !self.place_bid(amount, settings, &mut reflex_iterations).await {
                        return;
                    }
                }
            }
        }
    }

    /// Place one bid and, if the upstream reports the "accepted but
    /// outbid" reflex, fold the refreshed snapshot back in. Returns
    /// `true` if the caller should loop and re-evaluate `decide()`.
    async fn place_bid(
        &mut self,
        amount: i64,
        settings: &Settings,
        reflex_iterations: &mut u32,
    ) -> bool {
        let strategy = strategy_label(self.auction.config.strategy);
        let Ok(product_id) = parse_product_id(&self.auction.auction_id) else {
            warn!(auction_id = %self.auction.auction_id, "cannot place bid: non-numeric auction id");
            return false;
        };
        let Some(cookie_header) = self.store.get_cookies().await.unwrap_or(None) else {
            warn!(auction_id = %self.auction.auction_id, "cannot place bid: no session cookie stored");
            return false;
        };

        let now = now_ms();
        let result = self
            .upstream
            .place_bid(
                &self.auction.auction_id,
                product_id,
                amount,
                &cookie_header,
                settings.bidding.retry_attempts_clamped(),
            )
            .await;

        match result {
            Ok(outcome) => {
                self.auction.record_bid(amount, now);
                self.persist().await;
                if let Err(e) = self
                    .store
                    .append_bid_history(&BidHistoryEntry::placed(
                        &self.auction.auction_id,
                        amount,
                        self.auction.config.strategy,
                        now,
                    ))
                    .await
                {
                    warn!(auction_id = %self.auction.auction_id, error = %e, "failed to append bid history");
                }
                Metrics::bid_attempt(strategy, "placed");
                let _ = self.events_tx.send(MonitorEvent::BidPlaced {
                    auction_id: self.auction.auction_id.clone(),
                    amount,
                });

                match outcome.outbid_reflex {
                    // Only `auto` re-enters the bid loop on its own; sniping
                    // bids once near close and manual waits for the user, so
                    // an outbid reflex for either just ends the attempt here.
                    Some(reflex)
                        if self.auction.config.strategy == Strategy::Auto
                            && *reflex_iterations < MAX_OUTBID_REFLEX_ITERATIONS =>
                    {
                        *reflex_iterations += 1;
                        Metrics::bid_retry("outbid_reflex");
                        if let Some(data) = self.auction.data.as_mut() {
                            data.current_bid = reflex.current_bid;
                            data.next_bid = Some(reflex.next_bid);
                            data.bid_count = reflex.bid_count;
                            data.watcher_count = data.watcher_count.max(reflex.bidder_count);
                            data.is_winning = false;
                        }
                        self.persist().await;
                        tokio::select! {
                            _ = tokio::time::sleep(OUTBID_REFLEX_DELAY) => true,
                            _ = self.cancel.cancelled() => false,
                        }
                    }
                    _ => false,
                }
            }
            Err(e) => {
                let kind = e.kind();
                if let Err(store_err) = self
                    .store
                    .append_bid_history(&BidHistoryEntry::failed(
                        &self.auction.auction_id,
                        amount,
                        self.auction.config.strategy,
                        kind,
                        now,
                    ))
                    .await
                {
                    warn!(auction_id = %self.auction.auction_id, error = %store_err, "failed to append bid history");
                }
                Metrics::bid_attempt(strategy, "failed");
                let _ = self.events_tx.send(MonitorEvent::BidFailed {
                    auction_id: self.auction.auction_id.clone(),
                    kind,
                });
                false
            }
        }
    }

    async fn on_command(&mut self, cmd: Command) -> bool {
        match cmd {
            Command::UpdateConfig(partial) => {
                self.auction.config.merge(partial);
                self.persist().await;
                let _ = self.events_tx.send(MonitorEvent::Updated(self.auction.clone()));
                false
            }
            Command::ManualBid { amount, reply } => {
                let settings = self.store.get_settings().await.unwrap_or_default();
                let mut reflex_iterations = 0u32;
                self.place_bid(amount, &settings, &mut reflex_iterations).await;
                let _ = reply.send(Ok(()));
                false
            }
            Command::Remove => true,
        }
    }

    async fn persist(&mut self) {
        if let Err(e) = self.store.save_auction(&self.auction).await {
            warn!(auction_id = %self.auction.auction_id, error = %e, "failed to persist auction");
        }
        self.registry.update(self.auction.clone());
    }
}

fn strategy_label(strategy: Strategy) -> &'static str {
    match strategy {
        Strategy::Manual => "manual",
        Strategy::Auto => "auto",
        Strategy::Sniping => "sniping",
    }
}

fn parse_product_id(auction_id: &str) -> Result<i64, std::num::ParseIntError> {
    auction_id.parse::<i64>()
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
    fn strategy_labels_match_metrics_convention() {
        assert_eq!(strategy_label(Strategy::Manual), "manual");
        assert_eq!(strategy_label(Strategy::Auto), "auto");
        assert_eq!(strategy_label(Strategy::Sniping), "sniping");
    }

    #[test]
    fn product_id_parses_numeric_auction_ids() {
        assert_eq!(parse_product_id("123456").unwrap(), 123_456);
        assert!(parse_product_id("not-a-number").is_err());
    }
}

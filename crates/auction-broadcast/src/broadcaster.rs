//! [`Broadcaster`] — subscriber session registry and state fan-out.
//! Sits downstream of [`auction_monitor::Monitor`]: it subscribes to
//! `MonitorEvent` and has no inverse dependency, so the monitor never
//! needs to know subscribers exist.

use std::sync::Arc;

use auction_core::Auction;
use auction_monitor::MonitorEvent;
use auction_telemetry::Metrics;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{BroadcastError, BroadcastResult};
use crate::message::ServerFrame;
use crate::session::{Session, TrySendOutcome};

/// Outbound frames larger than this are dropped rather than sent.
pub const MAX_PAYLOAD_BYTES: usize = 1024 * 1024;

/// Default bound on a session's outbound queue before frames start
/// dropping.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

pub struct Broadcaster {
    sessions: DashMap<Uuid, Session>,
    auth_token: Vec<u8>,
    queue_capacity: usize,
}

impl Broadcaster {
    pub fn new(auth_token: impl Into<String>) -> Arc<Self> {
        Self::with_queue_capacity(auth_token, DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_queue_capacity(auth_token: impl Into<String>, queue_capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            sessions: DashMap::new(),
            auth_token: auth_token.into().into_bytes(),
            queue_capacity,
        })
    }

    /// Register a freshly accepted connection. Returns the session id
    /// and the receiving half the transport layer
    /// drains to forward frames out over the wire.
    pub fn on_connect(&self) -> (Uuid, mpsc::Receiver<ServerFrame>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        self.sessions.insert(id, Session::new(id, tx));
        Metrics::session_connected();
        debug!(session_id = %id, "subscriber session connected");
        (id, rx)
    }

    /// Tear down a session.
    pub fn on_disconnect(&self, session_id: Uuid) {
        if self.sessions.remove(&session_id).is_some() {
            Metrics::session_disconnected();
            debug!(session_id = %session_id, "subscriber session disconnected");
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Constant-time token check so a mistimed-response attack can't
    /// narrow down the token byte by byte.
    pub fn authenticate(&self, session_id: Uuid, token: &str) -> BroadcastResult<bool> {
        let session = self
            .sessions
            .get(&session_id)
            .ok_or(BroadcastError::UnknownSession(session_id))?;
        let ok = constant_time_eq(token.as_bytes(), &self.auth_token);
        session.set_authenticated(ok);
        Ok(ok)
    }

    pub fn is_authenticated(&self, session_id: Uuid) -> bool {
        self.sessions
            .get(&session_id)
            .map(|s| s.is_authenticated())
            .unwrap_or(false)
    }

    /// Subscribe to state updates for the given auctions, or to all
    /// auctions if `auction_ids` is empty. Gated on prior authentication.
    pub fn subscribe(&self, session_id: Uuid, auction_ids: Vec<String>) -> BroadcastResult<()> {
        let session = self
            .sessions
            .get(&session_id)
            .ok_or(BroadcastError::UnknownSession(session_id))?;
        if !session.is_authenticated() {
            return Err(BroadcastError::NotAuthenticated(session_id));
        }
        session.subscribe(&auction_ids);
        Ok(())
    }

    pub fn unsubscribe(&self, session_id: Uuid, auction_ids: Vec<String>) -> BroadcastResult<()> {
        let session = self
            .sessions
            .get(&session_id)
            .ok_or(BroadcastError::UnknownSession(session_id))?;
        if !session.is_authenticated() {
            return Err(BroadcastError::NotAuthenticated(session_id));
        }
        session.unsubscribe(&auction_ids);
        Ok(())
    }

    /// Send a targeted reply to one session, e.g. a `response`/`bidResult`
    /// to a command the session itself issued.
    pub fn notify(&self, session_id: Uuid, frame: ServerFrame) -> BroadcastResult<()> {
        let session = self
            .sessions
            .get(&session_id)
            .ok_or(BroadcastError::UnknownSession(session_id))?;
        self.deliver(&session, frame)
    }

    /// Fan a monitor event out to every session subscribed to its auction.
    /// Best-effort: a full or closed queue on one session never blocks
    /// delivery to the others.
    pub fn broadcast_state(&self, event: &MonitorEvent) {
        let Some(frame) = Self::frame_for_event(event) else {
            return;
        };
        let auction_id = event.auction_id();

        for session in self.sessions.iter() {
            if !session.is_subscribed(auction_id) {
                continue;
            }
            if let Err(e) = self.deliver(&session, frame.clone()) {
                debug!(session_id = %session.id, error = %e, "dropped broadcast frame");
            }
        }
    }

    fn frame_for_event(event: &MonitorEvent) -> Option<ServerFrame> {
        Some(match event {
            MonitorEvent::Added(auction) | MonitorEvent::Updated(auction) | MonitorEvent::Ended(auction) => {
                ServerFrame::AuctionUpdate {
                    auction: auction.clone(),
                }
            }
            MonitorEvent::Removed { .. } => return None,
            MonitorEvent::BidPlaced { auction_id, .. } => ServerFrame::BidResult {
                auction_id: auction_id.clone(),
                success: true,
                error_kind: None,
            },
            MonitorEvent::BidFailed { auction_id, kind } => ServerFrame::BidResult {
                auction_id: auction_id.clone(),
                success: false,
                error_kind: Some(*kind),
            },
            MonitorEvent::TransportChanged { auction_id, .. } => return None,
            #[allow(unreachable_patterns)]
            _ => return None,
        })
    }

    /// A full auction snapshot for a freshly authenticated session, sent
    /// once on connect/authenticate.
    pub fn send_snapshot(&self, session_id: Uuid, auctions: Vec<Auction>) -> BroadcastResult<()> {
        self.notify(session_id, ServerFrame::AuctionState { auctions })
    }

    fn deliver(&self, session: &Session, frame: ServerFrame) -> BroadcastResult<()> {
        let size = serde_json::to_vec(&frame)
            .map(|bytes| bytes.len())
            .unwrap_or(0);
        if size > MAX_PAYLOAD_BYTES {
            warn!(session_id = %session.id, size, "dropping oversized frame");
            return Err(BroadcastError::PayloadTooLarge(MAX_PAYLOAD_BYTES));
        }

        match session.try_send(frame) {
            Ok(()) => Ok(()),
            Err(TrySendOutcome::Full) => {
                Metrics::broadcast_dropped();
                Err(BroadcastError::QueueFull)
            }
            Err(TrySendOutcome::Closed) => Err(BroadcastError::ChannelClosed),
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_time_eq_rejects_mismatched_length() {
        assert!(!constant_time_eq(b"short", b"longer-value"));
    }

    #[test]
    fn constant_time_eq_accepts_equal_bytes() {
        assert!(constant_time_eq(b"same-token", b"same-token"));
    }

    #[test]
    fn authenticate_requires_known_session() {
        let broadcaster = Broadcaster::new("secret-token");
        let stray_id = Uuid::new_v4();
        assert!(matches!(
            broadcaster.authenticate(stray_id, "secret-token"),
            Err(BroadcastError::UnknownSession(_))
        ));
    }

    #[test]
    fn authenticate_marks_session_on_success() {
        let broadcaster = Broadcaster::new("secret-token");
        let (id, _rx) = broadcaster.on_connect();
        assert!(!broadcaster.is_authenticated(id));
        assert!(broadcaster.authenticate(id, "secret-token").unwrap());
        assert!(broadcaster.is_authenticated(id));
    }

    #[test]
    fn authenticate_rejects_wrong_token() {
        let broadcaster = Broadcaster::new("secret-token");
        let (id, _rx) = broadcaster.on_connect();
        assert!(!broadcaster.authenticate(id, "wrong").unwrap());
        assert!(!broadcaster.is_authenticated(id));
    }

    #[test]
    fn subscribe_requires_authentication() {
        let broadcaster = Broadcaster::new("secret-token");
        let (id, _rx) = broadcaster.on_connect();
        assert!(matches!(
            broadcaster.subscribe(id, vec!["123456".into()]),
            Err(BroadcastError::NotAuthenticated(_))
        ));
    }

    #[test]
    fn on_disconnect_removes_session_and_drops_further_use() {
        let broadcaster = Broadcaster::new("secret-token");
        let (id, _rx) = broadcaster.on_connect();
        assert_eq!(broadcaster.session_count(), 1);
        broadcaster.on_disconnect(id);
        assert_eq!(broadcaster.session_count(), 0);
        assert!(matches!(
            broadcaster.authenticate(id, "secret-token"),
            Err(BroadcastError::UnknownSession(_))
        ));
    }

    #[tokio::test]
    async fn broadcast_state_only_reaches_subscribed_sessions() {
        use auction_core::{Auction, AuctionConfig, AuctionMetadata, PartialAuctionConfig, Settings};

        let broadcaster = Broadcaster::new("secret-token");
        let (id, mut rx) = broadcaster.on_connect();
        broadcaster.authenticate(id, "secret-token").unwrap();
        broadcaster.subscribe(id, vec!["123456".to_string()]).unwrap();

        let settings = Settings::default();
        let config = AuctionConfig::from_partial_with_defaults(PartialAuctionConfig::default(), &settings);
        let other = Auction::new("999999", AuctionMetadata::default(), config.clone(), 0);
        broadcaster.broadcast_state(&MonitorEvent::Added(other));
        assert!(rx.try_recv().is_err());

        let matching = Auction::new("123456", AuctionMetadata::default(), config, 0);
        broadcaster.broadcast_state(&MonitorEvent::Added(matching));
        assert!(rx.try_recv().is_ok());
    }
}

//! Per-subscriber session state: auth flag, subscription set and bounded
//! outbound queue.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::message::ServerFrame;

/// Sentinel subscription id meaning "every auction": subscribing with
/// no ids means subscribe to all.
pub const ALL_AUCTIONS: &str = "*";

pub struct Session {
    pub id: Uuid,
    tx: mpsc::Sender<ServerFrame>,
    authenticated: AtomicBool,
    subscriptions: RwLock<HashSet<String>>,
}

impl Session {
    pub fn new(id: Uuid, tx: mpsc::Sender<ServerFrame>) -> Self {
        Self {
            id,
            tx,
            authenticated: AtomicBool::new(false),
            subscriptions: RwLock::new(HashSet::new()),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::Acquire)
    }

    pub fn set_authenticated(&self, value: bool) {
        self.authenticated.store(value, Ordering::Release);
    }

    pub fn subscribe(&self, auction_ids: &[String]) {
        let mut subs = self.subscriptions.write();
        if auction_ids.is_empty() {
            subs.insert(ALL_AUCTIONS.to_string());
            return;
        }
        for id in auction_ids {
            subs.insert(id.clone());
        }
    }

    pub fn unsubscribe(&self, auction_ids: &[String]) {
        let mut subs = self.subscriptions.write();
        if auction_ids.is_empty() {
            subs.clear();
            return;
        }
        for id in auction_ids {
            subs.remove(id);
        }
    }

    pub fn is_subscribed(&self, auction_id: &str) -> bool {
        let subs = self.subscriptions.read();
        subs.contains(ALL_AUCTIONS) || subs.contains(auction_id)
    }

    /// Non-blocking send, preferring to drop the message over blocking the
    /// broadcast fan-out on one slow subscriber.
    pub fn try_send(&self, frame: ServerFrame) -> Result<(), TrySendOutcome> {
        match self.tx.try_send(frame) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => Err(TrySendOutcome::Full),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(TrySendOutcome::Closed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrySendOutcome {
    Full,
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_session() -> (Session, mpsc::Receiver<ServerFrame>) {
        let (tx, rx) = mpsc::channel(4);
        (Session::new(Uuid::new_v4(), tx), rx)
    }

    #[test]
    fn empty_subscribe_means_all() {
        let (session, _rx) = make_session();
        session.subscribe(&[]);
        assert!(session.is_subscribed("anything"));
    }

    #[test]
    fn specific_subscribe_is_scoped() {
        let (session, _rx) = make_session();
        session.subscribe(&["123456".to_string()]);
        assert!(session.is_subscribed("123456"));
        assert!(!session.is_subscribed("999999"));
    }

    #[test]
    fn full_queue_reports_full_not_closed() {
        let (session, _rx) = make_session();
        for _ in 0..4 {
            session.try_send(ServerFrame::Pong).unwrap();
        }
        assert_eq!(session.try_send(ServerFrame::Pong), Err(TrySendOutcome::Full));
    }
}

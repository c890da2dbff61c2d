//! Durable [`Store`] over Redis, with an in-memory fallback cache and a
//! background reconnector.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use auction_core::{Auction, BidHistoryEntry, Settings};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use parking_lot::RwLock;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::cache::FallbackCache;
use crate::crypto;
use crate::error::{StoreError, StoreResult};
use crate::keys;

/// Upper bound on persisted bid history entries per auction: the last
/// 100 entries are retained, oldest trimmed first.
pub const MAX_BID_HISTORY_PER_AUCTION: usize = 100;

/// Auction record TTL, refreshed on every save.
const AUCTION_TTL_SECS: i64 = 60 * 60;
/// Encrypted cookie/session blob TTL.
const COOKIES_TTL_SECS: i64 = 24 * 60 * 60;
/// Bid history TTL.
const BID_HISTORY_TTL_SECS: i64 = 7 * 24 * 60 * 60;

/// Store connectivity lifecycle events, broadcast to any listener (e.g. the
/// Supervisor, for health reporting).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreEvent {
    Connected,
    Disconnected,
    /// Connected and the initial ping round-trip succeeded.
    Ready,
}

/// Configuration for [`Store::connect`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub redis_url: String,
    pub fallback_ttl: Duration,
    pub reconnect_base_delay_ms: u64,
    pub reconnect_max_delay_ms: u64,
    /// Secret used to derive the credentials-at-rest content key.
    pub credentials_master_secret: Vec<u8>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379".to_string(),
            fallback_ttl: Duration::from_secs(300),
            reconnect_base_delay_ms: 500,
            reconnect_max_delay_ms: 30_000,
            credentials_master_secret: Vec::new(),
        }
    }
}

/// The durable state backend for auctions, settings, bid history and
/// encrypted credentials.
///
/// Reads and writes prefer the live Redis connection; when it is down they
/// transparently fall through to an in-memory cache so the rest of the
/// system (Monitor, BoundaryAPI) degrades gracefully rather than failing
/// every call outright.
pub struct Store {
    conn: RwLock<Option<ConnectionManager>>,
    fallback: FallbackCache,
    connected: AtomicBool,
    events: broadcast::Sender<StoreEvent>,
    config: StoreConfig,
}

impl Store {
    /// Connect to Redis and spawn the background reconnector. Returns
    /// immediately even if the initial connection attempt fails — the
    /// reconnector takes over and the fallback cache serves reads/writes
    /// until it succeeds.
    pub async fn connect(config: StoreConfig) -> Arc<Self> {
        let (tx, _rx) = broadcast::channel(32);
        let store = Arc::new(Self {
            conn: RwLock::new(None),
            fallback: FallbackCache::new(config.fallback_ttl),
            connected: AtomicBool::new(false),
            events: tx,
            config,
        });

        let initial = store.clone();
        tokio::spawn(async move {
            initial.reconnect_loop().await;
        });

        store
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn reconnect_loop(self: Arc<Self>) {
        let mut attempt: u32 = 0;
        loop {
            match redis::Client::open(self.config.redis_url.clone()) {
                Ok(client) => match ConnectionManager::new(client).await {
                    Ok(mut manager) => {
                        let ping: StoreResult<String> = redis::cmd("PING")
                            .query_async(&mut manager)
                            .await
                            .map_err(StoreError::from);
                        match ping {
                            Ok(_) => {
                                *self.conn.write() = Some(manager);
                                self.connected.store(true, Ordering::SeqCst);
                                attempt = 0;
                                info!("store connected to redis");
                                let _ = self.events.send(StoreEvent::Connected);
                                let _ = self.events.send(StoreEvent::Ready);
                                self.wait_for_disconnect().await;
                                continue;
                            }
                            Err(e) => warn!(?e, "redis ping failed"),
                        }
                    }
                    Err(e) => warn!(?e, "redis connection manager setup failed"),
                },
                Err(e) => warn!(?e, "invalid redis url"),
            }

            self.connected.store(false, Ordering::SeqCst);
            *self.conn.write() = None;
            let _ = self.events.send(StoreEvent::Disconnected);

            attempt = attempt.saturating_add(1);
            let delay = self.backoff_delay(attempt);
            debug!(attempt, delay_ms = delay.as_millis(), "store reconnect backoff");
            tokio::time::sleep(delay).await;
        }
    }

    /// Poll the live connection periodically; once a PING fails, fall back
    /// to the reconnect loop.
    async fn wait_for_disconnect(&self) {
        loop {
            tokio::time::sleep(Duration::from_secs(5)).await;
            let ok = {
                let mut guard = self.conn.write();
                if let Some(manager) = guard.as_mut() {
                    redis::cmd("PING").query_async::<_, String>(manager).await.is_ok()
                } else {
                    false
                }
            };
            if !ok {
                return;
            }
        }
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let base = self.config.reconnect_base_delay_ms;
        let max = self.config.reconnect_max_delay_ms;
        let exponent = attempt.saturating_sub(1).min(10);
        let delay = base.saturating_mul(1u64 << exponent).min(max);
        let jitter = (rand::random::<u64>()) % 250;
        Duration::from_millis(delay + jitter)
    }

    async fn get_raw(&self, key: &str) -> StoreResult<Option<String>> {
        let live = {
            let mut guard = self.conn.write();
            match guard.as_mut() {
                Some(manager) => Some(manager.get::<_, Option<String>>(key).await),
                None => None,
            }
        };
        match live {
            Some(Ok(Some(value))) => {
                self.fallback.put(key.to_string(), value.clone());
                Ok(Some(value))
            }
            Some(Ok(None)) => Ok(None),
            Some(Err(e)) => {
                warn!(?e, key, "redis read failed, falling back to cache");
                Ok(self.fallback.get(key))
            }
            None => Ok(self.fallback.get(key)),
        }
    }

    async fn set_raw(&self, key: &str, value: String) -> StoreResult<()> {
        self.fallback.put(key.to_string(), value.clone());
        let live = {
            let mut guard = self.conn.write();
            match guard.as_mut() {
                Some(manager) => Some(manager.set::<_, _, ()>(key, value).await),
                None => None,
            }
        };
        match live {
            Some(Ok(())) => Ok(()),
            Some(Err(e)) => {
                warn!(?e, key, "redis write failed, cached locally only");
                Ok(())
            }
            None => Ok(()),
        }
    }

    async fn expire_raw(&self, key: &str, ttl_secs: i64) -> StoreResult<()> {
        let mut guard = self.conn.write();
        if let Some(manager) = guard.as_mut() {
            let _: StoreResult<()> = manager
                .expire::<_, ()>(key, ttl_secs)
                .await
                .map_err(StoreError::from);
        }
        Ok(())
    }

    async fn del_raw(&self, key: &str) -> StoreResult<()> {
        self.fallback.remove(key);
        let mut guard = self.conn.write();
        if let Some(manager) = guard.as_mut() {
            let _: StoreResult<()> = manager.del::<_, ()>(key).await.map_err(StoreError::from);
        }
        Ok(())
    }

    // ---- Auctions ----------------------------------------------------

    pub async fn get_auction(&self, auction_id: &str) -> StoreResult<Option<Auction>> {
        match self.get_raw(&keys::auction(auction_id)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub async fn save_auction(&self, auction: &Auction) -> StoreResult<()> {
        let raw = serde_json::to_string(auction)?;
        let key = keys::auction(&auction.auction_id);
        self.set_raw(&key, raw).await?;
        self.expire_raw(&key, AUCTION_TTL_SECS).await?;
        self.add_to_index(&auction.auction_id).await
    }

    pub async fn delete_auction(&self, auction_id: &str) -> StoreResult<()> {
        self.del_raw(&keys::auction(auction_id)).await?;
        self.del_raw(&keys::bid_history(auction_id)).await?;
        self.remove_from_index(auction_id).await
    }

    async fn add_to_index(&self, auction_id: &str) -> StoreResult<()> {
        let mut guard = self.conn.write();
        if let Some(manager) = guard.as_mut() {
            let _: StoreResult<()> = manager
                .sadd::<_, _, ()>(keys::auction_index(), auction_id)
                .await
                .map_err(StoreError::from);
        }
        Ok(())
    }

    async fn remove_from_index(&self, auction_id: &str) -> StoreResult<()> {
        let mut guard = self.conn.write();
        if let Some(manager) = guard.as_mut() {
            let _: StoreResult<()> = manager
                .srem::<_, _, ()>(keys::auction_index(), auction_id)
                .await
                .map_err(StoreError::from);
        }
        Ok(())
    }

    /// Every auction id known to the store. When disconnected, this can only
    /// reflect what has passed through the fallback cache since the last
    /// connection loss.
    pub async fn list_auction_ids(&self) -> StoreResult<Vec<String>> {
        let mut guard = self.conn.write();
        if let Some(manager) = guard.as_mut() {
            let ids: StoreResult<Vec<String>> = manager
                .smembers::<_, Vec<String>>(keys::auction_index())
                .await
                .map_err(StoreError::from);
            if let Ok(ids) = ids {
                return Ok(ids);
            }
        }
        drop(guard);
        let prefix = "nellis:auction:";
        Ok(self
            .fallback
            .keys_with_prefix(prefix)
            .into_iter()
            .map(|k| k.trim_start_matches(prefix).to_string())
            .collect())
    }

    // ---- Bid history ---------------------------------------------------

    /// Append one entry to the sorted set scored by `placed_at_ms`, trimmed
    /// to the newest [`MAX_BID_HISTORY_PER_AUCTION`] by rank. Falls back to
    /// the in-memory cache — keyed the same as every other record — when
    /// Redis is unreachable, same as every other write in this store.
    pub async fn append_bid_history(&self, entry: &BidHistoryEntry) -> StoreResult<()> {
        let key = keys::bid_history(&entry.auction_id);
        let raw = serde_json::to_string(entry)?;
        let score = entry.placed_at_ms;

        let live = {
            let mut guard = self.conn.write();
            match guard.as_mut() {
                Some(manager) => {
                    let result: StoreResult<()> = async {
                        let _: () = manager.zadd(&key, &raw, score).await?;
                        // Keep only the newest MAX_BID_HISTORY_PER_AUCTION
                        // members by rank; a no-op while the set is still
                        // under the cap, since `start > end` then and Redis
                        // returns an empty range rather than clamping `end`.
                        let _: () = manager
                            .zremrangebyrank(&key, 0, -(MAX_BID_HISTORY_PER_AUCTION as isize) - 1)
                            .await?;
                        let _: () = manager.expire(&key, BID_HISTORY_TTL_SECS).await?;
                        Ok(())
                    }
                    .await;
                    Some(result)
                }
                None => None,
            }
        };

        match live {
            Some(Ok(())) => {
                // Keep the fallback cache in sync so a subsequent outage
                // doesn't lose visibility into history written while
                // connected.
                self.push_fallback_history(&key, raw);
                Ok(())
            }
            Some(Err(e)) => {
                warn!(?e, auction_id = %entry.auction_id, "redis bid history append failed, caching locally only");
                self.push_fallback_history(&key, raw);
                Ok(())
            }
            None => {
                self.push_fallback_history(&key, raw);
                Ok(())
            }
        }
    }

    fn push_fallback_history(&self, key: &str, raw: String) {
        let mut entries: Vec<String> = self
            .fallback
            .get(key)
            .and_then(|blob| serde_json::from_str(&blob).ok())
            .unwrap_or_default();
        entries.push(raw);
        if entries.len() > MAX_BID_HISTORY_PER_AUCTION {
            let excess = entries.len() - MAX_BID_HISTORY_PER_AUCTION;
            entries.drain(0..excess);
        }
        if let Ok(blob) = serde_json::to_string(&entries) {
            self.fallback.put(key.to_string(), blob);
        }
    }

    pub async fn get_bid_history(&self, auction_id: &str) -> StoreResult<Vec<BidHistoryEntry>> {
        let key = keys::bid_history(auction_id);
        let live = {
            let mut guard = self.conn.write();
            match guard.as_mut() {
                // Ascending by score (oldest first), matching the order
                // the in-memory fallback cache keeps its own entries in.
                Some(manager) => Some(manager.zrange::<_, Vec<String>>(&key, 0, -1).await),
                None => None,
            }
        };

        let raw: Vec<String> = match live {
            Some(Ok(entries)) => entries,
            Some(Err(e)) => {
                warn!(?e, auction_id, "redis bid history read failed, falling back to cache");
                self.fallback_history_entries(&key)
            }
            None => self.fallback_history_entries(&key),
        };

        Ok(raw
            .into_iter()
            .filter_map(|s| serde_json::from_str(&s).ok())
            .collect())
    }

    fn fallback_history_entries(&self, key: &str) -> Vec<String> {
        self.fallback
            .get(key)
            .and_then(|blob| serde_json::from_str(&blob).ok())
            .unwrap_or_default()
    }

    // ---- Settings -------------------------------------------------------

    pub async fn get_settings(&self) -> StoreResult<Settings> {
        match self.get_raw(keys::settings()).await? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Settings::default()),
        }
    }

    pub async fn save_settings(&self, settings: &Settings) -> StoreResult<()> {
        let raw = serde_json::to_string(settings)?;
        self.set_raw(keys::settings(), raw).await
    }

    // ---- Cookies (encrypted at rest) ------------------------------------

    /// Encrypt and persist the marketplace session cookie header under
    /// `nellis:auth:cookies`, AES-256-GCM, 24h TTL.
    pub async fn save_cookies(&self, cookie_header: &str) -> StoreResult<()> {
        let ciphertext =
            crypto::encrypt(&self.config.credentials_master_secret, cookie_header.as_bytes())?;
        let key = keys::auth_cookies();
        self.set_raw(key, BASE64.encode(ciphertext)).await?;
        self.expire_raw(key, COOKIES_TTL_SECS).await
    }

    pub async fn get_cookies(&self) -> StoreResult<Option<String>> {
        match self.get_raw(keys::auth_cookies()).await? {
            Some(encoded) => {
                let ciphertext = BASE64
                    .decode(encoded)
                    .map_err(|e| StoreError::Crypto(format!("bad base64: {e}")))?;
                let plaintext =
                    crypto::decrypt(&self.config.credentials_master_secret, &ciphertext)?;
                let cookie_header = String::from_utf8(plaintext)
                    .map_err(|e| StoreError::Crypto(format!("decrypted cookies not utf8: {e}")))?;
                Ok(Some(cookie_header))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_and_caps() {
        let store_config = StoreConfig {
            reconnect_base_delay_ms: 500,
            reconnect_max_delay_ms: 4_000,
            ..Default::default()
        };
        let (tx, _rx) = broadcast::channel(1);
        let store = Store {
            conn: RwLock::new(None),
            fallback: FallbackCache::new(Duration::from_secs(1)),
            connected: AtomicBool::new(false),
            events: tx,
            config: store_config,
        };
        let d1 = store.backoff_delay(1).as_millis();
        let d4 = store.backoff_delay(4).as_millis();
        let d20 = store.backoff_delay(20).as_millis();
        assert!(d1 >= 500 && d1 < 750);
        assert!(d4 >= 4_000 && d4 < 4_250, "capped at max: {d4}");
        assert!(d20 >= 4_000 && d20 < 4_250);
    }
}

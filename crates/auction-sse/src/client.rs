//! [`SseClient`] — maintains one long-lived connection to the marketplace's
//! event stream, multiplexing every subscribed product id over it, with
//! capped-exponential reconnect backoff and jitter.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::SseError;
use crate::events::{decode, SseEvent};
use crate::parser::SseLineParser;

const RECONNECT_BASE_MS: u64 = 500;
const RECONNECT_MAX_MS: u64 = 30_000;
/// After this many consecutive reconnect failures, tell callers to fall
/// back to polling for every currently subscribed product.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Events surfaced to the owner of an [`SseClient`]: decoded wire events
/// plus connection-lifecycle signals the Monitor needs to drive transport
/// selection.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Wire(SseEvent),
    Disconnected,
    /// Reconnection has failed `FALLBACK_AFTER_ATTEMPTS` times in a row;
    /// these products should fall back to polling until resubscribed.
    FallbackSuggested { product_ids: Vec<String> },
}

#[derive(Clone)]
pub struct SseConfig {
    pub stream_url: String,
    pub max_reconnect_attempts: u32,
}

impl Default for SseConfig {
    fn default() -> Self {
        Self {
            stream_url: String::new(),
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
        }
    }
}

/// Multiplexes SSE subscriptions for every product id currently of
/// interest over a single reconnecting connection.
pub struct SseClient {
    config: SseConfig,
    subscriptions: Arc<RwLock<HashSet<String>>>,
    cancel: CancellationToken,
    resubscribe: tokio::sync::Notify,
}

impl SseClient {
    pub fn new(config: SseConfig) -> (Arc<Self>, mpsc::Receiver<ClientEvent>) {
        let (tx, rx) = mpsc::channel(256);
        let client = Arc::new(Self {
            config,
            subscriptions: Arc::new(RwLock::new(HashSet::new())),
            cancel: CancellationToken::new(),
            resubscribe: tokio::sync::Notify::new(),
        });

        let spawned = client.clone();
        tokio::spawn(async move {
            spawned.run(tx).await;
        });

        (client, rx)
    }

    /// Add a product id to the live subscription set, reconnecting with the
    /// updated set if already connected.
    pub fn subscribe(&self, product_id: impl Into<String>) {
        self.subscriptions.write().insert(product_id.into());
        self.resubscribe.notify_one();
    }

    /// Remove a product id. Idempotent.
    pub fn unsubscribe(&self, product_id: &str) {
        self.subscriptions.write().remove(product_id);
        self.resubscribe.notify_one();
    }

    /// Gracefully tear down the connection. Idempotent.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    fn subscription_snapshot(&self) -> Vec<String> {
        self.subscriptions.read().iter().cloned().collect()
    }

    async fn run(self: Arc<Self>, tx: mpsc::Sender<ClientEvent>) {
        let mut attempt: u32 = 0;

        loop {
            if self.cancel.is_cancelled() {
                return;
            }

            // `connect_once` itself resets `attempt` to 0 the moment the
            // connection opens successfully (even if the stream later ends
            // or errors) — resetting here instead would only cover the
            // cases where the whole call returns `Ok`, which also includes
            // a resubscribe or shutdown that never opened a socket at all.
            if let Err(e) = self.connect_once(&tx, &mut attempt).await {
                warn!(error = %e, "sse connection failed");
            }

            if self.cancel.is_cancelled() {
                return;
            }

            let _ = tx.send(ClientEvent::Disconnected).await;
            attempt = attempt.saturating_add(1);

            if attempt == self.config.max_reconnect_attempts {
                let product_ids = self.subscription_snapshot();
                if !product_ids.is_empty() {
                    let _ = tx.send(ClientEvent::FallbackSuggested { product_ids }).await;
                }
            }

            let delay = backoff_delay(attempt);
            debug!(attempt, delay_ms = delay.as_millis(), "sse reconnect backoff");

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.cancel.cancelled() => return,
            }
        }
    }

    async fn connect_once(
        &self,
        tx: &mpsc::Sender<ClientEvent>,
        attempt: &mut u32,
    ) -> Result<(), SseError> {
        let ids = self.subscription_snapshot();
        let query = ids.join(",");
        let url = format!("{}?products={}", self.config.stream_url, query);

        info!(url = %url, "connecting to sse stream");
        let response = reqwest::Client::new()
            .get(&url)
            .header("Accept", "text/event-stream")
            .send()
            .await
            .map_err(SseError::Http)?;

        if !response.status().is_success() {
            return Err(SseError::StreamEnded);
        }

        // The connection has opened: reset the reconnect counter here,
        // not when this call eventually returns, so a stream that opens
        // cleanly and later drops doesn't keep compounding failed-attempt
        // counts from connections that came before it.
        *attempt = 0;
        let _ = tx
            .send(ClientEvent::Wire(SseEvent::Connected))
            .await;

        let mut stream = response.bytes_stream();
        let mut parser = SseLineParser::new();

        loop {
            tokio::select! {
                chunk = stream.next() => {
                    let Some(chunk) = chunk else {
                        return Err(SseError::StreamEnded);
                    };
                    let chunk = chunk.map_err(SseError::Http)?;
                    for raw in parser.feed(&chunk) {
                        let now_ms = now_ms();
                        match decode(&raw, now_ms) {
                            Ok(event) => {
                                if tx.send(ClientEvent::Wire(event)).await.is_err() {
                                    return Ok(());
                                }
                            }
                            Err(e) => warn!(error = %e, "failed to decode sse event"),
                        }
                    }
                }
                _ = self.resubscribe.notified() => {
                    debug!("subscription set changed, reconnecting sse stream");
                    return Ok(());
                }
                _ = self.cancel.cancelled() => {
                    return Ok(());
                }
            }
        }
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(10);
    let delay = RECONNECT_BASE_MS
        .saturating_mul(1u64 << exponent)
        .min(RECONNECT_MAX_MS);
    let jitter = rand::random::<u64>() % 500;
    Duration::from_millis(delay + jitter)
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
    fn backoff_grows_and_caps() {
        let d1 = backoff_delay(1).as_millis();
        let d20 = backoff_delay(20).as_millis();
        assert!(d1 >= RECONNECT_BASE_MS as u128);
        assert!(d20 < (RECONNECT_MAX_MS + 500) as u128);
    }

    #[test]
    fn subscription_set_starts_empty() {
        let subscriptions: Arc<RwLock<HashSet<String>>> = Arc::new(RwLock::new(HashSet::new()));
        assert!(subscriptions.read().is_empty());
    }
}

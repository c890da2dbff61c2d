//! In-memory fallback cache used while the durable Redis backend is
//! unreachable: a TTL'd DashMap-backed cache that serves reads and
//! buffers writes until the connection comes back.

use std::time::{Duration, Instant};

use dashmap::DashMap;

struct Entry {
    value: String,
    expires_at: Instant,
}

/// A TTL'd string cache, keyed by the same Redis key the value would have
/// lived under durably.
pub struct FallbackCache {
    entries: DashMap<String, Entry>,
    ttl: Duration,
}

impl FallbackCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let live = self
            .entries
            .get(key)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.value.clone());
        if live.is_none() {
            self.entries.remove(key);
        }
        live
    }

    pub fn put(&self, key: String, value: String) {
        self.entries.insert(
            key,
            Entry {
                value,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    pub fn remove(&self, key: &str) {
        self.entries.remove(key);
    }

    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| e.key().starts_with(prefix) && e.value().expires_at > Instant::now())
            .map(|e| e.key().clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_round_trips() {
        let cache = FallbackCache::new(Duration::from_secs(60));
        cache.put("k".into(), "v".into());
        assert_eq!(cache.get("k"), Some("v".to_string()));
    }

    #[test]
    fn expired_entries_return_none() {
        let cache = FallbackCache::new(Duration::from_millis(1));
        cache.put("k".into(), "v".into());
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get("k"), None);
    }
}

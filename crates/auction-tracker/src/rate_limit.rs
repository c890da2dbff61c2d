//! Per-IP and per-auction sliding-window rate limiting, generalizing
//! `auction_broadcast::AcceptLimiter`'s sliding window (originally scoped
//! to WS connection admission) to any key type.

use std::collections::VecDeque;
use std::hash::Hash;
use std::net::IpAddr;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::config::RateLimitConfig;

/// Sliding-window counter keyed by an arbitrary hashable key, the same
/// shape as [`auction_broadcast::AcceptLimiter`] but not tied to `IpAddr`.
pub struct WindowLimiter<K: Eq + Hash> {
    max_per_window: u32,
    window: Duration,
    timestamps: DashMap<K, Mutex<VecDeque<Instant>>>,
}

impl<K: Eq + Hash + Clone> WindowLimiter<K> {
    pub fn new(max_per_window: u32, window: Duration) -> Self {
        Self {
            max_per_window,
            window,
            timestamps: DashMap::new(),
        }
    }

    pub fn try_accept(&self, key: K) -> bool {
        let entry = self
            .timestamps
            .entry(key)
            .or_insert_with(|| Mutex::new(VecDeque::with_capacity(self.max_per_window as usize)));
        let mut timestamps = entry.lock();

        let cutoff = Instant::now() - self.window;
        while timestamps.front().is_some_and(|&t| t < cutoff) {
            timestamps.pop_front();
        }

        if timestamps.len() >= self.max_per_window as usize {
            return false;
        }
        timestamps.push_back(Instant::now());
        true
    }
}

/// Every rate-limited surface the tracker exposes, bundled for a single
/// `AppState` field.
pub struct RateLimiters {
    pub api: WindowLimiter<IpAddr>,
    pub auth: WindowLimiter<IpAddr>,
    pub bid: WindowLimiter<String>,
    pub ws_accept: WindowLimiter<IpAddr>,
}

impl RateLimiters {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            api: WindowLimiter::new(config.api_per_minute_per_ip, Duration::from_secs(60)),
            auth: WindowLimiter::new(config.auth_per_15_min_per_ip, Duration::from_secs(15 * 60)),
            bid: WindowLimiter::new(config.bid_per_minute_per_auction, Duration::from_secs(60)),
            ws_accept: WindowLimiter::new(
                config.ws_accept_per_minute_per_ip,
                Duration::from_secs(60),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn allows_up_to_the_window_budget_then_rejects() {
        let limiter = WindowLimiter::new(2, Duration::from_secs(60));
        assert!(limiter.try_accept("auction-1".to_string()));
        assert!(limiter.try_accept("auction-1".to_string()));
        assert!(!limiter.try_accept("auction-1".to_string()));
    }

    #[test]
    fn tracks_keys_independently() {
        let limiter = WindowLimiter::new(1, Duration::from_secs(60));
        let a = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
        let b = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2));
        assert!(limiter.try_accept(a));
        assert!(limiter.try_accept(b));
        assert!(!limiter.try_accept(a));
    }

    #[test]
    fn bundle_reflects_configured_defaults() {
        let limiters = RateLimiters::new(&RateLimitConfig::default());
        assert!(limiters.api.try_accept(IpAddr::V4(Ipv4Addr::LOCALHOST)));
        assert!(limiters.bid.try_accept("auction-1".to_string()));
    }
}

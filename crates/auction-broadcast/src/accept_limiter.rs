//! New-connection admission rate limiting: a sliding-window counter
//! capping new WS connections per IP per minute.

use std::collections::VecDeque;
use std::net::IpAddr;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;

/// Sliding-window connection-accept limiter keyed by client IP.
pub struct AcceptLimiter {
    max_per_window: u32,
    window: Duration,
    timestamps: DashMap<IpAddr, Mutex<VecDeque<Instant>>>,
}

impl AcceptLimiter {
    pub fn new(max_per_window: u32, window: Duration) -> Self {
        Self {
            max_per_window,
            window,
            timestamps: DashMap::new(),
        }
    }

    /// Returns `true` and records the attempt if `ip` is still under its
    /// budget, `false` (without recording) otherwise.
    pub fn try_accept(&self, ip: IpAddr) -> bool {
        let entry = self
            .timestamps
            .entry(ip)
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn loopback() -> IpAddr {
        IpAddr::V4(Ipv4Addr::LOCALHOST)
    }

    #[test]
    fn allows_up_to_the_window_budget() {
        let limiter = AcceptLimiter::new(3, Duration::from_secs(60));
        assert!(limiter.try_accept(loopback()));
        assert!(limiter.try_accept(loopback()));
        assert!(limiter.try_accept(loopback()));
        assert!(!limiter.try_accept(loopback()));
    }

    #[test]
    fn tracks_ips_independently() {
        let limiter = AcceptLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.try_accept(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))));
        assert!(limiter.try_accept(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2))));
        assert!(!limiter.try_accept(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))));
    }
}

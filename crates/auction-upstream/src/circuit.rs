//! Circuit breaker guarding the marketplace connection: N consecutive
//! connection/server errors open the breaker for a cooldown.
//!
//! Built around a compare-exchange trigger, but this breaker self-heals
//! after `cooldown` elapses rather than requiring a manual reset — a
//! transient marketplace outage shouldn't need an operator.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_millis() as i64
}

pub struct CircuitBreaker {
    open: AtomicBool,
    opened_at_ms: AtomicI64,
    consecutive_failures: AtomicU32,
    failure_threshold: u32,
    cooldown: Duration,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            open: AtomicBool::new(false),
            opened_at_ms: AtomicI64::new(0),
            consecutive_failures: AtomicU32::new(0),
            failure_threshold,
            cooldown,
        }
    }

    /// `true` if requests should currently be refused. Auto half-opens
    /// (stops refusing) once `cooldown` has elapsed since the trip.
    pub fn is_open(&self) -> bool {
        if !self.open.load(Ordering::SeqCst) {
            return false;
        }
        let opened_at = self.opened_at_ms.load(Ordering::SeqCst);
        let elapsed = now_ms().saturating_sub(opened_at);
        if elapsed >= self.cooldown.as_millis() as i64 {
            self.open.store(false, Ordering::SeqCst);
            self.consecutive_failures.store(0, Ordering::SeqCst);
            false
        } else {
            true
        }
    }

    pub fn opened_at_ms(&self) -> i64 {
        self.opened_at_ms.load(Ordering::SeqCst)
    }

    /// Record a successful call; resets the failure streak.
    pub fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::SeqCst);
    }

    /// Record a retryable failure; trips the breaker once the threshold is
    /// reached.
    pub fn record_failure(&self) {
        let count = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
        if count >= self.failure_threshold
            && self
                .open
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
        {
            self.opened_at_ms.store(now_ms(), Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stays_closed_below_threshold() {
        let breaker = CircuitBreaker::new(3, Duration::from_secs(30));
        breaker.record_failure();
        breaker.record_failure();
        assert!(!breaker.is_open());
    }

    #[test]
    fn opens_at_threshold() {
        let breaker = CircuitBreaker::new(3, Duration::from_secs(30));
        breaker.record_failure();
        breaker.record_failure();
        breaker.record_failure();
        assert!(breaker.is_open());
    }

    #[test]
    fn success_resets_failure_streak() {
        let breaker = CircuitBreaker::new(3, Duration::from_secs(30));
        breaker.record_failure();
        breaker.record_failure();
        breaker.record_success();
        breaker.record_failure();
        assert!(!breaker.is_open());
    }

    #[test]
    fn half_opens_after_cooldown() {
        let breaker = CircuitBreaker::new(1, Duration::from_millis(5));
        breaker.record_failure();
        assert!(breaker.is_open());
        std::thread::sleep(Duration::from_millis(15));
        assert!(!breaker.is_open());
    }
}

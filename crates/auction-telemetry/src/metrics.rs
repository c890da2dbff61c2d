//! Prometheus metrics for the auction tracking core.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally: a registration
//! failure (e.g. a duplicate metric name) is a fatal startup bug, not a
//! runtime condition to recover from. These panics only occur during
//! static initialization.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge, register_gauge_vec, register_histogram_vec,
    register_int_gauge_vec, CounterVec, Gauge, GaugeVec, HistogramVec, IntGaugeVec,
};

/// Store durable-backend connectivity (1 = connected, 0 = fallback mode).
pub static STORE_CONNECTED: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "auction_store_connected",
        "Durable store connection state (1=connected, 0=fallback mode)"
    )
    .unwrap()
});

/// Per-auction transport currently in use. Labels: auction_id, transport (sse/polling).
pub static AUCTION_TRANSPORT: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "auction_transport_active",
        "Active transport per auction (1=active)",
        &["auction_id", "transport"]
    )
    .unwrap()
});

/// Currently monitored auction count by status.
pub static AUCTIONS_MONITORED: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "auction_monitored_count",
        "Number of auctions currently in the registry by status",
        &["status"]
    )
    .unwrap()
});

/// Total bid placement attempts. Labels: strategy, outcome (placed/failed).
pub static BID_ATTEMPTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "auction_bid_attempts_total",
        "Total bid placement attempts",
        &["strategy", "outcome"]
    )
    .unwrap()
});

/// Total bid retries issued by the upstream client. Labels: reason.
pub static BID_RETRIES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "auction_bid_retries_total",
        "Total bid placement retries",
        &["reason"]
    )
    .unwrap()
});

/// Total times the per-auction budget guard fired. Labels: strategy.
pub static MAX_BID_REACHED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "max_bid_reached_total",
        "Total times a computed bid exceeded the auction's max_bid",
        &["strategy"]
    )
    .unwrap()
});

/// Total circuit breaker trips.
pub static BREAKER_TRIPS_TOTAL: Lazy<prometheus::IntCounter> = Lazy::new(|| {
    prometheus::register_int_counter!(
        "auction_upstream_breaker_trips_total",
        "Total circuit breaker trips against the marketplace upstream"
    )
    .unwrap()
});

/// Upstream HTTP latency in milliseconds. Labels: operation (fetch/bid/validate).
pub static UPSTREAM_LATENCY_MS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "auction_upstream_latency_ms",
        "Upstream marketplace call latency in milliseconds",
        &["operation"],
        vec![10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0]
    )
    .unwrap()
});

/// Total SSE reconnect attempts. Labels: outcome (connected/fallback).
pub static SSE_RECONNECTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "auction_sse_reconnects_total",
        "Total SSE reconnect attempts",
        &["outcome"]
    )
    .unwrap()
});

/// Total auctions removed by the cleanup sweep.
pub static CLEANUP_REMOVED_TOTAL: Lazy<prometheus::IntCounter> = Lazy::new(|| {
    prometheus::register_int_counter!(
        "auction_cleanup_removed_total",
        "Total auctions removed by the periodic cleanup sweep"
    )
    .unwrap()
});

/// Current connected subscriber session count.
pub static SUBSCRIBER_SESSIONS: Lazy<prometheus::IntGauge> = Lazy::new(|| {
    prometheus::register_int_gauge!(
        "auction_subscriber_sessions",
        "Current number of connected subscriber sessions"
    )
    .unwrap()
});

/// Total broadcast sends dropped due to a slow/full subscriber queue.
pub static BROADCAST_DROPPED_TOTAL: Lazy<prometheus::IntCounter> = Lazy::new(|| {
    prometheus::register_int_counter!(
        "auction_broadcast_dropped_total",
        "Total broadcast messages dropped due to subscriber backpressure"
    )
    .unwrap()
});

/// Metrics facade for easy access from other crates.
pub struct Metrics;

impl Metrics {
    pub fn store_connected(connected: bool) {
        STORE_CONNECTED.set(if connected { 1.0 } else { 0.0 });
    }

    pub fn transport_set(auction_id: &str, transport: &str) {
        for t in &["sse", "polling"] {
            AUCTION_TRANSPORT
                .with_label_values(&[auction_id, t])
                .set(0.0);
        }
        AUCTION_TRANSPORT
            .with_label_values(&[auction_id, transport])
            .set(1.0);
    }

    pub fn transport_clear(auction_id: &str) {
        for t in &["sse", "polling"] {
            AUCTION_TRANSPORT
                .with_label_values(&[auction_id, t])
                .set(0.0);
        }
    }

    pub fn auctions_set(status: &str, count: i64) {
        AUCTIONS_MONITORED.with_label_values(&[status]).set(count);
    }

    pub fn bid_attempt(strategy: &str, outcome: &str) {
        BID_ATTEMPTS_TOTAL.with_label_values(&[strategy, outcome]).inc();
    }

    pub fn bid_retry(reason: &str) {
        BID_RETRIES_TOTAL.with_label_values(&[reason]).inc();
    }

    pub fn max_bid_reached(strategy: &str) {
        MAX_BID_REACHED_TOTAL.with_label_values(&[strategy]).inc();
    }

    pub fn breaker_tripped() {
        BREAKER_TRIPS_TOTAL.inc();
    }

    pub fn upstream_latency(operation: &str, latency_ms: f64) {
        UPSTREAM_LATENCY_MS
            .with_label_values(&[operation])
            .observe(latency_ms);
    }

    pub fn sse_reconnect(outcome: &str) {
        SSE_RECONNECTS_TOTAL.with_label_values(&[outcome]).inc();
    }

    pub fn cleanup_removed(count: u64) {
        CLEANUP_REMOVED_TOTAL.inc_by(count);
    }

    pub fn session_connected() {
        SUBSCRIBER_SESSIONS.inc();
    }

    pub fn session_disconnected() {
        SUBSCRIBER_SESSIONS.dec();
    }

    pub fn broadcast_dropped() {
        BROADCAST_DROPPED_TOTAL.inc();
    }
}

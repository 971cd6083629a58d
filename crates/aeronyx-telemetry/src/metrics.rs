//! Prometheus metrics for the AeroNyx node monitor.
//!
//! Covers:
//! - WebSocket session state, reconnects and heartbeat latency
//! - REST outcomes, retries, cache hits and the circuit breaker
//! - Node counts and freshness of the reconciled dashboard view
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. A registration failure
//! means duplicate metric names, a programming error that should crash at
//! startup. These panics only occur during static initialization.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter, register_counter_vec, register_gauge, register_gauge_vec,
    register_histogram, register_histogram_vec, Counter, CounterVec, Gauge, GaugeVec, Histogram,
    HistogramVec,
};

/// WebSocket connection state (1 = socket open, 0 = closed).
pub static WS_CONNECTED: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "aeronyx_ws_connected",
        "WebSocket connection state (1=open)"
    )
    .unwrap()
});

/// WebSocket state machine current state.
/// Labels: state (disconnected/connecting/connected/authenticated/monitoring/reconnecting/error)
pub static WS_STATE: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "aeronyx_ws_state",
        "WebSocket state machine current state (1=active, 0=inactive)",
        &["state"]
    )
    .unwrap()
});

/// Total WebSocket reconnection attempts.
pub static WS_RECONNECT_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "aeronyx_ws_reconnect_total",
        "Total WebSocket reconnection attempts",
        &["reason"]
    )
    .unwrap()
});

/// Authentication outcomes on the monitoring socket.
pub static WS_AUTH_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "aeronyx_ws_auth_total",
        "WebSocket authentication outcomes",
        &["outcome"]
    )
    .unwrap()
});

/// Inbound frames by type.
pub static WS_MESSAGES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "aeronyx_ws_messages_total",
        "Inbound WebSocket frames by type",
        &["type"]
    )
    .unwrap()
});

/// Ping/pong round trip in milliseconds.
pub static WS_LATENCY_MS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "aeronyx_ws_latency_ms",
        "WebSocket ping/pong round trip in milliseconds",
        vec![5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0]
    )
    .unwrap()
});

/// REST request outcomes.
/// Labels: endpoint, outcome (ok or an error kind)
pub static REST_REQUESTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "aeronyx_rest_requests_total",
        "REST request outcomes",
        &["endpoint", "outcome"]
    )
    .unwrap()
});

/// REST attempt latency in milliseconds.
pub static REST_LATENCY_MS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "aeronyx_rest_latency_ms",
        "REST attempt latency in milliseconds",
        &["endpoint"],
        vec![10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0, 30000.0]
    )
    .unwrap()
});

/// REST retries scheduled.
pub static REST_RETRY_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "aeronyx_rest_retry_total",
        "REST retries scheduled",
        &["endpoint"]
    )
    .unwrap()
});

/// Response cache lookups.
/// Labels: result (hit/miss/shared)
pub static REST_CACHE_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "aeronyx_rest_cache_total",
        "REST response cache lookups",
        &["result"]
    )
    .unwrap()
});

/// Circuit breaker state (1 = open).
pub static CIRCUIT_OPEN: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!("aeronyx_circuit_open", "REST circuit breaker open (1=open)").unwrap()
});

/// Times the circuit breaker opened.
pub static CIRCUIT_OPEN_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "aeronyx_circuit_open_total",
        "Times the REST circuit breaker opened"
    )
    .unwrap()
});

/// Nodes in the current view by status.
pub static NODES: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "aeronyx_nodes",
        "Nodes in the current dashboard view by status",
        &["status"]
    )
    .unwrap()
});

/// Current data quality of the dashboard view.
pub static DATA_QUALITY: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "aeronyx_data_quality",
        "Dashboard data quality (1=active, 0=inactive)",
        &["quality"]
    )
    .unwrap()
});

/// Background REST refreshes issued by the reconciler.
pub static SNAPSHOT_REFRESH_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "aeronyx_snapshot_refresh_total",
        "REST snapshot refreshes issued by the reconciler",
        &["trigger"]
    )
    .unwrap()
});

/// Metrics facade for easy access.
pub struct Metrics;

impl Metrics {
    /// Record WebSocket socket open.
    pub fn ws_connected() {
        WS_CONNECTED.set(1.0);
    }

    /// Record WebSocket socket closed.
    pub fn ws_disconnected() {
        WS_CONNECTED.set(0.0);
    }

    /// Set WebSocket state machine state.
    /// Only the active state is set to 1, all others to 0.
    pub fn ws_state_set(state: &str) {
        for s in &[
            "disconnected",
            "connecting",
            "connected",
            "authenticated",
            "monitoring",
            "reconnecting",
            "error",
        ] {
            WS_STATE.with_label_values(&[s]).set(0.0);
        }
        WS_STATE.with_label_values(&[state]).set(1.0);
    }

    /// Record WebSocket reconnection.
    pub fn ws_reconnect(reason: &str) {
        WS_RECONNECT_TOTAL.with_label_values(&[reason]).inc();
    }

    pub fn ws_auth(outcome: &str) {
        WS_AUTH_TOTAL.with_label_values(&[outcome]).inc();
    }

    pub fn ws_message(frame_type: &str) {
        WS_MESSAGES_TOTAL.with_label_values(&[frame_type]).inc();
    }

    pub fn ws_latency(latency_ms: f64) {
        WS_LATENCY_MS.observe(latency_ms);
    }

    /// Record the final outcome of a REST request.
    pub fn rest_request(endpoint: &str, outcome: &str) {
        REST_REQUESTS_TOTAL
            .with_label_values(&[endpoint, outcome])
            .inc();
    }

    pub fn rest_latency(endpoint: &str, latency_ms: f64) {
        REST_LATENCY_MS
            .with_label_values(&[endpoint])
            .observe(latency_ms);
    }

    pub fn rest_retry(endpoint: &str) {
        REST_RETRY_TOTAL.with_label_values(&[endpoint]).inc();
    }

    pub fn rest_cache(result: &str) {
        REST_CACHE_TOTAL.with_label_values(&[result]).inc();
    }

    /// Record circuit breaker transitions.
    pub fn circuit_open(is_open: bool) {
        CIRCUIT_OPEN.set(if is_open { 1.0 } else { 0.0 });
        if is_open {
            CIRCUIT_OPEN_TOTAL.inc();
        }
    }

    /// Publish node counts of the current view.
    pub fn node_counts(active: usize, offline: usize, pending: usize, suspended: usize) {
        NODES.with_label_values(&["active"]).set(active as f64);
        NODES.with_label_values(&["offline"]).set(offline as f64);
        NODES.with_label_values(&["pending"]).set(pending as f64);
        NODES.with_label_values(&["suspended"]).set(suspended as f64);
    }

    /// Set the current data quality. Only the active grade is set to 1.
    pub fn data_quality_set(quality: &str) {
        for q in &["realtime", "recent", "stale", "offline"] {
            DATA_QUALITY.with_label_values(&[q]).set(0.0);
        }
        DATA_QUALITY.with_label_values(&[quality]).set(1.0);
    }

    pub fn snapshot_refresh(trigger: &str) {
        SNAPSHOT_REFRESH_TOTAL.with_label_values(&[trigger]).inc();
    }
}

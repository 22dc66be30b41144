//! Prometheus metrics for numismatic feeds.
//!
//! Covers:
//! - Listener lifecycle and state
//! - Packets received and events decoded
//! - Capture windows written or dropped
//! - REST calls made through the feed facade
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. A registration failure
//! means duplicate metric names, which is a programming error. These panics
//! only occur during static initialization, never at runtime.

use crate::error::TelemetryResult;
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_gauge_vec, CounterVec,
    Encoder, HistogramVec, IntGaugeVec, TextEncoder,
};

/// Listeners currently between connect and termination.
/// Labels: exchange
pub static ACTIVE_LISTENERS: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "numis_active_listeners",
        "Feed listeners currently running",
        &["exchange"]
    )
    .unwrap()
});

/// Listener state machine current state.
/// Labels: exchange, symbol, state
pub static LISTENER_STATE: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "numis_listener_state",
        "Listener state machine current state (1=active, 0=inactive)",
        &["exchange", "symbol", "state"]
    )
    .unwrap()
});

/// Time from connect request to an open, hooked connection.
pub static CONNECT_LATENCY_MS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "numis_connect_latency_ms",
        "Websocket connect latency in milliseconds",
        &["exchange"],
        vec![10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0]
    )
    .unwrap()
});

/// Raw packets received from websocket feeds.
pub static PACKETS_RECEIVED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "numis_packets_received_total",
        "Raw websocket packets received",
        &["exchange", "symbol"]
    )
    .unwrap()
});

/// Normalized events delivered to consumers.
/// Labels: exchange, kind (trade/ticker)
pub static EVENTS_EMITTED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "numis_events_emitted_total",
        "Normalized events emitted",
        &["exchange", "kind"]
    )
    .unwrap()
});

pub static DECODE_ERRORS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "numis_decode_errors_total",
        "Packets that failed to decode",
        &["exchange"]
    )
    .unwrap()
});

/// Capture windows by result.
/// Labels: exchange, result (written/dropped)
pub static CAPTURE_WINDOWS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "numis_capture_windows_total",
        "Capture windows flushed to disk",
        &["exchange", "result"]
    )
    .unwrap()
});

pub static CAPTURE_PACKETS_WRITTEN_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "numis_capture_packets_written_total",
        "Raw packets persisted by capture sinks",
        &["exchange"]
    )
    .unwrap()
});

/// Listener terminations.
/// Labels: exchange, outcome (confirmed/timed_out/not_required/send_failed/error)
pub static LISTENER_TERMINATIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "numis_listener_terminations_total",
        "Listener terminations by unsubscribe outcome",
        &["exchange", "outcome"]
    )
    .unwrap()
});

/// REST calls through the feed facade.
/// Labels: provider, operation, result (ok/error)
pub static REST_REQUESTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "numis_rest_requests_total",
        "REST requests by operation and result",
        &["provider", "operation", "result"]
    )
    .unwrap()
});

const LISTENER_STATES: [&str; 6] = [
    "idle",
    "connecting",
    "subscribing",
    "listening",
    "unsubscribing",
    "terminated",
];

/// Metrics facade for easy access.
pub struct Metrics;

impl Metrics {
    pub fn listener_started(exchange: &str) {
        ACTIVE_LISTENERS.with_label_values(&[exchange]).inc();
    }

    pub fn listener_stopped(exchange: &str) {
        ACTIVE_LISTENERS.with_label_values(&[exchange]).dec();
    }

    /// Set the listener state. Only the active state is 1.
    pub fn listener_state_set(exchange: &str, symbol: &str, state: &str) {
        for s in LISTENER_STATES {
            LISTENER_STATE
                .with_label_values(&[exchange, symbol, s])
                .set(i64::from(s == state));
        }
    }

    pub fn connect_latency(exchange: &str, latency_ms: f64) {
        CONNECT_LATENCY_MS
            .with_label_values(&[exchange])
            .observe(latency_ms);
    }

    pub fn packet_received(exchange: &str, symbol: &str) {
        PACKETS_RECEIVED_TOTAL
            .with_label_values(&[exchange, symbol])
            .inc();
    }

    pub fn event_emitted(exchange: &str, kind: &str) {
        EVENTS_EMITTED_TOTAL.with_label_values(&[exchange, kind]).inc();
    }

    pub fn decode_error(exchange: &str) {
        DECODE_ERRORS_TOTAL.with_label_values(&[exchange]).inc();
    }

    /// Record the final capture counters of one sink.
    pub fn capture_closed(exchange: &str, windows_written: u64, windows_dropped: u64, packets: u64) {
        CAPTURE_WINDOWS_TOTAL
            .with_label_values(&[exchange, "written"])
            .inc_by(windows_written as f64);
        CAPTURE_WINDOWS_TOTAL
            .with_label_values(&[exchange, "dropped"])
            .inc_by(windows_dropped as f64);
        CAPTURE_PACKETS_WRITTEN_TOTAL
            .with_label_values(&[exchange])
            .inc_by(packets as f64);
    }

    pub fn listener_terminated(exchange: &str, outcome: &str) {
        LISTENER_TERMINATIONS_TOTAL
            .with_label_values(&[exchange, outcome])
            .inc();
    }

    pub fn rest_request(provider: &str, operation: &str, ok: bool) {
        let result = if ok { "ok" } else { "error" };
        REST_REQUESTS_TOTAL
            .with_label_values(&[provider, operation, result])
            .inc();
    }

    /// Render the default registry in the Prometheus text format.
    pub fn render() -> TelemetryResult<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

//! Metrics collection and exposition.
//!
//! # Metrics
//! - `failover_requests_total` (counter): buffered requests by the target that answered
//! - `failover_backend_attempts_total` (counter): attempts by role and result
//! - `failover_decode_fallbacks_total` (counter): bodies passed through undecoded
//! - `failover_request_duration_seconds` (histogram): end-to-end latency
//! - `failover_relay_sessions_active` (gauge): live WebSocket relays
//! - `failover_relay_messages_total` (counter): relayed frames by direction
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a completed buffered request.
pub fn record_request(outcome: &'static str, status: u16, start: Instant) {
    counter!(
        "failover_requests_total",
        "outcome" => outcome,
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("failover_request_duration_seconds", "outcome" => outcome)
        .record(start.elapsed().as_secs_f64());
}

/// Record one forwarder attempt. `result` is `ok`, `status` or `transport`.
pub fn record_attempt(role: &'static str, result: &'static str) {
    counter!(
        "failover_backend_attempts_total",
        "role" => role,
        "result" => result
    )
    .increment(1);
}

pub fn record_decode_fallback(encoding: &'static str) {
    counter!("failover_decode_fallbacks_total", "encoding" => encoding).increment(1);
}

pub fn relay_session_opened() {
    gauge!("failover_relay_sessions_active").increment(1.0);
}

pub fn relay_session_closed() {
    gauge!("failover_relay_sessions_active").decrement(1.0);
}

/// `direction` is `to_backend` or `to_client`.
pub fn record_relay_message(direction: &'static str) {
    counter!("failover_relay_messages_total", "direction" => direction).increment(1);
}

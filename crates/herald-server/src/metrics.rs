//! Metrics collection and export for Herald.
//!
//! Uses the `metrics` crate for instrumentation and exports
//! to Prometheus format.

use anyhow::{Context, Result};
use herald_core::delivery::metric_names as delivery;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::info;

/// Metric names.
pub mod names {
    pub const CONNECTIONS_TOTAL: &str = "herald_connections_total";
    pub const CONNECTIONS_ACTIVE: &str = "herald_connections_active";
    pub const REQUESTS_TOTAL: &str = "herald_requests_total";
    pub const REQUEST_LATENCY_SECONDS: &str = "herald_request_latency_seconds";
    pub const MALFORMED_REQUESTS_TOTAL: &str = "herald_malformed_requests_total";
}

/// Initialize the metrics system.
pub fn init_metrics() {
    metrics::describe_counter!(
        names::CONNECTIONS_TOTAL,
        "Total number of connections since server start"
    );
    metrics::describe_gauge!(
        names::CONNECTIONS_ACTIVE,
        "Current number of connections being served"
    );
    metrics::describe_counter!(names::REQUESTS_TOTAL, "Requests handled, by method");
    metrics::describe_histogram!(
        names::REQUEST_LATENCY_SECONDS,
        "Request handling latency in seconds, including outbound pushes"
    );
    metrics::describe_counter!(
        names::MALFORMED_REQUESTS_TOTAL,
        "Connections aborted because the request could not be parsed"
    );
    metrics::describe_counter!(delivery::PUSH_ATTEMPTS, "Outbound push attempts, by method");
    metrics::describe_counter!(delivery::PUSH_FAILURES, "Failed outbound pushes, by method");
    metrics::describe_counter!(delivery::PENDING_ENQUEUED, "Items queued for later delivery");
    metrics::describe_counter!(
        delivery::PENDING_DELIVERED,
        "Queued items delivered through a pending push"
    );
    metrics::describe_counter!(delivery::EVENTS_PUBLISHED, "Events published to known topics");
    metrics::describe_counter!(delivery::TOPICS_ADVERTISED, "Topics advertised");

    info!("Metrics initialized");
}

/// Start the Prometheus metrics server.
///
/// # Errors
///
/// Returns an error if the exporter cannot be installed.
pub fn start_metrics_server(host: &str, port: u16) -> Result<()> {
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .with_context(|| format!("Invalid metrics address {host}:{port}"))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("Failed to install Prometheus exporter")?;

    info!(%addr, "Metrics server listening");
    Ok(())
}

/// Record a handled request.
pub fn record_request(method: &str, seconds: f64) {
    counter!(names::REQUESTS_TOTAL, "method" => method.to_string()).increment(1);
    histogram!(names::REQUEST_LATENCY_SECONDS).record(seconds);
}

/// Record a request that could not be parsed.
pub fn record_malformed() {
    counter!(names::MALFORMED_REQUESTS_TOTAL).increment(1);
}

/// Metrics guard that tracks one served connection.
pub struct ConnectionMetricsGuard;

impl ConnectionMetricsGuard {
    /// Create a new metrics guard, recording a connection.
    #[must_use]
    pub fn new() -> Self {
        counter!(names::CONNECTIONS_TOTAL).increment(1);
        gauge!(names::CONNECTIONS_ACTIVE).increment(1.0);
        Self
    }
}

impl Default for ConnectionMetricsGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ConnectionMetricsGuard {
    fn drop(&mut self) {
        gauge!(names::CONNECTIONS_ACTIVE).decrement(1.0);
    }
}

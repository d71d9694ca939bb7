//! Metrics collection and exposition.
//!
//! # Metrics
//! - `web_events_total` (counter): raised application events by `event`
//! - `web_routes_registered_total` (counter): route registrations by `method`
//!
//! Recording is a no-op until a recorder is installed.

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_event(event: &'static str) {
    metrics::counter!("web_events_total", "event" => event).increment(1);
}

pub fn record_route(method: &str) {
    metrics::counter!("web_routes_registered_total", "method" => method.to_string()).increment(1);
}

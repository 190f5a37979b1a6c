//! Request accounting via the `metrics` facade, exported in Prometheus
//! exposition format at `/metrics`.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

/// Install the global Prometheus recorder and return its render handle.
///
/// The global recorder can only be installed once per process; when a second
/// router is built (integration tests), fall back to a detached recorder so
/// `/metrics` still renders instead of panicking.
pub fn install_recorder() -> PrometheusHandle {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => handle,
        Err(_) => PrometheusBuilder::new().build_recorder().handle(),
    }
}

/// Count a finished request per endpoint and status code.
pub fn record_request(endpoint: &'static str, status: u16) {
    counter!(
        "relay_requests_total",
        "endpoint" => endpoint,
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record wall-clock handler duration per endpoint.
pub fn record_duration(endpoint: &'static str, start: Instant) {
    histogram!("relay_request_duration_seconds", "endpoint" => endpoint)
        .record(start.elapsed().as_secs_f64());
}

/// Count a failed upstream fetch.
pub fn record_upstream_error() {
    counter!("relay_upstream_errors_total").increment(1);
}

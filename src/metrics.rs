//! Run metrics
//!
//! Counters and histograms are recorded through the `metrics` facade and cost
//! nothing when no recorder is installed. Long backfills can expose them on a
//! Prometheus scrape endpoint with [`init_metrics`].
//!
//! ## Metrics
//!
//! - `portal_requests_total{method,status}` - requests issued, by outcome
//! - `portal_request_duration_seconds{method}` - request latency
//! - `portal_failures_total{resource,kind}` - page and detail failures
//! - `records_harvested_total{resource}` - records appended to collections

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;
use std::net::SocketAddr;
use std::time::Instant;
use tracing::{debug, info};

static METRICS_INITIALIZED: OnceCell<()> = OnceCell::new();

/// Install the Prometheus exporter on `addr`.
///
/// Idempotent: later calls are no-ops. Must be called from within a Tokio
/// runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    if METRICS_INITIALIZED.get().is_some() {
        debug!("Metrics already initialized, skipping");
        return Ok(());
    }

    info!("Initializing metrics endpoint on {}", addr);
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        "portal_requests_total",
        Unit::Count,
        "Total number of requests issued to the vendor portal"
    );
    describe_histogram!(
        "portal_request_duration_seconds",
        Unit::Seconds,
        "Vendor portal request duration in seconds"
    );
    describe_counter!(
        "portal_failures_total",
        Unit::Count,
        "Page and detail fetches that failed"
    );
    describe_counter!(
        "records_harvested_total",
        Unit::Count,
        "Records appended to harvested collections"
    );

    let _ = METRICS_INITIALIZED.set(());
    Ok(())
}

/// Timing handle for one portal request
pub struct RequestTimer {
    method: &'static str,
    started: Instant,
}

impl RequestTimer {
    /// Start timing a request
    pub fn start(method: &'static str) -> Self {
        Self {
            method,
            started: Instant::now(),
        }
    }

    /// Record completion with an HTTP status, or `None` on transport failure
    pub fn finish(self, status: Option<u16>) {
        let status = status.map_or_else(|| "transport_error".to_string(), |s| s.to_string());
        counter!("portal_requests_total", "method" => self.method, "status" => status).increment(1);
        histogram!("portal_request_duration_seconds", "method" => self.method)
            .record(self.started.elapsed().as_secs_f64());
    }
}

/// Record a page or detail failure for `resource`
pub fn record_failure(resource: &'static str, kind: &'static str) {
    counter!("portal_failures_total", "resource" => resource, "kind" => kind).increment(1);
}

/// Record `count` records harvested for `resource`
pub fn record_harvested(resource: &'static str, count: usize) {
    counter!("records_harvested_total", "resource" => resource).increment(count as u64);
}

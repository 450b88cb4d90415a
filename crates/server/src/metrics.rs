//! Prometheus metrics (`GET /metrics`): a `OnceLock<PrometheusHandle>`,
//! `describe_*!` calls run once at startup, and a `RequestTimer` helper for
//! per-handler timing.

use std::sync::OnceLock;
use std::time::Instant;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Call once at startup before any metric
/// is recorded. Returns `false` if already initialized.
pub fn init_metrics() -> bool {
    if PROMETHEUS_HANDLE.get().is_some() {
        return false;
    }

    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();

    if metrics::set_global_recorder(recorder).is_err() {
        tracing::warn!("failed to set global metrics recorder (already set)");
        return false;
    }
    if PROMETHEUS_HANDLE.set(handle).is_err() {
        tracing::warn!("failed to store Prometheus handle (already set)");
    }

    describe_metrics();
    tracing::info!("Prometheus metrics initialized");
    true
}

fn describe_metrics() {
    describe_counter!("revisit_requests_total", "Total number of handled API requests");
    describe_histogram!("revisit_request_duration_seconds", "Duration of API requests in seconds");
    describe_histogram!("revisit_import_duration_seconds", "Duration of CSV import jobs in seconds");
    describe_gauge!("revisit_import_rows_processed", "Rows processed in the most recent import");
    describe_counter!("revisit_sessions_generated_total", "Total number of practice sessions generated");
}

/// Render current metrics in Prometheus text format. `None` before init.
pub fn render_metrics() -> Option<String> {
    PROMETHEUS_HANDLE.get().map(|h| h.render())
}

pub fn record_request(endpoint: &str, status: &str, duration: std::time::Duration) {
    counter!("revisit_requests_total", "endpoint" => endpoint.to_string(), "status" => status.to_string()).increment(1);
    histogram!("revisit_request_duration_seconds", "endpoint" => endpoint.to_string()).record(duration.as_secs_f64());
}

pub fn record_import(duration: std::time::Duration, rows_processed: u64) {
    histogram!("revisit_import_duration_seconds").record(duration.as_secs_f64());
    gauge!("revisit_import_rows_processed").set(rows_processed as f64);
}

pub fn record_session_generated() {
    counter!("revisit_sessions_generated_total").increment(1);
}

/// Times a request handler and records the result on drop-free `finish_*` calls.
pub struct RequestTimer {
    endpoint: String,
    start: Instant,
}

impl RequestTimer {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            start: Instant::now(),
        }
    }

    pub fn finish_ok(self) {
        record_request(&self.endpoint, "200", self.start.elapsed());
    }

    pub fn finish_err(self, status: u16) {
        record_request(&self.endpoint, &status.to_string(), self.start.elapsed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_timer_does_not_panic() {
        let timer = RequestTimer::new("dashboard_stats");
        timer.finish_ok();
    }
}

//! Prometheus metrics for the worker.

use std::net::{Ipv4Addr, SocketAddr};

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Serve metrics on `0.0.0.0:<port>/metrics`.
pub fn init_metrics(port: u16) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)))
        .install()
}

/// Metric names as constants for consistency.
pub mod names {
    pub const JOBS_ENQUEUED_TOTAL: &str = "scrub_jobs_enqueued_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "scrub_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "scrub_jobs_failed_total";
    pub const SHEETS_GENERATED_TOTAL: &str = "scrub_sheets_generated_total";
    pub const SHEETS_SKIPPED_TOTAL: &str = "scrub_sheets_skipped_total";
    pub const JOB_DURATION_SECONDS: &str = "scrub_job_duration_seconds";
}

pub fn record_job_enqueued() {
    counter!(names::JOBS_ENQUEUED_TOTAL).increment(1);
}

pub fn record_job_completed(duration_secs: f64) {
    counter!(names::JOBS_COMPLETED_TOTAL).increment(1);
    histogram!(names::JOB_DURATION_SECONDS).record(duration_secs);
}

/// Record a failed job; `reason` is a short label such as `cancelled`.
pub fn record_job_failed(reason: &str) {
    let labels = [("reason", reason.to_string())];
    counter!(names::JOBS_FAILED_TOTAL, &labels).increment(1);
}

pub fn record_sheet(generated: bool) {
    if generated {
        counter!(names::SHEETS_GENERATED_TOTAL).increment(1);
    } else {
        counter!(names::SHEETS_SKIPPED_TOTAL).increment(1);
    }
}

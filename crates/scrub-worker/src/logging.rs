//! Structured job logging utilities.
//!
//! Provides tracing subscriber setup for the binaries and consistent
//! job lifecycle log lines.

use tracing::{error, info, warn, Span};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use std::path::Path;

use scrub_models::ThumbnailJob;

/// Install the global tracing subscriber.
///
/// `LOG_FORMAT=json` selects JSON lines; otherwise human-readable output.
/// `RUST_LOG` overrides the default `info` level.
pub fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

/// Lifecycle log lines for one thumbnail job.
///
/// Every line carries the job id and sampling interval.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    interval_secs: f64,
}

impl JobLogger {
    pub fn for_job(job: &ThumbnailJob) -> Self {
        Self {
            job_id: job.job_id.to_string(),
            interval_secs: job.interval_secs,
        }
    }

    pub fn log_start(&self, video: &Path) {
        info!(
            job_id = %self.job_id,
            interval_secs = self.interval_secs,
            "Generating previews for {}", video.display()
        );
    }

    /// Summary once every sheet has been attempted.
    pub fn log_sheets(&self, generated: usize, planned: u32, skipped: &[u32]) {
        if skipped.is_empty() {
            info!(job_id = %self.job_id, "{}", sheet_summary(generated, planned, skipped));
        } else {
            warn!(job_id = %self.job_id, "{}", sheet_summary(generated, planned, skipped));
        }
    }

    pub fn log_warning(&self, message: &str) {
        warn!(job_id = %self.job_id, "Job warning: {}", message);
    }

    pub fn log_error(&self, message: &str) {
        error!(job_id = %self.job_id, "Job failed: {}", message);
    }

    pub fn log_completion(&self, cues: usize, elapsed_secs: f64) {
        info!(
            job_id = %self.job_id,
            cues,
            elapsed_secs,
            "Previews ready in {:.1}s", elapsed_secs
        );
    }

    /// Span carrying the job id and interval.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "thumbnail_job",
            job_id = %self.job_id,
            interval_secs = self.interval_secs
        )
    }
}

fn sheet_summary(generated: usize, planned: u32, skipped: &[u32]) -> String {
    if skipped.is_empty() {
        format!("{} of {} sheets generated", generated, planned)
    } else {
        format!(
            "{} of {} sheets generated, skipped {:?}",
            generated, planned, skipped
        )
    }
}

//! Live-update events pushed to connected clients.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::job::JobId;

/// Event published while a job runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// Percent complete changed
    ProgressChanged {
        #[serde(rename = "jobId")]
        job_id: JobId,
        percent: u8,
    },

    /// Elapsed wall-clock time changed
    ElapsedChanged {
        #[serde(rename = "jobId")]
        job_id: JobId,
        seconds: f64,
    },
}

impl ProgressEvent {
    pub fn progress(job_id: &JobId, percent: u8) -> Self {
        Self::ProgressChanged {
            job_id: job_id.clone(),
            percent,
        }
    }

    pub fn elapsed(job_id: &JobId, seconds: f64) -> Self {
        Self::ElapsedChanged {
            job_id: job_id.clone(),
            seconds,
        }
    }

    pub fn job_id(&self) -> &JobId {
        match self {
            ProgressEvent::ProgressChanged { job_id, .. }
            | ProgressEvent::ElapsedChanged { job_id, .. } => job_id,
        }
    }

    pub fn type_str(&self) -> &'static str {
        match self {
            ProgressEvent::ProgressChanged { .. } => "progress_changed",
            ProgressEvent::ElapsedChanged { .. } => "elapsed_changed",
        }
    }
}

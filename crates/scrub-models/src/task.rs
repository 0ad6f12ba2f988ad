//! Durable record of completed jobs.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Progress value stored with every completed-job record.
pub const TERMINAL_PROGRESS: u8 = 100;

/// Entry of the task-duration log (`TaskDurations.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaskDurationRecord {
    pub task_id: String,
    pub duration_seconds: f64,
    #[serde(default = "terminal_progress")]
    pub progress: u8,
    pub timestamp: DateTime<Utc>,
}

fn terminal_progress() -> u8 {
    TERMINAL_PROGRESS
}

impl TaskDurationRecord {
    /// Record a job that finished now.
    pub fn completed(task_id: impl Into<String>, duration_seconds: f64) -> Self {
        Self {
            task_id: task_id.into(),
            duration_seconds,
            progress: TERMINAL_PROGRESS,
            timestamp: Utc::now(),
        }
    }
}

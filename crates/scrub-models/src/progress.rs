//! Per-job progress state.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Progress of one job as seen by pollers.
///
/// `percent == 100` implies `is_processing == false`; the progress store
/// maintains this when it applies updates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    /// Percent complete (0-100)
    pub percent: u8,
    /// Whether the job is running
    pub is_processing: bool,
    /// Wall-clock seconds since the job started
    pub elapsed_seconds: f64,
}

impl ProgressRecord {
    /// Whether the job reached completion.
    pub fn is_complete(&self) -> bool {
        self.percent >= 100
    }
}

//! Video file naming rules and catalog entries.

use std::path::Path;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Extensions accepted for uploaded videos (lowercase, without dot).
pub const SUPPORTED_VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov"];

/// Check whether a file name has a supported video extension.
pub fn is_supported_video(file_name: impl AsRef<Path>) -> bool {
    file_name
        .as_ref()
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            SUPPORTED_VIDEO_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Name used for a video's job, sheets and manifest: the file name without
/// its last extension.
pub fn job_name_for(path: impl AsRef<Path>) -> String {
    path.as_ref()
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// A video in the catalog together with its generation status.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VideoEntry {
    /// Name without extension (also the job id)
    pub name: String,
    /// File name on disk
    pub file_name: String,
    /// File creation (or modification) time
    pub uploaded_at: Option<DateTime<Utc>>,
    /// Whether generation is running
    pub is_processing: bool,
    /// Generation progress (0-100)
    pub progress: u8,
    /// Recorded duration of the last completed generation
    pub task_duration_secs: Option<f64>,
}

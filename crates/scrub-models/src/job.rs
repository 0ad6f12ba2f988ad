//! Job definitions for queue processing.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::video::job_name_for;

/// Identifier for a thumbnail job.
///
/// Derived from the video's file name without extension, so two uploads of
/// identically named files share an id. Callers that need distinct ids must
/// make the file names distinct before enqueueing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Derive the id from a video path or file name (`clip.mp4` -> `clip`).
    pub fn from_video(path: impl AsRef<Path>) -> Self {
        Self(job_name_for(path))
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Request to generate sprite sheets and a manifest for one video.
///
/// This is the unit of work carried by the task queue. It is a plain value
/// so queued work can be logged, serialized and inspected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ThumbnailJob {
    /// Job id (video name without extension)
    pub job_id: JobId,
    /// Complete local video file
    pub video_path: PathBuf,
    /// Directory receiving `<job_name>/` sheets and `<job_name>.vtt.gz`
    pub output_dir: PathBuf,
    /// Base name used for sheet files and the manifest
    pub job_name: String,
    /// Seconds between sampled frames
    pub interval_secs: f64,
    /// When the job was enqueued
    pub enqueued_at: DateTime<Utc>,
}

impl ThumbnailJob {
    /// Create a new job. The id is taken from `job_name`.
    pub fn new(
        video_path: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        job_name: impl Into<String>,
        interval_secs: f64,
    ) -> Self {
        let job_name = job_name.into();
        Self {
            job_id: JobId::from_string(job_name.clone()),
            video_path: video_path.into(),
            output_dir: output_dir.into(),
            job_name,
            interval_secs,
            enqueued_at: Utc::now(),
        }
    }

    /// Create a job for a video, naming it after the file stem.
    pub fn for_video(
        video_path: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        interval_secs: f64,
    ) -> Self {
        let video_path = video_path.into();
        let job_name = job_name_for(&video_path);
        Self::new(video_path, output_dir, job_name, interval_secs)
    }

    /// Directory holding this job's sheet images.
    pub fn sheet_dir(&self) -> PathBuf {
        self.output_dir.join(&self.job_name)
    }

    /// Path of the compressed manifest.
    pub fn manifest_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}.vtt.gz", self.job_name))
    }

    /// Check the job carries everything the pipeline needs.
    ///
    /// Returns a description of the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        if self.video_path.as_os_str().is_empty() {
            return Err("video path is empty".to_string());
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err("output directory is empty".to_string());
        }
        if self.job_name.trim().is_empty() {
            return Err("job name is empty".to_string());
        }
        if !self.interval_secs.is_finite() || self.interval_secs <= 0.0 {
            return Err(format!(
                "sampling interval must be positive, got {}",
                self.interval_secs
            ));
        }
        Ok(())
    }
}

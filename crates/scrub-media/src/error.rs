//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while generating sheets and manifests.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("Video duration unavailable: {0}")]
    DurationUnavailable(String),

    #[error("Invalid video duration: {0}")]
    InvalidDuration(f64),

    #[error("Invalid sampling interval: {0}")]
    InvalidInterval(f64),

    #[error("Transcode failed: {message}")]
    TranscodeFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("No sheets generated for {0}")]
    NoSheetsGenerated(String),

    #[error("Failed to write manifest: {0}")]
    ManifestWrite(String),

    #[error("Image error: {0}")]
    Image(String),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    /// Create a transcode failure error.
    pub fn transcode_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::TranscodeFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    pub fn manifest_write(message: impl Into<String>) -> Self {
        Self::ManifestWrite(message.into())
    }
}

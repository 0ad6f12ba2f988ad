//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Unsupported video file: {0}")]
    UnsupportedVideo(String),

    #[error("Storage error: {0}")]
    Storage(#[from] scrub_storage::StorageError),

    #[error("Media error: {0}")]
    Media(#[from] scrub_media::MediaError),

    #[error("Queue error: {0}")]
    Queue(#[from] scrub_queue::QueueError),
}

impl WorkerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Whether the error came from a cancellation rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            WorkerError::Media(scrub_media::MediaError::Cancelled)
                | WorkerError::Queue(scrub_queue::QueueError::Cancelled)
        )
    }
}

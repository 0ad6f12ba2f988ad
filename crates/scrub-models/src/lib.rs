//! Shared data models for the scrubbing-preview pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Thumbnail generation jobs and their identifiers
//! - Sprite sheet geometry and per-sheet metadata
//! - WebVTT manifest cues (rendering and parsing)
//! - Progress records, duration log entries and live-update events
//! - Video file naming rules

pub mod events;
pub mod job;
pub mod manifest;
pub mod progress;
pub mod sprite;
pub mod task;
pub mod video;

// Re-export common types
pub use events::ProgressEvent;
pub use job::{JobId, ThumbnailJob};
pub use manifest::{format_cue_time, parse_manifest, render_manifest, ManifestCue, ManifestError, RegionRef};
pub use progress::ProgressRecord;
pub use sprite::{FrameSize, RemoteImageRef, SheetRef, TileGrid, TileInfo};
pub use task::TaskDurationRecord;
pub use video::{is_supported_video, job_name_for, VideoEntry, SUPPORTED_VIDEO_EXTENSIONS};

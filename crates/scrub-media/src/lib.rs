//! FFmpeg CLI wrapper and preview generation.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building with cancellation and timeouts
//! - Duration probing via ffprobe
//! - The [`Transcoder`] capability and its ffmpeg implementation
//! - Sprite sheet tiling geometry and generation
//! - WebVTT manifest generation

pub mod command;
pub mod error;
pub mod manifest;
pub mod probe;
pub mod sprite;
pub mod transcoder;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use manifest::{ManifestSummary, ManifestWriter};
pub use probe::probe_duration;
pub use sprite::{
    SheetPlan, SheetProgress, SheetWindow, SpriteConfig, SpriteSheetBuilder, SpriteSheetOutput,
    UploadFailurePolicy,
};
pub use transcoder::{FfmpegTranscoder, FullPassRequest, TileRequest, Transcoder};

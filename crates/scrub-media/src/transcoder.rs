//! Frame extraction capability.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use scrub_models::TileGrid;
use tokio_util::sync::CancellationToken;

use crate::command::{tile_filter, FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;
use crate::probe::probe_duration;

/// Extract one sheet covering `[start_time, start_time + duration)`.
#[derive(Debug, Clone, PartialEq)]
pub struct TileRequest {
    pub video_path: PathBuf,
    pub start_time: f64,
    pub duration: f64,
    pub interval_secs: f64,
    pub grid: TileGrid,
    pub thumbnail_height: u32,
    pub output: PathBuf,
}

/// Extract every sheet of a video in one pass.
///
/// `output_pattern` contains `%d`, replaced by the 1-based sheet index.
#[derive(Debug, Clone, PartialEq)]
pub struct FullPassRequest {
    pub video_path: PathBuf,
    pub interval_secs: f64,
    pub grid: TileGrid,
    pub thumbnail_height: u32,
    pub output_pattern: PathBuf,
}

impl FullPassRequest {
    /// Path the pass writes for sheet `index`.
    pub fn sheet_path(&self, index: u32) -> PathBuf {
        PathBuf::from(
            self.output_pattern
                .to_string_lossy()
                .replacen("%d", &index.to_string(), 1),
        )
    }
}

/// Probes durations and renders tiled sheets.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Duration of the video in seconds.
    async fn probe_duration(&self, video_path: &Path, cancel: &CancellationToken) -> MediaResult<f64>;

    /// Render one time-windowed sheet.
    async fn extract_tile(&self, request: &TileRequest, cancel: &CancellationToken) -> MediaResult<()>;

    /// Render all sheets by sampling the whole file once.
    async fn extract_all_tiles(
        &self,
        request: &FullPassRequest,
        cancel: &CancellationToken,
    ) -> MediaResult<()>;
}

/// [`Transcoder`] backed by the `ffmpeg` and `ffprobe` binaries.
#[derive(Debug, Clone, Default)]
pub struct FfmpegTranscoder {
    timeout: Option<Duration>,
}

impl FfmpegTranscoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill any single ffmpeg invocation running longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn runner(&self, cancel: &CancellationToken) -> FfmpegRunner {
        FfmpegRunner::new()
            .with_cancel(cancel.clone())
            .with_timeout(self.timeout)
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn probe_duration(&self, video_path: &Path, cancel: &CancellationToken) -> MediaResult<f64> {
        probe_duration(video_path, cancel).await
    }

    async fn extract_tile(&self, request: &TileRequest, cancel: &CancellationToken) -> MediaResult<()> {
        let cmd = FfmpegCommand::new(&request.video_path, &request.output)
            .seek(request.start_time)
            .duration(request.duration)
            .video_filter(tile_filter(
                request.interval_secs,
                request.thumbnail_height,
                &request.grid.filter_arg(),
            ))
            .frames(1);
        self.runner(cancel).run(&cmd).await
    }

    async fn extract_all_tiles(
        &self,
        request: &FullPassRequest,
        cancel: &CancellationToken,
    ) -> MediaResult<()> {
        let cmd = FfmpegCommand::new(&request.video_path, &request.output_pattern)
            .video_filter(tile_filter(
                request.interval_secs,
                request.thumbnail_height,
                &request.grid.filter_arg(),
            ))
            .output_arg("-start_number")
            .output_arg("1");
        self.runner(cancel).run(&cmd).await
    }
}

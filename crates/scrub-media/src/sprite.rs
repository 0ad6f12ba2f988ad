//! Sprite sheet generation.
//!
//! A video of duration `D` sampled every `I` seconds yields `ceil(D / I)`
//! frames. Frames are packed row-major into sheets of `columns x rows`
//! cells; sheet `i` (1-based) covers
//! `[(i-1) * F * I, min(i * F * I, D))` where `F` is the sheet capacity.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use scrub_models::sprite::{DEFAULT_THUMBNAIL_HEIGHT, LONG_VIDEO_THRESHOLD_SECS};
use scrub_models::{FrameSize, SheetRef, ThumbnailJob, TileGrid, TileInfo};
use scrub_storage::ImageStore;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{MediaError, MediaResult};
use crate::transcoder::{FullPassRequest, TileRequest, Transcoder};

/// What to do with a sheet whose remote upload failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadFailurePolicy {
    /// Reference the local file instead
    #[default]
    KeepLocal,
    /// Leave the sheet out of the manifest
    DropSheet,
}

impl FromStr for UploadFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keep_local" | "keep" | "local" => Ok(Self::KeepLocal),
            "drop_sheet" | "drop" => Ok(Self::DropSheet),
            other => Err(format!("unknown upload failure policy: {}", other)),
        }
    }
}

/// Sheet generation settings.
#[derive(Debug, Clone)]
pub struct SpriteConfig {
    pub grid: TileGrid,
    /// Height of one frame cell in pixels
    pub thumbnail_height: u32,
    /// Videos longer than this are extracted one window per sheet
    pub long_video_threshold_secs: f64,
    /// URL prefix under which the previews directory is served
    pub public_prefix: String,
    pub upload_failure: UploadFailurePolicy,
}

impl Default for SpriteConfig {
    fn default() -> Self {
        Self {
            grid: TileGrid::default(),
            thumbnail_height: DEFAULT_THUMBNAIL_HEIGHT,
            long_video_threshold_secs: LONG_VIDEO_THRESHOLD_SECS,
            public_prefix: "/previews".to_string(),
            upload_failure: UploadFailurePolicy::KeepLocal,
        }
    }
}

/// Time window and frame count of one sheet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SheetWindow {
    pub index: u32,
    pub start_time: f64,
    pub end_time: f64,
    pub frame_count: u32,
}

/// Tiling geometry for one video.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SheetPlan {
    pub duration: f64,
    pub interval_secs: f64,
    pub grid: TileGrid,
    pub total_frames: u64,
    pub sheet_count: u32,
}

impl SheetPlan {
    pub fn new(duration: f64, interval_secs: f64, grid: TileGrid) -> MediaResult<Self> {
        if !duration.is_finite() || duration <= 0.0 {
            return Err(MediaError::InvalidDuration(duration));
        }
        if !interval_secs.is_finite() || interval_secs <= 0.0 {
            return Err(MediaError::InvalidInterval(interval_secs));
        }
        if grid.frames_per_sheet() == 0 {
            return Err(MediaError::InvalidInterval(interval_secs));
        }

        let total_frames = frame_count(duration, interval_secs);
        let per_sheet = grid.frames_per_sheet() as u64;
        let sheet_count = total_frames.div_ceil(per_sheet) as u32;

        Ok(Self {
            duration,
            interval_secs,
            grid,
            total_frames,
            sheet_count,
        })
    }

    pub fn frames_per_sheet(&self) -> u32 {
        self.grid.frames_per_sheet()
    }

    /// Window of sheet `index` (1-based).
    pub fn window(&self, index: u32) -> SheetWindow {
        let per_sheet = self.frames_per_sheet() as u64;
        let first = (index as u64 - 1) * per_sheet;
        let start_time = first as f64 * self.interval_secs;
        let end_time = ((first + per_sheet) as f64 * self.interval_secs).min(self.duration);
        let frame_count = self.total_frames.saturating_sub(first).min(per_sheet) as u32;
        SheetWindow {
            index,
            start_time,
            end_time,
            frame_count,
        }
    }

    pub fn windows(&self) -> impl Iterator<Item = SheetWindow> + '_ {
        (1..=self.sheet_count).map(|i| self.window(i))
    }
}

/// `ceil(duration / interval)`, at least 1.
///
/// A ratio within rounding error of a whole number counts as that number,
/// so `7.7 / 0.7` gives 11 frames rather than a twelfth empty one.
fn frame_count(duration: f64, interval_secs: f64) -> u64 {
    let ratio = duration / interval_secs;
    let nearest = ratio.round();
    let frames = if (ratio - nearest).abs() <= ratio * 1e-12 {
        nearest
    } else {
        ratio.ceil()
    };
    frames.max(1.0) as u64
}

/// Progress after one sheet was attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SheetProgress {
    pub tile_index: u32,
    pub sheet_count: u32,
    /// `tile_index * 100 / sheet_count`
    pub percent: u8,
    /// False when the sheet was skipped
    pub generated: bool,
}

/// Output of a build.
#[derive(Debug, Clone)]
pub struct SpriteSheetOutput {
    pub plan: SheetPlan,
    /// Generated sheets in increasing index order
    pub tiles: Vec<TileInfo>,
    /// Cell size measured from the first generated sheet
    pub frame_size: Option<FrameSize>,
    /// Indices of sheets that were skipped
    pub skipped: Vec<u32>,
}

/// Drives the transcoder to produce a job's sheets.
pub struct SpriteSheetBuilder {
    transcoder: Arc<dyn Transcoder>,
    image_store: Option<Arc<dyn ImageStore>>,
    config: SpriteConfig,
}

impl SpriteSheetBuilder {
    pub fn new(
        transcoder: Arc<dyn Transcoder>,
        image_store: Option<Arc<dyn ImageStore>>,
        config: SpriteConfig,
    ) -> Self {
        Self {
            transcoder,
            image_store,
            config,
        }
    }

    pub fn config(&self) -> &SpriteConfig {
        &self.config
    }

    /// Sheet file for index `i`: `<sheet_dir>/<job>_<i>.png`.
    pub fn sheet_path(job: &ThumbnailJob, index: u32) -> PathBuf {
        job.sheet_dir().join(format!("{}_{}.png", job.job_name, index))
    }

    fn local_ref(&self, job: &ThumbnailJob, index: u32) -> String {
        format!(
            "{}/{}/{}_{}.png",
            self.config.public_prefix.trim_end_matches('/'),
            job.job_name,
            job.job_name,
            index
        )
    }

    /// Generate every sheet for `job`.
    ///
    /// A sheet whose extraction or upload fails is skipped; the job only
    /// fails when the duration cannot be determined or on cancellation.
    pub async fn build(
        &self,
        job: &ThumbnailJob,
        on_progress: &(dyn Fn(SheetProgress) + Send + Sync),
        cancel: &CancellationToken,
    ) -> MediaResult<SpriteSheetOutput> {
        let duration = self.transcoder.probe_duration(&job.video_path, cancel).await?;
        let plan = SheetPlan::new(duration, job.interval_secs, self.config.grid)?;

        info!(
            job_id = %job.job_id,
            duration,
            total_frames = plan.total_frames,
            sheets = plan.sheet_count,
            "Planned sprite sheets"
        );

        tokio::fs::create_dir_all(job.sheet_dir()).await?;
        remove_stale_sheets(job).await?;

        let windowed = duration > self.config.long_video_threshold_secs;
        let single_pass_ok = if windowed {
            false
        } else {
            self.run_single_pass(job, cancel).await?
        };

        let mut output = SpriteSheetOutput {
            plan,
            tiles: Vec::with_capacity(plan.sheet_count as usize),
            frame_size: None,
            skipped: Vec::new(),
        };

        for window in plan.windows() {
            if cancel.is_cancelled() {
                return Err(MediaError::Cancelled);
            }

            let sheet = Self::sheet_path(job, window.index);
            let extracted = if single_pass_ok {
                self.check_single_pass_sheet(&sheet).await
            } else {
                self.extract_window(job, &window, &sheet, cancel).await
            };

            let generated = match extracted {
                Ok(()) => self.finish_sheet(job, &window, &sheet, &mut output, cancel).await?,
                Err(MediaError::Cancelled) => return Err(MediaError::Cancelled),
                Err(e) => {
                    warn!(job_id = %job.job_id, tile = window.index, "Sheet extraction failed: {}", e);
                    false
                }
            };
            if !generated {
                output.skipped.push(window.index);
            }

            on_progress(SheetProgress {
                tile_index: window.index,
                sheet_count: plan.sheet_count,
                percent: (window.index as u64 * 100 / plan.sheet_count as u64) as u8,
                generated,
            });
        }

        info!(
            job_id = %job.job_id,
            generated = output.tiles.len(),
            skipped = output.skipped.len(),
            "Sprite sheets complete"
        );
        Ok(output)
    }

    /// Sample the whole file at once. Falls back to windowed extraction
    /// (returns false) when the pass fails.
    async fn run_single_pass(&self, job: &ThumbnailJob, cancel: &CancellationToken) -> MediaResult<bool> {
        let request = FullPassRequest {
            video_path: job.video_path.clone(),
            interval_secs: job.interval_secs,
            grid: self.config.grid,
            thumbnail_height: self.config.thumbnail_height,
            output_pattern: job.sheet_dir().join(format!("{}_%d.png", job.job_name)),
        };
        match self.transcoder.extract_all_tiles(&request, cancel).await {
            Ok(()) => Ok(true),
            Err(MediaError::Cancelled) => Err(MediaError::Cancelled),
            Err(e) => {
                warn!(job_id = %job.job_id, "Single-pass extraction failed, using windows: {}", e);
                Ok(false)
            }
        }
    }

    async fn check_single_pass_sheet(&self, sheet: &Path) -> MediaResult<()> {
        if tokio::fs::try_exists(sheet).await? {
            Ok(())
        } else {
            Err(MediaError::transcode_failed(
                format!("single pass did not produce {}", sheet.display()),
                None,
                None,
            ))
        }
    }

    async fn extract_window(
        &self,
        job: &ThumbnailJob,
        window: &SheetWindow,
        sheet: &Path,
        cancel: &CancellationToken,
    ) -> MediaResult<()> {
        let request = TileRequest {
            video_path: job.video_path.clone(),
            start_time: window.start_time,
            duration: window.end_time - window.start_time,
            interval_secs: job.interval_secs,
            grid: self.config.grid,
            thumbnail_height: self.config.thumbnail_height,
            output: sheet.to_path_buf(),
        };
        debug!(job_id = %job.job_id, tile = window.index, "Extracting {:?}", request);
        self.transcoder.extract_tile(&request, cancel).await
    }

    /// Measure, upload and record an extracted sheet. Returns false when
    /// the sheet had to be skipped.
    async fn finish_sheet(
        &self,
        job: &ThumbnailJob,
        window: &SheetWindow,
        sheet: &Path,
        output: &mut SpriteSheetOutput,
        cancel: &CancellationToken,
    ) -> MediaResult<bool> {
        if output.frame_size.is_none() {
            match measure_frame(sheet, self.config.grid).await {
                Ok(size) => output.frame_size = Some(size),
                Err(e) => {
                    warn!(job_id = %job.job_id, tile = window.index, "Unreadable sheet: {}", e);
                    return Ok(false);
                }
            }
        }

        let sheet_ref = match &self.image_store {
            None => SheetRef::Local {
                path: self.local_ref(job, window.index),
            },
            Some(store) => {
                let uploaded = tokio::select! {
                    result = store.upload(sheet) => result,
                    _ = cancel.cancelled() => return Err(MediaError::Cancelled),
                };
                match uploaded {
                    Ok(remote) => {
                        if let Err(e) = tokio::fs::remove_file(sheet).await {
                            warn!("Failed to remove uploaded sheet {}: {}", sheet.display(), e);
                        }
                        SheetRef::Remote(remote)
                    }
                    Err(e) => {
                        warn!(job_id = %job.job_id, tile = window.index, "Sheet upload failed: {}", e);
                        match self.config.upload_failure {
                            UploadFailurePolicy::KeepLocal => SheetRef::Local {
                                path: self.local_ref(job, window.index),
                            },
                            UploadFailurePolicy::DropSheet => return Ok(false),
                        }
                    }
                }
            }
        };

        output.tiles.push(TileInfo {
            tile_index: window.index,
            start_time: window.start_time,
            end_time: window.end_time,
            frame_count: window.frame_count,
            sheet: sheet_ref,
        });
        Ok(true)
    }
}

/// Delete `<job>_*.png` left in the sheet directory by an earlier run, so
/// only sheets written by this run are picked up.
async fn remove_stale_sheets(job: &ThumbnailJob) -> MediaResult<()> {
    let prefix = format!("{}_", job.job_name);
    let mut entries = tokio::fs::read_dir(job.sheet_dir()).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with(&prefix) && name.ends_with(".png") {
            debug!(job_id = %job.job_id, "Removing stale sheet {}", name);
            tokio::fs::remove_file(entry.path()).await?;
        }
    }
    Ok(())
}

/// Cell size of a generated sheet.
async fn measure_frame(sheet: &Path, grid: TileGrid) -> MediaResult<FrameSize> {
    let path = sheet.to_path_buf();
    let (width, height) = tokio::task::spawn_blocking(move || image::image_dimensions(&path))
        .await
        .map_err(|e| MediaError::Image(e.to_string()))?
        .map_err(|e| MediaError::Image(e.to_string()))?;
    FrameSize::from_sheet(width, height, grid).ok_or_else(|| {
        MediaError::Image(format!(
            "{}x{} sheet is too small for a {} grid",
            width,
            height,
            grid.filter_arg()
        ))
    })
}

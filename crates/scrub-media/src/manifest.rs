//! Manifest generation.

use std::path::PathBuf;

use scrub_models::{render_manifest, FrameSize, ManifestCue, RegionRef, ThumbnailJob, TileGrid, TileInfo};
use scrub_storage::compress_file;
use tracing::info;

use crate::error::{MediaError, MediaResult};

/// Written manifest.
#[derive(Debug, Clone)]
pub struct ManifestSummary {
    pub path: PathBuf,
    pub cue_count: usize,
    pub compressed_bytes: u64,
}

/// Turns generated sheets into a compressed WebVTT cue list.
#[derive(Debug, Clone, Copy)]
pub struct ManifestWriter {
    grid: TileGrid,
}

impl ManifestWriter {
    pub fn new(grid: TileGrid) -> Self {
        Self { grid }
    }

    /// One cue per captured frame, in sheet then cell order.
    ///
    /// Times are derived from the frame's index across the whole video so
    /// that consecutive cues share their boundary exactly.
    pub fn cues(&self, tiles: &[TileInfo], interval_secs: f64, frame: FrameSize) -> Vec<ManifestCue> {
        let per_sheet = self.grid.frames_per_sheet() as u64;
        let mut cues = Vec::with_capacity(tiles.iter().map(|t| t.frame_count as usize).sum());

        for tile in tiles {
            let first = (tile.tile_index as u64).saturating_sub(1) * per_sheet;
            let sheet = tile.sheet.as_manifest_ref();
            for f in 0..tile.frame_count {
                let global = first + f as u64;
                let start_time = global as f64 * interval_secs;
                // The last frame of a sheet closes the sheet's window exactly.
                let end_time = if f + 1 == tile.frame_count {
                    tile.end_time
                } else {
                    ((global + 1) as f64 * interval_secs).min(tile.end_time)
                };
                let (col, row) = self.grid.cell(f);
                cues.push(ManifestCue {
                    start_time,
                    end_time,
                    region: RegionRef {
                        sheet: sheet.to_string(),
                        x: col * frame.width,
                        y: row * frame.height,
                        width: frame.width,
                        height: frame.height,
                    },
                });
            }
        }
        cues
    }

    /// Write `<output_dir>/<job>.vtt`, compress it to `<job>.vtt.gz` and
    /// remove the plain file.
    pub async fn write(
        &self,
        job: &ThumbnailJob,
        tiles: &[TileInfo],
        frame: FrameSize,
    ) -> MediaResult<ManifestSummary> {
        let cues = self.cues(tiles, job.interval_secs, frame);
        let text = render_manifest(&cues);

        let archive = job.manifest_path();
        let plain = archive.with_extension("");

        tokio::fs::create_dir_all(&job.output_dir)
            .await
            .map_err(|e| MediaError::manifest_write(format!("{}: {}", job.output_dir.display(), e)))?;
        tokio::fs::write(&plain, text)
            .await
            .map_err(|e| MediaError::manifest_write(format!("{}: {}", plain.display(), e)))?;
        let compressed_bytes = compress_file(&plain, &archive)
            .await
            .map_err(|e| MediaError::manifest_write(e.to_string()))?;

        info!(
            job_id = %job.job_id,
            cues = cues.len(),
            compressed_bytes,
            "Wrote manifest {}",
            archive.display()
        );
        Ok(ManifestSummary {
            path: archive,
            cue_count: cues.len(),
            compressed_bytes,
        })
    }
}

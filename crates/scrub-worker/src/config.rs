//! Worker configuration.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use scrub_media::{SpriteConfig, UploadFailurePolicy};
use scrub_models::sprite::{DEFAULT_INTERVAL_SECS, DEFAULT_THUMBNAIL_HEIGHT, LONG_VIDEO_THRESHOLD_SECS};
use scrub_models::TileGrid;
use scrub_storage::AssetLayout;

use crate::error::{WorkerError, WorkerResult};

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum concurrent jobs (1 = single-flight)
    pub max_concurrent_jobs: usize,
    /// Graceful shutdown timeout
    pub shutdown_timeout: Duration,
    /// Limit for a single ffmpeg invocation
    pub ffmpeg_timeout: Option<Duration>,
    /// Default seconds between sampled frames
    pub interval_secs: f64,
    /// Sheet generation settings
    pub sprite: SpriteConfig,
    /// Video and previews directories
    pub layout: AssetLayout,
    /// Enqueue videos without a manifest at startup
    pub backfill_on_start: bool,
    /// Redis URL for live progress updates
    pub redis_url: Option<String>,
    /// Port for the Prometheus exporter
    pub metrics_port: Option<u16>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 1,
            shutdown_timeout: Duration::from_secs(30),
            ffmpeg_timeout: None,
            interval_secs: DEFAULT_INTERVAL_SECS,
            sprite: SpriteConfig::default(),
            layout: AssetLayout::default(),
            backfill_on_start: false,
            redis_url: None,
            metrics_port: None,
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

fn env_flag(key: &str) -> bool {
    std::env::var(key)
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let video_dir = std::env::var("SCRUB_VIDEO_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.layout.video_dir);
        let previews_dir = std::env::var("SCRUB_PREVIEWS_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.layout.previews_dir);
        let mut layout = AssetLayout::new(video_dir, previews_dir);
        if let Ok(log) = std::env::var("SCRUB_DURATION_LOG") {
            layout = layout.with_duration_log(log);
        }

        let sprite = SpriteConfig {
            grid: TileGrid::new(
                env_parse("SCRUB_TILE_COLUMNS").unwrap_or(defaults.sprite.grid.columns),
                env_parse("SCRUB_TILE_ROWS").unwrap_or(defaults.sprite.grid.rows),
            ),
            thumbnail_height: env_parse("SCRUB_THUMB_HEIGHT").unwrap_or(DEFAULT_THUMBNAIL_HEIGHT),
            long_video_threshold_secs: env_parse("SCRUB_LONG_VIDEO_SECS")
                .unwrap_or(LONG_VIDEO_THRESHOLD_SECS),
            public_prefix: std::env::var("SCRUB_PUBLIC_PREFIX")
                .unwrap_or(defaults.sprite.public_prefix),
            upload_failure: env_parse::<UploadFailurePolicy>("SCRUB_UPLOAD_FAILURE")
                .unwrap_or_default(),
        };

        Self {
            max_concurrent_jobs: env_parse("WORKER_MAX_JOBS").unwrap_or(defaults.max_concurrent_jobs),
            shutdown_timeout: Duration::from_secs(env_parse("WORKER_SHUTDOWN_TIMEOUT").unwrap_or(30)),
            ffmpeg_timeout: env_parse("FFMPEG_TIMEOUT_SECS").map(Duration::from_secs),
            interval_secs: env_parse("SCRUB_INTERVAL_SECS").unwrap_or(DEFAULT_INTERVAL_SECS),
            sprite,
            layout,
            backfill_on_start: env_flag("SCRUB_BACKFILL_ON_START"),
            redis_url: std::env::var("REDIS_URL").ok().filter(|s| !s.is_empty()),
            metrics_port: env_parse("METRICS_PORT"),
        }
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> WorkerResult<()> {
        if self.max_concurrent_jobs == 0 {
            return Err(WorkerError::config_error("WORKER_MAX_JOBS must be at least 1"));
        }
        if !self.interval_secs.is_finite() || self.interval_secs <= 0.0 {
            return Err(WorkerError::config_error(format!(
                "SCRUB_INTERVAL_SECS must be positive, got {}",
                self.interval_secs
            )));
        }
        if self.sprite.grid.frames_per_sheet() == 0 {
            return Err(WorkerError::config_error("tile grid must have at least one cell"));
        }
        if self.sprite.thumbnail_height == 0 {
            return Err(WorkerError::config_error("SCRUB_THUMB_HEIGHT must be positive"));
        }
        Ok(())
    }

    /// Whether jobs run strictly one at a time.
    pub fn is_single_flight(&self) -> bool {
        self.max_concurrent_jobs <= 1
    }
}

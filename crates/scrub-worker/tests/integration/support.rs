//! Shared fixtures: a fake transcoder and a temporary asset layout.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use image::RgbImage;
use scrub_media::{
    FullPassRequest, MediaError, MediaResult, SheetPlan, SpriteConfig, SpriteSheetBuilder,
    TileRequest, Transcoder,
};
use scrub_models::{FrameSize, TileGrid};
use scrub_queue::{InMemoryProgressStore, NoopPublisher, ProgressPublisher, ProgressStore};
use scrub_storage::{AssetLayout, AssetRepository, ImageStore};
use scrub_worker::{JobPipeline, WorkerConfig};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Cell size of every sheet the fake renders.
pub const FRAME: FrameSize = FrameSize {
    width: 16,
    height: 9,
};

#[derive(Default)]
struct FakeState {
    durations: HashMap<String, f64>,
    started: Vec<String>,
    failing_tiles: HashSet<u32>,
    fail_full_pass: bool,
    full_passes: usize,
    tile_requests: Vec<TileRequest>,
}

/// Transcoder that knows video durations up front and renders blank sheets.
#[derive(Default)]
pub struct FakeTranscoder {
    state: Mutex<FakeState>,
    lookup_delay: Duration,
}

impl FakeTranscoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every duration lookup take `delay`, so jobs overlap if they can.
    pub fn with_lookup_delay(delay: Duration) -> Self {
        Self {
            lookup_delay: delay,
            ..Self::default()
        }
    }

    pub fn set_duration(&self, file_name: &str, seconds: f64) {
        self.state
            .lock()
            .unwrap()
            .durations
            .insert(file_name.to_string(), seconds);
    }

    pub fn fail_tile(&self, index: u32) {
        self.state.lock().unwrap().failing_tiles.insert(index);
    }

    pub fn fail_full_pass(&self) {
        self.state.lock().unwrap().fail_full_pass = true;
    }

    /// File names in the order their jobs started.
    pub fn started(&self) -> Vec<String> {
        self.state.lock().unwrap().started.clone()
    }

    pub fn full_passes(&self) -> usize {
        self.state.lock().unwrap().full_passes
    }

    pub fn tile_requests(&self) -> Vec<TileRequest> {
        self.state.lock().unwrap().tile_requests.clone()
    }

    fn duration_of(&self, path: &Path) -> MediaResult<f64> {
        let name = file_name(path);
        self.state
            .lock()
            .unwrap()
            .durations
            .get(&name)
            .copied()
            .ok_or_else(|| MediaError::DurationUnavailable(format!("no duration for {}", name)))
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Index `i` from a `<job>_<i>.png` sheet path.
fn sheet_index(path: &Path) -> u32 {
    path.file_stem()
        .and_then(|s| s.to_str())
        .and_then(|s| s.rsplit('_').next())
        .and_then(|i| i.parse().ok())
        .unwrap_or(0)
}

async fn write_sheet(path: &Path, grid: TileGrid) -> MediaResult<()> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        RgbImage::new(grid.columns * FRAME.width, grid.rows * FRAME.height)
            .save(&path)
            .map_err(|e| MediaError::Image(e.to_string()))
    })
    .await
    .map_err(|e| MediaError::Image(e.to_string()))?
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn probe_duration(&self, video_path: &Path, cancel: &CancellationToken) -> MediaResult<f64> {
        self.state.lock().unwrap().started.push(file_name(video_path));
        tokio::select! {
            _ = tokio::time::sleep(self.lookup_delay) => {}
            _ = cancel.cancelled() => return Err(MediaError::Cancelled),
        }
        self.duration_of(video_path)
    }

    async fn extract_tile(&self, request: &TileRequest, _cancel: &CancellationToken) -> MediaResult<()> {
        let failing = {
            let mut state = self.state.lock().unwrap();
            state.tile_requests.push(request.clone());
            state.failing_tiles.contains(&sheet_index(&request.output))
        };
        if failing {
            return Err(MediaError::transcode_failed("tile rejected", None, Some(1)));
        }
        write_sheet(&request.output, request.grid).await
    }

    async fn extract_all_tiles(
        &self,
        request: &FullPassRequest,
        _cancel: &CancellationToken,
    ) -> MediaResult<()> {
        let (fail, failing_tiles) = {
            let mut state = self.state.lock().unwrap();
            state.full_passes += 1;
            (state.fail_full_pass, state.failing_tiles.clone())
        };
        if fail {
            return Err(MediaError::transcode_failed("full pass rejected", None, Some(1)));
        }

        let duration = self.duration_of(&request.video_path)?;
        let plan = SheetPlan::new(duration, request.interval_secs, request.grid)?;
        for index in 1..=plan.sheet_count {
            if !failing_tiles.contains(&index) {
                write_sheet(&request.sheet_path(index), request.grid).await?;
            }
        }
        Ok(())
    }
}

/// Temporary video and previews directories.
pub struct Fixture {
    // Removed on drop.
    _dir: TempDir,
    pub layout: AssetLayout,
    pub transcoder: Arc<FakeTranscoder>,
}

impl Fixture {
    pub async fn new() -> Self {
        Self::with_transcoder(FakeTranscoder::new()).await
    }

    pub async fn with_transcoder(transcoder: FakeTranscoder) -> Self {
        let dir = TempDir::new().unwrap();
        let layout = AssetLayout::new(dir.path().join("video"), dir.path().join("previews"));
        tokio::fs::create_dir_all(&layout.video_dir).await.unwrap();
        tokio::fs::create_dir_all(&layout.previews_dir).await.unwrap();
        Self {
            _dir: dir,
            layout,
            transcoder: Arc::new(transcoder),
        }
    }

    /// Write a placeholder video file and register its duration.
    pub async fn add_video(&self, file_name: &str, seconds: f64) {
        tokio::fs::write(self.layout.video_dir.join(file_name), b"video")
            .await
            .unwrap();
        self.transcoder.set_duration(file_name, seconds);
    }

    pub fn config(&self) -> WorkerConfig {
        WorkerConfig {
            layout: self.layout.clone(),
            shutdown_timeout: Duration::from_secs(5),
            ..WorkerConfig::default()
        }
    }

    pub fn transcoder(&self) -> Arc<dyn Transcoder> {
        Arc::clone(&self.transcoder) as Arc<dyn Transcoder>
    }
}

/// A pipeline wired to in-memory collaborators.
pub struct PipelineHarness {
    pub pipeline: JobPipeline,
    pub progress: Arc<InMemoryProgressStore>,
    pub repository: Arc<AssetRepository>,
}

impl PipelineHarness {
    pub fn new(
        fixture: &Fixture,
        sprite: SpriteConfig,
        image_store: Option<Arc<dyn ImageStore>>,
        publisher: Option<Arc<dyn ProgressPublisher>>,
    ) -> Self {
        let progress = Arc::new(InMemoryProgressStore::new());
        let repository = Arc::new(AssetRepository::new(fixture.layout.clone(), image_store.clone()));
        let builder = SpriteSheetBuilder::new(fixture.transcoder(), image_store, sprite);
        let pipeline = JobPipeline::new(
            builder,
            Arc::clone(&progress) as Arc<dyn ProgressStore>,
            publisher.unwrap_or_else(|| Arc::new(NoopPublisher)),
            Arc::clone(&repository),
        );
        Self {
            pipeline,
            progress,
            repository,
        }
    }
}

/// Poll `check` until it holds or `timeout` passes.
pub async fn wait_until(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

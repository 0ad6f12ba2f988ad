//! Asset repository.
//!
//! Owns the on-disk layout of videos and generated previews:
//!
//! ```text
//! <video_dir>/<name>.<ext>             uploaded video
//! <video_dir>/TaskDurations.json       completed-job log
//! <previews_dir>/<name>/<name>_<i>.png sprite sheets
//! <previews_dir>/<name>.vtt.gz         compressed manifest
//! ```

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use scrub_models::{job_name_for, TaskDurationRecord};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::archive::read_manifest_archive;
use crate::error::{StorageError, StorageResult};
use crate::image_store::{DeleteOutcome, ImageStore};

/// File name of the task-duration log.
pub const DURATION_LOG_FILE: &str = "TaskDurations.json";

/// Directory layout for videos and previews.
#[derive(Debug, Clone)]
pub struct AssetLayout {
    pub video_dir: PathBuf,
    pub previews_dir: PathBuf,
    pub duration_log: PathBuf,
}

impl AssetLayout {
    /// Layout with the duration log stored next to the videos.
    pub fn new(video_dir: impl Into<PathBuf>, previews_dir: impl Into<PathBuf>) -> Self {
        let video_dir = video_dir.into();
        Self {
            duration_log: video_dir.join(DURATION_LOG_FILE),
            video_dir,
            previews_dir: previews_dir.into(),
        }
    }

    pub fn with_duration_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.duration_log = path.into();
        self
    }

    pub fn video_path(&self, file_name: &str) -> PathBuf {
        self.video_dir.join(file_name)
    }

    pub fn sheet_dir(&self, job_name: &str) -> PathBuf {
        self.previews_dir.join(job_name)
    }

    pub fn manifest_path(&self, job_name: &str) -> PathBuf {
        self.previews_dir.join(format!("{}.vtt.gz", job_name))
    }
}

impl Default for AssetLayout {
    fn default() -> Self {
        Self::new("/etc/data/video", "/etc/data/previews")
    }
}

/// Artifact touched by a deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
    VideoFile(PathBuf),
    SheetDirectory(PathBuf),
    RemoteImage(String),
    Manifest(PathBuf),
}

/// What happened to one artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeletionStatus {
    Deleted,
    NotFound,
    Failed(String),
}

/// Per-artifact deletion result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactOutcome {
    pub artifact: Artifact,
    pub status: DeletionStatus,
}

/// Result of deleting a video and everything generated from it.
#[derive(Debug, Clone, Default)]
pub struct DeletionReport {
    pub video_name: String,
    pub outcomes: Vec<ArtifactOutcome>,
}

impl DeletionReport {
    fn record(&mut self, artifact: Artifact, status: DeletionStatus) {
        self.outcomes.push(ArtifactOutcome { artifact, status });
    }

    /// Whether the video file itself existed and was removed.
    pub fn video_deleted(&self) -> bool {
        self.outcomes.iter().any(|o| {
            matches!(o.artifact, Artifact::VideoFile(_)) && o.status == DeletionStatus::Deleted
        })
    }

    /// Whether the video file was missing.
    pub fn video_not_found(&self) -> bool {
        self.outcomes.iter().any(|o| {
            matches!(o.artifact, Artifact::VideoFile(_)) && o.status == DeletionStatus::NotFound
        })
    }

    /// Artifacts that could not be deleted.
    pub fn failures(&self) -> impl Iterator<Item = &ArtifactOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, DeletionStatus::Failed(_)))
    }

    /// True when no sub-deletion failed.
    pub fn is_clean(&self) -> bool {
        self.failures().next().is_none()
    }

    /// Ids of remote images with the given status.
    pub fn remote_ids(&self, status: &DeletionStatus) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| &o.status == status)
            .filter_map(|o| match &o.artifact {
                Artifact::RemoteImage(id) => Some(id.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// A video file found in the video directory.
#[derive(Debug, Clone)]
pub struct StoredVideo {
    pub name: String,
    pub file_name: String,
    pub uploaded_at: Option<DateTime<Utc>>,
}

/// Durable job metadata and coordinated artifact deletion.
pub struct AssetRepository {
    layout: AssetLayout,
    image_store: Option<Arc<dyn ImageStore>>,
    duration_log_lock: Mutex<()>,
}

impl AssetRepository {
    pub fn new(layout: AssetLayout, image_store: Option<Arc<dyn ImageStore>>) -> Self {
        Self {
            layout,
            image_store,
            duration_log_lock: Mutex::new(()),
        }
    }

    pub fn layout(&self) -> &AssetLayout {
        &self.layout
    }

    /// Create the video and previews directories.
    pub async fn ensure_dirs(&self) -> StorageResult<()> {
        tokio::fs::create_dir_all(&self.layout.video_dir).await?;
        tokio::fs::create_dir_all(&self.layout.previews_dir).await?;
        if let Some(parent) = self.layout.duration_log.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Path for a newly uploaded video that does not clash with an
    /// existing file: `name.ext` becomes `name_<ticks>.ext` when taken.
    pub async fn unique_video_path(&self, file_name: &str) -> StorageResult<PathBuf> {
        let file_name = plain_file_name(file_name)?;
        let path = self.layout.video_path(file_name);
        if !tokio::fs::try_exists(&path).await? {
            return Ok(path);
        }

        let stem = job_name_for(file_name);
        let ext = Path::new(file_name)
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        let ticks = Utc::now().timestamp_nanos_opt().unwrap_or_default() / 100;
        Ok(self.layout.video_path(&format!("{}_{}{}", stem, ticks, ext)))
    }

    /// Append a completed-job record to the duration log.
    ///
    /// The log is a JSON array rewritten in full; writers are serialized.
    pub async fn save_task_duration(
        &self,
        task_id: &str,
        duration_seconds: f64,
    ) -> StorageResult<TaskDurationRecord> {
        let _guard = self.duration_log_lock.lock().await;

        let mut records = self.read_records().await?;
        let record = TaskDurationRecord::completed(task_id, duration_seconds);
        records.push(record.clone());

        let json = serde_json::to_vec_pretty(&records)?;
        let tmp = self.layout.duration_log.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.layout.duration_log).await?;

        debug!(task_id, duration_seconds, "Saved task duration");
        Ok(record)
    }

    /// All records in the duration log, oldest first.
    pub async fn load_task_records(&self) -> StorageResult<Vec<TaskDurationRecord>> {
        let _guard = self.duration_log_lock.lock().await;
        self.read_records().await
    }

    /// Latest recorded duration per task id.
    pub async fn load_task_durations(&self) -> StorageResult<HashMap<String, f64>> {
        Ok(self
            .load_task_records()
            .await?
            .into_iter()
            .filter(|r| !r.task_id.is_empty())
            .map(|r| (r.task_id, r.duration_seconds))
            .collect())
    }

    async fn read_records(&self) -> StorageResult<Vec<TaskDurationRecord>> {
        let data = match tokio::fs::read_to_string(&self.layout.duration_log).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        if data.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&data)?)
    }

    /// Video files in the video directory, sorted by file name.
    pub async fn list_videos(&self) -> StorageResult<Vec<StoredVideo>> {
        let mut entries = match tokio::fs::read_dir(&self.layout.video_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut videos = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path == self.layout.duration_log {
                continue;
            }
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let uploaded_at = metadata
                .created()
                .or_else(|_| metadata.modified())
                .ok()
                .map(DateTime::<Utc>::from);
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if !scrub_models::is_supported_video(&file_name) {
                continue;
            }
            videos.push(StoredVideo {
                name: job_name_for(&file_name),
                file_name,
                uploaded_at,
            });
        }
        videos.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        Ok(videos)
    }

    /// Whether a compressed manifest exists for `job_name`.
    pub async fn manifest_exists(&self, job_name: &str) -> bool {
        tokio::fs::try_exists(self.layout.manifest_path(job_name))
            .await
            .unwrap_or(false)
    }

    /// Delete a video and everything generated from it.
    ///
    /// Every step is attempted regardless of earlier outcomes: the video
    /// file, the sheet directory, each remote image referenced by the
    /// manifest, then the manifest itself. A manifest that cannot be read
    /// is left on disk since it is the only record of its remote images.
    pub async fn delete_video(&self, video_name: &str) -> StorageResult<DeletionReport> {
        let file_name = plain_file_name(video_name)?;
        let job_name = job_name_for(file_name);
        let mut report = DeletionReport {
            video_name: file_name.to_string(),
            outcomes: Vec::new(),
        };

        let video_path = self.layout.video_path(file_name);
        let status = status_of(tokio::fs::remove_file(&video_path).await);
        if status == DeletionStatus::NotFound {
            warn!("Video not found: {}", video_path.display());
        }
        report.record(Artifact::VideoFile(video_path), status);

        let sheet_dir = self.layout.sheet_dir(&job_name);
        let status = status_of(tokio::fs::remove_dir_all(&sheet_dir).await);
        report.record(Artifact::SheetDirectory(sheet_dir), status);

        let manifest_path = self.layout.manifest_path(&job_name);
        match read_manifest_archive(&manifest_path).await {
            Ok(cues) => {
                for id in self.remote_ids(cues.iter().map(|c| c.region.sheet.as_str())) {
                    let status = match self.delete_remote(&id).await {
                        Ok(DeleteOutcome::Deleted) => DeletionStatus::Deleted,
                        Ok(DeleteOutcome::NotFound) => DeletionStatus::NotFound,
                        Err(e) => {
                            warn!("Failed to delete remote image {}: {}", id, e);
                            DeletionStatus::Failed(e.to_string())
                        }
                    };
                    report.record(Artifact::RemoteImage(id), status);
                }
                let status = status_of(tokio::fs::remove_file(&manifest_path).await);
                report.record(Artifact::Manifest(manifest_path), status);
            }
            Err(StorageError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                report.record(Artifact::Manifest(manifest_path), DeletionStatus::NotFound);
            }
            Err(e) => {
                warn!("Cannot read manifest {}: {}", manifest_path.display(), e);
                report.record(
                    Artifact::Manifest(manifest_path),
                    DeletionStatus::Failed(format!("unreadable manifest: {}", e)),
                );
            }
        }

        info!(
            video = %report.video_name,
            artifacts = report.outcomes.len(),
            failures = report.failures().count(),
            "Deleted video assets"
        );
        Ok(report)
    }

    /// Unique remote ids among manifest sheet references, in first-seen order.
    fn remote_ids<'a>(&self, refs: impl Iterator<Item = &'a str>) -> Vec<String> {
        let Some(store) = &self.image_store else {
            return Vec::new();
        };
        let mut ids: Vec<String> = Vec::new();
        for sheet in refs {
            if let Some(id) = store.id_for_url(sheet) {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
        ids
    }

    async fn delete_remote(&self, id: &str) -> StorageResult<DeleteOutcome> {
        match &self.image_store {
            Some(store) => store.delete(id).await,
            None => Err(StorageError::config_error("no image store configured")),
        }
    }
}

fn status_of(result: std::io::Result<()>) -> DeletionStatus {
    match result {
        Ok(()) => DeletionStatus::Deleted,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => DeletionStatus::NotFound,
        Err(e) => DeletionStatus::Failed(e.to_string()),
    }
}

/// Accept only a bare file name (no directories, no `..`).
fn plain_file_name(name: &str) -> StorageResult<&str> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(name),
        _ => Err(StorageError::InvalidKey(name.to_string())),
    }
}

//! Caller-facing thumbnail service.
//!
//! Upload handlers enqueue finished videos here and pollers read progress;
//! the catalog and deletion operations join the progress store with the
//! asset repository.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use scrub_models::{is_supported_video, JobId, ProgressRecord, ThumbnailJob, VideoEntry};
use scrub_queue::{ProgressStore, TaskQueue};
use scrub_storage::{AssetRepository, DeletionReport};
use tracing::{info, warn};

use crate::error::{WorkerError, WorkerResult};
use crate::metrics;

pub struct ThumbnailService {
    queue: Arc<TaskQueue>,
    progress: Arc<dyn ProgressStore>,
    repository: Arc<AssetRepository>,
    default_interval_secs: f64,
}

impl ThumbnailService {
    pub fn new(
        queue: Arc<TaskQueue>,
        progress: Arc<dyn ProgressStore>,
        repository: Arc<AssetRepository>,
        default_interval_secs: f64,
    ) -> Self {
        Self {
            queue,
            progress,
            repository,
            default_interval_secs,
        }
    }

    /// Queue generation for a complete local video file.
    pub fn enqueue(
        &self,
        video_path: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        job_name: impl Into<String>,
        interval_secs: f64,
    ) -> WorkerResult<JobId> {
        let job = ThumbnailJob::new(video_path, output_dir, job_name, interval_secs);
        let job_id = job.job_id.clone();
        self.queue.enqueue(job)?;
        metrics::record_job_enqueued();
        info!(job_id = %job_id, depth = self.queue.len(), "Queued thumbnail job");
        Ok(job_id)
    }

    /// Queue generation into the configured previews directory with the
    /// default interval.
    pub fn enqueue_video(&self, video_path: impl AsRef<Path>) -> WorkerResult<JobId> {
        let video_path = video_path.as_ref();
        let job = ThumbnailJob::for_video(
            video_path,
            &self.repository.layout().previews_dir,
            self.default_interval_secs,
        );
        self.enqueue(job.video_path, job.output_dir, job.job_name, job.interval_secs)
    }

    /// Path where an upload named `file_name` should be written.
    ///
    /// Rejects unsupported extensions and never returns an existing file, so
    /// each upload gets its own job id.
    pub async fn reserve_upload_path(&self, file_name: &str) -> WorkerResult<PathBuf> {
        if !is_supported_video(file_name) {
            return Err(WorkerError::UnsupportedVideo(file_name.to_string()));
        }
        Ok(self.repository.unique_video_path(file_name).await?)
    }

    pub fn get_progress(&self, job_id: &JobId) -> u8 {
        self.progress.get_progress(job_id)
    }

    pub fn is_processing(&self, job_id: &JobId) -> bool {
        self.progress.is_processing(job_id)
    }

    pub fn elapsed(&self, job_id: &JobId) -> f64 {
        self.progress.get_elapsed(job_id)
    }

    pub fn progress_record(&self, job_id: &JobId) -> ProgressRecord {
        self.progress.get(job_id)
    }

    /// Jobs waiting to start.
    pub fn queue_depth(&self) -> usize {
        self.queue.len()
    }

    /// Every video with its generation status and last recorded duration.
    pub async fn list_videos(&self) -> WorkerResult<Vec<VideoEntry>> {
        let durations = self.repository.load_task_durations().await?;
        let videos = self.repository.list_videos().await?;

        Ok(videos
            .into_iter()
            .map(|video| {
                let record = self.progress.get(&JobId::from_string(video.name.clone()));
                VideoEntry {
                    task_duration_secs: durations.get(&video.name).copied(),
                    is_processing: record.is_processing,
                    progress: record.percent,
                    uploaded_at: video.uploaded_at,
                    file_name: video.file_name,
                    name: video.name,
                }
            })
            .collect())
    }

    /// Delete a video together with its sheets, manifest and remote images.
    pub async fn delete_video(&self, file_name: &str) -> WorkerResult<DeletionReport> {
        let job_id = JobId::from_video(file_name);
        if self.progress.is_processing(&job_id) {
            warn!(job_id = %job_id, "Deleting a video whose previews are still being generated");
        }

        let report = self.repository.delete_video(file_name).await?;
        for failure in report.failures() {
            warn!(
                video = %report.video_name,
                "Could not delete {:?}: {:?}",
                failure.artifact,
                failure.status
            );
        }
        Ok(report)
    }

    /// Queue every video that has no manifest and is not being processed.
    pub async fn backfill_missing(&self) -> WorkerResult<Vec<JobId>> {
        let layout = self.repository.layout().clone();
        let mut queued = Vec::new();
        for video in self.repository.list_videos().await? {
            if self.repository.manifest_exists(&video.name).await {
                continue;
            }
            if self.progress.is_processing(&JobId::from_string(video.name.clone())) {
                continue;
            }
            queued.push(self.enqueue_video(layout.video_path(&video.file_name))?);
        }
        if !queued.is_empty() {
            info!("Backfill queued {} videos without previews", queued.len());
        }
        Ok(queued)
    }
}

//! One end-to-end thumbnail job.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use scrub_media::{ManifestWriter, MediaError, SheetProgress, SpriteSheetBuilder};
use scrub_models::{JobId, ProgressEvent, ThumbnailJob};
use scrub_queue::{ProgressPublisher, ProgressStore};
use scrub_storage::AssetRepository;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, Instrument};

use crate::error::WorkerResult;
use crate::logging::JobLogger;
use crate::metrics;

/// Sheet progress is capped below 100 until the manifest is written.
const MAX_SHEET_PERCENT: u8 = 99;

/// Result of a successful job.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub job_id: JobId,
    pub sheets: usize,
    pub skipped: Vec<u32>,
    pub cues: usize,
    pub manifest_path: PathBuf,
    pub elapsed_secs: f64,
}

/// Runs sheet generation, manifest writing and bookkeeping for a job.
pub struct JobPipeline {
    builder: SpriteSheetBuilder,
    manifest: ManifestWriter,
    progress: Arc<dyn ProgressStore>,
    publisher: Arc<dyn ProgressPublisher>,
    repository: Arc<AssetRepository>,
}

impl JobPipeline {
    pub fn new(
        builder: SpriteSheetBuilder,
        progress: Arc<dyn ProgressStore>,
        publisher: Arc<dyn ProgressPublisher>,
        repository: Arc<AssetRepository>,
    ) -> Self {
        let manifest = ManifestWriter::new(builder.config().grid);
        Self {
            builder,
            manifest,
            progress,
            publisher,
            repository,
        }
    }

    /// Run `job` to completion.
    ///
    /// On failure the progress record is left as the failure left it.
    pub async fn run(&self, job: &ThumbnailJob, cancel: &CancellationToken) -> WorkerResult<JobOutcome> {
        let logger = JobLogger::for_job(job);
        let span = logger.create_span();
        let result = self.run_logged(job, &logger, cancel).instrument(span).await;
        if let Err(e) = &result {
            if !e.is_cancelled() {
                logger.log_error(&e.to_string());
            }
        }
        result
    }

    async fn run_logged(
        &self,
        job: &ThumbnailJob,
        logger: &JobLogger,
        cancel: &CancellationToken,
    ) -> WorkerResult<JobOutcome> {
        let started = Instant::now();
        let id = job.job_id.clone();

        self.progress.begin(&id);
        logger.log_start(&job.video_path);

        let (tx, rx) = mpsc::unbounded_channel();
        let forwarder = tokio::spawn(forward_events(Arc::clone(&self.publisher), rx));
        let _ = tx.send(ProgressEvent::progress(&id, 0));

        let generated = self.generate(job, logger, started, tx, cancel).await;
        // Deliver every sheet event before the terminal ones.
        let _ = forwarder.await;
        let (sheets, skipped, cues, manifest_path) = generated?;

        let elapsed_secs = started.elapsed().as_secs_f64();
        if let Err(e) = self
            .repository
            .save_task_duration(id.as_str(), elapsed_secs)
            .await
        {
            logger.log_warning(&format!("Failed to record task duration: {}", e));
        }

        self.progress.set_elapsed(&id, elapsed_secs);
        self.progress.set_progress(&id, 100);
        self.publish(ProgressEvent::elapsed(&id, elapsed_secs)).await;
        self.publish(ProgressEvent::progress(&id, 100)).await;

        metrics::record_job_completed(elapsed_secs);
        logger.log_completion(cues, elapsed_secs);

        Ok(JobOutcome {
            job_id: id,
            sheets,
            skipped,
            cues,
            manifest_path,
            elapsed_secs,
        })
    }

    async fn generate(
        &self,
        job: &ThumbnailJob,
        logger: &JobLogger,
        started: Instant,
        events: mpsc::UnboundedSender<ProgressEvent>,
        cancel: &CancellationToken,
    ) -> WorkerResult<(usize, Vec<u32>, usize, PathBuf)> {
        let id = job.job_id.clone();
        let progress = Arc::clone(&self.progress);
        let on_progress = move |p: SheetProgress| {
            let percent = p.percent.min(MAX_SHEET_PERCENT);
            let elapsed = started.elapsed().as_secs_f64();
            progress.set_progress(&id, percent);
            progress.set_elapsed(&id, elapsed);
            metrics::record_sheet(p.generated);
            let _ = events.send(ProgressEvent::progress(&id, percent));
            let _ = events.send(ProgressEvent::elapsed(&id, elapsed));
        };

        let output = self.builder.build(job, &on_progress, cancel).await?;
        logger.log_sheets(output.tiles.len(), output.plan.sheet_count, &output.skipped);

        let frame = match output.frame_size {
            Some(frame) if !output.tiles.is_empty() => frame,
            _ => return Err(MediaError::NoSheetsGenerated(job.job_name.clone()).into()),
        };

        let summary = self.manifest.write(job, &output.tiles, frame).await?;
        Ok((output.tiles.len(), output.skipped, summary.cue_count, summary.path))
    }

    async fn publish(&self, event: ProgressEvent) {
        if let Err(e) = self.publisher.publish(&event).await {
            debug!("Failed to publish {}: {}", event.type_str(), e);
        }
    }
}

async fn forward_events(
    publisher: Arc<dyn ProgressPublisher>,
    mut events: mpsc::UnboundedReceiver<ProgressEvent>,
) {
    while let Some(event) = events.recv().await {
        if let Err(e) = publisher.publish(&event).await {
            debug!("Failed to publish {}: {}", event.type_str(), e);
        }
    }
}

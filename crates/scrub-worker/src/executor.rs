//! Job executor.

use std::sync::Arc;
use std::time::Duration;

use scrub_models::ThumbnailJob;
use scrub_queue::{QueueError, TaskQueue};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::metrics;
use crate::pipeline::JobPipeline;

/// Long-running consumer of the task queue.
///
/// A permit is taken before each dequeue, so with one permit jobs run
/// strictly one after another and with more they start in queue order.
pub struct PipelineWorker {
    queue: Arc<TaskQueue>,
    pipeline: Arc<JobPipeline>,
    max_concurrent_jobs: usize,
    shutdown_timeout: Duration,
}

impl PipelineWorker {
    pub fn new(
        queue: Arc<TaskQueue>,
        pipeline: Arc<JobPipeline>,
        max_concurrent_jobs: usize,
        shutdown_timeout: Duration,
    ) -> Self {
        Self {
            queue,
            pipeline,
            max_concurrent_jobs: max_concurrent_jobs.max(1),
            shutdown_timeout,
        }
    }

    /// Consume jobs until `cancel` fires.
    ///
    /// Job failures are logged and never stop the loop. Cancellation also
    /// reaches running jobs, which kill their ffmpeg processes.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            "Starting pipeline worker with {} max concurrent jobs",
            self.max_concurrent_jobs
        );

        let permits = Arc::new(Semaphore::new(self.max_concurrent_jobs));
        let mut jobs = JoinSet::new();

        loop {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                permit = Arc::clone(&permits).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let job = match self.queue.dequeue(&cancel).await {
                Ok(job) => job,
                Err(QueueError::Cancelled) => break,
                Err(e) => {
                    error!("Failed to dequeue job: {}", e);
                    continue;
                }
            };

            let pipeline = Arc::clone(&self.pipeline);
            let cancel = cancel.clone();
            jobs.spawn(async move {
                let _permit = permit;
                execute_job(&pipeline, job, &cancel).await;
            });

            while let Some(result) = jobs.try_join_next() {
                log_join_error(result);
            }
        }

        info!("Shutdown signal received, waiting for in-flight jobs...");
        let drained = tokio::time::timeout(self.shutdown_timeout, async {
            while let Some(result) = jobs.join_next().await {
                log_join_error(result);
            }
        })
        .await;
        if drained.is_err() {
            warn!(
                "In-flight jobs did not finish within {:?}, aborting",
                self.shutdown_timeout
            );
            jobs.abort_all();
        }

        info!("Pipeline worker stopped");
    }
}

async fn execute_job(pipeline: &JobPipeline, job: ThumbnailJob, cancel: &CancellationToken) {
    let job_id = job.job_id.clone();
    info!("Executing job {}", job_id);

    match pipeline.run(&job, cancel).await {
        Ok(outcome) => {
            info!(
                "Job {} completed in {:.1}s ({} cues)",
                job_id, outcome.elapsed_secs, outcome.cues
            );
        }
        Err(e) if e.is_cancelled() => {
            info!("Job {} cancelled", job_id);
            metrics::record_job_failed("cancelled");
        }
        // The pipeline already logged the error with its job context.
        Err(_) => metrics::record_job_failed("error"),
    }
}

fn log_join_error(result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        if e.is_panic() {
            error!("Job task panicked: {}", e);
        }
    }
}

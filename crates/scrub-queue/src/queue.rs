//! Unbounded FIFO task queue.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use scrub_models::ThumbnailJob;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{QueueError, QueueResult};

/// Multi-producer queue of thumbnail jobs.
///
/// `enqueue` never waits; `dequeue` waits until a job is available or the
/// cancellation token fires. Jobs come out in the order they went in.
#[derive(Default)]
pub struct TaskQueue {
    items: Mutex<VecDeque<ThumbnailJob>>,
    notify: Notify,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn items(&self) -> MutexGuard<'_, VecDeque<ThumbnailJob>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a job to the back of the queue.
    pub fn enqueue(&self, job: ThumbnailJob) -> QueueResult<()> {
        job.validate().map_err(QueueError::InvalidJob)?;

        let depth = {
            let mut items = self.items();
            items.push_back(job);
            items.len()
        };
        debug!(depth, "Enqueued job");
        self.notify.notify_one();
        Ok(())
    }

    /// Take the job at the front of the queue, waiting for one if empty.
    pub async fn dequeue(&self, cancel: &CancellationToken) -> QueueResult<ThumbnailJob> {
        loop {
            if cancel.is_cancelled() {
                return Err(QueueError::Cancelled);
            }
            if let Some(job) = self.items().pop_front() {
                return Ok(job);
            }
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(QueueError::Cancelled),
                _ = self.notify.notified() => {}
            }
        }
    }

    /// Take the front job without waiting.
    pub fn try_dequeue(&self) -> Option<ThumbnailJob> {
        self.items().pop_front()
    }

    pub fn len(&self) -> usize {
        self.items().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }

    /// Snapshot of waiting jobs, front first.
    pub fn pending(&self) -> Vec<ThumbnailJob> {
        self.items().iter().cloned().collect()
    }
}

//! Per-job progress state shared between the worker and pollers.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use scrub_models::{JobId, ProgressRecord};

/// Thread-safe progress records keyed by job id.
///
/// Absent ids read as zero values. Setting progress to 100 clears the
/// processing flag in the same update.
pub trait ProgressStore: Send + Sync {
    /// Apply `f` to the record for `id` atomically.
    fn update(&self, id: &JobId, f: &mut dyn FnMut(&mut ProgressRecord));

    /// Current record, or the zero value.
    fn get(&self, id: &JobId) -> ProgressRecord;

    /// Every known record.
    fn snapshot(&self) -> Vec<(JobId, ProgressRecord)>;

    fn set_progress(&self, id: &JobId, percent: u8) {
        let percent = percent.min(100);
        self.update(id, &mut |r| {
            r.percent = percent;
            if percent >= 100 {
                r.is_processing = false;
            }
        });
    }

    fn get_progress(&self, id: &JobId) -> u8 {
        self.get(id).percent
    }

    /// Marking a completed record as processing restarts it at 0%.
    fn set_processing(&self, id: &JobId, processing: bool) {
        self.update(id, &mut |r| {
            r.is_processing = processing;
            if processing && r.percent >= 100 {
                r.percent = 0;
            }
        });
    }

    fn is_processing(&self, id: &JobId) -> bool {
        self.get(id).is_processing
    }

    fn set_elapsed(&self, id: &JobId, seconds: f64) {
        self.update(id, &mut |r| r.elapsed_seconds = seconds);
    }

    fn get_elapsed(&self, id: &JobId) -> f64 {
        self.get(id).elapsed_seconds
    }

    /// Reset `id` for a job that just started running.
    fn begin(&self, id: &JobId) {
        self.update(id, &mut |r| {
            *r = ProgressRecord {
                percent: 0,
                is_processing: true,
                elapsed_seconds: 0.0,
            }
        });
    }
}

/// [`ProgressStore`] held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryProgressStore {
    records: RwLock<HashMap<JobId, ProgressRecord>>,
}

impl InMemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressStore for InMemoryProgressStore {
    fn update(&self, id: &JobId, f: &mut dyn FnMut(&mut ProgressRecord)) {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        f(records.entry(id.clone()).or_default());
    }

    fn get(&self, id: &JobId) -> ProgressRecord {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .copied()
            .unwrap_or_default()
    }

    fn snapshot(&self) -> Vec<(JobId, ProgressRecord)> {
        let mut all: Vec<_> = self
            .records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, r)| (id.clone(), *r))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }
}

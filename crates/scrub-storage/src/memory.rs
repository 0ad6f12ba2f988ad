//! In-memory image store.
//!
//! Keeps uploaded images in a map. Used by tests and for local development
//! without R2 credentials.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use scrub_models::RemoteImageRef;
use tracing::debug;
use uuid::Uuid;

use crate::error::{StorageError, StorageResult};
use crate::image_store::{DeleteOutcome, ImageStore};

const URL_SCHEME: &str = "memory://";

#[derive(Default)]
struct State {
    objects: HashMap<String, Vec<u8>>,
    failing_deletes: HashSet<String>,
    fail_uploads: bool,
}

/// Image store holding objects in process memory.
#[derive(Default)]
pub struct MemoryImageStore {
    state: Mutex<State>,
}

impl MemoryImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    /// Make every following upload fail.
    pub fn fail_uploads(&self, fail: bool) {
        self.with_state(|s| s.fail_uploads = fail);
    }

    /// Make deletes of `id` fail.
    pub fn fail_delete_of(&self, id: impl Into<String>) {
        self.with_state(|s| {
            s.failing_deletes.insert(id.into());
        });
    }

    /// Ids currently stored, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.with_state(|s| s.objects.keys().cloned().collect());
        ids.sort();
        ids
    }

    pub fn contains(&self, id: &str) -> bool {
        self.with_state(|s| s.objects.contains_key(id))
    }

    pub fn len(&self) -> usize {
        self.with_state(|s| s.objects.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ImageStore for MemoryImageStore {
    async fn upload(&self, path: &Path) -> StorageResult<RemoteImageRef> {
        if self.with_state(|s| s.fail_uploads) {
            return Err(StorageError::upload_failed(format!(
                "upload of {} rejected",
                path.display()
            )));
        }

        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| StorageError::InvalidKey(path.display().to_string()))?;
        let id = format!("{}-{}", Uuid::new_v4().simple(), file_name);

        debug!("Storing {} bytes as {}", bytes.len(), id);
        self.with_state(|s| s.objects.insert(id.clone(), bytes));

        Ok(RemoteImageRef {
            url: format!("{}{}", URL_SCHEME, id),
            id,
        })
    }

    async fn delete(&self, id: &str) -> StorageResult<DeleteOutcome> {
        self.with_state(|s| {
            if s.failing_deletes.contains(id) {
                return Err(StorageError::delete_failed(format!("delete of {} rejected", id)));
            }
            Ok(match s.objects.remove(id) {
                Some(_) => DeleteOutcome::Deleted,
                None => DeleteOutcome::NotFound,
            })
        })
    }

    fn id_for_url(&self, url: &str) -> Option<String> {
        url.strip_prefix(URL_SCHEME)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
    }
}

//! Remote image store capability.

use std::path::Path;

use async_trait::async_trait;
use scrub_models::RemoteImageRef;

use crate::error::StorageResult;

/// Outcome of a successful delete call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

/// Store that hosts sheet images for clients.
///
/// Implementations must be safe to share between the worker and request
/// handlers.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Upload a local image; returns its public URL and store id.
    async fn upload(&self, path: &Path) -> StorageResult<RemoteImageRef>;

    /// Delete an image by id.
    async fn delete(&self, id: &str) -> StorageResult<DeleteOutcome>;

    /// Recover the store id from a URL this store handed out.
    ///
    /// Returns `None` for URLs the store does not own (local references).
    fn id_for_url(&self, url: &str) -> Option<String>;
}

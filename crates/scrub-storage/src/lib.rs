//! Storage for generated preview artifacts.
//!
//! This crate provides:
//! - The remote image store capability, backed by Cloudflare R2 or memory
//! - Gzip archiving of WebVTT manifests
//! - The asset repository: task-duration log and coordinated deletion

pub mod archive;
pub mod error;
pub mod image_store;
pub mod memory;
pub mod r2;
pub mod repository;

pub use archive::{compress_file, compress_manifest, decompress_manifest, read_manifest_archive};
pub use error::{StorageError, StorageResult};
pub use image_store::{DeleteOutcome, ImageStore};
pub use memory::MemoryImageStore;
pub use r2::{R2Config, R2ImageStore};
pub use repository::{
    Artifact, ArtifactOutcome, AssetLayout, AssetRepository, DeletionReport, DeletionStatus,
    StoredVideo, DURATION_LOG_FILE,
};

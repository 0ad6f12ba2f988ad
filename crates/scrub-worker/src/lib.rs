//! Thumbnail pipeline worker.
//!
//! This crate provides:
//! - Worker configuration from the environment
//! - The job pipeline: sheets, manifest, duration log, progress
//! - The queue consumer with single-flight or bounded concurrency
//! - The caller-facing service (enqueue, polling, catalog, deletion)
//! - Logging and metrics setup shared by the binaries

pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod runtime;
pub mod service;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::PipelineWorker;
pub use logging::{init_tracing, JobLogger};
pub use pipeline::{JobOutcome, JobPipeline};
pub use runtime::Runtime;
pub use service::ThumbnailService;

//! Component wiring.

use std::sync::Arc;

use scrub_media::{FfmpegTranscoder, SpriteSheetBuilder, Transcoder};
use scrub_queue::{
    InMemoryProgressStore, NoopPublisher, ProgressPublisher, ProgressStore, RedisProgressChannel,
    TaskQueue,
};
use scrub_storage::{AssetRepository, ImageStore, R2Config, R2ImageStore};
use tracing::info;

use crate::config::WorkerConfig;
use crate::error::WorkerResult;
use crate::executor::PipelineWorker;
use crate::pipeline::JobPipeline;
use crate::service::ThumbnailService;

/// Service facade and worker sharing one queue, store and repository.
pub struct Runtime {
    pub service: Arc<ThumbnailService>,
    pub worker: PipelineWorker,
    pub progress: Arc<dyn ProgressStore>,
    pub repository: Arc<AssetRepository>,
}

impl Runtime {
    /// Wire the components around the given collaborators.
    pub fn with_parts(
        config: &WorkerConfig,
        transcoder: Arc<dyn Transcoder>,
        image_store: Option<Arc<dyn ImageStore>>,
        publisher: Arc<dyn ProgressPublisher>,
    ) -> Self {
        let queue = Arc::new(TaskQueue::new());
        let progress: Arc<dyn ProgressStore> = Arc::new(InMemoryProgressStore::new());
        let repository = Arc::new(AssetRepository::new(config.layout.clone(), image_store.clone()));

        let builder = SpriteSheetBuilder::new(transcoder, image_store, config.sprite.clone());
        let pipeline = Arc::new(JobPipeline::new(
            builder,
            Arc::clone(&progress),
            publisher,
            Arc::clone(&repository),
        ));

        let worker = PipelineWorker::new(
            Arc::clone(&queue),
            pipeline,
            config.max_concurrent_jobs,
            config.shutdown_timeout,
        );
        let service = Arc::new(ThumbnailService::new(
            queue,
            Arc::clone(&progress),
            Arc::clone(&repository),
            config.interval_secs,
        ));

        Self {
            service,
            worker,
            progress,
            repository,
        }
    }

    /// Wire ffmpeg, optional R2 storage and optional Redis live updates
    /// from the environment-derived config.
    pub fn from_config(config: &WorkerConfig) -> WorkerResult<Self> {
        config.validate()?;

        let transcoder: Arc<dyn Transcoder> =
            Arc::new(FfmpegTranscoder::new().with_timeout(config.ffmpeg_timeout));

        let image_store: Option<Arc<dyn ImageStore>> = match R2Config::from_env_optional()? {
            Some(r2) => {
                info!("Uploading sheets to R2 bucket {}", r2.bucket_name);
                Some(Arc::new(R2ImageStore::new(r2)))
            }
            None => {
                info!("R2 not configured, serving sheets from {}", config.layout.previews_dir.display());
                None
            }
        };

        let publisher: Arc<dyn ProgressPublisher> = match &config.redis_url {
            Some(url) => Arc::new(RedisProgressChannel::new(url)?),
            None => Arc::new(NoopPublisher),
        };

        Ok(Self::with_parts(config, transcoder, image_store, publisher))
    }
}

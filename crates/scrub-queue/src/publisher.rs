//! Live progress updates.

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;
use redis::AsyncCommands;
use scrub_models::{JobId, ProgressEvent};
use tokio::sync::broadcast;
use tracing::debug;

use crate::error::QueueResult;

/// Pushes progress events to whoever is listening.
#[async_trait]
pub trait ProgressPublisher: Send + Sync {
    async fn publish(&self, event: &ProgressEvent) -> QueueResult<()>;
}

/// Publisher that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPublisher;

#[async_trait]
impl ProgressPublisher for NoopPublisher {
    async fn publish(&self, _event: &ProgressEvent) -> QueueResult<()> {
        Ok(())
    }
}

/// In-process fan-out over a tokio broadcast channel.
#[derive(Debug, Clone)]
pub struct BroadcastPublisher {
    sender: broadcast::Sender<ProgressEvent>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastPublisher {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl ProgressPublisher for BroadcastPublisher {
    async fn publish(&self, event: &ProgressEvent) -> QueueResult<()> {
        // No subscribers is not an error.
        let _ = self.sender.send(event.clone());
        Ok(())
    }
}

/// Redis pub/sub channel per job (`scrub:progress:<job_id>`).
pub struct RedisProgressChannel {
    client: redis::Client,
}

impl RedisProgressChannel {
    pub fn new(redis_url: &str) -> QueueResult<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self { client })
    }

    /// Get the channel name for a job.
    pub fn channel_name(job_id: &JobId) -> String {
        format!("scrub:progress:{}", job_id)
    }

    /// Subscribe to progress events for a job.
    pub async fn subscribe(
        &self,
        job_id: &JobId,
    ) -> QueueResult<Pin<Box<dyn Stream<Item = ProgressEvent> + Send>>> {
        use futures_util::StreamExt;

        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(Self::channel_name(job_id)).await?;

        let stream = pubsub.into_on_message().filter_map(|msg| async move {
            let payload: String = msg.get_payload().ok()?;
            serde_json::from_str(&payload).ok()
        });

        Ok(Box::pin(stream))
    }
}

#[async_trait]
impl ProgressPublisher for RedisProgressChannel {
    async fn publish(&self, event: &ProgressEvent) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let channel = Self::channel_name(event.job_id());
        let payload = serde_json::to_string(event)?;

        debug!("Publishing {} to {}", event.type_str(), channel);
        conn.publish::<_, _, ()>(channel, payload).await?;

        Ok(())
    }
}

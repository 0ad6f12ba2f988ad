//! Work queue and progress tracking.
//!
//! This crate provides:
//! - An unbounded FIFO queue of thumbnail jobs with cancellable dequeue
//! - The progress store polled by callers while jobs run
//! - Live progress publishers (Redis pub/sub and in-process broadcast)

pub mod error;
pub mod progress;
pub mod publisher;
pub mod queue;

pub use error::{QueueError, QueueResult};
pub use progress::{InMemoryProgressStore, ProgressStore};
pub use publisher::{BroadcastPublisher, NoopPublisher, ProgressPublisher, RedisProgressChannel};
pub use queue::TaskQueue;

//! Durable FIFO job queue.
//!
//! The [`Broker`] trait is the raw message channel (Redis list semantics:
//! push to the tail, blocking pop from the head). [`JobQueue`] binds a broker
//! to one named channel and handles the `ScanJob` wire format, including
//! discarding payloads that fail to decode.

mod memory;
mod redis_broker;

pub use memory::MemoryBroker;
pub use redis_broker::RedisBroker;

use crate::error::QueueResult;
use crate::models::ScanJob;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Default channel name for scan jobs.
pub const DEFAULT_CHANNEL: &str = "scan_jobs";

/// A multi-producer, multi-consumer FIFO message broker.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Append a payload to the tail of `channel`. Returns once accepted.
    async fn push(&self, channel: &str, payload: &str) -> QueueResult<()>;

    /// Pop from the head of `channel`, waiting up to `wait` for a message.
    ///
    /// Returns `None` if nothing arrived in time. Waiting happens inside the
    /// broker; callers never spin.
    async fn blocking_pop(&self, channel: &str, wait: Duration) -> QueueResult<Option<String>>;

    /// Number of messages currently waiting on `channel`.
    async fn len(&self, channel: &str) -> QueueResult<usize>;
}

/// A broker channel carrying serialized [`ScanJob`]s.
#[derive(Clone)]
pub struct JobQueue {
    broker: Arc<dyn Broker>,
    channel: String,
}

impl std::fmt::Debug for JobQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobQueue")
            .field("channel", &self.channel)
            .finish()
    }
}

impl JobQueue {
    pub fn new(broker: Arc<dyn Broker>, channel: impl Into<String>) -> Self {
        Self {
            broker,
            channel: channel.into(),
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Serialize and enqueue a job.
    pub async fn push(&self, job: &ScanJob) -> QueueResult<()> {
        let payload = serde_json::to_string(job)?;
        self.broker.push(&self.channel, &payload).await
    }

    /// Wait up to `wait` for the next well-formed job.
    ///
    /// Payloads that do not decode are logged and dropped; they are never
    /// requeued. The wait budget is shared across any dropped payloads.
    pub async fn pop(&self, wait: Duration) -> QueueResult<Option<ScanJob>> {
        let deadline = Instant::now() + wait;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let Some(payload) = self.broker.blocking_pop(&self.channel, remaining).await? else {
                return Ok(None);
            };

            match serde_json::from_str::<ScanJob>(&payload) {
                Ok(job) => {
                    debug!(scan_id = %job.scan_id, host = %job.host, "Popped job");
                    return Ok(Some(job));
                }
                Err(e) => {
                    warn!(channel = %self.channel, error = %e, payload = %payload, "Invalid job format, dropping");
                    if remaining.is_zero() {
                        return Ok(None);
                    }
                }
            }
        }
    }

    /// Number of jobs waiting.
    pub async fn len(&self) -> QueueResult<usize> {
        self.broker.len(&self.channel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Host, ScanId};

    fn job(host: &str) -> ScanJob {
        ScanJob::new(ScanId::from_bytes([3; 16]), Host::new_unchecked(host))
    }

    #[tokio::test]
    async fn test_push_pop_fifo() {
        let queue = JobQueue::new(Arc::new(MemoryBroker::new()), DEFAULT_CHANNEL);
        queue.push(&job("a")).await.unwrap();
        queue.push(&job("b")).await.unwrap();
        assert_eq!(queue.len().await.unwrap(), 2);

        let wait = Duration::from_millis(50);
        assert_eq!(queue.pop(wait).await.unwrap(), Some(job("a")));
        assert_eq!(queue.pop(wait).await.unwrap(), Some(job("b")));
        assert_eq!(queue.pop(wait).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_poison_messages_are_dropped() {
        let broker = Arc::new(MemoryBroker::new());
        let queue = JobQueue::new(broker.clone(), DEFAULT_CHANNEL);

        broker.push(DEFAULT_CHANNEL, "{not json").await.unwrap();
        broker.push(DEFAULT_CHANNEL, r#"{"scan_id":"nope","host":"a"}"#).await.unwrap();
        queue.push(&job("good")).await.unwrap();

        let popped = queue.pop(Duration::from_millis(50)).await.unwrap();
        assert_eq!(popped, Some(job("good")));
        assert_eq!(queue.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_channels_are_isolated() {
        let broker: Arc<dyn Broker> = Arc::new(MemoryBroker::new());
        let jobs = JobQueue::new(broker.clone(), "jobs");
        let other = JobQueue::new(broker, "other");

        jobs.push(&job("a")).await.unwrap();
        assert_eq!(other.pop(Duration::from_millis(10)).await.unwrap(), None);
        assert_eq!(jobs.len().await.unwrap(), 1);
    }
}

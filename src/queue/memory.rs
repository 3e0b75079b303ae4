//! In-process broker with Redis list semantics.

use super::Broker;
use crate::error::QueueResult;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

/// FIFO channels held in memory. Not durable across restarts.
#[derive(Default)]
pub struct MemoryBroker {
    channels: Mutex<HashMap<String, VecDeque<String>>>,
    arrivals: Notify,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    async fn try_pop(&self, channel: &str) -> Option<String> {
        self.channels
            .lock()
            .await
            .get_mut(channel)
            .and_then(VecDeque::pop_front)
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn push(&self, channel: &str, payload: &str) -> QueueResult<()> {
        self.channels
            .lock()
            .await
            .entry(channel.to_string())
            .or_default()
            .push_back(payload.to_string());
        self.arrivals.notify_waiters();
        Ok(())
    }

    async fn blocking_pop(&self, channel: &str, wait: Duration) -> QueueResult<Option<String>> {
        let deadline = Instant::now() + wait;

        loop {
            // Register interest before checking, so a push between the check
            // and the wait still wakes us.
            let arrived = self.arrivals.notified();
            tokio::pin!(arrived);
            arrived.as_mut().enable();

            if let Some(payload) = self.try_pop(channel).await {
                return Ok(Some(payload));
            }

            if tokio::time::timeout_at(deadline, arrived).await.is_err() {
                return Ok(None);
            }
        }
    }

    async fn len(&self, channel: &str) -> QueueResult<usize> {
        Ok(self
            .channels
            .lock()
            .await
            .get(channel)
            .map_or(0, VecDeque::len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_pop_times_out_when_empty() {
        let broker = MemoryBroker::new();
        let started = Instant::now();
        let popped = broker
            .blocking_pop("jobs", Duration::from_millis(30))
            .await
            .unwrap();
        assert_eq!(popped, None);
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[tokio::test]
    async fn test_pop_wakes_on_push() {
        let broker = Arc::new(MemoryBroker::new());
        let consumer = {
            let broker = Arc::clone(&broker);
            tokio::spawn(async move { broker.blocking_pop("jobs", Duration::from_secs(5)).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        broker.push("jobs", "payload").await.unwrap();

        let popped = consumer.await.unwrap().unwrap();
        assert_eq!(popped.as_deref(), Some("payload"));
    }

    #[tokio::test]
    async fn test_each_message_delivered_once() {
        let broker = Arc::new(MemoryBroker::new());
        let mut consumers = Vec::new();
        for _ in 0..4 {
            let broker = Arc::clone(&broker);
            consumers.push(tokio::spawn(async move {
                let mut seen = Vec::new();
                while let Some(p) = broker
                    .blocking_pop("jobs", Duration::from_millis(100))
                    .await
                    .unwrap()
                {
                    seen.push(p);
                }
                seen
            }));
        }

        for i in 0..50 {
            broker.push("jobs", &i.to_string()).await.unwrap();
        }

        let mut all = Vec::new();
        for consumer in consumers {
            all.extend(consumer.await.unwrap());
        }
        all.sort_by_key(|p| p.parse::<u32>().unwrap());
        assert_eq!(all, (0..50).map(|i| i.to_string()).collect::<Vec<_>>());
    }
}

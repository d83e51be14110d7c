//! In-memory broker used by processor tests.

use super::{Broker, BrokerError};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Default)]
pub struct MemoryBroker {
    queues: Mutex<HashMap<String, VecDeque<String>>>,
    markers: Mutex<HashMap<String, Instant>>,
    published: Mutex<Vec<(String, String)>>,
    pub fail_pushes: AtomicBool,
    pub fail_publishes: AtomicBool,
}

impl MemoryBroker {
    /// Everything currently waiting in `queue`, oldest first.
    pub fn queued(&self, queue: &str) -> Vec<String> {
        let queues = self.queues.lock().unwrap();
        queues
            .get(queue)
            .map(|q| q.iter().rev().cloned().collect())
            .unwrap_or_default()
    }

    pub fn published(&self) -> Vec<(String, String)> {
        self.published.lock().unwrap().clone()
    }

    pub fn has_mark(&self, key: &str) -> bool {
        let markers = self.markers.lock().unwrap();
        markers.get(key).is_some_and(|expiry| *expiry > Instant::now())
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn push(&self, queue: &str, payload: &str) -> Result<(), BrokerError> {
        if self.fail_pushes.load(Ordering::SeqCst) {
            return Err(BrokerError::Unavailable(queue.to_string()));
        }
        let mut queues = self.queues.lock().unwrap();
        queues
            .entry(queue.to_string())
            .or_default()
            .push_front(payload.to_string());
        Ok(())
    }

    async fn pop(&self, queue: &str) -> Result<Option<String>, BrokerError> {
        let mut queues = self.queues.lock().unwrap();
        Ok(queues.get_mut(queue).and_then(|q| q.pop_back()))
    }

    async fn queue_depth(&self, queue: &str) -> Result<u64, BrokerError> {
        let queues = self.queues.lock().unwrap();
        Ok(queues.get(queue).map_or(0, |q| q.len() as u64))
    }

    async fn mark_if_absent(&self, key: &str, ttl: Duration) -> Result<bool, BrokerError> {
        let now = Instant::now();
        let mut markers = self.markers.lock().unwrap();
        match markers.get(key) {
            Some(expiry) if *expiry > now => Ok(false),
            _ => {
                markers.insert(key.to_string(), now + ttl);
                Ok(true)
            }
        }
    }

    async fn clear_mark(&self, key: &str) -> Result<(), BrokerError> {
        self.markers.lock().unwrap().remove(key);
        Ok(())
    }

    async fn publish(&self, channel: &str, payload: &str) -> Result<u64, BrokerError> {
        if self.fail_publishes.load(Ordering::SeqCst) {
            return Err(BrokerError::Unavailable(channel.to_string()));
        }
        let mut published = self.published.lock().unwrap();
        published.push((channel.to_string(), payload.to_string()));
        Ok(1)
    }

    async fn subscriber_count(&self, _channel: &str) -> Result<u64, BrokerError> {
        Ok(1)
    }

    async fn ping(&self) -> Result<(), BrokerError> {
        Ok(())
    }
}

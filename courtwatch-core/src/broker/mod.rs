//! Message broker access.
//!
//! The broker carries three kinds of traffic:
//! - scraping task queues (scheduler -> external scraper)
//! - the availability channel and work queue (change detector -> coordinator)
//! - short-lived suppression markers for recently published slots
//!
//! [`RedisBroker`] is the production implementation.

#[cfg(test)]
pub mod memory;
mod redis_broker;

pub use redis_broker::{RedisBroker, mask_redis_url};

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrokerError {
    /// Redis error
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// The broker refused the operation (used by test doubles)
    #[error("broker unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait Broker: Send + Sync {
    /// Append a payload to a queue. Consumers pop from the other end.
    async fn push(&self, queue: &str, payload: &str) -> Result<(), BrokerError>;

    /// Pop the oldest payload, if there is one.
    async fn pop(&self, queue: &str) -> Result<Option<String>, BrokerError>;

    async fn queue_depth(&self, queue: &str) -> Result<u64, BrokerError>;

    /// Atomically create `key` with the given lifetime unless it exists.
    ///
    /// Returns `true` when this call created the marker.
    async fn mark_if_absent(&self, key: &str, ttl: Duration) -> Result<bool, BrokerError>;

    async fn clear_mark(&self, key: &str) -> Result<(), BrokerError>;

    /// Publish on a pub/sub channel, returning the number of receivers.
    async fn publish(&self, channel: &str, payload: &str) -> Result<u64, BrokerError>;

    async fn subscriber_count(&self, channel: &str) -> Result<u64, BrokerError>;

    async fn ping(&self) -> Result<(), BrokerError>;
}

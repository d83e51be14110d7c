//! HealthMonitor processor.
//!
//! Periodically pings the broker and the store, reads queue depths and the
//! availability channel's subscriber count, and publishes the result on a
//! watch channel. It never mutates application state.

use crate::broker::Broker;
use crate::config::HealthConfig;
use crate::store::StoreHealth;
use courtwatch_sdk::formats;
use serde::Serialize;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueDepth {
    pub queue: String,
    pub depth: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    #[serde(with = "formats::rfc3339")]
    pub checked_at: OffsetDateTime,
    pub broker_ok: bool,
    pub store_ok: bool,
    pub queues: Vec<QueueDepth>,
    pub subscribers: Option<u64>,
    pub errors: Vec<String>,
}

impl HealthReport {
    pub fn healthy(&self) -> bool {
        self.broker_ok && self.store_ok
    }
}

pub type HealthReceiver = watch::Receiver<Option<HealthReport>>;

pub struct HealthMonitor<S, B> {
    store: Arc<S>,
    broker: Arc<B>,
    config: HealthConfig,
    report_tx: watch::Sender<Option<HealthReport>>,
}

impl<S: StoreHealth, B: Broker> HealthMonitor<S, B> {
    /// Create the monitor and the receiver its reports are published on.
    pub fn new(store: Arc<S>, broker: Arc<B>, config: HealthConfig) -> (Self, HealthReceiver) {
        let (report_tx, report_rx) = watch::channel(None);
        (
            Self {
                store,
                broker,
                config,
                report_tx,
            },
            report_rx,
        )
    }

    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(every_secs = self.config.every.as_secs(), "HealthMonitor started");
        let mut ticker = tokio::time::interval(self.config.every);

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("HealthMonitor received shutdown signal");
                        break;
                    }
                }

                _ = ticker.tick() => {
                    let report = self.check().await;
                    if report.healthy() {
                        info!(queues = ?report.queues, subscribers = ?report.subscribers, "Health check passed");
                    } else {
                        warn!(errors = ?report.errors, "Health check failed");
                    }
                    self.report_tx.send_replace(Some(report));
                }
            }
        }

        info!("HealthMonitor shutdown complete");
    }

    /// Probe everything once.
    pub async fn check(&self) -> HealthReport {
        let mut errors = Vec::new();

        let broker_ok = match self.broker.ping().await {
            Ok(()) => true,
            Err(e) => {
                errors.push(format!("broker: {e}"));
                false
            }
        };
        let store_ok = match self.store.ping().await {
            Ok(()) => true,
            Err(e) => {
                errors.push(format!("store: {e}"));
                false
            }
        };

        let mut queues = Vec::with_capacity(self.config.queues.len());
        let mut subscribers = None;
        if broker_ok {
            for queue in &self.config.queues {
                match self.broker.queue_depth(queue).await {
                    Ok(depth) => queues.push(QueueDepth {
                        queue: queue.clone(),
                        depth,
                    }),
                    Err(e) => errors.push(format!("queue {queue}: {e}")),
                }
            }
            match self.broker.subscriber_count(&self.config.channel).await {
                Ok(count) => subscribers = Some(count),
                Err(e) => errors.push(format!("channel {}: {e}", self.config.channel)),
            }
        }

        HealthReport {
            checked_at: OffsetDateTime::now_utc(),
            broker_ok,
            store_ok,
            queues,
            subscribers,
            errors,
        }
    }
}

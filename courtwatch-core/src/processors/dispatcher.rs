//! NotificationDispatcher processor.
//!
//! The NotificationDispatcher is responsible for:
//! - Receiving `BatchReady` events from the flush timers
//! - Rendering one consolidated message per batch
//! - Handing it to the notifier
//! - Writing one history record per delivered slot
//!
//! Delivery is at most once: a notifier failure drops the batch, and a
//! history write failure is logged without sending again.

use crate::entities::notification_history::NotificationInsert;
use crate::events::{BatchReady, BatchReadyReceiver};
use crate::history::DedupHistory;
use crate::notifier::{Notifier, NotifierError, OutgoingMessage, render_batch};
use crate::store::{HistoryStore, StoreError};
use courtwatch_sdk::objects::AvailabilityEvent;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum DispatchError {
    /// The notifier failed; the batch is dropped
    #[error("notifier error: {0}")]
    Notifier(#[from] NotifierError),

    /// The message went out but history could not be written
    #[error("history write failed after delivery: {0}")]
    History(#[from] StoreError),
}

pub struct NotificationDispatcher<H> {
    history: DedupHistory<H>,
    notifier: Arc<dyn Notifier>,
}

impl<H: HistoryStore> NotificationDispatcher<H> {
    pub fn new(history: DedupHistory<H>, notifier: Arc<dyn Notifier>) -> Self {
        Self { history, notifier }
    }

    /// Run the NotificationDispatcher.
    ///
    /// After the shutdown signal, batches still arriving (the coordinator
    /// flushes its pending ones) are delivered for at most `grace`.
    pub async fn run(
        self,
        mut shutdown_rx: watch::Receiver<bool>,
        mut batch_rx: BatchReadyReceiver,
        grace: Duration,
    ) {
        info!("NotificationDispatcher started");

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("NotificationDispatcher received shutdown signal");
                        break;
                    }
                }

                Some(batch) = batch_rx.recv() => {
                    self.deliver(batch).await;
                }

                else => {
                    info!("BatchReady channel closed");
                    break;
                }
            }
        }

        let drain = async {
            while let Some(batch) = batch_rx.recv().await {
                self.deliver(batch).await;
            }
        };
        if tokio::time::timeout(grace, drain).await.is_err() {
            warn!(
                grace_secs = grace.as_secs(),
                "Grace period elapsed, abandoning undelivered batches"
            );
        }

        info!("NotificationDispatcher shutdown complete");
    }

    /// Run-loop delivery. `dispatch` already logged the failure; the batch
    /// is not retried.
    async fn deliver(&self, batch: BatchReady) {
        match self.dispatch(batch).await {
            Ok(sent) => debug!(sent, "Batch delivered"),
            Err(DispatchError::Notifier(_)) => debug!("Batch dropped after notifier failure"),
            Err(DispatchError::History(_)) => debug!("Batch delivered without history"),
        }
    }

    /// Deliver one batch and record it. Errors are logged here.
    pub async fn dispatch(&self, batch: BatchReady) -> Result<usize, DispatchError> {
        let BatchReady { recipient, matches } = batch;
        if matches.is_empty() {
            return Ok(0);
        }

        let slot_ids: Vec<String> = matches.iter().map(|m| m.slot_id()).collect();
        let events: Vec<AvailabilityEvent> = matches.iter().map(|m| m.event.clone()).collect();
        let message = OutgoingMessage::new(recipient.as_str(), render_batch(&events), events.len());

        if let Err(e) = self.notifier.send(&message).await {
            error!(
                recipient = %recipient,
                slot_ids = ?slot_ids,
                error = %e,
                "Notification failed, dropping batch"
            );
            return Err(e.into());
        }
        info!(
            recipient = %recipient,
            slots = slot_ids.len(),
            "Notification sent"
        );

        let sent_at = time::OffsetDateTime::now_utc();
        let records = matches
            .iter()
            .map(|m| NotificationInsert::for_event(m.user_id, &recipient, &m.event, sent_at))
            .collect();
        match self.history.record(records).await {
            Ok(written) => {
                debug!(recipient = %recipient, written, "Notification history recorded");
                Ok(slot_ids.len())
            }
            Err(e) => {
                error!(
                    recipient = %recipient,
                    slot_ids = ?slot_ids,
                    error = %e,
                    "Failed to record notification history, not resending"
                );
                Err(e.into())
            }
        }
    }
}

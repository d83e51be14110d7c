//! ChangeDetector processor.
//!
//! The ChangeDetector is responsible for:
//! - Receiving `ScrapeLogObserved` events from the live listener and the poller
//! - Re-reading the scrape log and turning each available slot into an
//!   `AvailabilityEvent`
//! - Suppressing slots seen unchanged within the suppression horizon
//! - Publishing the rest to the availability channel and the work queue
//!
//! Both sources write through the same [`SlotPublisher`], whose marker is set
//! atomically, so a log reported by both paths is published once.

use crate::broker::{Broker, BrokerError};
use crate::config::DetectorConfig;
use crate::entities::scrape_logs::ScrapeLog;
use crate::events::{ScrapeLogObserved, ScrapeLogObservedReceiver};
use crate::store::{ScrapeLogStore, StoreError};
use crate::utils::slot_key::{court_id, suppression_key};
use courtwatch_sdk::formats::{self, FormatError};
use courtwatch_sdk::objects::{AvailabilityEvent, EventError, SlotObservation};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("broker error: {0}")]
    Broker(#[from] BrokerError),

    #[error("event serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Why one slot observation was dropped.
#[derive(Debug, Error)]
pub enum ObservationError {
    #[error("undecodable slot: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("bad slot time: {0}")]
    Format(#[from] FormatError),

    #[error("invalid slot: {0}")]
    Invalid(#[from] EventError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Published { receivers: u64 },
    /// An unchanged sighting within the suppression horizon.
    Suppressed,
}

/// The single deduplicating sink for availability events.
pub struct SlotPublisher<B> {
    broker: Arc<B>,
    channel: String,
    work_queue: String,
    suppression_ttl: Duration,
}

impl<B> Clone for SlotPublisher<B> {
    fn clone(&self) -> Self {
        Self {
            broker: Arc::clone(&self.broker),
            channel: self.channel.clone(),
            work_queue: self.work_queue.clone(),
            suppression_ttl: self.suppression_ttl,
        }
    }
}

impl<B: Broker> SlotPublisher<B> {
    pub fn new(broker: Arc<B>, config: &DetectorConfig) -> Self {
        Self {
            broker,
            channel: config.channel.clone(),
            work_queue: config.work_queue.clone(),
            suppression_ttl: config.suppression_ttl,
        }
    }

    /// Publish `event` unless an unchanged sighting was published recently.
    ///
    /// The marker is cleared again when publishing fails, so the next
    /// sighting can retry.
    pub async fn publish(&self, event: &AvailabilityEvent) -> Result<PublishOutcome, DetectorError> {
        let payload = serde_json::to_string(event)?;
        let key = suppression_key(event);
        if !self.broker.mark_if_absent(&key, self.suppression_ttl).await? {
            return Ok(PublishOutcome::Suppressed);
        }

        match self.send(&payload).await {
            Ok(receivers) => Ok(PublishOutcome::Published { receivers }),
            Err(e) => {
                if let Err(clear_err) = self.broker.clear_mark(&key).await {
                    warn!(key = %key, error = %clear_err, "Failed to clear suppression marker");
                }
                Err(e.into())
            }
        }
    }

    /// Queue first: a pub/sub announcement is never made for an event the
    /// coordinator did not receive.
    async fn send(&self, payload: &str) -> Result<u64, BrokerError> {
        self.broker.push(&self.work_queue, payload).await?;
        self.broker.publish(&self.channel, payload).await
    }
}

/// Build the event for one observation, or `None` when the slot is taken.
pub fn event_from_observation(
    log: &ScrapeLog,
    slot: &SlotObservation,
    discovered_at: OffsetDateTime,
) -> Result<Option<AvailabilityEvent>, ObservationError> {
    if !slot.available {
        return Ok(None);
    }
    let event = AvailabilityEvent {
        venue_id: log.venue_id.clone(),
        venue_name: log.venue_name.clone(),
        court_id: court_id(&slot.court_name),
        court_name: slot.court_name.clone(),
        date: formats::parse_date(&slot.date)?,
        start_time: formats::parse_hhmm(&slot.start_time)?,
        end_time: formats::parse_hhmm(&slot.end_time)?,
        price: slot.price,
        currency: slot.currency.clone(),
        booking_url: slot.booking_url.clone(),
        discovered_at,
        scrape_log_id: Some(log.id),
    };
    event.validate()?;
    Ok(Some(event))
}

/// Counts from processing one scrape log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DetectionSummary {
    pub published: usize,
    pub suppressed: usize,
    pub unavailable: usize,
    pub dropped: usize,
}

pub struct ChangeDetector<S, B> {
    store: Arc<S>,
    publisher: SlotPublisher<B>,
}

impl<S: ScrapeLogStore, B: Broker> ChangeDetector<S, B> {
    pub fn new(store: Arc<S>, publisher: SlotPublisher<B>) -> Self {
        Self { store, publisher }
    }

    pub async fn run(
        self,
        mut shutdown_rx: watch::Receiver<bool>,
        mut observed_rx: ScrapeLogObservedReceiver,
    ) {
        info!("ChangeDetector started");

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("ChangeDetector received shutdown signal");
                        break;
                    }
                }

                Some(observed) = observed_rx.recv() => {
                    match self.process(observed).await {
                        Ok(summary) => debug!(
                            scrape_log_id = observed.scrape_log_id,
                            source = %observed.source,
                            published = summary.published,
                            suppressed = summary.suppressed,
                            dropped = summary.dropped,
                            "Scrape log processed"
                        ),
                        // The poller picks the log up again if it was missed.
                        Err(e) => error!(
                            scrape_log_id = observed.scrape_log_id,
                            source = %observed.source,
                            error = %e,
                            "Failed to process scrape log"
                        ),
                    }
                }

                else => {
                    info!("ScrapeLogObserved channel closed");
                    break;
                }
            }
        }

        info!("ChangeDetector shutdown complete");
    }

    /// Turn one scrape log into published availability events.
    ///
    /// Safe to call repeatedly for the same log.
    pub async fn process(&self, observed: ScrapeLogObserved) -> Result<DetectionSummary, DetectorError> {
        let mut summary = DetectionSummary::default();
        let Some(log) = self.store.scrape_log(observed.scrape_log_id).await? else {
            warn!(scrape_log_id = observed.scrape_log_id, "Scrape log not found");
            return Ok(summary);
        };
        if !log.has_slots() {
            return Ok(summary);
        }

        for (index, slot) in log.observations().enumerate() {
            let event = match slot
                .map_err(ObservationError::from)
                .and_then(|slot| event_from_observation(&log, &slot, log.scraped_at))
            {
                Ok(Some(event)) => event,
                Ok(None) => {
                    summary.unavailable += 1;
                    continue;
                }
                Err(e) => {
                    warn!(
                        scrape_log_id = log.id,
                        venue_id = %log.venue_id,
                        index,
                        error = %e,
                        "Dropping slot observation"
                    );
                    summary.dropped += 1;
                    continue;
                }
            };

            match self.publisher.publish(&event).await {
                Ok(PublishOutcome::Published { receivers }) => {
                    info!(
                        venue_id = %event.venue_id,
                        slot_id = %event.slot_id(),
                        receivers,
                        "Availability event published"
                    );
                    summary.published += 1;
                }
                Ok(PublishOutcome::Suppressed) => {
                    debug!(slot_id = %event.slot_id(), "Slot seen recently, suppressed");
                    summary.suppressed += 1;
                }
                // Other slots may still go through.
                Err(e) => {
                    error!(
                        venue_id = %event.venue_id,
                        slot_id = %event.slot_id(),
                        error = %e,
                        "Failed to publish availability event"
                    );
                    summary.dropped += 1;
                }
            }
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::memory::MemoryBroker;
    use crate::events::ObservationSource;
    use crate::store::memory::MemoryStore;
    use crate::testing::{VICTORIA_PARK_SLOT, friday_noon, victoria_park_event, victoria_park_log};
    use std::sync::atomic::Ordering;

    fn detector(logs: Vec<ScrapeLog>) -> (ChangeDetector<MemoryStore, MemoryBroker>, Arc<MemoryBroker>) {
        let store = MemoryStore::default();
        *store.scrape_logs.lock().unwrap() = logs;
        let broker = Arc::new(MemoryBroker::default());
        let publisher = SlotPublisher::new(broker.clone(), &DetectorConfig::default());
        (ChangeDetector::new(Arc::new(store), publisher), broker)
    }

    fn observed(id: i64, source: ObservationSource) -> ScrapeLogObserved {
        ScrapeLogObserved {
            scrape_log_id: id,
            source,
        }
    }

    #[tokio::test]
    async fn test_available_slots_become_events() {
        let (detector, broker) = detector(vec![victoria_park_log(1, friday_noon())]);
        let summary = detector.process(observed(1, ObservationSource::Live)).await.unwrap();

        assert_eq!(
            summary,
            DetectionSummary {
                published: 1,
                suppressed: 0,
                unavailable: 1,
                dropped: 0
            }
        );
        let published = broker.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, "court:availability");
        let event: AvailabilityEvent = serde_json::from_str(&published[0].1).unwrap();
        assert_eq!(event.slot_id(), VICTORIA_PARK_SLOT);
        assert_eq!(event.scrape_log_id, Some(1));
        assert_eq!(broker.queued("court_slots"), vec![published[0].1.clone()]);
    }

    #[tokio::test]
    async fn test_events_are_stamped_with_scrape_time() {
        let scraped_at = friday_noon() - time::Duration::minutes(7);
        let (detector, broker) = detector(vec![victoria_park_log(1, scraped_at)]);
        detector.process(observed(1, ObservationSource::Poll)).await.unwrap();

        let event: AvailabilityEvent = serde_json::from_str(&broker.queued("court_slots")[0]).unwrap();
        assert_eq!(event.discovered_at, scraped_at);
    }

    #[tokio::test]
    async fn test_queue_failure_announces_nothing() {
        let broker = Arc::new(MemoryBroker::default());
        let publisher = SlotPublisher::new(broker.clone(), &DetectorConfig::default());
        let event = victoria_park_event();

        broker.fail_pushes.store(true, Ordering::SeqCst);
        assert!(publisher.publish(&event).await.is_err());
        assert!(broker.published().is_empty());
        assert!(!broker.has_mark(&suppression_key(&event)));
    }

    #[tokio::test]
    async fn test_same_log_from_both_paths_publishes_once() {
        let (detector, broker) = detector(vec![victoria_park_log(1, friday_noon())]);
        detector.process(observed(1, ObservationSource::Live)).await.unwrap();
        let again = detector.process(observed(1, ObservationSource::Poll)).await.unwrap();

        assert_eq!(again.published, 0);
        assert_eq!(again.suppressed, 1);
        assert_eq!(broker.published().len(), 1);
        assert_eq!(broker.queued("court_slots").len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_observation_dropped_rest_kept() {
        let mut log = victoria_park_log(1, friday_noon());
        log.slots.0.insert(0, serde_json::json!({"date": "soon", "available": true}));
        log.slots.0.insert(
            1,
            serde_json::json!({
                "date": "2024-06-01", "startTime": "25:00", "endTime": "26:00",
                "courtName": "Court 9", "price": "1", "available": true
            }),
        );
        let (detector, broker) = detector(vec![log]);

        let summary = detector.process(observed(1, ObservationSource::Poll)).await.unwrap();
        assert_eq!(summary.dropped, 2);
        assert_eq!(summary.published, 1);
        assert_eq!(broker.published().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_scrape_and_missing_log_are_ignored() {
        let mut log = victoria_park_log(1, friday_noon());
        log.success = false;
        let (detector, broker) = detector(vec![log]);

        assert_eq!(
            detector.process(observed(1, ObservationSource::Live)).await.unwrap(),
            DetectionSummary::default()
        );
        assert_eq!(
            detector.process(observed(42, ObservationSource::Live)).await.unwrap(),
            DetectionSummary::default()
        );
        assert!(broker.published().is_empty());
    }

    #[tokio::test]
    async fn test_publish_failure_clears_marker() {
        let broker = Arc::new(MemoryBroker::default());
        let publisher = SlotPublisher::new(broker.clone(), &DetectorConfig::default());
        let event = victoria_park_event();

        broker.fail_publishes.store(true, Ordering::SeqCst);
        assert!(publisher.publish(&event).await.is_err());
        assert!(!broker.has_mark(&suppression_key(&event)));

        broker.fail_publishes.store(false, Ordering::SeqCst);
        assert_eq!(
            publisher.publish(&event).await.unwrap(),
            PublishOutcome::Published { receivers: 1 }
        );
        assert!(broker.has_mark(&suppression_key(&event)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_marker_expires_after_horizon() {
        let broker = Arc::new(MemoryBroker::default());
        let publisher = SlotPublisher::new(broker.clone(), &DetectorConfig::default());
        let event = victoria_park_event();

        assert!(matches!(publisher.publish(&event).await.unwrap(), PublishOutcome::Published { .. }));
        tokio::time::advance(Duration::from_secs(29 * 60)).await;
        assert_eq!(publisher.publish(&event).await.unwrap(), PublishOutcome::Suppressed);
        tokio::time::advance(Duration::from_secs(2 * 60)).await;
        assert!(matches!(publisher.publish(&event).await.unwrap(), PublishOutcome::Published { .. }));
    }
}

//! Detector -> broker -> coordinator -> dispatcher, over in-memory seams.

use super::*;
use crate::broker::Broker;
use crate::broker::memory::MemoryBroker;
use crate::config::{CoordinatorConfig, DetectorConfig};
use crate::events::{ObservationSource, ScrapeLogObserved, batch_ready_channel};
use crate::history::DedupHistory;
use crate::notifier::memory::RecordingNotifier;
use crate::store::memory::MemoryStore;
use crate::testing::{
    PLAYER_ADDRESS, VICTORIA_PARK_SLOT, friday_noon, player_id, player_row, victoria_park_log,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

struct Pipeline {
    store: Arc<MemoryStore>,
    broker: Arc<MemoryBroker>,
    notifier: Arc<RecordingNotifier>,
}

impl Pipeline {
    fn new(max_price: &str) -> Self {
        let store = MemoryStore::default();
        *store.scrape_logs.lock().unwrap() = vec![victoria_park_log(1, friday_noon())];
        *store.users.lock().unwrap() = vec![player_row(max_price)];
        Self {
            store: Arc::new(store),
            broker: Arc::new(MemoryBroker::default()),
            notifier: Arc::new(RecordingNotifier::default()),
        }
    }

    /// Detect the scrape log, then drain the work queue through the
    /// coordinator and dispatch whatever batches close.
    async fn run(&self) -> usize {
        let publisher = SlotPublisher::new(self.broker.clone(), &DetectorConfig::default());
        let detector = ChangeDetector::new(self.store.clone(), publisher);
        let summary = detector
            .process(ScrapeLogObserved {
                scrape_log_id: 1,
                source: ObservationSource::Live,
            })
            .await
            .unwrap();

        let (batch_tx, mut batch_rx) = batch_ready_channel();
        let mut coordinator = NotificationCoordinator::new(
            self.store.clone(),
            self.broker.clone(),
            CoordinatorConfig::default(),
            batch_tx,
        );
        coordinator.refresh_roster().await;
        while let Some(payload) = self.broker.pop("court_slots").await.unwrap() {
            coordinator.handle_payload(&payload, friday_noon()).await.unwrap();
        }

        let dispatcher = NotificationDispatcher::new(
            DedupHistory::new(self.store.clone(), time::Duration::hours(24)),
            self.notifier.clone(),
        );
        drop(coordinator);
        let started = Instant::now();
        while let Some(batch) = batch_rx.recv().await {
            assert!(Instant::now() - started <= Duration::from_secs(10));
            dispatcher.dispatch(batch).await.unwrap();
        }
        summary.published
    }
}

#[tokio::test(start_paused = true)]
async fn test_victoria_park_end_to_end() {
    let pipeline = Pipeline::new("15.00");
    assert_eq!(pipeline.run().await, 1);

    let sent = pipeline.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].recipient, PLAYER_ADDRESS);
    assert!(sent[0].body.contains("Victoria Park Court 1 09:00-10:00"));

    let history = pipeline.store.history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].user_id, player_id());
    assert_eq!(history[0].slot_id, VICTORIA_PARK_SLOT);
}

#[tokio::test(start_paused = true)]
async fn test_price_above_ceiling_end_to_end() {
    let pipeline = Pipeline::new("10.00");
    assert_eq!(pipeline.run().await, 1);

    assert!(pipeline.notifier.sent().is_empty());
    assert!(pipeline.store.history().is_empty());
}

//! Scheduler processor.
//!
//! The Scheduler is responsible for:
//! - Waking up on each tier's cadence (tiers run independently and may overlap)
//! - Listing active venues and keeping those in the tier's interval band
//! - Enqueuing a scraping task for every venue that is due
//! - Stamping `last_scraped_at` once the task is on the queue
//!
//! Enqueuing is fire-and-forget: the scheduler never waits for the scraper.

use crate::broker::{Broker, BrokerError};
use crate::config::{ScheduleTier, SchedulerConfig};
use crate::entities::venues::Venue;
use crate::store::{StoreError, VenueStore};
use courtwatch_sdk::objects::ScrapingTask;
use std::sync::Arc;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("broker error: {0}")]
    Broker(#[from] BrokerError),

    #[error("task serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Whether a venue with the given interval should be scraped again at `now`.
///
/// A venue that was never scraped is always due.
pub fn due_for_scrape(
    last_scraped_at: Option<OffsetDateTime>,
    interval_minutes: i32,
    now: OffsetDateTime,
) -> bool {
    match last_scraped_at {
        None => true,
        Some(last) => now - last >= time::Duration::minutes(i64::from(interval_minutes)),
    }
}

/// Counts from one pass of a tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TierPass {
    pub enqueued: usize,
    pub not_due: usize,
    pub failed: usize,
}

pub struct Scheduler<S, B> {
    store: Arc<S>,
    broker: Arc<B>,
    config: SchedulerConfig,
}

impl<S, B> Scheduler<S, B>
where
    S: VenueStore + 'static,
    B: Broker + 'static,
{
    pub fn new(store: Arc<S>, broker: Arc<B>, config: SchedulerConfig) -> Self {
        Self {
            store,
            broker,
            config,
        }
    }

    /// Run every tier until shutdown is signaled.
    pub async fn run(self, shutdown_rx: watch::Receiver<bool>) {
        info!(tiers = self.config.tiers.len(), "Scheduler started");

        let scheduler = Arc::new(self);
        let handles: Vec<_> = scheduler
            .config
            .tiers
            .iter()
            .cloned()
            .map(|tier| {
                let scheduler = Arc::clone(&scheduler);
                let shutdown_rx = shutdown_rx.clone();
                tokio::spawn(async move { scheduler.tier_loop(tier, shutdown_rx).await })
            })
            .collect();

        for handle in handles {
            let _ = handle.await;
        }

        info!("Scheduler shutdown complete");
    }

    async fn tier_loop(&self, tier: ScheduleTier, mut shutdown_rx: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(tier.every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        debug!(tier = %tier.name, every_secs = tier.every.as_secs(), "Tier loop started");

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!(tier = %tier.name, "Scheduler tier received shutdown signal");
                        break;
                    }
                }

                _ = ticker.tick() => {
                    match self.run_tier(&tier, OffsetDateTime::now_utc()).await {
                        Ok(pass) => info!(
                            tier = %tier.name,
                            enqueued = pass.enqueued,
                            not_due = pass.not_due,
                            failed = pass.failed,
                            "Scheduler tier pass complete"
                        ),
                        // Retried on the next tick.
                        Err(e) => error!(tier = %tier.name, error = %e, "Scheduler tier pass failed"),
                    }
                }
            }
        }
    }

    /// One pass of a tier over the active venues.
    ///
    /// Only listing the venues can fail the pass; a failure for one venue is
    /// logged and counted.
    pub async fn run_tier(
        &self,
        tier: &ScheduleTier,
        now: OffsetDateTime,
    ) -> Result<TierPass, SchedulerError> {
        let venues = self.store.active_venues().await?;
        let mut pass = TierPass::default();

        for venue in &venues {
            let interval = venue.effective_interval_minutes(self.config.default_interval_minutes);
            if !tier.covers(interval) {
                continue;
            }
            if !due_for_scrape(venue.last_scraped_at, interval, now) {
                pass.not_due += 1;
                continue;
            }

            match self.enqueue(venue, tier, now).await {
                Ok(task_id) => {
                    debug!(venue_id = %venue.id, tier = %tier.name, %task_id, "Scraping task enqueued");
                    pass.enqueued += 1;
                }
                Err(e) => {
                    warn!(venue_id = %venue.id, tier = %tier.name, error = %e, "Failed to enqueue scraping task");
                    pass.failed += 1;
                }
            }
        }

        Ok(pass)
    }

    async fn enqueue(
        &self,
        venue: &Venue,
        tier: &ScheduleTier,
        now: OffsetDateTime,
    ) -> Result<String, SchedulerError> {
        let task = build_task(venue, tier, now);
        let payload = serde_json::to_string(&task)?;
        let queue = task.priority.queue_name(&self.config.queue_name);
        self.broker.push(&queue, &payload).await?;
        self.store.mark_enqueued(&venue.id, now).await?;
        Ok(task.task_id)
    }
}

/// Scraping task for `venue`, targeting the day after `now`.
pub fn build_task(venue: &Venue, tier: &ScheduleTier, now: OffsetDateTime) -> ScrapingTask {
    ScrapingTask {
        venue_id: venue.id.clone(),
        venue_name: venue.name.clone(),
        venue_url: venue.url.clone(),
        provider: venue.provider.clone(),
        task_id: Uuid::now_v7().to_string(),
        queued_at: now,
        priority: tier.priority,
        target_date: (now + time::Duration::days(1)).date(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::memory::MemoryBroker;
    use crate::store::memory::MemoryStore;
    use crate::testing::{friday_noon, venue};
    use courtwatch_sdk::objects::TaskPriority;
    use std::sync::atomic::Ordering;

    fn scheduler(
        venues: Vec<Venue>,
    ) -> (Scheduler<MemoryStore, MemoryBroker>, Arc<MemoryStore>, Arc<MemoryBroker>) {
        let store = Arc::new(MemoryStore::default());
        *store.venues.lock().unwrap() = venues;
        let broker = Arc::new(MemoryBroker::default());
        let scheduler = Scheduler::new(store.clone(), broker.clone(), SchedulerConfig::default());
        (scheduler, store, broker)
    }

    #[test]
    fn test_due_for_scrape() {
        let now = friday_noon();
        assert!(due_for_scrape(None, 30, now));
        assert!(due_for_scrape(Some(now - time::Duration::minutes(31)), 30, now));
        assert!(due_for_scrape(Some(now - time::Duration::minutes(30)), 30, now));
        assert!(!due_for_scrape(Some(now - time::Duration::minutes(10)), 30, now));
    }

    #[tokio::test]
    async fn test_due_venue_is_enqueued_and_stamped() {
        let now = friday_noon();
        let (scheduler, store, broker) = scheduler(vec![
            venue("Stale", 30, Some(now - time::Duration::minutes(31))),
            venue("Fresh", 30, Some(now - time::Duration::minutes(10))),
        ]);
        let regular = SchedulerConfig::default().tiers[0].clone();

        let pass = scheduler.run_tier(&regular, now).await.unwrap();
        assert_eq!(pass, TierPass { enqueued: 1, not_due: 1, failed: 0 });

        let queued = broker.queued("scraping_tasks");
        assert_eq!(queued.len(), 1);
        let task: ScrapingTask = serde_json::from_str(&queued[0]).unwrap();
        assert_eq!(task.venue_id, "Stale");
        assert_eq!(task.priority, TaskPriority::Normal);
        assert_eq!(task.target_date, (now + time::Duration::days(1)).date());

        let venues = store.venues.lock().unwrap();
        assert_eq!(venues[0].last_scraped_at, Some(now));
        // Not due: no write.
        assert_eq!(venues[1].last_scraped_at, Some(now - time::Duration::minutes(10)));
    }

    #[tokio::test]
    async fn test_frequent_tier_only_covers_short_intervals() {
        let now = friday_noon();
        let (scheduler, _, broker) = scheduler(vec![
            venue("Busy", 10, None),
            venue("Quiet", 60, None),
            venue("Unset", 0, None),
        ]);
        let frequent = SchedulerConfig::default().tiers[1].clone();

        let pass = scheduler.run_tier(&frequent, now).await.unwrap();
        assert_eq!(pass.enqueued, 1);
        let queued = broker.queued("scraping_tasks:high");
        assert_eq!(queued.len(), 1);
        assert!(queued[0].contains("\"venueID\":\"Busy\""));
        assert!(broker.queued("scraping_tasks").is_empty());
    }

    #[tokio::test]
    async fn test_enqueue_failure_does_not_stamp_venue() {
        let now = friday_noon();
        let (scheduler, store, broker) = scheduler(vec![venue("A", 30, None), venue("B", 30, None)]);
        broker.fail_pushes.store(true, Ordering::SeqCst);
        let regular = SchedulerConfig::default().tiers[0].clone();

        let pass = scheduler.run_tier(&regular, now).await.unwrap();
        assert_eq!(pass.failed, 2);
        assert!(store.venues.lock().unwrap().iter().all(|v| v.last_scraped_at.is_none()));
    }

    #[tokio::test]
    async fn test_listing_failure_fails_the_pass() {
        let (scheduler, store, _) = scheduler(vec![venue("A", 30, None)]);
        store.fail_venue_listing.store(true, Ordering::SeqCst);
        let regular = SchedulerConfig::default().tiers[0].clone();

        assert!(matches!(
            scheduler.run_tier(&regular, friday_noon()).await,
            Err(SchedulerError::Store(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_passes_immediately_then_stops_on_shutdown() {
        let (scheduler, _, broker) = scheduler(vec![venue("A", 30, None)]);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(scheduler.run(shutdown_rx));

        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
        assert_eq!(broker.queued("scraping_tasks").len(), 1);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }
}

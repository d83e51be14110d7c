//! NotificationCoordinator processor.
//!
//! The NotificationCoordinator is responsible for:
//! - Popping availability events from the work queue fed by the detector
//! - Matching every event against every loaded user
//! - Dropping matches already notified within the dedup window, or beyond a
//!   user's hourly cap
//! - Feeding the remaining matches into the per-recipient [`Batcher`]
//! - Keeping the user roster fresh and purging old history
//!
//! Delivery itself happens in the `NotificationDispatcher`.

use super::batcher::{AddOutcome, Batcher};
use crate::broker::{Broker, BrokerError};
use crate::config::{ConfigStore, ConfigWatcher, CoordinatorConfig};
use crate::entities::users::UserProfile;
use crate::events::{BatchReadySender, MatchedSlot};
use crate::history::DedupHistory;
use crate::matching::evaluate;
use crate::store::{HistoryStore, StoreError, UserStore};
use courtwatch_sdk::objects::AvailabilityEvent;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use time::{OffsetDateTime, PrimitiveDateTime};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Delay before polling an empty work queue again.
const QUEUE_IDLE_DELAY: Duration = Duration::from_secs(1);
/// Events handled per drain before other duties get a turn.
const MAX_EVENTS_PER_DRAIN: usize = 100;
const RETENTION_EVERY: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("broker error: {0}")]
    Broker(#[from] BrokerError),

    /// Payload on the work queue is not an availability event
    #[error("malformed availability event: {0}")]
    MalformedEvent(#[from] serde_json::Error),

    #[error("invalid availability event {slot_id}: {reason}")]
    InvalidEvent { slot_id: String, reason: String },
}

/// What happened to one event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventSummary {
    pub matched: usize,
    pub batched: usize,
    pub duplicates: usize,
    pub capped: usize,
}

pub struct NotificationCoordinator<S, B> {
    store: Arc<S>,
    broker: Arc<B>,
    history: DedupHistory<S>,
    batcher: Batcher,
    roster: Vec<UserProfile>,
    config: CoordinatorConfig,
}

impl<S, B> NotificationCoordinator<S, B>
where
    S: UserStore + HistoryStore + 'static,
    B: Broker + 'static,
{
    pub fn new(
        store: Arc<S>,
        broker: Arc<B>,
        config: CoordinatorConfig,
        batch_tx: BatchReadySender,
    ) -> Self {
        Self {
            history: DedupHistory::new(store.clone(), config.dedup_window),
            batcher: Batcher::new(config.batch_window, batch_tx),
            store,
            broker,
            roster: Vec::new(),
            config,
        }
    }

    pub fn roster(&self) -> &[UserProfile] {
        &self.roster
    }

    pub fn batcher(&self) -> &Batcher {
        &self.batcher
    }

    /// Run the NotificationCoordinator.
    ///
    /// On shutdown every pending batch is flushed to the dispatcher
    /// immediately rather than waiting for its window.
    pub async fn run(
        mut self,
        mut shutdown_rx: watch::Receiver<bool>,
        config_store: ConfigStore<CoordinatorConfig>,
        mut config_watcher: ConfigWatcher,
    ) {
        self.refresh_roster().await;
        info!(
            users = self.roster.len(),
            queue = %self.config.work_queue,
            "NotificationCoordinator started"
        );

        let mut roster_tick = tokio::time::interval_at(
            tokio::time::Instant::now() + self.config.user_refresh_every,
            self.config.user_refresh_every,
        );
        let mut retention_tick = tokio::time::interval(RETENTION_EVERY);
        let mut next_poll = Duration::ZERO;

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("NotificationCoordinator received shutdown signal");
                        break;
                    }
                }

                Ok(()) = config_watcher.changed() => {
                    self.apply_config(config_store.snapshot().await);
                    self.refresh_roster().await;
                    info!(users = self.roster.len(), "NotificationCoordinator reloaded config");
                }

                _ = roster_tick.tick() => {
                    self.refresh_roster().await;
                }

                _ = retention_tick.tick() => {
                    self.purge_history().await;
                }

                _ = tokio::time::sleep(next_poll) => {
                    let handled = self.drain_queue().await;
                    next_poll = if handled >= MAX_EVENTS_PER_DRAIN {
                        Duration::ZERO
                    } else {
                        QUEUE_IDLE_DELAY
                    };
                }
            }
        }

        let flushed = self.batcher.flush_all().await;
        info!(batches = flushed, "NotificationCoordinator flushed pending batches");
        info!("NotificationCoordinator shutdown complete");
    }

    fn apply_config(&mut self, config: CoordinatorConfig) {
        if config.dedup_window != self.config.dedup_window {
            self.history = DedupHistory::new(self.store.clone(), config.dedup_window);
        }
        self.batcher.set_window(config.batch_window);
        self.config = config;
    }

    /// Reload users with notifications enabled.
    ///
    /// Users whose preference document does not decode are skipped. On a
    /// store error the previous roster is kept.
    pub async fn refresh_roster(&mut self) {
        let rows = match self.store.notifiable_users().await {
            Ok(rows) => rows,
            Err(e) => {
                error!(error = %e, "Failed to load users, keeping previous roster");
                return;
            }
        };

        let mut roster = Vec::with_capacity(rows.len());
        for row in rows {
            let user_id = row.id;
            match UserProfile::try_from(row) {
                Ok(profile) => roster.push(profile),
                Err(e) => warn!(%user_id, error = %e, "Skipping user with malformed preferences"),
            }
        }
        debug!(users = roster.len(), "User roster refreshed");
        self.roster = roster;
    }

    async fn purge_history(&self) {
        match self
            .history
            .purge(self.config.history_retention, OffsetDateTime::now_utc())
            .await
        {
            Ok(0) => {}
            Ok(deleted) => info!(deleted, "Purged old notification history"),
            Err(e) => error!(error = %e, "Failed to purge notification history"),
        }
    }

    /// Pop and handle events until the queue is empty or the drain limit is
    /// reached. Returns the number of events popped.
    async fn drain_queue(&mut self) -> usize {
        let mut handled = 0;
        while handled < MAX_EVENTS_PER_DRAIN {
            let payload = match self.broker.pop(&self.config.work_queue).await {
                Ok(Some(payload)) => payload,
                Ok(None) => break,
                Err(e) => {
                    warn!(queue = %self.config.work_queue, error = %e, "Failed to pop work queue");
                    break;
                }
            };
            handled += 1;

            if let Err(e) = self.handle_payload(&payload, OffsetDateTime::now_utc()).await {
                warn!(error = %e, "Dropping availability event");
            }
        }
        handled
    }

    /// Decode one work-queue payload and handle it.
    pub async fn handle_payload(
        &self,
        payload: &str,
        now: OffsetDateTime,
    ) -> Result<EventSummary, CoordinatorError> {
        let event: AvailabilityEvent = serde_json::from_str(payload)?;
        event
            .validate()
            .map_err(|e| CoordinatorError::InvalidEvent {
                slot_id: event.slot_id(),
                reason: e.to_string(),
            })?;
        Ok(self.handle_event(&event, now).await)
    }

    /// Match one event against the roster and batch the survivors.
    pub async fn handle_event(&self, event: &AvailabilityEvent, now: OffsetDateTime) -> EventSummary {
        let local = now.to_offset(self.config.venue_utc_offset);
        let local_now = PrimitiveDateTime::new(local.date(), local.time());
        let slot_id = event.slot_id();
        let mut summary = EventSummary::default();

        for user in &self.roster {
            let result = evaluate(event, &user.preferences, local_now);
            if !result.matches {
                debug!(
                    user_id = %user.user_id,
                    slot_id = %slot_id,
                    reasons = ?result.failure_reasons,
                    "No match"
                );
                continue;
            }
            summary.matched += 1;

            match self.history.already_notified(user.user_id, &slot_id, now).await {
                Ok(true) => {
                    info!(
                        user_id = %user.user_id,
                        slot_id = %slot_id,
                        "Already notified within dedup window, skipping"
                    );
                    summary.duplicates += 1;
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    error!(
                        user_id = %user.user_id,
                        slot_id = %slot_id,
                        error = %e,
                        "Failed to check notification history, skipping"
                    );
                    continue;
                }
            }

            if let Some(cap) = user.max_alerts_per_hour {
                match self.history.alerts_in_last_hour(user.user_id, now).await {
                    Ok(sent) => {
                        let pending = self.batcher.pending_for(&user.address) as i64;
                        if sent + pending >= i64::from(cap) {
                            info!(
                                user_id = %user.user_id,
                                slot_id = %slot_id,
                                cap,
                                "Hourly alert cap reached, skipping"
                            );
                            summary.capped += 1;
                            continue;
                        }
                    }
                    Err(e) => {
                        error!(
                            user_id = %user.user_id,
                            error = %e,
                            "Failed to count recent alerts, skipping"
                        );
                        continue;
                    }
                }
            }

            let matched = MatchedSlot {
                user_id: user.user_id,
                score: result.score,
                event: event.clone(),
            };
            match self.batcher.add(&user.address, matched) {
                AddOutcome::Queued { pending } => {
                    info!(
                        user_id = %user.user_id,
                        recipient = %user.address,
                        slot_id = %slot_id,
                        score = result.score,
                        pending,
                        "Match batched"
                    );
                    summary.batched += 1;
                }
                AddOutcome::AlreadyPending => {
                    summary.duplicates += 1;
                }
            }
        }

        summary
    }
}

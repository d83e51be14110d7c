//! Process roles and the wiring of the core processors.
//!
//! Each role spawns its processors on the shared shutdown flag. `All` runs
//! every processor in one process.

use crate::config::{ConfigError, LoadedConfig, NotifierSettings, get_notifier_secret};
use crate::config::file::NotifierKind;
use courtwatch_core::broker::RedisBroker;
use courtwatch_core::config::{ConfigStore, CoordinatorConfig};
use courtwatch_core::events::{batch_ready_channel, scrape_log_observed_channel};
use courtwatch_core::history::DedupHistory;
use courtwatch_core::notifier::{LogNotifier, Notifier, WebhookNotifier};
use courtwatch_core::processors::{
    ChangeDetector, HealthMonitor, HealthReceiver, NotificationCoordinator,
    NotificationDispatcher, Scheduler, ScrapeLogListener, ScrapeLogPoller, SlotPublisher,
};
use courtwatch_core::store::PgStore;
use serde::Serialize;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Scheduler,
    Detector,
    Coordinator,
    All,
}

impl Role {
    fn includes(self, other: Role) -> bool {
        self == Role::All || self == other
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Scheduler => write!(f, "scheduler"),
            Role::Detector => write!(f, "detector"),
            Role::Coordinator => write!(f, "coordinator"),
            Role::All => write!(f, "all"),
        }
    }
}

/// Connections shared by every processor of the process.
pub struct Services {
    pub pool: PgPool,
    pub store: Arc<PgStore>,
    pub broker: Arc<RedisBroker>,
}

/// Build the configured notifier.
pub fn build_notifier(settings: &NotifierSettings) -> Result<Arc<dyn Notifier>, ConfigError> {
    match settings.kind {
        NotifierKind::Log => Ok(Arc::new(LogNotifier)),
        NotifierKind::Webhook => {
            let url = settings.url.clone().ok_or_else(|| {
                ConfigError::ValidationError("notifier.url is required".to_string())
            })?;
            let secret = get_notifier_secret()?;
            Ok(Arc::new(WebhookNotifier::new(
                url,
                secret.as_bytes(),
                settings.timeout,
            )))
        }
    }
}

/// Handles of the spawned processors.
pub struct RunningRole {
    pub health: HealthReceiver,
    pub coordinator_config: ConfigStore<CoordinatorConfig>,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl RunningRole {
    /// Wait for every processor to finish, each for at most `grace`.
    pub async fn join(self, grace: Duration) {
        for (name, handle) in self.tasks {
            match tokio::time::timeout(grace, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(processor = name, error = %e, "Processor task failed"),
                Err(_) => warn!(processor = name, "Processor did not stop within the grace period"),
            }
        }
    }
}

/// Spawn the processors of `role`.
///
/// The health monitor runs in every role.
pub fn spawn_role(
    role: Role,
    services: &Services,
    config: &LoadedConfig,
    notifier: Arc<dyn Notifier>,
    shutdown_rx: watch::Receiver<bool>,
) -> RunningRole {
    let mut tasks: Vec<(&'static str, JoinHandle<()>)> = Vec::new();

    let (monitor, health) = HealthMonitor::new(
        services.store.clone(),
        services.broker.clone(),
        config.health.clone(),
    );
    tasks.push(("health", tokio::spawn(monitor.run(shutdown_rx.clone()))));

    if role.includes(Role::Scheduler) {
        let scheduler = Scheduler::new(
            services.store.clone(),
            services.broker.clone(),
            config.scheduler.clone(),
        );
        tasks.push(("scheduler", tokio::spawn(scheduler.run(shutdown_rx.clone()))));
    }

    if role.includes(Role::Detector) {
        let detector_config = &config.detector;
        let (observed_tx, observed_rx) = scrape_log_observed_channel();

        let listener = ScrapeLogListener::new(services.pool.clone(), observed_tx.clone());
        tasks.push(("listener", tokio::spawn(listener.run(shutdown_rx.clone()))));

        let poller = ScrapeLogPoller::new(
            services.store.clone(),
            observed_tx,
            detector_config.poll_every,
            detector_config.poll_batch,
            OffsetDateTime::now_utc() - detector_config.initial_lookback,
        );
        tasks.push(("poller", tokio::spawn(poller.run(shutdown_rx.clone()))));

        let publisher = SlotPublisher::new(services.broker.clone(), detector_config);
        let detector = ChangeDetector::new(services.store.clone(), publisher);
        tasks.push((
            "detector",
            tokio::spawn(detector.run(shutdown_rx.clone(), observed_rx)),
        ));
    }

    let coordinator_config = ConfigStore::new(config.coordinator.clone());
    if role.includes(Role::Coordinator) {
        let (batch_tx, batch_rx) = batch_ready_channel();

        let dispatcher = NotificationDispatcher::new(
            DedupHistory::new(services.store.clone(), config.coordinator.dedup_window),
            notifier,
        );
        tasks.push((
            "dispatcher",
            tokio::spawn(dispatcher.run(
                shutdown_rx.clone(),
                batch_rx,
                config.coordinator.shutdown_grace,
            )),
        ));

        let coordinator = NotificationCoordinator::new(
            services.store.clone(),
            services.broker.clone(),
            config.coordinator.clone(),
            batch_tx,
        );
        let watcher = coordinator_config.subscribe();
        tasks.push((
            "coordinator",
            tokio::spawn(coordinator.run(shutdown_rx, coordinator_config.clone(), watcher)),
        ));
    }

    info!(role = %role, processors = tasks.len(), "Processors spawned");
    RunningRole {
        health,
        coordinator_config,
        tasks,
    }
}

//! Long-running processors.
//!
//! - `Scheduler`: enqueues scraping tasks for due venues, per tier
//! - `HealthMonitor`: probes broker and store, reports queue depths
//! - `ScrapeLogListener` / `ScrapeLogPoller`: emit `ScrapeLogObserved`
//! - `ChangeDetector`: receives `ScrapeLogObserved`, publishes availability events
//! - `NotificationCoordinator`: consumes availability events, matches, batches
//! - `NotificationDispatcher`: receives `BatchReady`, notifies, records history

pub mod batcher;
pub mod change_detector;
pub mod dispatcher;
pub mod health;
pub mod notification_coordinator;
pub mod scheduler;
pub mod scrape_log_sources;

#[cfg(test)]
mod pipeline_tests;

pub use batcher::{AddOutcome, Batcher};
pub use change_detector::{
    ChangeDetector, DetectionSummary, DetectorError, ObservationError, PublishOutcome,
    SlotPublisher, event_from_observation,
};
pub use dispatcher::{DispatchError, NotificationDispatcher};
pub use health::{HealthMonitor, HealthReceiver, HealthReport, QueueDepth};
pub use notification_coordinator::{CoordinatorError, EventSummary, NotificationCoordinator};
pub use scheduler::{Scheduler, SchedulerError, TierPass, due_for_scrape};
pub use scrape_log_sources::{SCRAPE_LOG_NOTIFY_CHANNEL, ScrapeLogListener, ScrapeLogPoller};

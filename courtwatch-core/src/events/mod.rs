//! Event system for the in-process pipelines.
//!
//! # Event Flow
//!
//! Change detector:
//! 1. `ScrapeLogListener` / `ScrapeLogPoller` emit `ScrapeLogObserved` -> `ChangeDetector`
//! 2. `ChangeDetector` publishes availability events to the broker
//!
//! Notification coordinator:
//! 1. `NotificationCoordinator` pops availability events from the work queue,
//!    matches them and feeds the `Batcher`
//! 2. Flush timers emit `BatchReady` -> `NotificationDispatcher`

pub mod channels;
pub mod types;

pub use channels::{
    BatchReadyReceiver, BatchReadySender, DEFAULT_CHANNEL_BUFFER, ScrapeLogObservedReceiver,
    ScrapeLogObservedSender, batch_ready_channel, scrape_log_observed_channel,
};

pub use types::{BatchReady, MatchedSlot, ObservationSource, ScrapeLogObserved};

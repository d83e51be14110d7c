//! Runtime configuration for the Courtwatch processors.
//!
//! These types are the validated configuration consumed by the core. The
//! TOML file format and its loading live in the server crate, which converts
//! into these types.

mod config_store;
mod coordinator;
mod detector;
mod scheduler;

pub use config_store::{ConfigStore, ConfigWatcher};
pub use coordinator::CoordinatorConfig;
pub use detector::DetectorConfig;
pub use scheduler::{HealthConfig, ScheduleTier, SchedulerConfig};

/// Default base name of the scraping task queues.
pub const DEFAULT_TASK_QUEUE: &str = "scraping_tasks";
/// Default pub/sub channel for availability events.
pub const DEFAULT_AVAILABILITY_CHANNEL: &str = "court:availability";
/// Default work queue feeding the notification coordinator.
pub const DEFAULT_WORK_QUEUE: &str = "court_slots";

//! TOML file configuration structures.
//!
//! These structs directly map to the `courtwatch.toml` file format. Every
//! section and field has a default, so an empty file is a valid config.

use courtwatch_core::config::{
    DEFAULT_AVAILABILITY_CHANNEL, DEFAULT_TASK_QUEUE, DEFAULT_WORK_QUEUE,
};
use courtwatch_sdk::objects::TaskPriority;
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use url::Url;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub server: ServerConfig,
    pub scheduler: SchedulerConfig,
    pub detector: DetectorConfig,
    pub coordinator: CoordinatorConfig,
    pub notifier: NotifierConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address of the health endpoint (e.g., "0.0.0.0:8080").
    pub listen: SocketAddr,
    pub log_format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8080)),
            log_format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierConfig {
    pub name: String,
    pub every_minutes: u64,
    #[serde(default = "default_priority")]
    pub priority: TaskPriority,
    /// Venues with a longer scraping interval are left to other tiers.
    #[serde(default)]
    pub max_interval_minutes: Option<i32>,
}

fn default_priority() -> TaskPriority {
    TaskPriority::Normal
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub tiers: Vec<TierConfig>,
    pub health_check_minutes: u64,
    pub queue_name: String,
    pub default_interval_minutes: i32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tiers: vec![
                TierConfig {
                    name: "regular".to_string(),
                    every_minutes: 30,
                    priority: TaskPriority::Normal,
                    max_interval_minutes: None,
                },
                TierConfig {
                    name: "frequent".to_string(),
                    every_minutes: 15,
                    priority: TaskPriority::High,
                    max_interval_minutes: Some(15),
                },
            ],
            health_check_minutes: 5,
            queue_name: DEFAULT_TASK_QUEUE.to_string(),
            default_interval_minutes: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub channel: String,
    pub work_queue: String,
    pub suppression_minutes: u64,
    pub poll_seconds: u64,
    pub initial_lookback_hours: i64,
    pub poll_batch: i64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            channel: DEFAULT_AVAILABILITY_CHANNEL.to_string(),
            work_queue: DEFAULT_WORK_QUEUE.to_string(),
            suppression_minutes: 30,
            poll_seconds: 60,
            initial_lookback_hours: 24,
            poll_batch: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    pub batch_window_seconds: u64,
    pub dedup_hours: i64,
    pub user_refresh_seconds: u64,
    pub history_retention_days: i64,
    pub shutdown_grace_seconds: u64,
    pub max_alerts_per_hour: Option<u32>,
    /// Offset of the venues' local time from UTC, in minutes.
    pub venue_utc_offset_minutes: i32,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            batch_window_seconds: 10,
            dedup_hours: 24,
            user_refresh_seconds: 300,
            history_retention_days: 30,
            shutdown_grace_seconds: 15,
            max_alerts_per_hour: None,
            venue_utc_offset_minutes: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifierKind {
    /// Write messages to the log.
    #[default]
    Log,
    /// POST signed payloads to `url`; the secret comes from `NOTIFIER_SECRET`.
    Webhook,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    pub kind: NotifierKind,
    pub url: Option<Url>,
    pub timeout_seconds: u64,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            kind: NotifierKind::Log,
            url: None,
            timeout_seconds: 30,
        }
    }
}

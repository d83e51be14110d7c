//! Configuration module for the courtwatch binary.
//!
//! Reads the TOML file, applies CLI overrides, validates it and converts it
//! into the runtime configuration types of `courtwatch-core`. Secrets are
//! taken from the environment only.

pub mod file;

use crate::config::file::{FileConfig, LogFormat, NotifierKind};
use courtwatch_core::config::{
    CoordinatorConfig, DetectorConfig, HealthConfig, ScheduleTier, SchedulerConfig,
};
use courtwatch_sdk::objects::TaskPriority;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("DATABASE_URL environment variable not set")]
    MissingDatabaseUrl,

    #[error("REDIS_URL environment variable not set")]
    MissingRedisUrl,

    #[error("NOTIFIER_SECRET environment variable not set (required by the webhook notifier)")]
    MissingNotifierSecret,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen: SocketAddr,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone)]
pub struct NotifierSettings {
    pub kind: NotifierKind,
    pub url: Option<Url>,
    pub timeout: Duration,
}

/// Loaded configuration result containing all parts.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub server: ServerConfig,
    pub scheduler: SchedulerConfig,
    pub health: HealthConfig,
    pub detector: DetectorConfig,
    pub coordinator: CoordinatorConfig,
    pub notifier: NotifierSettings,
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: PathBuf,
    listen_override: Option<SocketAddr>,
}

impl ConfigLoader {
    pub fn new(config_path: impl AsRef<Path>, listen_override: Option<SocketAddr>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            listen_override,
        }
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Load and process the configuration.
    ///
    /// A missing file is the same as an empty one.
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let config_content = match std::fs::read_to_string(&self.config_path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };
        let mut file_config: FileConfig = toml::from_str(&config_content)?;

        if let Some(listen) = self.listen_override {
            file_config.server.listen = listen;
        }

        validate(&file_config)?;
        build_loaded_config(file_config)
    }

    /// Reload the configuration (used during SIGHUP).
    pub fn reload(&self) -> Result<LoadedConfig, ConfigError> {
        self.load()
    }
}

fn validate(config: &FileConfig) -> Result<(), ConfigError> {
    let invalid = |msg: String| Err(ConfigError::ValidationError(msg));

    if config.scheduler.tiers.is_empty() {
        return invalid("scheduler.tiers must not be empty".to_string());
    }
    for tier in &config.scheduler.tiers {
        if tier.every_minutes == 0 {
            return invalid(format!("scheduler tier {} has every_minutes = 0", tier.name));
        }
    }
    if config.scheduler.health_check_minutes == 0 {
        return invalid("scheduler.health_check_minutes must be positive".to_string());
    }
    if config.detector.suppression_minutes == 0 || config.detector.poll_seconds == 0 {
        return invalid("detector suppression and poll windows must be positive".to_string());
    }
    let coordinator = &config.coordinator;
    if coordinator.batch_window_seconds == 0
        || coordinator.dedup_hours <= 0
        || coordinator.user_refresh_seconds == 0
        || coordinator.history_retention_days <= 0
    {
        return invalid("coordinator windows must be positive".to_string());
    }
    if coordinator.venue_utc_offset_minutes.abs() >= 24 * 60 {
        return invalid("coordinator.venue_utc_offset_minutes is out of range".to_string());
    }
    if config.notifier.kind == NotifierKind::Webhook && config.notifier.url.is_none() {
        return invalid("notifier.url is required for the webhook notifier".to_string());
    }
    Ok(())
}

fn build_loaded_config(file_config: FileConfig) -> Result<LoadedConfig, ConfigError> {
    let FileConfig {
        server,
        scheduler,
        detector,
        coordinator,
        notifier,
    } = file_config;

    let health = HealthConfig {
        every: Duration::from_secs(scheduler.health_check_minutes * 60),
        queues: vec![
            TaskPriority::Normal.queue_name(&scheduler.queue_name),
            TaskPriority::High.queue_name(&scheduler.queue_name),
            detector.work_queue.clone(),
        ],
        channel: detector.channel.clone(),
    };

    let venue_utc_offset =
        time::UtcOffset::from_whole_seconds(coordinator.venue_utc_offset_minutes * 60)
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

    Ok(LoadedConfig {
        server: ServerConfig {
            listen: server.listen,
            log_format: server.log_format,
        },
        scheduler: SchedulerConfig {
            tiers: scheduler
                .tiers
                .into_iter()
                .map(|tier| ScheduleTier {
                    name: tier.name,
                    every: Duration::from_secs(tier.every_minutes * 60),
                    priority: tier.priority,
                    max_interval_minutes: tier.max_interval_minutes,
                })
                .collect(),
            queue_name: scheduler.queue_name,
            default_interval_minutes: scheduler.default_interval_minutes,
        },
        health,
        coordinator: CoordinatorConfig {
            work_queue: detector.work_queue.clone(),
            batch_window: Duration::from_secs(coordinator.batch_window_seconds),
            dedup_window: time::Duration::hours(coordinator.dedup_hours),
            user_refresh_every: Duration::from_secs(coordinator.user_refresh_seconds),
            history_retention: time::Duration::days(coordinator.history_retention_days),
            shutdown_grace: Duration::from_secs(coordinator.shutdown_grace_seconds),
            max_alerts_per_hour: coordinator.max_alerts_per_hour.filter(|cap| *cap > 0),
            venue_utc_offset,
        },
        detector: DetectorConfig {
            channel: detector.channel,
            work_queue: detector.work_queue,
            suppression_ttl: Duration::from_secs(detector.suppression_minutes * 60),
            poll_every: Duration::from_secs(detector.poll_seconds),
            initial_lookback: time::Duration::hours(detector.initial_lookback_hours),
            poll_batch: detector.poll_batch.max(1),
        },
        notifier: NotifierSettings {
            kind: notifier.kind,
            url: notifier.url,
            timeout: Duration::from_secs(notifier.timeout_seconds),
        },
    })
}

/// Get the database URL from the environment.
pub fn get_database_url() -> Result<String, ConfigError> {
    std::env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)
}

/// Get the broker URL from the environment.
pub fn get_redis_url() -> Result<String, ConfigError> {
    std::env::var("REDIS_URL").map_err(|_| ConfigError::MissingRedisUrl)
}

/// Get the webhook signing secret from the environment.
pub fn get_notifier_secret() -> Result<String, ConfigError> {
    std::env::var("NOTIFIER_SECRET")
        .ok()
        .filter(|secret| !secret.is_empty())
        .ok_or(ConfigError::MissingNotifierSecret)
}

use courtwatch_sdk::objects::TaskPriority;
use std::time::Duration;

/// One scheduling cadence.
///
/// A tier wakes up every `every`, and covers the active venues whose
/// scraping interval is at most `max_interval_minutes` (all of them when
/// unset).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleTier {
    pub name: String,
    pub every: Duration,
    pub priority: TaskPriority,
    pub max_interval_minutes: Option<i32>,
}

impl ScheduleTier {
    /// Whether a venue with the given effective interval belongs to this tier.
    pub fn covers(&self, interval_minutes: i32) -> bool {
        self.max_interval_minutes
            .is_none_or(|max| interval_minutes <= max)
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub tiers: Vec<ScheduleTier>,
    /// Base queue name; see [`TaskPriority::queue_name`].
    pub queue_name: String,
    /// Interval used for venues that have none (zero or negative).
    pub default_interval_minutes: i32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tiers: vec![
                ScheduleTier {
                    name: "regular".to_string(),
                    every: Duration::from_secs(30 * 60),
                    priority: TaskPriority::Normal,
                    max_interval_minutes: None,
                },
                ScheduleTier {
                    name: "frequent".to_string(),
                    every: Duration::from_secs(15 * 60),
                    priority: TaskPriority::High,
                    max_interval_minutes: Some(15),
                },
            ],
            queue_name: super::DEFAULT_TASK_QUEUE.to_string(),
            default_interval_minutes: 30,
        }
    }
}

/// What the periodic health check looks at.
#[derive(Debug, Clone)]
pub struct HealthConfig {
    pub every: Duration,
    /// Queues whose depth is reported.
    pub queues: Vec<String>,
    /// Pub/sub channel whose subscriber count is reported.
    pub channel: String,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            every: Duration::from_secs(5 * 60),
            queues: vec![
                TaskPriority::Normal.queue_name(super::DEFAULT_TASK_QUEUE),
                TaskPriority::High.queue_name(super::DEFAULT_TASK_QUEUE),
                super::DEFAULT_WORK_QUEUE.to_string(),
            ],
            channel: super::DEFAULT_AVAILABILITY_CHANNEL.to_string(),
        }
    }
}

use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatorConfig {
    /// Work queue the availability events are popped from.
    pub work_queue: String,
    /// Quiet period after the last match before a recipient's batch is sent.
    pub batch_window: Duration,
    /// A (user, slot) pair notified within this window is not notified again.
    pub dedup_window: time::Duration,
    pub user_refresh_every: Duration,
    /// History older than this is purged.
    pub history_retention: time::Duration,
    /// Upper bound for flushing pending batches on shutdown.
    pub shutdown_grace: Duration,
    /// Cap on alerts per user per rolling hour, if any.
    pub max_alerts_per_hour: Option<u32>,
    /// Offset of the venues' local time, used for advance-booking checks.
    pub venue_utc_offset: time::UtcOffset,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            work_queue: super::DEFAULT_WORK_QUEUE.to_string(),
            batch_window: Duration::from_secs(10),
            dedup_window: time::Duration::hours(24),
            user_refresh_every: Duration::from_secs(300),
            history_retention: time::Duration::days(30),
            shutdown_grace: Duration::from_secs(15),
            max_alerts_per_hour: None,
            venue_utc_offset: time::UtcOffset::UTC,
        }
    }
}

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Pub/sub channel availability events are published on.
    pub channel: String,
    /// Work queue consumed by the notification coordinator.
    pub work_queue: String,
    /// Lifetime of the "recently seen" marker for an unchanged slot.
    pub suppression_ttl: Duration,
    /// Cadence of the fallback poller.
    pub poll_every: Duration,
    /// How far back the poller starts on boot.
    pub initial_lookback: time::Duration,
    /// Maximum number of scrape logs fetched per poll.
    pub poll_batch: i64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            channel: super::DEFAULT_AVAILABILITY_CHANNEL.to_string(),
            work_queue: super::DEFAULT_WORK_QUEUE.to_string(),
            suppression_ttl: Duration::from_secs(30 * 60),
            poll_every: Duration::from_secs(60),
            initial_lookback: time::Duration::hours(24),
            poll_batch: 100,
        }
    }
}

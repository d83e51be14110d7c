use std::time::Duration;

/// Delays between attempts to re-establish a dropped subscription.
const RECONNECT_BACKOFF_SECS: &[u64] = &[1, 2, 5, 10, 30];

/// Delay before reconnect attempt number `attempt` (starting at 0).
///
/// The last step repeats once the schedule is exhausted.
pub fn reconnect_delay(attempt: usize) -> Duration {
    let idx = attempt.min(RECONNECT_BACKOFF_SECS.len() - 1);
    Duration::from_secs(RECONNECT_BACKOFF_SECS[idx])
}

//! Event type definitions for the in-process pipelines.
//!
//! Scrape log events carry identifiers only; the detector re-reads the log
//! from the store. Batches carry the matched events themselves since those
//! are not stored anywhere until history is written.

use courtwatch_sdk::objects::AvailabilityEvent;
use uuid::Uuid;

/// Which path noticed a scrape log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservationSource {
    /// The database insert notification.
    Live,
    /// The fallback poller.
    Poll,
}

impl std::fmt::Display for ObservationSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObservationSource::Live => write!(f, "live"),
            ObservationSource::Poll => write!(f, "poll"),
        }
    }
}

/// A scrape log that should be turned into availability events.
///
/// Both paths may report the same log; processing is idempotent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrapeLogObserved {
    pub scrape_log_id: i64,
    pub source: ObservationSource,
}

/// One slot matched for one user, waiting in a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedSlot {
    pub user_id: Uuid,
    pub score: f64,
    pub event: AvailabilityEvent,
}

impl MatchedSlot {
    pub fn slot_id(&self) -> String {
        self.event.slot_id()
    }
}

/// A recipient's batch window closed.
#[derive(Debug, Clone)]
pub struct BatchReady {
    pub recipient: String,
    pub matches: Vec<MatchedSlot>,
}

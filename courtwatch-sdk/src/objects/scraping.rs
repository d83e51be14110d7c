//! Scraping tasks and the result documents written back by scrapers.

use crate::formats;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

/// Priority tier of a scraping task. Each tier has its own queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Normal,
    High,
}

impl TaskPriority {
    /// Queue name for this priority derived from the base queue name.
    ///
    /// Normal tasks go to `base`, high priority tasks to `base:high`.
    pub fn queue_name(self, base: &str) -> String {
        match self {
            TaskPriority::Normal => base.to_owned(),
            TaskPriority::High => format!("{base}:high"),
        }
    }
}

impl std::fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskPriority::Normal => write!(f, "normal"),
            TaskPriority::High => write!(f, "high"),
        }
    }
}

/// A unit of scraping work consumed by the external scraper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapingTask {
    #[serde(rename = "venueID")]
    pub venue_id: String,
    pub venue_name: String,
    #[serde(rename = "venueURL")]
    pub venue_url: String,
    pub provider: String,
    #[serde(rename = "taskID")]
    pub task_id: String,
    #[serde(with = "formats::rfc3339")]
    pub queued_at: OffsetDateTime,
    pub priority: TaskPriority,
    #[serde(with = "formats::date")]
    pub target_date: Date,
}

/// One slot sighting inside a scrape result.
///
/// Dates and times are kept as the scraper wrote them; they are validated
/// one observation at a time so a single bad row never discards the rest
/// of the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotObservation {
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub court_name: String,
    pub price: Decimal,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub booking_url: String,
    pub available: bool,
}

fn default_currency() -> String {
    "GBP".to_owned()
}

/// The document a scraper writes for every scrape attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeResultDocument {
    #[serde(rename = "venueID")]
    pub venue_id: String,
    pub venue_name: String,
    pub provider: String,
    #[serde(with = "formats::rfc3339")]
    pub scraped_at: OffsetDateTime,
    pub slots_found: i32,
    #[serde(default)]
    pub slots: Vec<SlotObservation>,
    pub success: bool,
    #[serde(default)]
    pub errors: Vec<String>,
}

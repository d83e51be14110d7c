use crate::framework::DatabaseProcessor;
use courtwatch_sdk::objects::SlotObservation;
use kanau::processor::Processor;
use sqlx::types::Json;
use time::OffsetDateTime;

/// A scrape result as stored by the external scraper.
///
/// Slots are kept as raw JSON values so that one malformed observation can
/// be dropped on its own; see [`ScrapeLog::observations`].
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ScrapeLog {
    pub id: i64,
    pub venue_id: String,
    pub venue_name: String,
    pub provider: String,
    pub scraped_at: OffsetDateTime,
    pub slots_found: i32,
    pub slots: Json<Vec<serde_json::Value>>,
    pub success: bool,
    pub errors: Json<Vec<String>>,
}

impl ScrapeLog {
    /// Only successful scrapes that found something are worth looking at.
    pub fn has_slots(&self) -> bool {
        self.success && self.slots_found > 0
    }

    /// Decode each slot observation independently, in order.
    pub fn observations(
        &self,
    ) -> impl Iterator<Item = Result<SlotObservation, serde_json::Error>> + '_ {
        self.slots
            .0
            .iter()
            .map(|value| serde_json::from_value(value.clone()))
    }

    pub fn cursor(&self) -> ScrapeLogCursor {
        ScrapeLogCursor {
            scraped_at: self.scraped_at,
            id: self.id,
        }
    }
}

/// Position in the scrape log stream.
///
/// Logs are totally ordered by `(scraped_at, id)`; several logs may share a
/// `scraped_at`, so the id breaks ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ScrapeLogCursor {
    pub scraped_at: OffsetDateTime,
    pub id: i64,
}

impl ScrapeLogCursor {
    /// Positioned after every log scraped at or before `at`.
    pub fn after_time(at: OffsetDateTime) -> Self {
        Self {
            scraped_at: at,
            id: i64::MAX,
        }
    }
}

const SCRAPE_LOG_COLUMNS: &str =
    "id, venue_id, venue_name, provider, scraped_at, slots_found, slots, success, errors";

#[derive(Debug, Clone, Copy)]
pub struct GetScrapeLogById {
    pub id: i64,
}

impl Processor<GetScrapeLogById> for DatabaseProcessor {
    type Output = Option<ScrapeLog>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetScrapeLogById")]
    async fn process(&self, query: GetScrapeLogById) -> Result<Option<ScrapeLog>, sqlx::Error> {
        sqlx::query_as::<_, ScrapeLog>(&format!(
            "SELECT {SCRAPE_LOG_COLUMNS} FROM scrape_logs WHERE id = $1"
        ))
        .bind(query.id)
        .fetch_optional(&self.pool)
        .await
    }
}

#[derive(Debug, Clone, Copy)]
/// Successful, non-empty scrape logs strictly past `after`, in cursor order.
pub struct ListScrapeLogsAfter {
    pub after: ScrapeLogCursor,
    pub limit: i64,
}

impl Processor<ListScrapeLogsAfter> for DatabaseProcessor {
    type Output = Vec<ScrapeLog>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListScrapeLogsAfter")]
    async fn process(&self, query: ListScrapeLogsAfter) -> Result<Vec<ScrapeLog>, sqlx::Error> {
        sqlx::query_as::<_, ScrapeLog>(&format!(
            r#"
            SELECT {SCRAPE_LOG_COLUMNS}
            FROM scrape_logs
            WHERE (scraped_at, id) > ($1, $2) AND success AND slots_found > 0
            ORDER BY scraped_at ASC, id ASC
            LIMIT $3
            "#
        ))
        .bind(query.after.scraped_at)
        .bind(query.after.id)
        .bind(query.limit)
        .fetch_all(&self.pool)
        .await
    }
}

use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use sqlx::types::Json;
use time::OffsetDateTime;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Venue {
    pub id: String,
    pub name: String,
    pub provider: String,
    pub url: String,
    pub courts: Json<Vec<String>>,
    pub scraping_interval_minutes: i32,
    pub last_scraped_at: Option<OffsetDateTime>,
    pub is_active: bool,
}

impl Venue {
    /// Scraping interval in minutes, falling back to `default` when unset.
    pub fn effective_interval_minutes(&self, default: i32) -> i32 {
        if self.scraping_interval_minutes > 0 {
            self.scraping_interval_minutes
        } else {
            default
        }
    }
}

#[derive(Debug, Clone, Copy)]
/// All venues flagged active, ordered by id.
pub struct ListActiveVenues;

impl Processor<ListActiveVenues> for DatabaseProcessor {
    type Output = Vec<Venue>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListActiveVenues")]
    async fn process(&self, _: ListActiveVenues) -> Result<Vec<Venue>, sqlx::Error> {
        sqlx::query_as::<_, Venue>(
            r#"
            SELECT id, name, provider, url, courts, scraping_interval_minutes,
                   last_scraped_at, is_active
            FROM venues
            WHERE is_active
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
/// Record that a scraping task for the venue was enqueued at `at`.
pub struct MarkVenueEnqueued {
    pub venue_id: String,
    pub at: OffsetDateTime,
}

impl Processor<MarkVenueEnqueued> for DatabaseProcessor {
    type Output = u64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:MarkVenueEnqueued")]
    async fn process(&self, update: MarkVenueEnqueued) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("UPDATE venues SET last_scraped_at = $2 WHERE id = $1")
            .bind(update.venue_id)
            .bind(update.at)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

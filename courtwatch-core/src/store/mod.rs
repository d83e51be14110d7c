//! Document store seams.
//!
//! Processors depend on these traits rather than on a pool so that their
//! logic can be exercised without a database. [`PgStore`] is the production
//! implementation.

#[cfg(test)]
pub mod memory;
mod postgres;

pub use postgres::PgStore;

use crate::entities::notification_history::{NotificationInsert, NotificationRecord};
use crate::entities::scrape_logs::{ScrapeLog, ScrapeLogCursor};
use crate::entities::users::UserRow;
use crate::entities::venues::Venue;
use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The store refused the operation (used by test doubles)
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait VenueStore: Send + Sync {
    async fn active_venues(&self) -> Result<Vec<Venue>, StoreError>;

    /// Stamp `last_scraped_at` after a task for the venue was enqueued.
    async fn mark_enqueued(&self, venue_id: &str, at: OffsetDateTime) -> Result<(), StoreError>;
}

#[async_trait]
pub trait ScrapeLogStore: Send + Sync {
    async fn scrape_log(&self, id: i64) -> Result<Option<ScrapeLog>, StoreError>;

    /// Successful, non-empty logs strictly past `after`, in cursor order.
    async fn scrape_logs_after(
        &self,
        after: ScrapeLogCursor,
        limit: i64,
    ) -> Result<Vec<ScrapeLog>, StoreError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn notifiable_users(&self) -> Result<Vec<UserRow>, StoreError>;
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn recent_notifications(
        &self,
        user_id: Uuid,
        slot_id: &str,
        since: OffsetDateTime,
    ) -> Result<Vec<NotificationRecord>, StoreError>;

    async fn count_notifications_since(
        &self,
        user_id: Uuid,
        since: OffsetDateTime,
    ) -> Result<i64, StoreError>;

    async fn record_notifications(
        &self,
        records: Vec<NotificationInsert>,
    ) -> Result<u64, StoreError>;

    async fn purge_notifications_before(&self, before: OffsetDateTime) -> Result<u64, StoreError>;
}

#[async_trait]
pub trait StoreHealth: Send + Sync {
    async fn ping(&self) -> Result<(), StoreError>;
}

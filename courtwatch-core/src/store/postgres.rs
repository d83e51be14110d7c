use super::{HistoryStore, ScrapeLogStore, StoreError, StoreHealth, UserStore, VenueStore};
use crate::entities::PingDatabase;
use crate::entities::notification_history::{
    CountNotificationsSince, DeleteNotificationsBefore, GetRecentNotifications,
    InsertNotifications, NotificationInsert, NotificationRecord,
};
use crate::entities::scrape_logs::{
    GetScrapeLogById, ListScrapeLogsAfter, ScrapeLog, ScrapeLogCursor,
};
use crate::entities::users::{ListNotifiableUsers, UserRow};
use crate::entities::venues::{ListActiveVenues, MarkVenueEnqueued, Venue};
use crate::framework::DatabaseProcessor;
use async_trait::async_trait;
use kanau::processor::Processor;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PgStore {
    db: DatabaseProcessor,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            db: DatabaseProcessor { pool },
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.db.pool
    }
}

#[async_trait]
impl VenueStore for PgStore {
    async fn active_venues(&self) -> Result<Vec<Venue>, StoreError> {
        Ok(self.db.process(ListActiveVenues).await?)
    }

    async fn mark_enqueued(&self, venue_id: &str, at: OffsetDateTime) -> Result<(), StoreError> {
        self.db
            .process(MarkVenueEnqueued {
                venue_id: venue_id.to_owned(),
                at,
            })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ScrapeLogStore for PgStore {
    async fn scrape_log(&self, id: i64) -> Result<Option<ScrapeLog>, StoreError> {
        Ok(self.db.process(GetScrapeLogById { id }).await?)
    }

    async fn scrape_logs_after(
        &self,
        after: ScrapeLogCursor,
        limit: i64,
    ) -> Result<Vec<ScrapeLog>, StoreError> {
        Ok(self.db.process(ListScrapeLogsAfter { after, limit }).await?)
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn notifiable_users(&self) -> Result<Vec<UserRow>, StoreError> {
        Ok(self.db.process(ListNotifiableUsers).await?)
    }
}

#[async_trait]
impl HistoryStore for PgStore {
    async fn recent_notifications(
        &self,
        user_id: Uuid,
        slot_id: &str,
        since: OffsetDateTime,
    ) -> Result<Vec<NotificationRecord>, StoreError> {
        Ok(self
            .db
            .process(GetRecentNotifications {
                user_id,
                slot_id: slot_id.to_owned(),
                since,
            })
            .await?)
    }

    async fn count_notifications_since(
        &self,
        user_id: Uuid,
        since: OffsetDateTime,
    ) -> Result<i64, StoreError> {
        Ok(self
            .db
            .process(CountNotificationsSince { user_id, since })
            .await?)
    }

    async fn record_notifications(
        &self,
        records: Vec<NotificationInsert>,
    ) -> Result<u64, StoreError> {
        Ok(self.db.process(InsertNotifications { records }).await?)
    }

    async fn purge_notifications_before(&self, before: OffsetDateTime) -> Result<u64, StoreError> {
        Ok(self.db.process(DeleteNotificationsBefore { before }).await?)
    }
}

#[async_trait]
impl StoreHealth for PgStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(self.db.process(PingDatabase).await?)
    }
}

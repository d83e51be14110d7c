//! In-memory store used by processor tests.

use super::{HistoryStore, ScrapeLogStore, StoreError, StoreHealth, UserStore, VenueStore};
use crate::entities::notification_history::{NotificationInsert, NotificationRecord};
use crate::entities::scrape_logs::{ScrapeLog, ScrapeLogCursor};
use crate::entities::users::UserRow;
use crate::entities::venues::Venue;
use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Default)]
pub struct MemoryStore {
    pub venues: Mutex<Vec<Venue>>,
    pub scrape_logs: Mutex<Vec<ScrapeLog>>,
    pub users: Mutex<Vec<UserRow>>,
    pub history: Mutex<Vec<NotificationRecord>>,
    pub fail_venue_listing: AtomicBool,
    pub fail_history_writes: AtomicBool,
}

impl MemoryStore {
    pub fn history(&self) -> Vec<NotificationRecord> {
        self.history.lock().unwrap().clone()
    }
}

#[async_trait]
impl VenueStore for MemoryStore {
    async fn active_venues(&self) -> Result<Vec<Venue>, StoreError> {
        if self.fail_venue_listing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("venues".to_string()));
        }
        let venues = self.venues.lock().unwrap();
        Ok(venues.iter().filter(|v| v.is_active).cloned().collect())
    }

    async fn mark_enqueued(&self, venue_id: &str, at: OffsetDateTime) -> Result<(), StoreError> {
        let mut venues = self.venues.lock().unwrap();
        if let Some(venue) = venues.iter_mut().find(|v| v.id == venue_id) {
            venue.last_scraped_at = Some(at);
        }
        Ok(())
    }
}

#[async_trait]
impl ScrapeLogStore for MemoryStore {
    async fn scrape_log(&self, id: i64) -> Result<Option<ScrapeLog>, StoreError> {
        let logs = self.scrape_logs.lock().unwrap();
        Ok(logs.iter().find(|log| log.id == id).cloned())
    }

    async fn scrape_logs_after(
        &self,
        after: ScrapeLogCursor,
        limit: i64,
    ) -> Result<Vec<ScrapeLog>, StoreError> {
        let logs = self.scrape_logs.lock().unwrap();
        let mut found: Vec<ScrapeLog> = logs
            .iter()
            .filter(|log| log.cursor() > after && log.has_slots())
            .cloned()
            .collect();
        found.sort_by_key(ScrapeLog::cursor);
        found.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(found)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn notifiable_users(&self) -> Result<Vec<UserRow>, StoreError> {
        Ok(self.users.lock().unwrap().clone())
    }
}

#[async_trait]
impl HistoryStore for MemoryStore {
    async fn recent_notifications(
        &self,
        user_id: Uuid,
        slot_id: &str,
        since: OffsetDateTime,
    ) -> Result<Vec<NotificationRecord>, StoreError> {
        let history = self.history.lock().unwrap();
        Ok(history
            .iter()
            .filter(|r| r.user_id == user_id && r.slot_id == slot_id && r.sent_at >= since)
            .cloned()
            .collect())
    }

    async fn count_notifications_since(
        &self,
        user_id: Uuid,
        since: OffsetDateTime,
    ) -> Result<i64, StoreError> {
        let history = self.history.lock().unwrap();
        let count = history
            .iter()
            .filter(|r| r.user_id == user_id && r.sent_at >= since)
            .count();
        Ok(count as i64)
    }

    async fn record_notifications(
        &self,
        records: Vec<NotificationInsert>,
    ) -> Result<u64, StoreError> {
        if self.fail_history_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("history".to_string()));
        }
        let mut history = self.history.lock().unwrap();
        let inserted = records.len() as u64;
        for record in records {
            let id = history.len() as i64 + 1;
            history.push(NotificationRecord {
                id,
                user_id: record.user_id,
                recipient: record.recipient,
                slot_id: record.slot_id,
                venue_id: record.venue_id,
                venue_name: record.venue_name,
                court_name: record.court_name,
                slot_date: record.slot_date,
                start_time: record.start_time,
                price: record.price,
                sent_at: record.sent_at,
            });
        }
        Ok(inserted)
    }

    async fn purge_notifications_before(&self, before: OffsetDateTime) -> Result<u64, StoreError> {
        let mut history = self.history.lock().unwrap();
        let len = history.len();
        history.retain(|r| r.sent_at >= before);
        Ok((len - history.len()) as u64)
    }
}

#[async_trait]
impl StoreHealth for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

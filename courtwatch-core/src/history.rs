//! Notification history: "was this user already told about this slot?"
//!
//! History is append-only. A (user, slot) pair with a record inside the
//! dedup window is never alerted again; records are written only after a
//! notifier call succeeded.

use crate::entities::notification_history::NotificationInsert;
use crate::store::{HistoryStore, StoreError};
use std::sync::Arc;
use time::OffsetDateTime;
use uuid::Uuid;

pub struct DedupHistory<H> {
    store: Arc<H>,
    window: time::Duration,
}

impl<H> Clone for DedupHistory<H> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            window: self.window,
        }
    }
}

impl<H: HistoryStore> DedupHistory<H> {
    pub fn new(store: Arc<H>, window: time::Duration) -> Self {
        Self { store, window }
    }

    pub fn window(&self) -> time::Duration {
        self.window
    }

    /// Whether `user_id` was notified about `slot_id` within the window
    /// ending at `now`.
    pub async fn already_notified(
        &self,
        user_id: Uuid,
        slot_id: &str,
        now: OffsetDateTime,
    ) -> Result<bool, StoreError> {
        let records = self
            .store
            .recent_notifications(user_id, slot_id, now - self.window)
            .await?;
        Ok(!records.is_empty())
    }

    /// Number of slots `user_id` was alerted about in the hour before `now`.
    pub async fn alerts_in_last_hour(
        &self,
        user_id: Uuid,
        now: OffsetDateTime,
    ) -> Result<i64, StoreError> {
        self.store
            .count_notifications_since(user_id, now - time::Duration::hours(1))
            .await
    }

    pub async fn record(&self, records: Vec<NotificationInsert>) -> Result<u64, StoreError> {
        self.store.record_notifications(records).await
    }

    /// Delete records older than `retention` before `now`.
    pub async fn purge(
        &self,
        retention: time::Duration,
        now: OffsetDateTime,
    ) -> Result<u64, StoreError> {
        self.store.purge_notifications_before(now - retention).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use courtwatch_sdk::formats;
    use rust_decimal::Decimal;

    fn insert(user_id: Uuid, slot_id: &str, sent_at: OffsetDateTime) -> NotificationInsert {
        NotificationInsert {
            user_id,
            recipient: "player@example.com".to_string(),
            slot_id: slot_id.to_string(),
            venue_id: "VictoriaPark".to_string(),
            venue_name: "Victoria Park".to_string(),
            court_name: "Court 1".to_string(),
            slot_date: formats::parse_date("2024-06-01").unwrap(),
            start_time: formats::parse_hhmm("09:00").unwrap(),
            price: Decimal::new(12, 0),
            sent_at,
        }
    }

    #[tokio::test]
    async fn test_dedup_window_boundaries() {
        let store = Arc::new(MemoryStore::default());
        let history = DedupHistory::new(store, time::Duration::hours(24));
        let user = Uuid::from_u128(1);
        let slot = "VictoriaPark_1_2024-06-01_09:00";
        let sent = OffsetDateTime::from_unix_timestamp(1_717_000_000).unwrap();
        history.record(vec![insert(user, slot, sent)]).await.unwrap();

        let at_23h = sent + time::Duration::hours(23);
        let at_25h = sent + time::Duration::hours(25);
        assert!(history.already_notified(user, slot, at_23h).await.unwrap());
        assert!(!history.already_notified(user, slot, at_25h).await.unwrap());

        // Other users and other slots are unaffected.
        assert!(!history.already_notified(Uuid::from_u128(2), slot, at_23h).await.unwrap());
        assert!(!history.already_notified(user, "VictoriaPark_2_2024-06-01_09:00", at_23h).await.unwrap());
    }

    #[tokio::test]
    async fn test_hourly_count_and_purge() {
        let store = Arc::new(MemoryStore::default());
        let history = DedupHistory::new(store.clone(), time::Duration::hours(24));
        let user = Uuid::from_u128(1);
        let now = OffsetDateTime::from_unix_timestamp(1_717_000_000).unwrap();
        history
            .record(vec![
                insert(user, "a", now - time::Duration::minutes(10)),
                insert(user, "b", now - time::Duration::minutes(50)),
                insert(user, "c", now - time::Duration::days(40)),
            ])
            .await
            .unwrap();

        assert_eq!(history.alerts_in_last_hour(user, now).await.unwrap(), 2);
        assert_eq!(history.purge(time::Duration::days(30), now).await.unwrap(), 1);
        assert_eq!(store.history().len(), 2);
    }
}

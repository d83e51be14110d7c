use crate::framework::DatabaseProcessor;
use courtwatch_sdk::objects::AvailabilityEvent;
use kanau::processor::Processor;
use rust_decimal::Decimal;
use time::{Date, OffsetDateTime, Time};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct NotificationRecord {
    pub id: i64,
    pub user_id: Uuid,
    pub recipient: String,
    pub slot_id: String,
    pub venue_id: String,
    pub venue_name: String,
    pub court_name: String,
    pub slot_date: Date,
    pub start_time: Time,
    pub price: Decimal,
    pub sent_at: OffsetDateTime,
}

/// Data for inserting a history record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationInsert {
    pub user_id: Uuid,
    pub recipient: String,
    pub slot_id: String,
    pub venue_id: String,
    pub venue_name: String,
    pub court_name: String,
    pub slot_date: Date,
    pub start_time: Time,
    pub price: Decimal,
    pub sent_at: OffsetDateTime,
}

impl NotificationInsert {
    pub fn for_event(
        user_id: Uuid,
        recipient: &str,
        event: &AvailabilityEvent,
        sent_at: OffsetDateTime,
    ) -> Self {
        Self {
            user_id,
            recipient: recipient.to_owned(),
            slot_id: event.slot_id(),
            venue_id: event.venue_id.clone(),
            venue_name: event.venue_name.clone(),
            court_name: event.court_name.clone(),
            slot_date: event.date,
            start_time: event.start_time,
            price: event.price,
            sent_at,
        }
    }
}

#[derive(Debug, Clone)]
/// History records for one (user, slot) pair sent at or after `since`.
///
/// Served by the `(user_id, slot_id, sent_at)` index.
pub struct GetRecentNotifications {
    pub user_id: Uuid,
    pub slot_id: String,
    pub since: OffsetDateTime,
}

impl Processor<GetRecentNotifications> for DatabaseProcessor {
    type Output = Vec<NotificationRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetRecentNotifications")]
    async fn process(
        &self,
        query: GetRecentNotifications,
    ) -> Result<Vec<NotificationRecord>, sqlx::Error> {
        sqlx::query_as::<_, NotificationRecord>(
            r#"
            SELECT id, user_id, recipient, slot_id, venue_id, venue_name, court_name,
                   slot_date, start_time, price, sent_at
            FROM notification_history
            WHERE user_id = $1 AND slot_id = $2 AND sent_at >= $3
            ORDER BY sent_at DESC
            "#,
        )
        .bind(query.user_id)
        .bind(query.slot_id)
        .bind(query.since)
        .fetch_all(&self.pool)
        .await
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CountNotificationsSince {
    pub user_id: Uuid,
    pub since: OffsetDateTime,
}

impl Processor<CountNotificationsSince> for DatabaseProcessor {
    type Output = i64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:CountNotificationsSince")]
    async fn process(&self, query: CountNotificationsSince) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM notification_history WHERE user_id = $1 AND sent_at >= $2",
        )
        .bind(query.user_id)
        .bind(query.since)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}

#[derive(Debug, Clone)]
/// Insert history records in a single statement.
pub struct InsertNotifications {
    pub records: Vec<NotificationInsert>,
}

impl Processor<InsertNotifications> for DatabaseProcessor {
    type Output = u64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:InsertNotifications")]
    async fn process(&self, insert: InsertNotifications) -> Result<u64, sqlx::Error> {
        if insert.records.is_empty() {
            return Ok(0);
        }

        let mut query_builder = sqlx::QueryBuilder::new(
            "INSERT INTO notification_history \
            (user_id, recipient, slot_id, venue_id, venue_name, court_name, slot_date, start_time, price, sent_at) ",
        );

        query_builder.push_values(insert.records, |mut b, record| {
            b.push_bind(record.user_id)
                .push_bind(record.recipient)
                .push_bind(record.slot_id)
                .push_bind(record.venue_id)
                .push_bind(record.venue_name)
                .push_bind(record.court_name)
                .push_bind(record.slot_date)
                .push_bind(record.start_time)
                .push_bind(record.price)
                .push_bind(record.sent_at);
        });

        let result = query_builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DeleteNotificationsBefore {
    pub before: OffsetDateTime,
}

impl Processor<DeleteNotificationsBefore> for DatabaseProcessor {
    type Output = u64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:DeleteNotificationsBefore")]
    async fn process(&self, query: DeleteNotificationsBefore) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM notification_history WHERE sent_at < $1")
            .bind(query.before)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

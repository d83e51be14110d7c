//! One-shot commands: test notification, test event and match preview.

use crate::roles::Services;
use anyhow::Context;
use clap::Args;
use courtwatch_core::broker::Broker;
use courtwatch_core::config::DetectorConfig;
use courtwatch_core::entities::scrape_logs::ScrapeLogCursor;
use courtwatch_core::entities::users::UserProfile;
use courtwatch_core::matching::rank_matches;
use courtwatch_core::notifier::{Notifier, OutgoingMessage, render_batch};
use courtwatch_core::processors::{PublishOutcome, SlotPublisher, event_from_observation};
use courtwatch_core::store::{ScrapeLogStore, UserStore};
use courtwatch_core::utils::slot_key::court_id;
use courtwatch_sdk::formats;
use courtwatch_sdk::objects::AvailabilityEvent;
use rust_decimal::Decimal;
use std::sync::Arc;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};
use uuid::Uuid;

/// Scrape logs considered by the match preview.
const MATCH_LOOKBACK_HOURS: i64 = 24;
const MATCH_MAX_LOGS: i64 = 500;

/// Fields of the synthetic event published by `publish-test-event`.
#[derive(Debug, Clone, Args)]
pub struct TestEventArgs {
    #[arg(long, default_value = "test-venue")]
    pub venue_id: String,
    #[arg(long, default_value = "Test Venue")]
    pub venue_name: String,
    #[arg(long, default_value = "Court 1")]
    pub court: String,
    /// YYYY-MM-DD, tomorrow when omitted
    #[arg(long)]
    pub date: Option<String>,
    #[arg(long, default_value = "09:00")]
    pub start: String,
    #[arg(long, default_value = "10:00")]
    pub end: String,
    #[arg(long, default_value = "12.00")]
    pub price: Decimal,
    #[arg(long, default_value = "GBP")]
    pub currency: String,
    #[arg(long, default_value = "https://example.com/book")]
    pub booking_url: String,
}

impl TestEventArgs {
    pub fn to_event(&self, now: OffsetDateTime) -> anyhow::Result<AvailabilityEvent> {
        let date = match &self.date {
            Some(date) => formats::parse_date(date)?,
            None => now
                .date()
                .next_day()
                .context("no calendar date after today")?,
        };
        let event = AvailabilityEvent {
            venue_id: self.venue_id.clone(),
            venue_name: self.venue_name.clone(),
            court_id: court_id(&self.court),
            court_name: self.court.clone(),
            date,
            start_time: formats::parse_hhmm(&self.start)?,
            end_time: formats::parse_hhmm(&self.end)?,
            price: self.price,
            currency: self.currency.clone(),
            booking_url: self.booking_url.clone(),
            discovered_at: now,
            scrape_log_id: None,
        };
        event.validate()?;
        Ok(event)
    }
}

/// Send a sample alert to `to` through the configured notifier.
pub async fn send_test(notifier: Arc<dyn Notifier>, to: &str) -> anyhow::Result<()> {
    let event = TestEventArgs {
        venue_id: "test-venue".to_string(),
        venue_name: "Test Venue".to_string(),
        court: "Court 1".to_string(),
        date: None,
        start: "09:00".to_string(),
        end: "10:00".to_string(),
        price: Decimal::new(1200, 2),
        currency: "GBP".to_string(),
        booking_url: "https://example.com/book".to_string(),
    }
    .to_event(OffsetDateTime::now_utc())?;

    let message = OutgoingMessage::new(to, render_batch(std::slice::from_ref(&event)), 1);
    notifier
        .send(&message)
        .await
        .context("test notification failed")?;
    tracing::info!(recipient = %to, "Test notification sent");
    Ok(())
}

/// Publish a synthetic event through the same path as detected slots.
pub async fn publish_test_event<B: Broker>(
    broker: Arc<B>,
    config: &DetectorConfig,
    args: &TestEventArgs,
) -> anyhow::Result<PublishOutcome> {
    let event = args.to_event(OffsetDateTime::now_utc())?;
    let outcome = SlotPublisher::new(broker, config).publish(&event).await?;
    match outcome {
        PublishOutcome::Published { receivers } => {
            tracing::info!(slot_id = %event.slot_id(), receivers, "Test event published")
        }
        PublishOutcome::Suppressed => {
            tracing::info!(slot_id = %event.slot_id(), "Test event suppressed as recently seen")
        }
    }
    Ok(outcome)
}

/// Print the best matches for one user among recently scraped slots.
pub async fn match_user(
    services: &Services,
    user_id: Uuid,
    limit: usize,
    venue_offset: UtcOffset,
) -> anyhow::Result<()> {
    let row = services
        .store
        .notifiable_users()
        .await?
        .into_iter()
        .find(|row| row.id == user_id)
        .with_context(|| format!("user {user_id} not found or notifications disabled"))?;
    let profile =
        UserProfile::try_from(row).context("user preferences could not be decoded")?;

    let now = OffsetDateTime::now_utc();
    let logs = services
        .store
        .scrape_logs_after(
            ScrapeLogCursor::after_time(now - time::Duration::hours(MATCH_LOOKBACK_HOURS)),
            MATCH_MAX_LOGS,
        )
        .await?;
    let events: Vec<AvailabilityEvent> = logs
        .iter()
        .flat_map(|log| {
            log.observations()
                .filter_map(Result::ok)
                .filter_map(move |slot| event_from_observation(log, &slot, log.scraped_at).ok().flatten())
        })
        .collect();

    let local = now.to_offset(venue_offset);
    let local_now = PrimitiveDateTime::new(local.date(), local.time());
    let ranked = rank_matches(&events, &profile.preferences, local_now, limit);

    println!(
        "{} matching slots for {} among {} available",
        ranked.len(),
        profile.address,
        events.len()
    );
    for (i, (event, result)) in ranked.iter().enumerate() {
        println!(
            "{:>2}. [{:>5.1}] {} {} {} {}-{}  {}",
            i + 1,
            result.score,
            event.venue_name,
            event.court_name,
            formats::format_date(event.date),
            formats::format_hhmm(event.start_time),
            formats::format_hhmm(event.end_time),
            result.summary()
        );
    }
    Ok(())
}

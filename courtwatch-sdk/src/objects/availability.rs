//! Availability events published by the change detector.

use crate::formats;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime, Time, Weekday};

/// Reasons an availability event is rejected as malformed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EventError {
    #[error("slot start {start} is not before end {end}")]
    EmptySlot { start: String, end: String },
    #[error("missing {0}")]
    MissingField(&'static str),
    #[error("negative price {0}")]
    NegativePrice(Decimal),
}

/// A normalized observation that a slot is open for booking.
///
/// `date` is a calendar date in the venue's local context, never an instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityEvent {
    #[serde(rename = "venueID")]
    pub venue_id: String,
    pub venue_name: String,
    #[serde(rename = "courtID")]
    pub court_id: String,
    pub court_name: String,
    #[serde(with = "formats::date")]
    pub date: Date,
    #[serde(with = "formats::hhmm")]
    pub start_time: Time,
    #[serde(with = "formats::hhmm")]
    pub end_time: Time,
    pub price: Decimal,
    pub currency: String,
    #[serde(rename = "bookingURL")]
    pub booking_url: String,
    #[serde(with = "formats::rfc3339")]
    pub discovered_at: OffsetDateTime,
    /// Scrape log the slot was read from. Synthetic test events carry none.
    #[serde(rename = "scrapeLogID", default)]
    pub scrape_log_id: Option<i64>,
}

impl AvailabilityEvent {
    /// Check the invariants every event must hold before it is matched.
    pub fn validate(&self) -> Result<(), EventError> {
        if self.venue_id.is_empty() {
            return Err(EventError::MissingField("venueID"));
        }
        if self.court_id.is_empty() {
            return Err(EventError::MissingField("courtID"));
        }
        if self.start_time >= self.end_time {
            return Err(EventError::EmptySlot {
                start: formats::format_hhmm(self.start_time),
                end: formats::format_hhmm(self.end_time),
            });
        }
        if self.price.is_sign_negative() {
            return Err(EventError::NegativePrice(self.price));
        }
        Ok(())
    }

    /// Identifier of the slot used for notification history:
    /// `{venueID}_{courtID}_{date}_{startTime}`.
    pub fn slot_id(&self) -> String {
        format!(
            "{}_{}_{}_{}",
            self.venue_id,
            self.court_id,
            formats::format_date(self.date),
            formats::format_hhmm(self.start_time)
        )
    }

    /// Length of the session in whole minutes.
    pub fn duration_minutes(&self) -> i64 {
        (self.end_time - self.start_time).whole_minutes()
    }

    pub fn weekday(&self) -> Weekday {
        self.date.weekday()
    }

    pub fn is_weekend(&self) -> bool {
        matches!(self.weekday(), Weekday::Saturday | Weekday::Sunday)
    }
}

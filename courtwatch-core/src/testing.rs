//! Fixtures shared by processor tests.

use crate::entities::scrape_logs::ScrapeLog;
use crate::entities::users::UserRow;
use crate::entities::venues::Venue;
use courtwatch_sdk::formats;
use courtwatch_sdk::objects::AvailabilityEvent;
use rust_decimal::Decimal;
use sqlx::types::Json;
use time::OffsetDateTime;
use uuid::Uuid;

pub const PLAYER_ADDRESS: &str = "player@example.com";
pub const VICTORIA_PARK_SLOT: &str = "VictoriaPark_1_2024-06-01_09:00";

pub fn player_id() -> Uuid {
    Uuid::from_u128(0x1)
}

/// 2024-05-31 12:00 UTC, the day before the Victoria Park slot.
pub fn friday_noon() -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(1_717_156_800).unwrap()
}

pub fn victoria_park_event() -> AvailabilityEvent {
    AvailabilityEvent {
        venue_id: "VictoriaPark".to_string(),
        venue_name: "Victoria Park".to_string(),
        court_id: "1".to_string(),
        court_name: "Court 1".to_string(),
        date: formats::parse_date("2024-06-01").unwrap(),
        start_time: formats::parse_hhmm("09:00").unwrap(),
        end_time: formats::parse_hhmm("10:00").unwrap(),
        price: Decimal::new(1200, 2),
        currency: "GBP".to_string(),
        booking_url: "https://victoriapark.example.com/book/1".to_string(),
        discovered_at: friday_noon(),
        scrape_log_id: Some(1),
    }
}

/// A user wanting Victoria Park on weekend mornings for at most `max_price`.
pub fn player_row(max_price: &str) -> UserRow {
    UserRow {
        id: player_id(),
        email: PLAYER_ADDRESS.to_string(),
        name: Some("Player".to_string()),
        preferences: Json(serde_json::json!({
            "preferredVenues": ["Victoria Park"],
            "weekendTimes": [{"start": "09:00", "end": "11:00"}],
            "maxPrice": max_price,
        })),
        max_alerts_per_hour: None,
    }
}

pub fn victoria_park_log(id: i64, scraped_at: OffsetDateTime) -> ScrapeLog {
    ScrapeLog {
        id,
        venue_id: "VictoriaPark".to_string(),
        venue_name: "Victoria Park".to_string(),
        provider: "clubspark".to_string(),
        scraped_at,
        slots_found: 2,
        slots: Json(vec![
            serde_json::json!({
                "date": "2024-06-01",
                "startTime": "09:00",
                "endTime": "10:00",
                "courtName": "Court 1",
                "price": "12.00",
                "currency": "GBP",
                "bookingUrl": "https://victoriapark.example.com/book/1",
                "available": true,
            }),
            serde_json::json!({
                "date": "2024-06-01",
                "startTime": "10:00",
                "endTime": "11:00",
                "courtName": "Court 2",
                "price": "12.00",
                "currency": "GBP",
                "bookingUrl": "https://victoriapark.example.com/book/2",
                "available": false,
            }),
        ]),
        success: true,
        errors: Json(Vec::new()),
    }
}

pub fn venue(id: &str, interval_minutes: i32, last_scraped_at: Option<OffsetDateTime>) -> Venue {
    Venue {
        id: id.to_string(),
        name: id.to_string(),
        provider: "clubspark".to_string(),
        url: format!("https://{}.example.com", id.to_lowercase()),
        courts: Json(vec!["Court 1".to_string()]),
        scraping_interval_minutes: interval_minutes,
        last_scraped_at,
        is_active: true,
    }
}

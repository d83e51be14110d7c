//! Rendering of consolidated alert messages.

use crate::utils::currency::format_price;
use courtwatch_sdk::formats;
use courtwatch_sdk::objects::AvailabilityEvent;
use std::collections::BTreeMap;
use std::fmt::Write;
use time::Date;

pub const SINGLE_SUBJECT: &str = "🎾 Tennis Court Available!";
pub const MULTIPLE_SUBJECT: &str = "🎾 Multiple Tennis Courts Available!";
const FOOTER: &str = "⚡ These slots just became available - book quickly!";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub subject: String,
    pub body: String,
    /// Booking link of the first event.
    pub primary_link: Option<String>,
}

/// Render one message covering every event of a batch.
///
/// Quick booking links come first in arrival order; the details section is
/// grouped by venue and then by date.
pub fn render_batch(events: &[AvailabilityEvent]) -> RenderedMessage {
    let count = events.len();
    let subject = if count == 1 {
        SINGLE_SUBJECT
    } else {
        MULTIPLE_SUBJECT
    };

    let mut body = String::new();
    if count == 1 {
        body.push_str("🎾 A tennis court just became available!\n\n");
    } else {
        let _ = writeln!(body, "🎾 {count} tennis courts just became available!\n");
    }

    body.push_str("🔗 QUICK BOOKING LINKS:\n");
    for (i, event) in events.iter().enumerate() {
        let _ = writeln!(
            body,
            "  {}. {} {} {}: {}",
            i + 1,
            event.venue_name,
            event.court_name,
            time_span(event),
            event.booking_url
        );
    }

    let mut grouped: BTreeMap<&str, BTreeMap<Date, Vec<&AvailabilityEvent>>> = BTreeMap::new();
    for event in events {
        grouped
            .entry(event.venue_name.as_str())
            .or_default()
            .entry(event.date)
            .or_default()
            .push(event);
    }

    body.push_str("\n📋 COURT DETAILS:\n");
    for (venue, dates) in &grouped {
        let _ = writeln!(body, "\n🏟️ {venue}:");
        for (date, slots) in dates {
            let _ = writeln!(body, "  📅 {} ({}):", formats::format_date(*date), date.weekday());
            for event in slots {
                let _ = writeln!(
                    body,
                    "    • {}: {} ({})",
                    event.court_name,
                    time_span(event),
                    format_price(event.price, &event.currency)
                );
            }
        }
    }

    let _ = write!(body, "\n{FOOTER}\n");

    RenderedMessage {
        subject: subject.to_string(),
        body,
        primary_link: events.first().map(|event| event.booking_url.clone()),
    }
}

fn time_span(event: &AvailabilityEvent) -> String {
    format!(
        "{}-{}",
        formats::format_hhmm(event.start_time),
        formats::format_hhmm(event.end_time)
    )
}

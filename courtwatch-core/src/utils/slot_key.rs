//! Deterministic identifiers derived from slot observations.

use courtwatch_sdk::formats;
use courtwatch_sdk::objects::AvailabilityEvent;
use ring::digest;

/// Prefix of the broker key marking a recently published slot.
pub const SUPPRESSION_KEY_PREFIX: &str = "recent_slot:";

/// Normalize a court name into an identifier that is stable across scrapes.
///
/// The result is lowercase, drops a leading "court" word and collapses every
/// run of non-alphanumeric characters into one `_`. Names that normalize to
/// nothing fall back to the lowercased original.
pub fn court_id(court_name: &str) -> String {
    let lowered = court_name.trim().to_lowercase();
    let stripped = lowered
        .strip_prefix("court")
        .filter(|rest| rest.starts_with(|c: char| !c.is_alphanumeric()))
        .unwrap_or(&lowered);

    let mut id = String::with_capacity(stripped.len());
    let mut pending_sep = false;
    for c in stripped.chars() {
        if c.is_alphanumeric() {
            if pending_sep && !id.is_empty() {
                id.push('_');
            }
            pending_sep = false;
            id.push(c);
        } else {
            pending_sep = true;
        }
    }

    if id.is_empty() { lowered } else { id }
}

/// Broker key of the suppression marker for an event.
///
/// Two sightings share a key exactly when venue, court, date, start, end and
/// price all agree, so a price change is announced again.
pub fn suppression_key(event: &AvailabilityEvent) -> String {
    let material = format!(
        "{}|{}|{}|{}|{}|{}",
        event.venue_id,
        event.court_id,
        formats::format_date(event.date),
        formats::format_hhmm(event.start_time),
        formats::format_hhmm(event.end_time),
        event.price.normalize(),
    );
    let hash = digest::digest(&digest::SHA256, material.as_bytes());
    format!("{SUPPRESSION_KEY_PREFIX}{}", hex::encode(hash.as_ref()))
}

//! Preference matching.
//!
//! Pure and synchronous: no I/O, no clock reads. Callers pass the current
//! venue-local time in.

mod engine;
mod preferences;

pub use engine::{
    CheckOutcome, MatchDetails, MatchResult, evaluate, rank_matches, time_proximity_score,
};
pub use preferences::{Surface, TimeRange, UserPreferences, parse_weekday};

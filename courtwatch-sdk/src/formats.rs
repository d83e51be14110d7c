//! Calendar formats used on the wire.
//!
//! Dates travel as `YYYY-MM-DD`, times of day as 24-hour `HH:MM` and
//! instants as RFC 3339. The submodules are `#[serde(with = "...")]`
//! adapters for each of them.

use time::{Date, Month, Time};

/// Errors produced when a wire string is not a valid date or time.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("invalid date {0:?}, expected YYYY-MM-DD")]
    Date(String),
    #[error("invalid time {0:?}, expected HH:MM")]
    Time(String),
}

/// Parse a `YYYY-MM-DD` calendar date.
pub fn parse_date(value: &str) -> Result<Date, FormatError> {
    let invalid = || FormatError::Date(value.to_owned());
    let mut parts = value.trim().splitn(3, '-');
    let (Some(year), Some(month), Some(day)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(invalid());
    };
    let year: i32 = year.parse().map_err(|_| invalid())?;
    let month: u8 = month.parse().map_err(|_| invalid())?;
    let day: u8 = day.parse().map_err(|_| invalid())?;
    let month = Month::try_from(month).map_err(|_| invalid())?;
    Date::from_calendar_date(year, month, day).map_err(|_| invalid())
}

/// Format a calendar date as `YYYY-MM-DD`.
pub fn format_date(date: Date) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}

/// Parse an `HH:MM` time of day. A single-digit hour (`9:30`) is accepted.
pub fn parse_hhmm(value: &str) -> Result<Time, FormatError> {
    let invalid = || FormatError::Time(value.to_owned());
    let (hour, minute) = value.trim().split_once(':').ok_or_else(invalid)?;
    if hour.is_empty() || hour.len() > 2 || minute.len() != 2 {
        return Err(invalid());
    }
    let hour: u8 = hour.parse().map_err(|_| invalid())?;
    let minute: u8 = minute.parse().map_err(|_| invalid())?;
    Time::from_hms(hour, minute, 0).map_err(|_| invalid())
}

/// Format a time of day as `HH:MM`.
pub fn format_hhmm(time: Time) -> String {
    format!("{:02}:{:02}", time.hour(), time.minute())
}

pub mod date {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &time::Date, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_date(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<time::Date, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::parse_date(&s).map_err(serde::de::Error::custom)
    }
}

pub mod hhmm {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &time::Time, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_hhmm(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<time::Time, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::parse_hhmm(&s).map_err(serde::de::Error::custom)
    }
}

pub mod rfc3339 {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::OffsetDateTime;
    use time::format_description::well_known::Rfc3339;

    pub fn serialize<S: Serializer>(
        value: &OffsetDateTime,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let formatted = value.format(&Rfc3339).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&formatted)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<OffsetDateTime, D::Error> {
        let s = String::deserialize(deserializer)?;
        OffsetDateTime::parse(&s, &Rfc3339).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hhmm() {
        assert_eq!(parse_hhmm("09:00").unwrap(), Time::from_hms(9, 0, 0).unwrap());
        assert_eq!(parse_hhmm("9:30").unwrap(), Time::from_hms(9, 30, 0).unwrap());
        assert_eq!(parse_hhmm("23:59").unwrap(), Time::from_hms(23, 59, 0).unwrap());
        assert!(parse_hhmm("24:00").is_err());
        assert!(parse_hhmm("09:60").is_err());
        assert!(parse_hhmm("0900").is_err());
        assert!(parse_hhmm("9:5").is_err());
        assert!(parse_hhmm("").is_err());
    }

    #[test]
    fn test_parse_date() {
        let date = parse_date("2024-06-01").unwrap();
        assert_eq!(date.year(), 2024);
        assert_eq!(date.month(), Month::June);
        assert_eq!(date.day(), 1);
        assert!(parse_date("2024-02-30").is_err());
        assert!(parse_date("2024-13-01").is_err());
        assert!(parse_date("01/06/2024").is_err());
    }

    #[test]
    fn test_formatting_is_zero_padded() {
        let date = Date::from_calendar_date(2024, Month::March, 5).unwrap();
        assert_eq!(format_date(date), "2024-03-05");
        assert_eq!(format_hhmm(Time::from_hms(7, 5, 0).unwrap()), "07:05");
    }
}

use courtwatch_sdk::formats;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::{Time, Weekday};

/// Court surface, as far as it can be told from a court's name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Surface {
    Hard,
    Clay,
    Grass,
    Carpet,
    Indoor,
    Outdoor,
}

impl Surface {
    const KEYWORDS: [(&'static str, Surface); 6] = [
        ("hard", Surface::Hard),
        ("clay", Surface::Clay),
        ("grass", Surface::Grass),
        ("carpet", Surface::Carpet),
        ("indoor", Surface::Indoor),
        ("outdoor", Surface::Outdoor),
    ];

    /// First surface keyword found in the court name, if any.
    pub fn infer(court_name: &str) -> Option<Surface> {
        let name = court_name.to_lowercase();
        Self::KEYWORDS
            .iter()
            .find(|(keyword, _)| name.contains(keyword))
            .map(|(_, surface)| *surface)
    }
}

impl std::fmt::Display for Surface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Surface::Hard => "hard",
            Surface::Clay => "clay",
            Surface::Grass => "grass",
            Surface::Carpet => "carpet",
            Surface::Indoor => "indoor",
            Surface::Outdoor => "outdoor",
        };
        f.write_str(name)
    }
}

/// An inclusive time-of-day window such as `09:00-11:00`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    #[serde(with = "formats::hhmm")]
    pub start: Time,
    #[serde(with = "formats::hhmm")]
    pub end: Time,
}

impl TimeRange {
    /// Minutes between `at` and the nearest edge of the range, or zero when
    /// `at` lies inside it.
    pub fn distance_minutes(&self, at: Time) -> i64 {
        if at < self.start {
            (self.start - at).whole_minutes()
        } else if at > self.end {
            (at - self.end).whole_minutes()
        } else {
            0
        }
    }
}

impl std::fmt::Display for TimeRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}-{}",
            formats::format_hhmm(self.start),
            formats::format_hhmm(self.end)
        )
    }
}

/// What a user wants to be alerted about.
///
/// Stored as a JSON document per user. Every field is optional; an empty
/// list or missing limit means "no restriction".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserPreferences {
    /// Venue ids or names the user wants. Empty means any venue.
    pub preferred_venues: Vec<String>,
    /// Venue ids or names the user never wants. Wins over `preferred_venues`.
    pub excluded_venues: Vec<String>,
    pub weekday_times: Vec<TimeRange>,
    pub weekend_times: Vec<TimeRange>,
    #[serde(with = "weekday_names")]
    pub preferred_days: Vec<Weekday>,
    /// Zero or negative is treated as unset.
    pub max_price: Option<Decimal>,
    pub preferred_surfaces: Vec<Surface>,
    pub preferred_duration_minutes: Option<u32>,
    pub min_advance_hours: Option<u32>,
    pub max_advance_days: Option<u32>,
}

impl UserPreferences {
    /// The price ceiling, if one is really set.
    pub fn price_ceiling(&self) -> Option<Decimal> {
        self.max_price.filter(|max| max.is_sign_positive() && !max.is_zero())
    }

    /// Time ranges applicable to a weekend or weekday slot.
    pub fn time_ranges(&self, weekend: bool) -> &[TimeRange] {
        if weekend {
            &self.weekend_times
        } else {
            &self.weekday_times
        }
    }
}

/// Parse a weekday from its English name or three-letter abbreviation.
pub fn parse_weekday(name: &str) -> Option<Weekday> {
    let day = match name.trim().to_lowercase().as_str() {
        "monday" | "mon" => Weekday::Monday,
        "tuesday" | "tue" => Weekday::Tuesday,
        "wednesday" | "wed" => Weekday::Wednesday,
        "thursday" | "thu" => Weekday::Thursday,
        "friday" | "fri" => Weekday::Friday,
        "saturday" | "sat" => Weekday::Saturday,
        "sunday" | "sun" => Weekday::Sunday,
        _ => return None,
    };
    Some(day)
}

/// Lowercase weekday names on the wire: `["saturday", "sunday"]`.
mod weekday_names {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::Weekday;

    pub fn serialize<S: Serializer>(days: &[Weekday], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(days.iter().map(|day| day.to_string().to_lowercase()))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Weekday>, D::Error> {
        Vec::<String>::deserialize(deserializer)?
            .iter()
            .map(|name| {
                super::parse_weekday(name)
                    .ok_or_else(|| serde::de::Error::custom(format!("unknown weekday {name:?}")))
            })
            .collect()
    }
}

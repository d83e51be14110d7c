//! Scoring of one availability event against one user's preferences.
//!
//! The engine runs a fixed, ordered list of checks. Each check yields a
//! [`CheckOutcome`] and the outcomes are folded into a [`MatchResult`]:
//! any `Fail` makes the result a non-match, `Adjust` multiplies the score,
//! `Bonus` adds to it. The score starts at 100 and is clamped to `0..=100`.

use super::preferences::{Surface, UserPreferences};
use courtwatch_sdk::formats;
use courtwatch_sdk::objects::AvailabilityEvent;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use time::PrimitiveDateTime;

/// Minutes outside a preferred range after which a slot no longer counts.
const TIME_TOLERANCE_MINUTES: i64 = 30;
/// Best score an out-of-range start can get; it decays to zero at the tolerance.
const NEAR_MISS_CEILING: f64 = 80.0;
/// Prices at or below this share of the ceiling earn [`DEAL_BONUS`].
const DEAL_THRESHOLD: Decimal = Decimal::from_parts(7, 0, 0, false, 1);
const DEAL_BONUS: f64 = 10.0;
const SURFACE_PENALTY: f64 = 0.9;
const DURATION_TOLERANCE_MINUTES: i64 = 15;

/// Result of a single check.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckOutcome {
    /// The check holds, optionally with something worth reporting.
    Pass(Option<String>),
    /// A hard constraint is violated.
    Fail(String),
    /// Soft preference: multiply the score by `factor`.
    Adjust { factor: f64, reason: String },
    /// Add `points` to the score.
    Bonus { points: f64, reason: String },
}

/// Per-dimension figures behind a [`MatchResult`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchDetails {
    pub time_score: Option<f64>,
    pub price_score: Option<f64>,
    pub surface: Option<Surface>,
    pub duration_minutes: i64,
    pub lead_time_hours: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    /// True when every hard check passed.
    pub matches: bool,
    /// 0 to 100. Always 0 for a non-match.
    pub score: f64,
    pub reasons: Vec<String>,
    pub failure_reasons: Vec<String>,
    pub details: MatchDetails,
}

impl MatchResult {
    /// One-line description for logs.
    pub fn summary(&self) -> String {
        if self.matches {
            format!("match (score {:.0}): {}", self.score, self.reasons.join("; "))
        } else {
            format!("no match: {}", self.failure_reasons.join("; "))
        }
    }
}

struct MatchInput<'a> {
    event: &'a AvailabilityEvent,
    prefs: &'a UserPreferences,
    now: PrimitiveDateTime,
}

type Check = fn(&MatchInput<'_>, &mut MatchDetails) -> CheckOutcome;

const CHECKS: [Check; 7] = [
    check_venue,
    check_time_of_day,
    check_day_of_week,
    check_price,
    check_surface,
    check_duration,
    check_advance_window,
];

/// Evaluate `event` against `prefs`.
///
/// `now` is the current wall-clock time in the venue's local context; it is
/// only used for the advance-booking window.
pub fn evaluate(
    event: &AvailabilityEvent,
    prefs: &UserPreferences,
    now: PrimitiveDateTime,
) -> MatchResult {
    let input = MatchInput { event, prefs, now };
    let mut details = MatchDetails {
        duration_minutes: event.duration_minutes(),
        ..Default::default()
    };
    let outcomes: Vec<CheckOutcome> = CHECKS
        .iter()
        .map(|check| check(&input, &mut details))
        .collect();
    fold_outcomes(outcomes, details)
}

fn fold_outcomes(outcomes: Vec<CheckOutcome>, details: MatchDetails) -> MatchResult {
    let mut result = MatchResult {
        matches: true,
        score: 100.0,
        reasons: Vec::new(),
        failure_reasons: Vec::new(),
        details,
    };
    for outcome in outcomes {
        match outcome {
            CheckOutcome::Pass(reason) => result.reasons.extend(reason),
            CheckOutcome::Fail(reason) => {
                result.matches = false;
                result.failure_reasons.push(reason);
            }
            CheckOutcome::Adjust { factor, reason } => {
                result.score *= factor;
                result.reasons.push(reason);
            }
            CheckOutcome::Bonus { points, reason } => {
                result.score += points;
                result.reasons.push(reason);
            }
        }
    }
    result.score = if result.matches {
        result.score.clamp(0.0, 100.0)
    } else {
        0.0
    };
    result
}

/// Events that match `prefs`, best score first, at most `limit` of them.
pub fn rank_matches<'a>(
    events: &'a [AvailabilityEvent],
    prefs: &UserPreferences,
    now: PrimitiveDateTime,
    limit: usize,
) -> Vec<(&'a AvailabilityEvent, MatchResult)> {
    let mut ranked: Vec<_> = events
        .iter()
        .map(|event| (event, evaluate(event, prefs, now)))
        .filter(|(_, result)| result.matches)
        .collect();
    ranked.sort_by(|(_, a), (_, b)| b.score.total_cmp(&a.score));
    ranked.truncate(limit);
    ranked
}

fn venue_listed(list: &[String], event: &AvailabilityEvent) -> bool {
    list.iter().any(|entry| {
        entry.eq_ignore_ascii_case(&event.venue_id) || entry.eq_ignore_ascii_case(&event.venue_name)
    })
}

fn check_venue(input: &MatchInput<'_>, _: &mut MatchDetails) -> CheckOutcome {
    let MatchInput { event, prefs, .. } = input;
    if venue_listed(&prefs.excluded_venues, event) {
        return CheckOutcome::Fail(format!("Venue {} is excluded", event.venue_name));
    }
    if prefs.preferred_venues.is_empty() {
        return CheckOutcome::Pass(None);
    }
    if venue_listed(&prefs.preferred_venues, event) {
        CheckOutcome::Pass(Some(format!("Preferred venue: {}", event.venue_name)))
    } else {
        CheckOutcome::Fail(format!(
            "Venue {} is not in preferred venues",
            event.venue_name
        ))
    }
}

/// Proximity of a start time to a range: 100 inside, decaying linearly from
/// [`NEAR_MISS_CEILING`] to 0 over [`TIME_TOLERANCE_MINUTES`] outside.
pub fn time_proximity_score(distance_minutes: i64) -> f64 {
    match distance_minutes {
        0 => 100.0,
        d if d >= TIME_TOLERANCE_MINUTES => 0.0,
        d => NEAR_MISS_CEILING * (TIME_TOLERANCE_MINUTES - d) as f64 / TIME_TOLERANCE_MINUTES as f64,
    }
}

fn check_time_of_day(input: &MatchInput<'_>, details: &mut MatchDetails) -> CheckOutcome {
    let event = input.event;
    let ranges = input.prefs.time_ranges(event.is_weekend());
    if ranges.is_empty() {
        return CheckOutcome::Pass(None);
    }
    let Some((best_range, best)) = ranges
        .iter()
        .map(|range| (range, time_proximity_score(range.distance_minutes(event.start_time))))
        .max_by(|(_, a), (_, b)| a.total_cmp(b))
    else {
        return CheckOutcome::Pass(None);
    };
    details.time_score = Some(best);
    let start = formats::format_hhmm(event.start_time);
    if best <= 0.0 {
        CheckOutcome::Fail(format!("Start time {start} is outside preferred times"))
    } else if best < 100.0 {
        CheckOutcome::Adjust {
            factor: best / 100.0,
            reason: format!("Start time {start} is close to preferred range {best_range}"),
        }
    } else {
        CheckOutcome::Pass(Some(format!(
            "Start time {start} within preferred range {best_range}"
        )))
    }
}

fn check_day_of_week(input: &MatchInput<'_>, _: &mut MatchDetails) -> CheckOutcome {
    let days = &input.prefs.preferred_days;
    if days.is_empty() {
        return CheckOutcome::Pass(None);
    }
    let weekday = input.event.weekday();
    if days.contains(&weekday) {
        CheckOutcome::Pass(Some(format!("Preferred day: {weekday}")))
    } else {
        CheckOutcome::Fail(format!("{weekday} is not a preferred day"))
    }
}

fn check_price(input: &MatchInput<'_>, details: &mut MatchDetails) -> CheckOutcome {
    let Some(max) = input.prefs.price_ceiling() else {
        return CheckOutcome::Pass(None);
    };
    let price = input.event.price;
    if price > max {
        return CheckOutcome::Fail(format!("Price {price:.2} exceeds max {max:.2}"));
    }
    details.price_score = ((max - price) / max * Decimal::ONE_HUNDRED).to_f64();
    if price <= max * DEAL_THRESHOLD {
        CheckOutcome::Bonus {
            points: DEAL_BONUS,
            reason: format!("Great price deal: {price:.2}"),
        }
    } else {
        CheckOutcome::Pass(Some(format!("Price {price:.2} within budget")))
    }
}

fn check_surface(input: &MatchInput<'_>, details: &mut MatchDetails) -> CheckOutcome {
    let surface = Surface::infer(&input.event.court_name);
    details.surface = surface;
    let preferred = &input.prefs.preferred_surfaces;
    match surface {
        _ if preferred.is_empty() => CheckOutcome::Pass(None),
        None => CheckOutcome::Pass(None),
        Some(surface) if preferred.contains(&surface) => {
            CheckOutcome::Pass(Some(format!("Preferred surface: {surface}")))
        }
        Some(surface) => CheckOutcome::Adjust {
            factor: SURFACE_PENALTY,
            reason: format!("Surface {surface} is not preferred"),
        },
    }
}

fn check_duration(input: &MatchInput<'_>, details: &mut MatchDetails) -> CheckOutcome {
    let Some(preferred) = input.prefs.preferred_duration_minutes.filter(|m| *m > 0) else {
        return CheckOutcome::Pass(None);
    };
    let diff = (details.duration_minutes - i64::from(preferred)).abs();
    if diff <= DURATION_TOLERANCE_MINUTES {
        return CheckOutcome::Pass(Some(format!(
            "Duration {} min suits preferred {preferred} min",
            details.duration_minutes
        )));
    }
    let factor = (100 - 2 * diff).max(0) as f64 / 100.0;
    CheckOutcome::Adjust {
        factor,
        reason: format!(
            "Duration {} min differs from preferred {preferred} min",
            details.duration_minutes
        ),
    }
}

fn check_advance_window(input: &MatchInput<'_>, details: &mut MatchDetails) -> CheckOutcome {
    let MatchInput { event, prefs, now } = input;
    let lead = PrimitiveDateTime::new(event.date, event.start_time) - *now;
    details.lead_time_hours = lead.whole_hours();

    if let Some(min_hours) = prefs
        .min_advance_hours
        .filter(|hours| lead < time::Duration::hours(i64::from(*hours)))
    {
        return CheckOutcome::Fail(format!(
            "Only {}h notice, at least {min_hours}h required",
            lead.whole_hours()
        ));
    }
    if let Some(max_days) = prefs
        .max_advance_days
        .filter(|days| lead > time::Duration::days(i64::from(*days)))
    {
        return CheckOutcome::Fail(format!(
            "{} days ahead, at most {max_days} days wanted",
            lead.whole_days()
        ));
    }
    CheckOutcome::Pass(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::TimeRange;
    use time::Weekday;

    fn hhmm(value: &str) -> time::Time {
        formats::parse_hhmm(value).unwrap()
    }

    fn victoria_park_event() -> AvailabilityEvent {
        AvailabilityEvent {
            venue_id: "VictoriaPark".to_string(),
            venue_name: "Victoria Park".to_string(),
            court_id: "1".to_string(),
            court_name: "Court 1".to_string(),
            date: formats::parse_date("2024-06-01").unwrap(),
            start_time: hhmm("09:00"),
            end_time: hhmm("10:00"),
            price: Decimal::new(1200, 2),
            currency: "GBP".to_string(),
            booking_url: "https://example.com/book".to_string(),
            discovered_at: time::OffsetDateTime::from_unix_timestamp(1_717_200_000).unwrap(),
            scrape_log_id: Some(1),
        }
    }

    fn victoria_park_prefs() -> UserPreferences {
        UserPreferences {
            preferred_venues: vec!["Victoria Park".to_string()],
            weekend_times: vec![TimeRange {
                start: hhmm("09:00"),
                end: hhmm("11:00"),
            }],
            max_price: Some(Decimal::new(1500, 2)),
            ..Default::default()
        }
    }

    /// Friday 2024-05-31 12:00, the day before the slot.
    fn now() -> PrimitiveDateTime {
        PrimitiveDateTime::new(formats::parse_date("2024-05-31").unwrap(), hhmm("12:00"))
    }

    #[test]
    fn test_victoria_park_matches_with_full_score() {
        let result = evaluate(&victoria_park_event(), &victoria_park_prefs(), now());
        assert!(result.matches, "{}", result.summary());
        assert_eq!(result.score, 100.0);
        assert!(result.failure_reasons.is_empty());
        assert_eq!(result.details.time_score, Some(100.0));
        assert_eq!(result.details.lead_time_hours, 21);
    }

    #[test]
    fn test_price_above_ceiling_fails() {
        let prefs = UserPreferences {
            max_price: Some(Decimal::new(1000, 2)),
            ..victoria_park_prefs()
        };
        let result = evaluate(&victoria_park_event(), &prefs, now());
        assert!(!result.matches);
        assert_eq!(result.score, 0.0);
        assert_eq!(result.failure_reasons.len(), 1);
    }

    #[test]
    fn test_each_hard_constraint_fails_on_its_own() {
        let base = victoria_park_prefs();
        let violations = [
            UserPreferences {
                excluded_venues: vec!["VictoriaPark".to_string()],
                ..base.clone()
            },
            UserPreferences {
                preferred_venues: vec!["Regent's Park".to_string()],
                ..base.clone()
            },
            UserPreferences {
                weekend_times: vec![TimeRange {
                    start: hhmm("18:00"),
                    end: hhmm("20:00"),
                }],
                ..base.clone()
            },
            UserPreferences {
                preferred_days: vec![Weekday::Monday, Weekday::Tuesday],
                ..base.clone()
            },
            UserPreferences {
                max_price: Some(Decimal::new(1199, 2)),
                ..base.clone()
            },
            UserPreferences {
                min_advance_hours: Some(48),
                ..base.clone()
            },
            UserPreferences {
                max_advance_days: Some(0),
                ..base.clone()
            },
        ];
        for prefs in violations {
            let result = evaluate(&victoria_park_event(), &prefs, now());
            assert!(!result.matches, "expected failure for {prefs:?}");
            assert_eq!(result.failure_reasons.len(), 1, "{:?}", result.failure_reasons);
        }
    }

    #[test]
    fn test_exclusion_wins_over_preference() {
        let prefs = UserPreferences {
            excluded_venues: vec!["victoria park".to_string()],
            ..victoria_park_prefs()
        };
        assert!(!evaluate(&victoria_park_event(), &prefs, now()).matches);
    }

    #[test]
    fn test_no_preferences_match_everything() {
        let result = evaluate(&victoria_park_event(), &UserPreferences::default(), now());
        assert!(result.matches);
        assert_eq!(result.score, 100.0);
    }

    #[test]
    fn test_weekday_ranges_do_not_apply_on_weekends() {
        let prefs = UserPreferences {
            weekday_times: vec![TimeRange {
                start: hhmm("18:00"),
                end: hhmm("20:00"),
            }],
            ..Default::default()
        };
        assert!(evaluate(&victoria_park_event(), &prefs, now()).matches);
    }

    #[test]
    fn test_near_miss_time_scales_score() {
        assert_eq!(time_proximity_score(0), 100.0);
        assert_eq!(time_proximity_score(15), 40.0);
        assert_eq!(time_proximity_score(30), 0.0);
        assert_eq!(time_proximity_score(90), 0.0);

        let prefs = UserPreferences {
            weekend_times: vec![TimeRange {
                start: hhmm("09:15"),
                end: hhmm("11:00"),
            }],
            ..Default::default()
        };
        let result = evaluate(&victoria_park_event(), &prefs, now());
        assert!(result.matches);
        assert!((result.score - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_best_range_wins() {
        let prefs = UserPreferences {
            weekend_times: vec![
                TimeRange {
                    start: hhmm("09:20"),
                    end: hhmm("10:00"),
                },
                TimeRange {
                    start: hhmm("08:00"),
                    end: hhmm("09:00"),
                },
            ],
            ..Default::default()
        };
        let result = evaluate(&victoria_park_event(), &prefs, now());
        assert_eq!(result.details.time_score, Some(100.0));
        assert_eq!(result.score, 100.0);
    }

    #[test]
    fn test_deal_bonus_is_capped() {
        let prefs = UserPreferences {
            max_price: Some(Decimal::new(20, 0)),
            ..Default::default()
        };
        let result = evaluate(&victoria_park_event(), &prefs, now());
        assert!(result.matches);
        assert_eq!(result.score, 100.0);
        assert!(result.reasons.iter().any(|r| r.starts_with("Great price deal")));
        assert_eq!(result.details.price_score, Some(40.0));
    }

    #[test]
    fn test_surface_mismatch_only_penalises() {
        let mut event = victoria_park_event();
        event.court_name = "Court 1 (Hard)".to_string();
        let prefs = UserPreferences {
            preferred_surfaces: vec![Surface::Clay],
            ..Default::default()
        };
        let result = evaluate(&event, &prefs, now());
        assert!(result.matches);
        assert!((result.score - 90.0).abs() < 1e-9);
        assert_eq!(result.details.surface, Some(Surface::Hard));
    }

    #[test]
    fn test_duration_difference_scales_score() {
        let within = UserPreferences {
            preferred_duration_minutes: Some(75),
            ..Default::default()
        };
        assert_eq!(evaluate(&victoria_park_event(), &within, now()).score, 100.0);

        let far = UserPreferences {
            preferred_duration_minutes: Some(90),
            ..Default::default()
        };
        let result = evaluate(&victoria_park_event(), &far, now());
        assert!(result.matches);
        assert!((result.score - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_rank_matches_orders_by_score() {
        let exact = victoria_park_event();
        let mut near = victoria_park_event();
        near.start_time = hhmm("08:50");
        near.end_time = hhmm("09:50");
        let mut expensive = victoria_park_event();
        expensive.price = Decimal::new(30, 0);

        let events = vec![near, expensive, exact.clone()];
        let ranked = rank_matches(&events, &victoria_park_prefs(), now(), 5);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].0, &exact);
        assert!(ranked[0].1.score > ranked[1].1.score);

        assert_eq!(rank_matches(&events, &victoria_park_prefs(), now(), 1).len(), 1);
    }
}

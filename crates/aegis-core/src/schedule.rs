//! Schedule expression interpretation.
//!
//! Only a small vocabulary is understood: `@hourly`, `@daily`, `@weekly` and
//! the minute-step form `*/N * * * *`. Anything else advances by one hour.

use chrono::{DateTime, Datelike, Duration, DurationRound, Utc};
use std::fmt;
use tracing::warn;

/// A parsed schedule expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schedule {
    /// Top of the next hour
    Hourly,
    /// Midnight UTC of the next day
    Daily,
    /// Midnight UTC of the next Monday
    Weekly,
    /// Every N minutes from the reference time
    EveryMinutes(u32),
    /// Not understood; runs one hour after the reference time
    Fallback(String),
}

impl Schedule {
    pub fn parse(expr: &str) -> Self {
        let trimmed = expr.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "@hourly" => return Schedule::Hourly,
            "@daily" => return Schedule::Daily,
            "@weekly" => return Schedule::Weekly,
            _ => {}
        }

        if let Some(step) = trimmed
            .split_whitespace()
            .next()
            .and_then(|field| field.strip_prefix("*/"))
        {
            if let Ok(minutes) = step.parse::<u32>() {
                if minutes > 0 {
                    return Schedule::EveryMinutes(minutes);
                }
            }
        }

        Schedule::Fallback(trimmed.to_string())
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, Schedule::Fallback(_))
    }

    /// Next run strictly after `from`
    pub fn next_after(&self, from: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Schedule::Hourly => truncate(from, Duration::hours(1)) + Duration::hours(1),
            Schedule::Daily => truncate(from, Duration::days(1)) + Duration::days(1),
            Schedule::Weekly => {
                let days_from_monday = from.weekday().num_days_from_monday() as i64;
                truncate(from, Duration::days(1)) + Duration::days(7 - days_from_monday)
            }
            Schedule::EveryMinutes(minutes) => from + Duration::minutes(*minutes as i64),
            Schedule::Fallback(_) => from + Duration::hours(1),
        }
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Schedule::Hourly => f.write_str("@hourly"),
            Schedule::Daily => f.write_str("@daily"),
            Schedule::Weekly => f.write_str("@weekly"),
            Schedule::EveryMinutes(n) => write!(f, "*/{} * * * *", n),
            Schedule::Fallback(expr) => f.write_str(expr),
        }
    }
}

fn truncate(from: DateTime<Utc>, unit: Duration) -> DateTime<Utc> {
    // Hour and day boundaries are always representable in UTC
    from.duration_trunc(unit).unwrap_or(from)
}

/// Compute when a job with `schedule` should next run after `from`
pub fn calculate_next_run(schedule: &str, from: DateTime<Utc>) -> DateTime<Utc> {
    let parsed = Schedule::parse(schedule);
    if !parsed.is_recognized() {
        warn!(
            "Unrecognized schedule expression '{}', next run in one hour",
            schedule
        );
    }
    parsed.next_after(from)
}

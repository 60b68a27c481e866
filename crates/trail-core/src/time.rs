//! Time expression parsing for event lookups.
//!
//! Accepts `now`, relative expressions such as `3 hours ago`, and absolute
//! timestamps. The current instant is always passed in so parsing stays
//! deterministic under test.

use std::sync::OnceLock;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use regex::Regex;

use crate::error::{Result, TrailError};

/// Naive date-time layouts tried after RFC 3339, all interpreted as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Fixed-length units used for relative expressions. Months are 30 days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
}

impl TimeUnit {
    fn parse(unit: &str) -> Option<Self> {
        match unit.trim_end_matches('s') {
            "second" => Some(TimeUnit::Second),
            "minute" => Some(TimeUnit::Minute),
            "hour" => Some(TimeUnit::Hour),
            "day" => Some(TimeUnit::Day),
            "week" => Some(TimeUnit::Week),
            "month" => Some(TimeUnit::Month),
            _ => None,
        }
    }

    pub fn millis(self) -> i64 {
        match self {
            TimeUnit::Second => 1_000,
            TimeUnit::Minute => 60 * 1_000,
            TimeUnit::Hour => 3_600 * 1_000,
            TimeUnit::Day => 86_400 * 1_000,
            TimeUnit::Week => 7 * 86_400 * 1_000,
            TimeUnit::Month => 30 * 86_400 * 1_000,
        }
    }
}

fn relative_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(\d+)\s+(seconds?|minutes?|hours?|days?|weeks?|months?)\s+ago$")
            .expect("relative time pattern is valid")
    })
}

/// Parse a time expression relative to `now`.
pub fn parse_time(input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let trimmed = input.trim();
    let lowered = trimmed.to_lowercase();

    if lowered == "now" {
        return Ok(now);
    }

    if let Some(captures) = relative_pattern().captures(&lowered) {
        let amount: i64 = captures[1]
            .parse()
            .map_err(|_| TrailError::InvalidTimeFormat(input.to_string()))?;
        let unit = TimeUnit::parse(&captures[2])
            .ok_or_else(|| TrailError::InvalidTimeFormat(input.to_string()))?;
        let offset = amount
            .checked_mul(unit.millis())
            .and_then(Duration::try_milliseconds)
            .ok_or_else(|| TrailError::InvalidTimeFormat(input.to_string()))?;
        return now
            .checked_sub_signed(offset)
            .ok_or_else(|| TrailError::InvalidTimeFormat(input.to_string()));
    }

    parse_absolute(trimmed).ok_or_else(|| TrailError::InvalidTimeFormat(input.to_string()))
}

fn parse_absolute(input: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(input) {
        return Some(parsed.with_timezone(&Utc));
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

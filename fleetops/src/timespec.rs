//! Parsing of durations (`15m`, `2day`) and relative timestamps (`-3d`, `+1h`, RFC 3339)

use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, Utc};
use regex::Regex;

const DELTA_PATTERN: &str = r"^(?P<sign>[+-]?)(?P<count>\d+)(?P<unit>d|day|days|h|hr|hrs|m|min|mins|s|sec|secs)$";

fn unit_duration(count: i64, unit: &str) -> Result<Duration> {
    let duration = match unit {
        "d" | "day" | "days" => Duration::try_days(count),
        "h" | "hr" | "hrs" => Duration::try_hours(count),
        "m" | "min" | "mins" => Duration::try_minutes(count),
        "s" | "sec" | "secs" => Duration::try_seconds(count),
        other => return Err(anyhow!("Unknown time unit '{}'", other)),
    };
    duration.ok_or_else(|| anyhow!("{}{} is out of range", count, unit))
}

/// Parse `N<unit>` into a duration; the sign, if any, is ignored
pub fn parse_duration(raw: &str) -> Result<Duration> {
    let (_, duration) = parse_signed(raw)?;
    Ok(duration)
}

fn parse_signed(raw: &str) -> Result<(bool, Duration)> {
    let pattern = Regex::new(DELTA_PATTERN)?;
    let captures = pattern
        .captures(raw.trim())
        .ok_or_else(|| anyhow!("Invalid time delta '{}', expected [+|-]N(d|h|m|s)", raw))?;

    let count: i64 = captures["count"]
        .parse()
        .map_err(|e| anyhow!("Invalid count in '{}': {}", raw, e))?;
    let duration = unit_duration(count, &captures["unit"])?;
    Ok((&captures["sign"] == "+", duration))
}

/// Resolve a relative delta against `now`, or parse an absolute RFC 3339 timestamp
///
/// Unsigned deltas point into the past: `3d` is three days ago.
pub fn parse_timestamp(raw: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    if let Ok((forward, duration)) = parse_signed(raw) {
        return Ok(if forward { now + duration } else { now - duration });
    }

    DateTime::parse_from_rfc3339(raw.trim())
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| anyhow!("Invalid timestamp '{}': {}", raw, e))
}

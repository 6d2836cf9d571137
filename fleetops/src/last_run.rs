//! Freshness of `last run` marker files written by periodic jobs

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use std::fmt;

use crate::timespec;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastRunCheck {
    pub path: String,
    pub last_run: NaiveDateTime,
    pub age: Duration,
    pub threshold: Duration,
}

impl LastRunCheck {
    pub fn is_stale(&self) -> bool {
        self.age > self.threshold
    }
}

impl fmt::Display for LastRunCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Last run {} for {} is {} second(s) ago",
            self.last_run,
            self.path,
            self.age.num_seconds()
        )
    }
}

pub fn parse_marker(content: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(content.trim(), TIMESTAMP_FORMAT)
        .map_err(|e| anyhow!("Invalid last run timestamp '{}': {}", content.trim(), e))
}

/// Markers hold UTC wall-clock time
pub async fn check(path: &str, threshold: &str, now: DateTime<Utc>) -> Result<LastRunCheck> {
    let threshold = timespec::parse_duration(threshold)?;
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path))?;
    let last_run = parse_marker(&content)?;

    Ok(LastRunCheck {
        path: path.to_string(),
        last_run,
        age: now.naive_utc() - last_run,
        threshold,
    })
}

/// Split a `{file} {threshold}` line
pub fn parse_line(line: &str) -> Result<(String, String)> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    match parts.as_slice() {
        [path, threshold] => Ok((path.to_string(), threshold.to_string())),
        _ => Err(anyhow!("Invalid line '{}', expected '{{file}} {{threshold}}'", line.trim())),
    }
}

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetentionState {
    NotRipe,
    Archivable,
    /// Old enough to be reaped, provided an archive exists
    ArchivedExpired,
}

/// Age thresholds, fixed at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    ripe_age: Duration,
    reap_age: Duration,
}

impl RetentionPolicy {
    pub fn new(ripe_age: Duration, reap_age: Duration, reap_floor: Duration) -> Result<Self, ConfigError> {
        if ripe_age < Duration::zero() {
            return Err(ConfigError::InvalidValue {
                field: "ripe_age".to_string(),
                reason: format!("must not be negative, got {} days", ripe_age.num_days()),
            });
        }
        if reap_age < Duration::zero() {
            return Err(ConfigError::InvalidValue {
                field: "reap_age".to_string(),
                reason: format!("must not be negative, got {} days", reap_age.num_days()),
            });
        }
        if reap_age < ripe_age {
            return Err(ConfigError::InvalidValue {
                field: "reap_age".to_string(),
                reason: format!(
                    "{} days is shorter than the ripe age of {} days",
                    reap_age.num_days(),
                    ripe_age.num_days()
                ),
            });
        }
        if reap_age < reap_floor {
            return Err(ConfigError::BelowSafetyFloor {
                field: "reap_age".to_string(),
                days: reap_age.num_days(),
                floor_days: reap_floor.num_days(),
            });
        }
        Ok(Self { ripe_age, reap_age })
    }

    pub fn from_days(ripe_days: i64, reap_days: i64, floor_days: i64) -> Result<Self, ConfigError> {
        Self::new(
            days("ripe_age", ripe_days)?,
            days("reap_age", reap_days)?,
            days("reap_floor", floor_days)?,
        )
    }

    pub fn ripe_age(&self) -> Duration {
        self.ripe_age
    }

    pub fn reap_age(&self) -> Duration {
        self.reap_age
    }

    /// Partition dates count from midnight UTC
    pub fn classify(&self, now: DateTime<Utc>, timestamp: NaiveDate) -> RetentionState {
        let age = now - timestamp.and_time(chrono::NaiveTime::MIN).and_utc();

        if age < self.ripe_age {
            RetentionState::NotRipe
        } else if age < self.reap_age {
            RetentionState::Archivable
        } else {
            RetentionState::ArchivedExpired
        }
    }
}

fn days(field: &str, n: i64) -> Result<Duration, ConfigError> {
    Duration::try_days(n).ok_or_else(|| ConfigError::InvalidValue {
        field: field.to_string(),
        reason: format!("{} days is out of range", n),
    })
}

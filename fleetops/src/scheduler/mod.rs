//! Cron scheduling of fleet tasks
//!
//! Uses 6-field cron expressions (sec min hour day month dow). Schedules come from the task
//! sections of `config/main.toml`:
//!
//! ```toml
//! [logs]
//! bucket = "balanced.log"
//! schedule = "0 30 * * * *"      # hourly at half past
//!
//! [search_index]
//! optimize_schedule = "0 0 11 * * *"
//! purge_schedule = "0 0 11 * * *"
//!
//! [geoip]
//! schedule = "0 0 4 7 * *"       # 7th of every month at 04:00
//! ```

pub mod jobs;
pub use jobs::TaskScheduler;

use anyhow::{anyhow, Result};

/// Check a schedule before handing it to the scheduler
pub fn validate_6_field_cron(schedule: &str) -> Result<()> {
    let parts: Vec<&str> = schedule.split_whitespace().collect();

    if parts.len() != 6 {
        return Err(anyhow!(
            "tokio-cron-scheduler requires exactly 6 fields: second minute hour day month dayofweek. Got {} fields: '{}'",
            parts.len(),
            schedule
        ));
    }

    validate_cron_field(parts[0], "second", 0, 59)?;
    validate_cron_field(parts[1], "minute", 0, 59)?;
    validate_cron_field(parts[2], "hour", 0, 23)?;
    validate_cron_field(parts[3], "day", 1, 31)?;
    validate_cron_field(parts[4], "month", 1, 12)?;
    validate_cron_field(parts[5], "dayofweek", 0, 7)?;
    Ok(())
}

fn validate_cron_field(field: &str, name: &str, min: u32, max: u32) -> Result<()> {
    if field == "*" || field == "?" {
        return Ok(());
    }

    if let Some(step_str) = field.strip_prefix("*/") {
        let step = step_str
            .parse::<u32>()
            .map_err(|_| anyhow!("Invalid {} step value: {}", name, step_str))?;
        if step == 0 {
            return Err(anyhow!("{} step value cannot be 0", name));
        }
        return Ok(());
    }

    if field.contains(',') {
        for part in field.split(',') {
            validate_cron_field(part, name, min, max)?;
        }
        return Ok(());
    }

    if let Some((start, end)) = field.split_once('-') {
        let start = start
            .parse::<u32>()
            .map_err(|_| anyhow!("Invalid {} range start: {}", name, start))?;
        let end = end
            .parse::<u32>()
            .map_err(|_| anyhow!("Invalid {} range end: {}", name, end))?;
        if start < min || end > max || start > end {
            return Err(anyhow!(
                "{} range {}-{} is outside valid range {}-{}",
                name,
                start,
                end,
                min,
                max
            ));
        }
        return Ok(());
    }

    let value = field
        .parse::<u32>()
        .map_err(|_| anyhow!("Invalid {} value: {}", name, field))?;
    if value < min || value > max {
        return Err(anyhow!(
            "{} value {} is outside valid range {}-{}",
            name,
            value,
            min,
            max
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::schedules;

    #[test]
    fn default_schedules_are_valid() {
        for schedule in [
            schedules::LOGS_ARCHIVE,
            schedules::INDEX_OPTIMIZE,
            schedules::INDEX_PURGE,
            schedules::GEOIP_UPDATE,
        ] {
            assert!(validate_6_field_cron(schedule).is_ok(), "{}", schedule);
        }
    }

    #[test]
    fn five_field_crontab_is_rejected() {
        let err = validate_6_field_cron("30 * * * *").unwrap_err();
        assert!(err.to_string().contains("exactly 6 fields"));
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        assert!(validate_6_field_cron("0 60 * * * *").is_err());
        assert!(validate_6_field_cron("0 0 25 * * *").is_err());
        assert!(validate_6_field_cron("0 0 1-30 * * *").is_err());
        assert!(validate_6_field_cron("0 */0 * * * *").is_err());
        assert!(validate_6_field_cron("0 0,15,30,45 * * * 1-5").is_ok());
    }
}

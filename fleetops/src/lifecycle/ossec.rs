//! Rotated OSSEC logs: `{base}/.../{YYYY}/{Mon}/ossec-{name}-{DD}.log.gz`

use async_trait::async_trait;
use chrono::NaiveDate;
use regex::Regex;
use std::sync::Arc;
use tracing::debug;

use super::{LogPartition, PartitionScanner};
use crate::errors::LifecycleError;
use crate::exec::{basename, dirname, shell_quote, CommandExecutor};

const ROTATED_LOG_PATTERN: &str = r"^(?P<name>ossec-\w+?)-(?P<day>\d{2})\.log\.gz$";

pub struct RotatedLogScanner {
    executor: Arc<dyn CommandExecutor>,
    pattern: Regex,
}

impl RotatedLogScanner {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Result<Self, LifecycleError> {
        let pattern = Regex::new(ROTATED_LOG_PATTERN).map_err(|e| LifecycleError::Scan {
            path: ROTATED_LOG_PATTERN.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self { executor, pattern })
    }

    /// Partition for one file path, `None` when it is not a rotated log
    pub fn parse(&self, path: &str) -> Option<LogPartition> {
        let file = basename(path);
        let captures = self.pattern.captures(file)?;
        let name = captures.name("name")?.as_str();
        let day = captures.name("day")?.as_str();

        let month_dir = dirname(path);
        let month = basename(month_dir);
        let year = basename(dirname(month_dir));

        // `2024/Jan/05` only, so no two files share an archive name
        let date = format!("{}/{}/{}", year, month, day);
        let timestamp = NaiveDate::parse_from_str(&date, "%Y/%b/%d").ok()?;
        if timestamp.format("%Y/%b/%d").to_string() != date {
            return None;
        }

        Some(LogPartition::rotated(
            self.executor.host(),
            &format!("{}.log.gz", name),
            timestamp,
            path,
        ))
    }
}

#[async_trait]
impl PartitionScanner for RotatedLogScanner {
    async fn scan(&self, base_path: &str) -> Result<Vec<LogPartition>, LifecycleError> {
        debug!("getting rotated ossec logs in {}", base_path);

        let listing = self
            .executor
            .run_checked(&format!("find {} -type f", shell_quote(base_path)))
            .await
            .map_err(|e| LifecycleError::Scan {
                path: base_path.to_string(),
                reason: e.to_string(),
            })?;

        let mut partitions = Vec::new();
        for path in listing.lines().map(str::trim).filter(|l| !l.is_empty()) {
            match self.parse(path) {
                Some(partition) => {
                    debug!("{} is rotated ossec log, processing", path);
                    partitions.push(partition);
                }
                None => debug!("{} is not a rotated ossec log, skipping", path),
            }
        }

        partitions.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.archive_name.cmp(&b.archive_name))
        });
        Ok(partitions)
    }
}

use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{debug, warn};

use super::LogPartition;
use crate::errors::LifecycleError;
use crate::exec::{join_path, CommandExecutor};

/// Discovers the partitions below a base path
#[async_trait]
pub trait PartitionScanner: Send + Sync {
    /// Partitions sorted oldest first. Only a base path that cannot be read is an error.
    async fn scan(&self, base_path: &str) -> Result<Vec<LogPartition>, LifecycleError>;
}

/// Scanner for `{base}/{host}/{date}` directory trees
pub struct BucketedScanner {
    executor: Arc<dyn CommandExecutor>,
    timestamp_format: String,
}

impl BucketedScanner {
    pub fn new(executor: Arc<dyn CommandExecutor>, timestamp_format: &str) -> Self {
        Self {
            executor,
            timestamp_format: timestamp_format.to_string(),
        }
    }

    /// Only the canonical spelling of a date is a partition
    ///
    /// `2024-1-1` parses to the same day as `2024-01-01` and would share its archive name.
    fn parse_date(&self, name: &str) -> Result<NaiveDate, String> {
        let timestamp = NaiveDate::parse_from_str(name, &self.timestamp_format)
            .map_err(|e| format!("expected {}: {}", self.timestamp_format, e))?;
        let canonical = timestamp.format(&self.timestamp_format).to_string();
        if canonical != name {
            return Err(format!(
                "expected {}, written as {}",
                self.timestamp_format, canonical
            ));
        }
        Ok(timestamp)
    }
}

#[async_trait]
impl PartitionScanner for BucketedScanner {
    async fn scan(&self, base_path: &str) -> Result<Vec<LogPartition>, LifecycleError> {
        debug!("getting buckets in {} on {}", base_path, self.executor.host());

        let mut hosts = self
            .executor
            .list_directories(base_path)
            .await
            .map_err(|e| LifecycleError::Scan {
                path: base_path.to_string(),
                reason: e.to_string(),
            })?;
        hosts.sort();

        let mut partitions = Vec::new();
        for host in hosts {
            let host_path = join_path(base_path, &host);
            let dates = match self.executor.list_directories(&host_path).await {
                Ok(dates) => dates,
                Err(e) => {
                    warn!("Skipping host bucket {}: {}", host_path, e);
                    continue;
                }
            };

            for date in dates {
                let date_path = join_path(&host_path, &date);
                match self.parse_date(&date) {
                    Ok(timestamp) => {
                        partitions.push(LogPartition::bucketed(&host, timestamp, &date_path))
                    }
                    Err(reason) => {
                        let err = LifecycleError::Parse {
                            path: date_path,
                            reason,
                        };
                        warn!("{}", err);
                    }
                }
            }
        }

        partitions.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.host.cmp(&b.host))
        });
        Ok(partitions)
    }
}

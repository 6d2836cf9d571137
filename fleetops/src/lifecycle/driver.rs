use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::ops::AddAssign;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

use super::{ArchiveStore, LogPartition, PartitionScanner, RetentionPolicy, RetentionState};
use crate::errors::LifecycleError;

/// Counts of what one pass did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LifecycleReport {
    pub skipped: usize,
    pub archived: usize,
    pub removed: usize,
    pub errors: usize,
    /// Source paths of the partitions counted in `errors`
    pub failed: Vec<String>,
}

impl LifecycleReport {
    pub fn total(&self) -> usize {
        self.skipped + self.archived + self.removed + self.errors
    }
}

impl AddAssign for LifecycleReport {
    fn add_assign(&mut self, other: Self) {
        self.skipped += other.skipped;
        self.archived += other.archived;
        self.removed += other.removed;
        self.errors += other.errors;
        self.failed.extend(other.failed);
    }
}

impl fmt::Display for LifecycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} skipped, {} archived, {} removed, {} errors",
            self.skipped, self.archived, self.removed, self.errors
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Skipped,
    Archived,
    Removed,
}

/// Applies one retention policy to every partition a scanner finds
pub struct LifecycleDriver {
    scanner: Arc<dyn PartitionScanner>,
    archive_store: ArchiveStore,
    policy: RetentionPolicy,
}

impl LifecycleDriver {
    pub fn new(
        scanner: Arc<dyn PartitionScanner>,
        archive_store: ArchiveStore,
        policy: RetentionPolicy,
    ) -> Self {
        Self {
            scanner,
            archive_store,
            policy,
        }
    }

    pub fn policy(&self) -> &RetentionPolicy {
        &self.policy
    }

    /// One pass over `base_path`, oldest partition first
    ///
    /// Fails only when the store is unreachable or the base path cannot be scanned. Every
    /// other failure is counted against its partition and the pass continues.
    #[instrument(skip(self, now), fields(bucket = %self.archive_store.blobs().bucket()))]
    pub async fn run(&self, base_path: &str, now: DateTime<Utc>) -> Result<LifecycleReport, LifecycleError> {
        self.archive_store.check_connection().await?;

        let partitions = self.scanner.scan(base_path).await?;
        debug!("{} partitions under {}", partitions.len(), base_path);

        let mut name_counts: HashMap<&str, usize> = HashMap::new();
        for partition in &partitions {
            *name_counts.entry(partition.archive_name.as_str()).or_default() += 1;
        }

        let mut report = LifecycleReport::default();
        for partition in &partitions {
            let outcome = if name_counts[partition.archive_name.as_str()] > 1 {
                Err(LifecycleError::AmbiguousArchive {
                    path: partition.source_path.clone(),
                    archive_name: partition.archive_name.clone(),
                })
            } else {
                self.process(partition, now).await
            };
            match outcome {
                Ok(Action::Skipped) => report.skipped += 1,
                Ok(Action::Archived) => report.archived += 1,
                Ok(Action::Removed) => report.removed += 1,
                Err(e) if e.is_fatal() => {
                    error!("Aborting pass over {}: {}", base_path, e);
                    return Err(e);
                }
                Err(e) => {
                    error!("{}", e);
                    report.errors += 1;
                    report.failed.push(partition.source_path.clone());
                }
            }
        }

        info!("Finished {}: {}", base_path, report);
        Ok(report)
    }

    async fn process(&self, partition: &LogPartition, now: DateTime<Utc>) -> Result<Action, LifecycleError> {
        match self.policy.classify(now, partition.timestamp) {
            RetentionState::NotRipe => {
                debug!("{} is not ripe, skipping", partition.source_path);
                Ok(Action::Skipped)
            }
            RetentionState::Archivable => {
                if self.archive_store.is_archived(&partition.archive_name).await? {
                    debug!("{} already archived as {}", partition.source_path, partition.archive_name);
                    Ok(Action::Skipped)
                } else {
                    info!("archiving {} as {}", partition.source_path, partition.archive_name);
                    self.archive_store.archive(partition).await?;
                    Ok(Action::Archived)
                }
            }
            RetentionState::ArchivedExpired => {
                if self.archive_store.is_archived(&partition.archive_name).await? {
                    debug!("{} is expired, removing", partition.source_path);
                    self.archive_store.remove(partition).await?;
                    Ok(Action::Removed)
                } else {
                    // Removal waits for a later pass to see the archive
                    info!(
                        "archiving expired {} as {}",
                        partition.source_path, partition.archive_name
                    );
                    self.archive_store.archive(partition).await?;
                    Ok(Action::Archived)
                }
            }
        }
    }
}

use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{LogPartition, Packaging};
use crate::errors::{LifecycleError, StoreError};
use crate::exec::{basename, dirname, join_path, shell_quote, CommandExecutor};
use crate::storage::BlobStore;

/// Packaging, upload and local removal of partitions, keyed by archive name
pub struct ArchiveStore {
    executor: Arc<dyn CommandExecutor>,
    blobs: Arc<dyn BlobStore>,
    staging_dir: String,
}

impl ArchiveStore {
    pub fn new(executor: Arc<dyn CommandExecutor>, blobs: Arc<dyn BlobStore>, staging_dir: &str) -> Self {
        Self {
            executor,
            blobs,
            staging_dir: staging_dir.to_string(),
        }
    }

    pub fn blobs(&self) -> &Arc<dyn BlobStore> {
        &self.blobs
    }

    pub async fn check_connection(&self) -> Result<(), LifecycleError> {
        self.blobs
            .check_connection()
            .await
            .map_err(LifecycleError::StoreUnavailable)
    }

    /// Missing keys are `false`; anything else the store reports is fatal
    pub async fn is_archived(&self, archive_name: &str) -> Result<bool, LifecycleError> {
        self.blobs
            .exists(archive_name)
            .await
            .map_err(LifecycleError::StoreUnavailable)
    }

    pub async fn archive(&self, partition: &LogPartition) -> Result<(), LifecycleError> {
        match partition.packaging {
            Packaging::AsIs => {
                info!("uploading {} to {}", partition.source_path, partition.archive_name);
                self.upload(&partition.source_path, partition).await
            }
            Packaging::Tarball => {
                let staged = join_path(
                    &self.staging_dir,
                    &format!("{}.{}", partition.archive_name, Uuid::new_v4()),
                );
                let result = self.package_and_upload(partition, &staged).await;

                debug!("deleting archive {}", staged);
                if let Err(e) = self
                    .executor
                    .run_checked(&format!("rm -f {}", shell_quote(&staged)))
                    .await
                {
                    warn!("Failed to delete staged archive {}: {}", staged, e);
                }
                result
            }
        }
    }

    async fn package_and_upload(&self, partition: &LogPartition, staged: &str) -> Result<(), LifecycleError> {
        debug!("creating archive {} from {}", staged, partition.source_path);
        let command = format!(
            "tar -C {} -zcf {} {}",
            shell_quote(dirname(&partition.source_path)),
            shell_quote(staged),
            shell_quote(basename(&partition.source_path))
        );

        self.executor
            .run_checked(&command)
            .await
            .map_err(|e| LifecycleError::Packaging {
                partition: partition.source_path.clone(),
                reason: e.to_string(),
            })?;

        info!("uploading {} to {}", staged, partition.archive_name);
        self.upload(staged, partition).await
    }

    async fn upload(&self, local_path: &str, partition: &LogPartition) -> Result<(), LifecycleError> {
        self.blobs
            .put_file(local_path, &partition.archive_name)
            .await
            .map_err(|e: StoreError| LifecycleError::Packaging {
                partition: partition.source_path.clone(),
                reason: e.to_string(),
            })
    }

    /// Caller must have confirmed the archive exists in the same pass
    pub async fn remove(&self, partition: &LogPartition) -> Result<(), LifecycleError> {
        debug!("removing {}", partition.source_path);
        let flag = match partition.packaging {
            Packaging::Tarball => "-rf",
            Packaging::AsIs => "-f",
        };
        self.executor
            .run_checked(&format!("rm {} {}", flag, shell_quote(&partition.source_path)))
            .await
            .map(|_| ())
            .map_err(|e| LifecycleError::Removal {
                path: partition.source_path.clone(),
                reason: e.to_string(),
            })
    }
}

//! Blob storage capability
//!
//! Keys are always `{YYYYMMDD}_{identifier}.ext` (or `{YYYYMMDD_HHMMSS}.sql` for database
//! dumps). Single-object uploads go through [`BlobStore::put_file`], which stages the upload
//! under a temporary key and promotes it only once the transfer completed; multipart uploads
//! become visible only on completion. Either way a partially transferred object is never
//! addressable under its final key.

pub mod awscli;
pub mod local;
pub mod multipart;

pub use awscli::AwsCliStore;
pub use local::LocalDirStore;
pub use multipart::upload_in_parts;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::AwsCredentials;
use crate::errors::{ConfigError, StoreError};
use crate::exec::CommandExecutor;

/// Bucket targets with this scheme are served from a local directory
pub const LOCAL_STORE_SCHEME: &str = "file://";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectInfo {
    pub key: String,
    pub last_modified: DateTime<Utc>,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedPart {
    pub part_number: u32,
    pub etag: String,
}

/// Local paths passed to a store refer to the host the store's executor runs on.
#[async_trait]
pub trait BlobStore: Send + Sync {
    fn bucket(&self) -> &str;

    /// Fails with [`StoreError::Unavailable`] when the backend cannot be reached at all
    async fn check_connection(&self) -> Result<(), StoreError>;

    /// `Ok(false)` for a missing key; errors only for transport or auth failures
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    async fn list(&self, prefix: Option<&str>) -> Result<Vec<ObjectInfo>, StoreError>;

    async fn put_file(&self, local_path: &str, key: &str) -> Result<(), StoreError>;

    async fn get_file(&self, key: &str, local_path: &str) -> Result<(), StoreError>;

    async fn copy(&self, src_key: &str, dst_key: &str) -> Result<(), StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    async fn set_public_read(&self, key: &str) -> Result<(), StoreError>;

    async fn create_bucket(&self) -> Result<(), StoreError>;

    async fn create_multipart_upload(&self, key: &str) -> Result<String, StoreError>;

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: u32,
        local_path: &str,
    ) -> Result<CompletedPart, StoreError>;

    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<(), StoreError>;

    async fn abort_multipart_upload(&self, key: &str, upload_id: &str) -> Result<(), StoreError>;
}

/// Open `target` as a bucket name (AWS CLI through `executor`) or a `file://` directory
///
/// Credentials are only resolved for the AWS backend.
pub fn open_store<F>(
    target: &str,
    executor: Arc<dyn CommandExecutor>,
    credentials: F,
) -> Result<Arc<dyn BlobStore>, ConfigError>
where
    F: FnOnce() -> Result<AwsCredentials, ConfigError>,
{
    if let Some(root) = target.strip_prefix(LOCAL_STORE_SCHEME) {
        if root.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "bucket".to_string(),
                reason: "file:// target needs a directory".to_string(),
            });
        }
        return Ok(Arc::new(LocalDirStore::new(root)));
    }

    if target.trim().is_empty() {
        return Err(ConfigError::MissingRequired {
            field: "bucket".to_string(),
        });
    }

    Ok(Arc::new(AwsCliStore::new(target, executor, credentials()?)))
}

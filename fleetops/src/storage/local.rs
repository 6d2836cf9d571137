use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use uuid::Uuid;

use super::{BlobStore, CompletedPart, ObjectInfo};
use crate::constants;
use crate::errors::StoreError;

const MULTIPART_DIR: &str = ".multipart";

/// Bucket backed by a directory on the local filesystem
///
/// Keys map to files below the root. Uploads are written under `.staging/` and renamed into
/// place, multipart parts collect under `.multipart/{upload_id}/` until completion.
pub struct LocalDirStore {
    root: PathBuf,
    bucket: String,
}

impl LocalDirStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        let root = root.as_ref().to_path_buf();
        let bucket = root.to_string_lossy().to_string();
        Self { root, bucket }
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.root.join(key.trim_start_matches('/'))
    }

    fn upload_dir(&self, upload_id: &str) -> PathBuf {
        self.root.join(MULTIPART_DIR).join(upload_id)
    }

    fn failed(&self, key: &str, operation: &str, err: impl ToString) -> StoreError {
        StoreError::OperationFailed {
            bucket: self.bucket.clone(),
            key: key.to_string(),
            operation: operation.to_string(),
            reason: err.to_string(),
        }
    }

    async fn staging_path(&self, key: &str) -> Result<PathBuf, StoreError> {
        let staging_dir = self.root.join(constants::storage::STAGING_PREFIX);
        fs::create_dir_all(&staging_dir)
            .await
            .map_err(|e| self.failed(key, "stage", e))?;
        let flat = key.replace('/', "_");
        Ok(staging_dir.join(format!("{}.{}", flat, Uuid::new_v4())))
    }

    /// Rename a fully written staging file to its final key
    async fn publish(&self, staged: &Path, key: &str) -> Result<(), StoreError> {
        let target = self.key_path(key);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| self.failed(key, "publish", e))?;
        }
        if let Err(e) = fs::rename(staged, &target).await {
            let _ = fs::remove_file(staged).await;
            return Err(self.failed(key, "publish", e));
        }
        Ok(())
    }

    fn is_internal(relative: &str) -> bool {
        relative.starts_with(constants::storage::STAGING_PREFIX)
            || relative.starts_with(&format!("{}/", MULTIPART_DIR))
    }
}

#[async_trait]
impl BlobStore for LocalDirStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn check_connection(&self) -> Result<(), StoreError> {
        match fs::metadata(&self.root).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(StoreError::Unavailable {
                bucket: self.bucket.clone(),
                reason: "not a directory".to_string(),
            }),
            Err(e) => Err(StoreError::Unavailable {
                bucket: self.bucket.clone(),
                reason: e.to_string(),
            }),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        match fs::metadata(self.key_path(key)).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::Unavailable {
                bucket: self.bucket.clone(),
                reason: e.to_string(),
            }),
        }
    }

    async fn list(&self, prefix: Option<&str>) -> Result<Vec<ObjectInfo>, StoreError> {
        let mut objects = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = fs::read_dir(&dir)
                .await
                .map_err(|e| self.failed(prefix.unwrap_or(""), "list", e))?;

            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| self.failed(prefix.unwrap_or(""), "list", e))?
            {
                let path = entry.path();
                let meta = entry
                    .metadata()
                    .await
                    .map_err(|e| self.failed(prefix.unwrap_or(""), "list", e))?;

                if meta.is_dir() {
                    pending.push(path);
                    continue;
                }

                let relative = match path.strip_prefix(&self.root) {
                    Ok(rel) => rel.to_string_lossy().replace('\\', "/"),
                    Err(_) => continue,
                };
                if Self::is_internal(&relative) {
                    continue;
                }
                if let Some(prefix) = prefix {
                    if !relative.starts_with(prefix) {
                        continue;
                    }
                }

                let last_modified = meta
                    .modified()
                    .map(DateTime::<Utc>::from)
                    .unwrap_or_else(|_| Utc::now());
                objects.push(ObjectInfo {
                    key: relative,
                    last_modified,
                    size: meta.len(),
                });
            }
        }

        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }

    async fn put_file(&self, local_path: &str, key: &str) -> Result<(), StoreError> {
        let staged = self.staging_path(key).await?;
        debug!("staging {} as {}", local_path, staged.display());
        if let Err(e) = fs::copy(local_path, &staged).await {
            let _ = fs::remove_file(&staged).await;
            return Err(self.failed(key, "upload", e));
        }
        self.publish(&staged, key).await
    }

    async fn get_file(&self, key: &str, local_path: &str) -> Result<(), StoreError> {
        let source = self.key_path(key);
        if !self.exists(key).await? {
            return Err(StoreError::NotFound {
                bucket: self.bucket.clone(),
                key: key.to_string(),
            });
        }
        fs::copy(&source, local_path)
            .await
            .map(|_| ())
            .map_err(|e| self.failed(key, "download", e))
    }

    async fn copy(&self, src_key: &str, dst_key: &str) -> Result<(), StoreError> {
        if !self.exists(src_key).await? {
            return Err(StoreError::NotFound {
                bucket: self.bucket.clone(),
                key: src_key.to_string(),
            });
        }
        let source = self.key_path(src_key);
        self.put_file(&source.to_string_lossy(), dst_key).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.key_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.failed(key, "delete", e)),
        }
    }

    async fn set_public_read(&self, key: &str) -> Result<(), StoreError> {
        if self.exists(key).await? {
            Ok(())
        } else {
            Err(StoreError::NotFound {
                bucket: self.bucket.clone(),
                key: key.to_string(),
            })
        }
    }

    async fn create_bucket(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| self.failed("", "create-bucket", e))
    }

    async fn create_multipart_upload(&self, key: &str) -> Result<String, StoreError> {
        let upload_id = Uuid::new_v4().to_string();
        fs::create_dir_all(self.upload_dir(&upload_id))
            .await
            .map_err(|e| self.failed(key, "create-multipart-upload", e))?;
        Ok(upload_id)
    }

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: u32,
        local_path: &str,
    ) -> Result<CompletedPart, StoreError> {
        let dir = self.upload_dir(upload_id);
        if fs::metadata(&dir).await.is_err() {
            return Err(self.failed(key, "upload-part", format!("no upload {}", upload_id)));
        }
        fs::copy(local_path, dir.join(part_number.to_string()))
            .await
            .map_err(|e| self.failed(key, "upload-part", e))?;
        Ok(CompletedPart {
            part_number,
            etag: format!("{}-{}", upload_id, part_number),
        })
    }

    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<(), StoreError> {
        let dir = self.upload_dir(upload_id);
        let mut ordered: Vec<&CompletedPart> = parts.iter().collect();
        ordered.sort_by_key(|p| p.part_number);

        let staged = self.staging_path(key).await?;
        let mut out = fs::File::create(&staged)
            .await
            .map_err(|e| self.failed(key, "complete-multipart-upload", e))?;

        for part in ordered {
            let bytes = match fs::read(dir.join(part.part_number.to_string())).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    let _ = fs::remove_file(&staged).await;
                    return Err(self.failed(key, "complete-multipart-upload", e));
                }
            };
            if let Err(e) = out.write_all(&bytes).await {
                let _ = fs::remove_file(&staged).await;
                return Err(self.failed(key, "complete-multipart-upload", e));
            }
        }
        out.flush()
            .await
            .map_err(|e| self.failed(key, "complete-multipart-upload", e))?;
        drop(out);

        self.publish(&staged, key).await?;
        let _ = fs::remove_dir_all(&dir).await;
        Ok(())
    }

    async fn abort_multipart_upload(&self, key: &str, upload_id: &str) -> Result<(), StoreError> {
        match fs::remove_dir_all(self.upload_dir(upload_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.failed(key, "abort-multipart-upload", e)),
        }
    }
}

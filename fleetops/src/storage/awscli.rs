use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{BlobStore, CompletedPart, ObjectInfo};
use crate::config::AwsCredentials;
use crate::constants;
use crate::errors::StoreError;
use crate::exec::{shell_quote, CommandExecutor, CommandOutput};

/// stderr fragments meaning the backend itself is unusable, not just one object
const UNAVAILABLE_MARKERS: [&str; 8] = [
    "Could not connect",
    "Unable to locate credentials",
    "InvalidAccessKeyId",
    "SignatureDoesNotMatch",
    "ExpiredToken",
    "NoSuchBucket",
    "AccessDenied",
    "command not found",
];

const NOT_FOUND_MARKERS: [&str; 3] = ["404", "Not Found", "NoSuchKey"];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListObjectsOutput {
    #[serde(default)]
    contents: Vec<ListedObject>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListedObject {
    key: String,
    last_modified: DateTime<Utc>,
    #[serde(default)]
    size: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreateMultipartOutput {
    upload_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct UploadPartOutput {
    e_tag: String,
}

/// S3 bucket driven through the `aws` CLI on the executor's host
///
/// Running the CLI through the executor means uploads happen on the machine that owns the
/// files, whether that is the local box or a remote log host.
pub struct AwsCliStore {
    bucket: String,
    executor: Arc<dyn CommandExecutor>,
    credentials: AwsCredentials,
}

impl AwsCliStore {
    pub fn new(bucket: &str, executor: Arc<dyn CommandExecutor>, credentials: AwsCredentials) -> Self {
        Self {
            bucket: bucket.to_string(),
            executor,
            credentials,
        }
    }

    fn url(&self, key: &str) -> String {
        shell_quote(&format!("s3://{}/{}", self.bucket, key))
    }

    async fn aws(&self, args: &str) -> Result<CommandOutput, StoreError> {
        let command = format!("aws {}", args);
        self.executor
            .run_command_with_env(&command, &self.credentials.env_pairs())
            .await
            .map_err(|e| StoreError::Unavailable {
                bucket: self.bucket.clone(),
                reason: e.to_string(),
            })
    }

    fn failure(&self, key: &str, operation: &str, output: &CommandOutput) -> StoreError {
        let reason = if output.stderr.trim().is_empty() {
            format!("exit status {}", output.status)
        } else {
            output.stderr.trim().to_string()
        };

        if UNAVAILABLE_MARKERS.iter().any(|m| reason.contains(m)) {
            StoreError::Unavailable {
                bucket: self.bucket.clone(),
                reason,
            }
        } else if NOT_FOUND_MARKERS.iter().any(|m| reason.contains(m)) {
            StoreError::NotFound {
                bucket: self.bucket.clone(),
                key: key.to_string(),
            }
        } else {
            StoreError::OperationFailed {
                bucket: self.bucket.clone(),
                key: key.to_string(),
                operation: operation.to_string(),
                reason,
            }
        }
    }

    async fn aws_checked(&self, args: &str, key: &str, operation: &str) -> Result<String, StoreError> {
        let output = self.aws(args).await?;
        if output.success() {
            Ok(output.stdout)
        } else {
            Err(self.failure(key, operation, &output))
        }
    }

    fn parse_json<T: for<'de> Deserialize<'de>>(
        &self,
        raw: &str,
        key: &str,
        operation: &str,
    ) -> Result<T, StoreError> {
        serde_json::from_str(raw).map_err(|e| StoreError::OperationFailed {
            bucket: self.bucket.clone(),
            key: key.to_string(),
            operation: operation.to_string(),
            reason: format!("Failed to parse CLI output: {}", e),
        })
    }
}

#[async_trait]
impl BlobStore for AwsCliStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn check_connection(&self) -> Result<(), StoreError> {
        let output = self
            .aws(&format!("s3api head-bucket --bucket {}", shell_quote(&self.bucket)))
            .await?;
        if output.success() {
            debug!("Bucket {} reachable", self.bucket);
            Ok(())
        } else {
            Err(StoreError::Unavailable {
                bucket: self.bucket.clone(),
                reason: output.stderr.trim().to_string(),
            })
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        debug!("Is {} in bucket {}?", key, self.bucket);
        let output = self
            .aws(&format!(
                "s3api head-object --bucket {} --key {}",
                shell_quote(&self.bucket),
                shell_quote(key)
            ))
            .await?;

        if output.success() {
            return Ok(true);
        }
        match self.failure(key, "head-object", &output) {
            StoreError::NotFound { .. } => Ok(false),
            other => Err(other),
        }
    }

    async fn list(&self, prefix: Option<&str>) -> Result<Vec<ObjectInfo>, StoreError> {
        let mut args = format!(
            "s3api list-objects-v2 --bucket {} --output json",
            shell_quote(&self.bucket)
        );
        if let Some(prefix) = prefix {
            args.push_str(&format!(" --prefix {}", shell_quote(prefix)));
        }

        let stdout = self.aws_checked(&args, prefix.unwrap_or(""), "list").await?;
        if stdout.trim().is_empty() {
            return Ok(Vec::new());
        }

        let listed: ListObjectsOutput = self.parse_json(&stdout, prefix.unwrap_or(""), "list")?;
        Ok(listed
            .contents
            .into_iter()
            .filter(|o| !o.key.starts_with(constants::storage::STAGING_PREFIX))
            .map(|o| ObjectInfo {
                key: o.key,
                last_modified: o.last_modified,
                size: o.size,
            })
            .collect())
    }

    async fn put_file(&self, local_path: &str, key: &str) -> Result<(), StoreError> {
        let staging_key = format!(
            "{}{}.{}",
            constants::storage::STAGING_PREFIX,
            key,
            Uuid::new_v4()
        );

        info!("uploading {} to {} (staged as {})", local_path, key, staging_key);
        self.aws_checked(
            &format!(
                "s3 cp {} {} --only-show-errors",
                shell_quote(local_path),
                self.url(&staging_key)
            ),
            key,
            "upload",
        )
        .await?;

        let promoted = self
            .aws_checked(
                &format!(
                    "s3 mv {} {} --only-show-errors",
                    self.url(&staging_key),
                    self.url(key)
                ),
                key,
                "promote",
            )
            .await;

        if let Err(e) = promoted {
            warn!("Promotion of {} failed, dropping staged upload: {}", key, e);
            if let Err(cleanup) = self.delete(&staging_key).await {
                warn!("Failed to delete staged upload {}: {}", staging_key, cleanup);
            }
            return Err(e);
        }
        Ok(())
    }

    async fn get_file(&self, key: &str, local_path: &str) -> Result<(), StoreError> {
        debug!("downloading {} key {} to {}", self.bucket, key, local_path);
        self.aws_checked(
            &format!(
                "s3 cp {} {} --only-show-errors",
                self.url(key),
                shell_quote(local_path)
            ),
            key,
            "download",
        )
        .await
        .map(|_| ())
    }

    async fn copy(&self, src_key: &str, dst_key: &str) -> Result<(), StoreError> {
        self.aws_checked(
            &format!(
                "s3 cp {} {} --only-show-errors",
                self.url(src_key),
                self.url(dst_key)
            ),
            src_key,
            "copy",
        )
        .await
        .map(|_| ())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.aws_checked(
            &format!("s3 rm {} --only-show-errors", self.url(key)),
            key,
            "delete",
        )
        .await
        .map(|_| ())
    }

    async fn set_public_read(&self, key: &str) -> Result<(), StoreError> {
        self.aws_checked(
            &format!(
                "s3api put-object-acl --bucket {} --key {} --acl public-read",
                shell_quote(&self.bucket),
                shell_quote(key)
            ),
            key,
            "set-acl",
        )
        .await
        .map(|_| ())
    }

    async fn create_bucket(&self) -> Result<(), StoreError> {
        let output = self
            .aws(&format!("s3 mb {}", shell_quote(&format!("s3://{}", self.bucket))))
            .await?;
        if output.success() || output.stderr.contains("BucketAlreadyOwnedByYou") {
            Ok(())
        } else {
            Err(self.failure("", "create-bucket", &output))
        }
    }

    async fn create_multipart_upload(&self, key: &str) -> Result<String, StoreError> {
        let stdout = self
            .aws_checked(
                &format!(
                    "s3api create-multipart-upload --bucket {} --key {} --output json",
                    shell_quote(&self.bucket),
                    shell_quote(key)
                ),
                key,
                "create-multipart-upload",
            )
            .await?;
        let created: CreateMultipartOutput =
            self.parse_json(&stdout, key, "create-multipart-upload")?;
        Ok(created.upload_id)
    }

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: u32,
        local_path: &str,
    ) -> Result<CompletedPart, StoreError> {
        debug!("uploading part {} of {} from {}", part_number, key, local_path);
        let stdout = self
            .aws_checked(
                &format!(
                    "s3api upload-part --bucket {} --key {} --part-number {} --upload-id {} --body {} --output json",
                    shell_quote(&self.bucket),
                    shell_quote(key),
                    part_number,
                    shell_quote(upload_id),
                    shell_quote(local_path)
                ),
                key,
                "upload-part",
            )
            .await?;
        let uploaded: UploadPartOutput = self.parse_json(&stdout, key, "upload-part")?;
        Ok(CompletedPart {
            part_number,
            etag: uploaded.e_tag,
        })
    }

    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<(), StoreError> {
        let manifest = json!({
            "Parts": parts
                .iter()
                .map(|p| json!({"ETag": p.etag, "PartNumber": p.part_number}))
                .collect::<Vec<_>>()
        });
        self.aws_checked(
            &format!(
                "s3api complete-multipart-upload --bucket {} --key {} --upload-id {} --multipart-upload {}",
                shell_quote(&self.bucket),
                shell_quote(key),
                shell_quote(upload_id),
                shell_quote(&manifest.to_string())
            ),
            key,
            "complete-multipart-upload",
        )
        .await
        .map(|_| ())
    }

    async fn abort_multipart_upload(&self, key: &str, upload_id: &str) -> Result<(), StoreError> {
        self.aws_checked(
            &format!(
                "s3api abort-multipart-upload --bucket {} --key {} --upload-id {}",
                shell_quote(&self.bucket),
                shell_quote(key),
                shell_quote(upload_id)
            ),
            key,
            "abort-multipart-upload",
        )
        .await
        .map(|_| ())
    }
}

//! PostgreSQL dumps shipped to a bucket, with count-based reaping
//!
//! Every dump lands under `{YYYYMMDD_HHMMSS}.sql`. Dumps above the single-request ceiling are
//! split and sent as a multipart upload. After each upload the bucket is trimmed to the newest
//! `capacity` keys.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use std::str::FromStr;
use tracing::{debug, info, instrument, warn};

use crate::constants;
use crate::exec::{join_path, shell_quote, CommandExecutor};
use crate::storage::{multipart, BlobStore};

/// One `{bucket} {database} {user}` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupJob {
    pub bucket: String,
    pub database: String,
    pub user: String,
}

impl FromStr for BackupJob {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts.as_slice() {
            [bucket, database, user] => Ok(Self {
                bucket: bucket.to_string(),
                database: database.to_string(),
                user: user.to_string(),
            }),
            _ => Err(anyhow!(
                "Expected '{{bucket}} {{database}} {{user}}', got '{}'",
                line.trim()
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BackupOptions {
    /// Database server passed to `pg_dump --host`
    pub host: String,
    pub staging_dir: String,
    /// Concurrent part uploads; defaults to one worker per part
    pub workers: Option<usize>,
    pub capacity: usize,
    pub part_size: u64,
    pub dry: bool,
}

impl Default for BackupOptions {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            staging_dir: std::env::temp_dir().to_string_lossy().to_string(),
            workers: None,
            capacity: constants::backup::DEFAULT_CAPACITY_COUNT,
            part_size: constants::storage::MAX_UPLOAD_SIZE,
            dry: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupOutcome {
    pub key: String,
    /// 1 for a single-request upload
    pub parts: usize,
    pub reaped: Vec<String>,
}

pub fn dump_command(job: &BackupJob, host: &str, file: &str) -> String {
    format!(
        "pg_dump --format=custom --compress={} --file={} --user={} --host={} --exclude-table={} {}",
        constants::backup::COMPRESSION_LEVEL,
        shell_quote(file),
        shell_quote(&job.user),
        shell_quote(host),
        constants::backup::EXCLUDED_TABLE,
        shell_quote(&job.database)
    )
}

/// Dump, upload and reap one database; the local dump is removed on every path
#[instrument(skip(executor, store, options, now), fields(database = %job.database, bucket = %job.bucket))]
pub async fn backup_database(
    executor: &dyn CommandExecutor,
    store: &dyn BlobStore,
    job: &BackupJob,
    options: &BackupOptions,
    now: DateTime<Utc>,
) -> Result<BackupOutcome> {
    let timestamp = now.format(constants::backup::DUMP_DATE_FORMAT).to_string();
    let dump_path = join_path(&options.staging_dir, &format!("{}-{}.sql", job.database, timestamp));
    let key = format!("{}.sql", timestamp);

    let result = dump_and_upload(executor, store, job, options, &dump_path, &key).await;

    debug!("deleting dump {}", dump_path);
    if let Err(e) = executor
        .run_checked(&format!("rm -f {}", shell_quote(&dump_path)))
        .await
    {
        warn!("Failed to delete dump {}: {}", dump_path, e);
    }

    let parts = result?;
    let reaped = reap(store, options.capacity, options.dry).await?;
    Ok(BackupOutcome { key, parts, reaped })
}

async fn dump_and_upload(
    executor: &dyn CommandExecutor,
    store: &dyn BlobStore,
    job: &BackupJob,
    options: &BackupOptions,
    dump_path: &str,
    key: &str,
) -> Result<usize> {
    info!("dumping {} to {}", job.database, dump_path);
    executor
        .run_checked(&dump_command(job, &options.host, dump_path))
        .await
        .with_context(|| format!("Dump of {} failed", job.database))?;

    let size = file_size(executor, dump_path).await?;
    if size > options.part_size {
        let parts = multipart::part_count(size, options.part_size) as usize;
        let workers = options
            .workers
            .unwrap_or(parts)
            .clamp(1, constants::storage::MAX_UPLOAD_WORKERS);
        multipart::upload_in_parts(store, executor, dump_path, key, options.part_size, workers).await
    } else {
        info!("uploading {} to bucket {} as {}", dump_path, store.bucket(), key);
        store.put_file(dump_path, key).await?;
        Ok(1)
    }
}

async fn file_size(executor: &dyn CommandExecutor, path: &str) -> Result<u64> {
    let output = executor
        .run_checked(&format!("wc -c < {}", shell_quote(path)))
        .await?;
    output
        .trim()
        .parse()
        .map_err(|e| anyhow!("Unexpected size '{}' for {}: {}", output.trim(), path, e))
}

/// Keep the newest `capacity` keys by last modification; returns the keys deleted
///
/// With `dry` the keys are only logged.
pub async fn reap(store: &dyn BlobStore, capacity: usize, dry: bool) -> Result<Vec<String>> {
    let mut objects = store.list(None).await?;
    if objects.len() <= capacity {
        return Ok(Vec::new());
    }

    objects.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
    let expired: Vec<_> = objects.split_off(capacity);

    let mut reaped = Vec::with_capacity(expired.len());
    for object in expired {
        debug!(
            "deleting key {} last modified @ {} from bucket {}",
            object.key,
            object.last_modified,
            store.bucket()
        );
        if !dry {
            store.delete(&object.key).await?;
        }
        reaped.push(object.key);
    }
    Ok(reaped)
}

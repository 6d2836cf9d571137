use anyhow::{anyhow, Result};
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{BlobStore, CompletedPart};
use crate::exec::{shell_quote, CommandExecutor};

/// Number of `part_size` chunks a file of `size` bytes splits into
pub fn part_count(size: u64, part_size: u64) -> u64 {
    if part_size == 0 {
        return 1;
    }
    size.div_ceil(part_size).max(1)
}

/// Upload `local_path` as `key` in `part_size` chunks, `workers` parts at a time
///
/// The file is split next to itself on the executor's host. All parts are awaited before the
/// upload is completed; if any part failed the upload is aborted instead. Part files are
/// removed on every path. Returns the number of parts uploaded.
pub async fn upload_in_parts(
    store: &dyn BlobStore,
    executor: &dyn CommandExecutor,
    local_path: &str,
    key: &str,
    part_size: u64,
    workers: usize,
) -> Result<usize> {
    let prefix = format!("{}.part-{}.", local_path, Uuid::new_v4());
    let result = split_and_upload(store, executor, local_path, &prefix, key, part_size, workers).await;

    let cleanup = format!("rm -f {}*", shell_quote(&prefix));
    if let Err(e) = executor.run_checked(&cleanup).await {
        warn!("Failed to remove part files {}*: {}", prefix, e);
    }

    result
}

async fn split_and_upload(
    store: &dyn BlobStore,
    executor: &dyn CommandExecutor,
    local_path: &str,
    prefix: &str,
    key: &str,
    part_size: u64,
    workers: usize,
) -> Result<usize> {
    executor
        .run_checked(&format!(
            "split -b {} -d -a 4 {} {}",
            part_size,
            shell_quote(local_path),
            shell_quote(prefix)
        ))
        .await
        .map_err(|e| anyhow!("Failed to split {}: {}", local_path, e))?;

    let listing = executor
        .run_checked(&format!("ls -1 {}*", shell_quote(prefix)))
        .await
        .map_err(|e| anyhow!("Failed to list parts of {}: {}", local_path, e))?;

    let mut chunks: Vec<String> = listing
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect();
    chunks.sort();

    if chunks.is_empty() {
        return Err(anyhow!("Splitting {} produced no parts", local_path));
    }

    let upload_id = store.create_multipart_upload(key).await?;
    info!(
        "Uploading {} to {} in {} parts with {} workers",
        local_path,
        key,
        chunks.len(),
        workers.max(1)
    );

    let upload_id_ref = upload_id.as_str();
    let results: Vec<_> = stream::iter(chunks.iter().enumerate())
        .map(|(idx, chunk)| async move {
            let part_number = idx as u32 + 1;
            debug!("part {} <- {}", part_number, chunk);
            store
                .upload_part(key, upload_id_ref, part_number, chunk)
                .await
        })
        .buffer_unordered(workers.max(1))
        .collect()
        .await;

    let mut parts: Vec<CompletedPart> = Vec::with_capacity(results.len());
    let mut failures = Vec::new();
    for result in results {
        match result {
            Ok(part) => parts.push(part),
            Err(e) => failures.push(e.to_string()),
        }
    }

    if !failures.is_empty() {
        warn!("{} parts of {} failed, aborting upload", failures.len(), key);
        if let Err(e) = store.abort_multipart_upload(key, &upload_id).await {
            warn!("Failed to abort multipart upload {}: {}", upload_id, e);
        }
        return Err(anyhow!(
            "Multipart upload of {} failed: {}",
            key,
            failures.join("; ")
        ));
    }

    parts.sort_by_key(|p| p.part_number);
    store
        .complete_multipart_upload(key, &upload_id, &parts)
        .await?;
    Ok(parts.len())
}

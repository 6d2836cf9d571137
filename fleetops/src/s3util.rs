//! Line-oriented bucket operations behind `s3-util`
//!
//! Commands read key names (or `src dst` pairs) one per line, so they compose in a shell:
//!
//! ```text
//! s3-util list some.bucket --before 30d | s3-util delete some.bucket --verbose
//! ```

use anyhow::{anyhow, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use std::io::{BufRead, Write};
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

use crate::errors::StoreError;
use crate::exec::{basename, join_path};
use crate::storage::{BlobStore, ObjectInfo};

pub const DEFAULT_LIST_FORMAT: &str = "{name}";

#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub prefix: Option<String>,
    pub before: Option<DateTime<Utc>>,
    pub after: Option<DateTime<Utc>>,
}

impl ListFilter {
    fn accepts(&self, object: &ObjectInfo) -> bool {
        if let Some(after) = self.after {
            if object.last_modified < after {
                return false;
            }
        }
        if let Some(before) = self.before {
            if before < object.last_modified {
                return false;
            }
        }
        true
    }
}

/// Non-blank, trimmed input lines
pub fn read_lines<R: BufRead>(input: R) -> Result<Vec<String>> {
    let mut lines = Vec::new();
    for line in input.lines() {
        let line = line?;
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            lines.push(trimmed.to_string());
        }
    }
    Ok(lines)
}

/// Expand `{name}`/`{n}`, `{bucket}`/`{b}` and `{last_modified}`/`{modified}`/`{lm}`/`{m}`
pub fn format_object(format: &str, bucket: &str, object: &ObjectInfo) -> String {
    let modified = object
        .last_modified
        .to_rfc3339_opts(SecondsFormat::Millis, true);
    format
        .replace("{name}", &object.key)
        .replace("{n}", &object.key)
        .replace("{bucket}", bucket)
        .replace("{b}", bucket)
        .replace("{last_modified}", &modified)
        .replace("{modified}", &modified)
        .replace("{lm}", &modified)
        .replace("{m}", &modified)
}

pub async fn list(store: &dyn BlobStore, filter: &ListFilter, format: &str) -> Result<Vec<String>> {
    debug!(
        "listing bucket {} using prefix {:?}",
        store.bucket(),
        filter.prefix
    );
    let objects = store.list(filter.prefix.as_deref()).await?;
    Ok(objects
        .iter()
        .filter(|o| {
            let keep = filter.accepts(o);
            if !keep {
                debug!("discarding key {}", o.key);
            }
            keep
        })
        .map(|o| format_object(format, store.bucket(), o))
        .collect())
}

/// Fetch each key into `dir`, or stream it to `out` when no directory is given
pub async fn download<W: Write>(
    store: &dyn BlobStore,
    keys: &[String],
    dir: Option<&str>,
    dry: bool,
    out: &mut W,
) -> Result<usize> {
    for key in keys {
        if !store.exists(key).await? {
            return Err(StoreError::NotFound {
                bucket: store.bucket().to_string(),
                key: key.clone(),
            }
            .into());
        }
        if dry {
            debug!("would download {} key {}", store.bucket(), key);
            continue;
        }

        match dir {
            Some(dir) => {
                let path = join_path(dir, key);
                debug!("downloading {} key {} to {}", store.bucket(), key, path);
                store.get_file(key, &path).await?;
            }
            None => {
                debug!("downloading {} key {} to stdout", store.bucket(), key);
                let scratch = std::env::temp_dir().join(format!("s3-util-{}", Uuid::new_v4()));
                let scratch_path = scratch.to_string_lossy().to_string();
                let fetched = store.get_file(key, &scratch_path).await;
                let copied = match fetched {
                    Ok(()) => fs::read(&scratch)
                        .await
                        .map_err(anyhow::Error::from)
                        .and_then(|bytes| out.write_all(&bytes).map_err(anyhow::Error::from)),
                    Err(e) => Err(e.into()),
                };
                let _ = fs::remove_file(&scratch).await;
                copied?;
            }
        }
    }
    out.flush()?;
    Ok(keys.len())
}

pub async fn delete(store: &dyn BlobStore, keys: &[String], dry: bool) -> Result<usize> {
    for key in keys {
        debug!("delete {} key {}", store.bucket(), key);
        if !dry {
            store.delete(key).await?;
        }
    }
    Ok(keys.len())
}

/// Parse `src dst` lines; the error names the first malformed line (1-based)
pub fn parse_rename_pairs(lines: &[String]) -> Result<Vec<(String, String)>> {
    lines
        .iter()
        .enumerate()
        .map(|(idx, line)| {
            let parts: Vec<&str> = line.split_whitespace().collect();
            match parts.as_slice() {
                [src, dst] => Ok((src.to_string(), dst.to_string())),
                _ => Err(anyhow!(
                    "line #{} invalid, expecting source and destination key name pair",
                    idx + 1
                )),
            }
        })
        .collect()
}

/// Server-side copy to the new name, then delete the old one
pub async fn rename(store: &dyn BlobStore, lines: &[String], dry: bool) -> Result<usize> {
    let pairs = parse_rename_pairs(lines)?;
    for (src, dst) in &pairs {
        debug!("renaming {} key {} to {}", store.bucket(), src, dst);
        if !store.exists(src).await? {
            return Err(StoreError::NotFound {
                bucket: store.bucket().to_string(),
                key: src.clone(),
            }
            .into());
        }
        if !dry {
            store.copy(src, dst).await?;
            store.delete(src).await?;
        }
    }
    Ok(pairs.len())
}

/// `src [dst]`; the key defaults to the file name of `src`
pub fn parse_upload_line(line: &str) -> (String, String) {
    match line.trim().split_once(' ') {
        Some((src, dst)) if !dst.trim().is_empty() => (src.to_string(), dst.trim().to_string()),
        _ => {
            let src = line.trim().to_string();
            let dst = basename(&src).to_string();
            (src, dst)
        }
    }
}

pub async fn upload(
    store: &dyn BlobStore,
    lines: &[String],
    dry: bool,
    public: bool,
    create_bucket: bool,
) -> Result<usize> {
    if create_bucket && !dry {
        store.create_bucket().await?;
    }

    for line in lines {
        let (src, dst) = parse_upload_line(line);
        debug!("uploading {} {} key from {}", store.bucket(), dst, src);
        if dry {
            continue;
        }
        store.put_file(&src, &dst).await?;
        if public {
            store.set_public_read(&dst).await?;
        }
    }
    Ok(lines.len())
}

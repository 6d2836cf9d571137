//! Monthly refresh of the GeoLite city database mirrored in a bucket
//!
//! The bucket ends up holding the archive plus an `md5sums` file of `"{md5} {archive}"`.

use anyhow::{anyhow, Result};
use reqwest::Client;
use std::path::Path;
use tokio::fs;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::constants;
use crate::exec::{basename, shell_quote, CommandExecutor};
use crate::storage::BlobStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeoIpOutcome {
    pub archive_key: String,
    pub md5: String,
}

/// File name the archive is published under, taken from the URL path
pub fn archive_name(url: &str) -> Result<String> {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    let name = basename(without_query);
    if name.is_empty() || name.contains(':') {
        return Err(anyhow!("Cannot derive an archive name from {}", url));
    }
    Ok(name.to_string())
}

/// Download, checksum and publish; staging files are removed on every path
///
/// `executor` runs `md5sum` on the staging files and must be local to `staging_dir`.
#[instrument(skip(executor, store))]
pub async fn update(
    executor: &dyn CommandExecutor,
    store: &dyn BlobStore,
    url: &str,
    staging_dir: &str,
) -> Result<GeoIpOutcome> {
    let name = archive_name(url)?;
    let run_id = Uuid::new_v4();
    let archive_path = Path::new(staging_dir).join(format!("{}-{}", run_id, name));
    let md5sums_path = Path::new(staging_dir).join(format!(
        "{}-{}",
        run_id,
        constants::geoip::MD5SUMS_NAME
    ));

    let result = download_and_publish(executor, store, url, &name, &archive_path, &md5sums_path).await;

    info!("Cleaning up");
    for path in [&archive_path, &md5sums_path] {
        if let Err(e) = fs::remove_file(path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Unable to remove {}: {}", path.display(), e);
            }
        }
    }

    result
}

async fn download_and_publish(
    executor: &dyn CommandExecutor,
    store: &dyn BlobStore,
    url: &str,
    name: &str,
    archive_path: &Path,
    md5sums_path: &Path,
) -> Result<GeoIpOutcome> {
    let client = Client::builder()
        .connect_timeout(constants::http::CONNECT_TIMEOUT)
        .build()
        .map_err(|e| anyhow!("Failed to build HTTP client: {}", e))?;

    debug!("GET {}", url);
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| anyhow!("Unable to download database: {}", e))?;
    if !response.status().is_success() {
        return Err(anyhow!(
            "Unable to download database: HTTP {}",
            response.status()
        ));
    }
    let body = response
        .bytes()
        .await
        .map_err(|e| anyhow!("Unable to download database: {}", e))?;
    fs::write(archive_path, &body).await?;
    info!("Downloaded {} bytes to {}", body.len(), archive_path.display());

    let archive_local = archive_path.to_string_lossy().to_string();
    let output = executor
        .run_checked(&format!("md5sum {}", shell_quote(&archive_local)))
        .await?;
    let md5 = output
        .split_whitespace()
        .next()
        .ok_or_else(|| anyhow!("md5sum printed nothing for {}", archive_local))?
        .to_string();

    fs::write(md5sums_path, format!("{} {}", md5, name)).await?;

    store.put_file(&archive_local, name).await?;
    store
        .put_file(
            &md5sums_path.to_string_lossy(),
            constants::geoip::MD5SUMS_NAME,
        )
        .await?;

    Ok(GeoIpOutcome {
        archive_key: name.to_string(),
        md5,
    })
}

//! Search-index maintenance: segment merging and purging of daily log indexes
//!
//! Daily indexes are named `log-{YYYYMMDD}`, monthly dashboards `dash-log-{YYYYMM}`.

use anyhow::{anyhow, Result};
use chrono::{Duration, NaiveDate};
use reqwest::Client;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, error, info, instrument};

use crate::constants;
use crate::errors::ConfigError;

const MAX_NUM_SEGMENTS: u32 = 2;
const DAILY_PREFIX: &str = "log-";

#[derive(Debug, Deserialize)]
struct CatIndex {
    index: String,
}

/// Which indexes an optimize run merges
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptimizeTarget {
    /// Yesterday's daily index and its month's dashboard index
    Yesterday,
    /// Everything except today's indexes
    All,
    Index(String),
}

impl FromStr for OptimizeTarget {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim() {
            "" => Err(anyhow!("Empty optimize target")),
            "yesterday" => Ok(OptimizeTarget::Yesterday),
            "all" => Ok(OptimizeTarget::All),
            index => Ok(OptimizeTarget::Index(index.to_string())),
        }
    }
}

impl fmt::Display for OptimizeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptimizeTarget::Yesterday => write!(f, "yesterday"),
            OptimizeTarget::All => write!(f, "all"),
            OptimizeTarget::Index(name) => write!(f, "{}", name),
        }
    }
}

pub struct SearchIndexClient {
    base_url: String,
    client: Client,
}

impl SearchIndexClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(constants::http::INDEX_REQUEST_TIMEOUT)
            .connect_timeout(constants::http::CONNECT_TIMEOUT)
            .build()
            .map_err(|e| anyhow!("Failed to build HTTP client: {}", e))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub async fn list_indices(&self) -> Result<Vec<String>> {
        let url = format!("{}/_cat/indices?h=index&format=json", self.base_url);
        debug!("GET {}", url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| anyhow!("Failed to list indexes: {}", e))?;

        if !response.status().is_success() {
            return Err(anyhow!("Listing indexes failed with HTTP {}", response.status()));
        }

        let indices: Vec<CatIndex> = response
            .json()
            .await
            .map_err(|e| anyhow!("Failed to parse index listing: {}", e))?;
        let mut names: Vec<String> = indices.into_iter().map(|i| i.index).collect();
        names.sort();
        Ok(names)
    }

    pub async fn force_merge(&self, index: &str) -> Result<()> {
        let url = format!(
            "{}/{}/_forcemerge?max_num_segments={}",
            self.base_url, index, MAX_NUM_SEGMENTS
        );
        debug!("POSTing to {}", url);
        let response = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|e| anyhow!("Failed to optimize {}: {}", index, e))?;

        if !response.status().is_success() {
            return Err(anyhow!("Optimizing {} failed with HTTP {}", index, response.status()));
        }
        Ok(())
    }

    pub async fn delete_index(&self, index: &str) -> Result<()> {
        let url = format!("{}/{}", self.base_url, index);
        let response = self
            .client
            .delete(&url)
            .send()
            .await
            .map_err(|e| anyhow!("Failed to delete {}: {}", index, e))?;

        if !response.status().is_success() {
            return Err(anyhow!("Deleting {} failed with HTTP {}", index, response.status()));
        }
        Ok(())
    }

    /// Merge the indexes `target` selects; returns the names merged
    #[instrument(skip(self))]
    pub async fn optimize(&self, target: &OptimizeTarget, today: NaiveDate) -> Result<Vec<String>> {
        let indexes = match target {
            OptimizeTarget::Yesterday => {
                let yesterday = today - Duration::days(1);
                info!("Optimizing yesterday {} logs", yesterday);
                yesterday_indexes(yesterday)
            }
            OptimizeTarget::All => {
                let today_suffix = today.format("%Y%m%d").to_string();
                info!("Optimizing indexes of all but not today {}", today);
                self.list_indices()
                    .await?
                    .into_iter()
                    .filter(|index| !index.ends_with(&today_suffix))
                    .collect()
            }
            OptimizeTarget::Index(name) => {
                info!("Optimizing index {}", name);
                vec![name.clone()]
            }
        };

        for index in &indexes {
            self.force_merge(index).await?;
        }
        Ok(indexes)
    }

    /// Delete daily indexes older than `max_age_days`; returns the names deleted
    ///
    /// Every candidate is attempted. The run fails afterwards if any delete failed.
    #[instrument(skip(self))]
    pub async fn purge(&self, max_age_days: i64, today: NaiveDate) -> Result<Vec<String>> {
        let cutoff = purge_cutoff(max_age_days, today)?;
        let candidates: Vec<String> = self
            .list_indices()
            .await?
            .into_iter()
            .filter(|index| index.starts_with(DAILY_PREFIX) && *index < cutoff)
            .collect();

        let mut deleted = Vec::new();
        let mut failed = Vec::new();
        for index in candidates {
            info!("Deleting {} index", index);
            match self.delete_index(&index).await {
                Ok(()) => deleted.push(index),
                Err(e) => {
                    error!("Unable to delete {} index: {}", index, e);
                    failed.push(index);
                }
            }
        }

        if !failed.is_empty() {
            return Err(anyhow!(
                "Errors occurred while deleting indexes: {}",
                failed.join(", ")
            ));
        }
        Ok(deleted)
    }
}

pub fn yesterday_indexes(yesterday: NaiveDate) -> Vec<String> {
    vec![
        format!("{}{}", DAILY_PREFIX, yesterday.format("%Y%m%d")),
        format!("dash-{}{}", DAILY_PREFIX, yesterday.format("%Y%m")),
    ]
}

/// Daily indexes sorting below the returned name are old enough to purge
pub fn purge_cutoff(max_age_days: i64, today: NaiveDate) -> Result<String, ConfigError> {
    if max_age_days < constants::retention::INDEX_PURGE_FLOOR_DAYS {
        return Err(ConfigError::BelowSafetyFloor {
            field: "max_age_days".to_string(),
            days: max_age_days,
            floor_days: constants::retention::INDEX_PURGE_FLOOR_DAYS,
        });
    }
    let oldest_kept = Duration::try_days(max_age_days)
        .and_then(|age| today.checked_sub_signed(age))
        .ok_or_else(|| ConfigError::InvalidValue {
            field: "max_age_days".to_string(),
            reason: format!("{} days is out of range", max_age_days),
        })?;
    Ok(format!("{}{}", DAILY_PREFIX, oldest_kept.format("%Y%m%d")))
}

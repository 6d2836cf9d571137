use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// How a partition's source is turned into an uploadable artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Packaging {
    /// Directory packed into a gzip tarball
    Tarball,
    /// Single file uploaded unchanged
    AsIs,
}

/// One `{host}/{date}` unit of logs, valid for a single lifecycle pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogPartition {
    pub host: String,
    pub timestamp: NaiveDate,
    pub source_path: String,
    pub archive_name: String,
    pub packaging: Packaging,
}

impl LogPartition {
    /// A date directory of bucketed logs, archived as `{YYYYMMDD}_{host}.tar.gz`
    pub fn bucketed(host: &str, timestamp: NaiveDate, source_path: &str) -> Self {
        Self {
            host: host.to_string(),
            timestamp,
            source_path: source_path.to_string(),
            archive_name: archive_name(host, timestamp),
            packaging: Packaging::Tarball,
        }
    }

    /// An already compressed file, archived as `{YYYYMMDD}_{identifier}`
    pub fn rotated(host: &str, identifier: &str, timestamp: NaiveDate, source_path: &str) -> Self {
        Self {
            host: host.to_string(),
            timestamp,
            source_path: source_path.to_string(),
            archive_name: format!("{}_{}", timestamp.format("%Y%m%d"), identifier),
            packaging: Packaging::AsIs,
        }
    }
}

pub fn archive_name(host: &str, timestamp: NaiveDate) -> String {
    format!("{}_{}.tar.gz", timestamp.format("%Y%m%d"), host)
}

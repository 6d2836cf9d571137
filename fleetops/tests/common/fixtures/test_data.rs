//! Log trees and common values for lifecycle tests

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const HOST_A: &str = "host-a";
pub const HOST_B: &str = "host-b";

/// Midday, so day arithmetic never lands on a boundary
pub fn utc(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap()
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

/// `{base}/{host}/{YYYY-MM-DD}/` directories with a log file in each
pub struct LogTree {
    pub dir: TempDir,
}

impl LogTree {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("temp log tree"),
        }
    }

    pub fn base(&self) -> &str {
        self.dir.path().to_str().unwrap()
    }

    pub fn partition_path(&self, host: &str, day: NaiveDate) -> PathBuf {
        self.dir
            .path()
            .join(host)
            .join(day.format("%Y-%m-%d").to_string())
    }

    pub fn add_partition(&self, host: &str, day: NaiveDate) -> PathBuf {
        let path = self.partition_path(host, day);
        std::fs::create_dir_all(&path).expect("create partition");
        std::fs::write(
            path.join("syslog.log"),
            format!("{} {} kernel: started\n", day, host),
        )
        .expect("write log");
        path
    }

    /// Directory under a host whose name is not a date
    pub fn add_raw_dir(&self, host: &str, name: &str) -> PathBuf {
        let path = self.dir.path().join(host).join(name);
        std::fs::create_dir_all(&path).expect("create dir");
        path
    }

    pub fn add_file(&self, relative: &str, body: &[u8]) -> PathBuf {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent");
        }
        std::fs::write(&path, body).expect("write file");
        path
    }

    pub fn exists(&self, host: &str, day: NaiveDate) -> bool {
        self.partition_path(host, day).exists()
    }
}

/// Names of the regular files directly under `dir`
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .filter(|e| e.path().is_file())
                .filter_map(|e| e.file_name().to_str().map(String::from))
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

pub mod credentials;
pub mod manager;

pub use credentials::AwsCredentials;
pub use manager::ConfigManager;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::constants;

/// Contents of `config/main.toml` plus the hosts collected from the other files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub aws_credentials_file: Option<String>,
    #[serde(default = "default_region")]
    pub aws_region: String,
    #[serde(default = "default_staging_dir")]
    pub staging_dir: String,
    pub logs: Option<LogsTaskConfig>,
    pub search_index: Option<SearchIndexConfig>,
    pub geoip: Option<GeoIpConfig>,
    // Populated from individual host config files
    #[serde(skip)]
    pub hosts: HashMap<String, HostConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfigFile {
    pub host: HostConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    pub address: String,
    #[serde(default = "default_agent_port")]
    pub agent_port: u16,
    pub api_key: String,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    // Overrides the task-wide log paths for this host
    pub log_paths: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogsTaskConfig {
    pub bucket: String,
    #[serde(default = "default_log_paths")]
    pub paths: Vec<String>,
    #[serde(default = "default_ripe_days")]
    pub ripe_days: i64,
    #[serde(default = "default_reap_days")]
    pub reap_days: i64,
    #[serde(default = "default_log_role")]
    pub host_role: String,
    #[serde(default = "default_partition_format")]
    pub timestamp_format: String,
    #[serde(default = "default_logs_schedule")]
    pub schedule: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchIndexConfig {
    #[serde(default = "default_index_url")]
    pub base_url: String,
    #[serde(default = "default_optimize_schedule")]
    pub optimize_schedule: String,
    #[serde(default = "default_purge_schedule")]
    pub purge_schedule: String,
    #[serde(default = "default_purge_max_age")]
    pub purge_max_age_days: i64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoIpConfig {
    #[serde(default = "default_geoip_url")]
    pub url: String,
    #[serde(default = "default_geoip_bucket")]
    pub bucket: String,
    #[serde(default = "default_geoip_schedule")]
    pub schedule: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl Config {
    /// Hosts carrying `role`, ordered by name
    pub fn hosts_with_role(&self, role: &str) -> Vec<(&String, &HostConfig)> {
        let mut hosts: Vec<_> = self
            .hosts
            .iter()
            .filter(|(_, host)| host.roles.iter().any(|r| r == role))
            .collect();
        hosts.sort_by(|a, b| a.0.cmp(b.0));
        hosts
    }
}

fn default_region() -> String {
    constants::storage::DEFAULT_REGION.to_string()
}

fn default_staging_dir() -> String {
    std::env::temp_dir().to_string_lossy().to_string()
}

fn default_agent_port() -> u16 {
    constants::agent::DEFAULT_PORT
}

fn default_request_timeout() -> u64 {
    constants::http::AGENT_REQUEST_TIMEOUT.as_secs()
}

fn default_log_paths() -> Vec<String> {
    vec![constants::retention::DEFAULT_LOG_PATH.to_string()]
}

fn default_ripe_days() -> i64 {
    constants::retention::BUCKETED_RIPE_DAYS
}

fn default_reap_days() -> i64 {
    constants::retention::BUCKETED_REAP_DAYS
}

fn default_log_role() -> String {
    constants::agent::DEFAULT_LOG_ROLE.to_string()
}

fn default_partition_format() -> String {
    constants::retention::PARTITION_DATE_FORMAT.to_string()
}

fn default_logs_schedule() -> String {
    constants::schedules::LOGS_ARCHIVE.to_string()
}

fn default_index_url() -> String {
    "http://localhost:9200".to_string()
}

fn default_optimize_schedule() -> String {
    constants::schedules::INDEX_OPTIMIZE.to_string()
}

fn default_purge_schedule() -> String {
    constants::schedules::INDEX_PURGE.to_string()
}

fn default_purge_max_age() -> i64 {
    constants::retention::INDEX_PURGE_MAX_AGE_DAYS
}

fn default_geoip_url() -> String {
    constants::geoip::DATABASE_URL.to_string()
}

fn default_geoip_bucket() -> String {
    constants::geoip::BUCKET.to_string()
}

fn default_geoip_schedule() -> String {
    constants::schedules::GEOIP_UPDATE.to_string()
}

fn default_enabled() -> bool {
    true
}

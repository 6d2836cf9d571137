use super::{Config, HostConfigFile};
use crate::constants;
use crate::lifecycle::RetentionPolicy;
use anyhow::{anyhow, Result};
use glob::glob;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info};

pub struct ConfigManager {
    current_config: Arc<Config>,
}

impl ConfigManager {
    pub async fn new(config_dir: &str) -> Result<Self> {
        let config = Self::load_configuration(config_dir).await?;
        Self::validate(&config)?;
        Ok(Self {
            current_config: Arc::new(config),
        })
    }

    pub fn get_current_config(&self) -> Arc<Config> {
        self.current_config.clone()
    }

    async fn load_configuration(config_dir: &str) -> Result<Config> {
        let main_config_path = format!("{}/main.toml", config_dir);
        let main_config_content = fs::read_to_string(&main_config_path)
            .await
            .map_err(|e| anyhow!("Failed to read main config {}: {}", main_config_path, e))?;

        let mut config: Config = toml::from_str(&main_config_content)
            .map_err(|e| anyhow!("Failed to parse main config: {}", e))?;

        // Every other file describes one host, named after the file
        let pattern = format!("{}/*.toml", config_dir);
        let mut hosts = HashMap::new();

        for entry in glob(&pattern).map_err(|e| anyhow!("Glob pattern error: {}", e))? {
            let path = entry.map_err(|e| anyhow!("Glob entry error: {}", e))?;
            let filename = path
                .file_name()
                .and_then(|name| name.to_str())
                .ok_or_else(|| anyhow!("Invalid filename"))?;

            if filename == "main.toml" {
                continue;
            }

            let host_name = filename
                .strip_suffix(".toml")
                .ok_or_else(|| anyhow!("Invalid config filename: {}", filename))?;

            debug!("Loading host config: {}", path.display());

            let content = fs::read_to_string(&path)
                .await
                .map_err(|e| anyhow!("Failed to read {}: {}", path.display(), e))?;

            let host_file: HostConfigFile = toml::from_str(&content)
                .map_err(|e| anyhow!("Failed to parse {}: {}", path.display(), e))?;

            hosts.insert(host_name.to_string(), host_file.host);
        }

        config.hosts = hosts;

        info!(
            "Loaded {} hosts (logs task: {}, search index task: {}, geoip task: {})",
            config.hosts.len(),
            config.logs.is_some(),
            config.search_index.is_some(),
            config.geoip.is_some()
        );

        Ok(config)
    }

    /// Reject configurations that would be refused later, before anything runs
    pub fn validate(config: &Config) -> Result<()> {
        if let Some(logs) = &config.logs {
            if logs.bucket.trim().is_empty() {
                return Err(anyhow!("logs.bucket must not be empty"));
            }
            if logs.paths.is_empty() {
                return Err(anyhow!("logs.paths must list at least one base path"));
            }
            RetentionPolicy::from_days(
                logs.ripe_days,
                logs.reap_days,
                constants::retention::BUCKETED_REAP_FLOOR_DAYS,
            )?;
        }

        if let Some(index) = &config.search_index {
            if index.purge_max_age_days < constants::retention::INDEX_PURGE_FLOOR_DAYS {
                return Err(anyhow!(
                    "search_index.purge_max_age_days must be at least {} days, got {}",
                    constants::retention::INDEX_PURGE_FLOOR_DAYS,
                    index.purge_max_age_days
                ));
            }
        }

        for (name, host) in &config.hosts {
            if host.api_key.trim().is_empty() {
                return Err(anyhow!("Host {} has an empty api_key", name));
            }
            if host.address.trim().is_empty() {
                return Err(anyhow!("Host {} has an empty address", name));
            }
        }

        Ok(())
    }
}

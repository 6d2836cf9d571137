//! Configuration directories for tests

use std::path::{Path, PathBuf};
use tempfile::TempDir;

use fleetops::config::{Config, ConfigManager};

/// Builds a `config/` directory with `main.toml` and one file per host
pub struct TestConfigBuilder {
    main: Vec<String>,
    hosts: Vec<(String, String)>,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        Self {
            main: Vec::new(),
            hosts: Vec::new(),
        }
    }

    pub fn with_logs(mut self, bucket: &str, ripe_days: i64, reap_days: i64) -> Self {
        self.main.push(format!(
            "[logs]\nbucket = \"{}\"\nripe_days = {}\nreap_days = {}\n",
            bucket, ripe_days, reap_days
        ));
        self
    }

    pub fn with_search_index(mut self, base_url: &str, purge_max_age_days: i64) -> Self {
        self.main.push(format!(
            "[search_index]\nbase_url = \"{}\"\npurge_max_age_days = {}\n",
            base_url, purge_max_age_days
        ));
        self
    }

    pub fn with_geoip(mut self, url: &str, bucket: &str) -> Self {
        self.main.push(format!(
            "[geoip]\nurl = \"{}\"\nbucket = \"{}\"\n",
            url, bucket
        ));
        self
    }

    /// Raw TOML appended to `main.toml`
    pub fn with_main_section(mut self, toml: &str) -> Self {
        self.main.push(toml.to_string());
        self
    }

    pub fn with_host(mut self, name: &str, address: &str, roles: &[&str]) -> Self {
        let roles = roles
            .iter()
            .map(|r| format!("\"{}\"", r))
            .collect::<Vec<_>>()
            .join(", ");
        self.hosts.push((
            name.to_string(),
            format!(
                "[host]\naddress = \"{}\"\napi_key = \"key-{}\"\nroles = [{}]\n",
                address, name, roles
            ),
        ));
        self
    }

    /// Host whose agent listens at `base_url` (`http://ip:port`)
    pub fn with_agent(mut self, name: &str, base_url: &str, roles: &[&str]) -> Self {
        let authority = base_url.trim_start_matches("http://").trim_end_matches('/');
        let (address, port) = authority.rsplit_once(':').expect("base url with port");
        let roles = roles
            .iter()
            .map(|r| format!("\"{}\"", r))
            .collect::<Vec<_>>()
            .join(", ");
        self.hosts.push((
            name.to_string(),
            format!(
                "[host]\naddress = \"{}\"\nagent_port = {}\napi_key = \"{}\"\nroles = [{}]\nrequest_timeout_seconds = 5\n",
                address,
                port,
                super::mock_agent::TEST_API_KEY,
                roles
            ),
        ));
        self
    }

    /// Write the files into a fresh temporary directory
    pub fn write(self) -> TempDir {
        let dir = TempDir::new().expect("temp config dir");
        self.write_to(dir.path());
        dir
    }

    pub fn write_to(self, dir: &Path) -> PathBuf {
        std::fs::write(dir.join("main.toml"), self.main.join("\n")).expect("write main.toml");
        for (name, body) in &self.hosts {
            std::fs::write(dir.join(format!("{}.toml", name)), body).expect("write host toml");
        }
        dir.to_path_buf()
    }

    /// Write and load through [`ConfigManager`]
    pub async fn load(self) -> (TempDir, anyhow::Result<Config>) {
        let dir = self.write();
        let result = ConfigManager::new(dir.path().to_str().unwrap())
            .await
            .map(|m| (*m.get_current_config()).clone());
        (dir, result)
    }
}

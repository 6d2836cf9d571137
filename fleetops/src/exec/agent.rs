use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

use super::{basename, shell_quote, CommandExecutor, CommandOutput};
use crate::config::HostConfig;
use crate::constants;
use crate::errors::ExecError;

/// Runs commands on a remote host through its command agent
///
/// The agent accepts `POST /command/execute` with `{"command": ...}` and a bearer token, and
/// answers `{"success": bool, "output": ..., "error": ...}`. A command that exits non-zero is
/// reported by the agent as `success: false`; that is surfaced as a [`CommandOutput`] with a
/// non-zero status, not as a transport error.
pub struct AgentExecutor {
    host: String,
    base_url: String,
    api_key: String,
    client: Client,
}

impl AgentExecutor {
    pub fn new(host: &str, config: &HostConfig) -> Result<Self, ExecError> {
        let base_url = format!("http://{}:{}", config.address, config.agent_port);
        Self::with_base_url(
            host,
            &base_url,
            &config.api_key,
            Duration::from_secs(config.request_timeout_seconds),
        )
    }

    pub fn with_base_url(
        host: &str,
        base_url: &str,
        api_key: &str,
        timeout: Duration,
    ) -> Result<Self, ExecError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(constants::http::CONNECT_TIMEOUT)
            .build()
            .map_err(|e| ExecError::AgentUnavailable {
                host: host.to_string(),
                reason: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            host: host.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client,
        })
    }

    async fn execute(&self, command: &str) -> Result<CommandOutput, ExecError> {
        let url = format!("{}/command/execute", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&json!({ "command": command }))
            .send()
            .await
            .map_err(|e| ExecError::AgentUnavailable {
                host: self.host.clone(),
                reason: format!("HTTP request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ExecError::AgentUnavailable {
                host: self.host.clone(),
                reason: format!("status {}: {}", status, error_text),
            });
        }

        let result: Value = response
            .json()
            .await
            .map_err(|e| ExecError::InvalidResponse {
                host: self.host.clone(),
                reason: format!("Failed to parse response: {}", e),
            })?;

        let success = result
            .get("success")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        let output = result
            .get("output")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();

        if success {
            Ok(CommandOutput {
                status: 0,
                stdout: output,
                stderr: String::new(),
            })
        } else {
            let error_msg = result
                .get("error")
                .and_then(|v| v.as_str())
                .unwrap_or("Unknown error")
                .to_string();
            warn!("Command failed on {}: {}", self.host, error_msg.trim());
            Ok(CommandOutput {
                status: 1,
                stdout: output,
                stderr: error_msg,
            })
        }
    }
}

#[async_trait]
impl CommandExecutor for AgentExecutor {
    fn host(&self) -> &str {
        &self.host
    }

    async fn list_directories(&self, path: &str) -> Result<Vec<String>, ExecError> {
        let command = format!(
            "find {} -mindepth 1 -maxdepth 1 -type d",
            shell_quote(path.trim_end_matches('/'))
        );
        let output = self
            .execute(&command)
            .await?
            .into_result(&command)
            .map_err(|e| ExecError::ListFailed {
                path: path.to_string(),
                reason: e.to_string(),
            })?;

        Ok(output
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| basename(line).to_string())
            .collect())
    }

    async fn run_command_with_env(
        &self,
        command: &str,
        env: &[(String, String)],
    ) -> Result<CommandOutput, ExecError> {
        debug!("Executing command on {}: {}", self.host, command);

        if env.is_empty() {
            return self.execute(command).await;
        }

        let exports: Vec<String> = env
            .iter()
            .map(|(k, v)| format!("export {}={};", k, shell_quote(v)))
            .collect();
        self.execute(&format!("{} {}", exports.join(" "), command))
            .await
    }
}

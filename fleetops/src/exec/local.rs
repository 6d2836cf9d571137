use async_trait::async_trait;
use glob::glob;
use std::path::Path;
use tokio::process::Command as AsyncCommand;
use tracing::debug;

use super::{CommandExecutor, CommandOutput};
use crate::errors::ExecError;

/// Executes against the local filesystem and process table
#[derive(Debug, Clone)]
pub struct LocalExecutor {
    host: String,
}

impl LocalExecutor {
    pub fn new() -> Self {
        Self {
            host: "localhost".to_string(),
        }
    }
}

impl Default for LocalExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandExecutor for LocalExecutor {
    fn host(&self) -> &str {
        &self.host
    }

    async fn list_directories(&self, path: &str) -> Result<Vec<String>, ExecError> {
        if !Path::new(path).is_dir() {
            return Err(ExecError::ListFailed {
                path: path.to_string(),
                reason: "not a directory".to_string(),
            });
        }

        let escaped = glob::Pattern::escape(path.trim_end_matches('/'));
        let pattern = format!("{}/*", escaped);
        let entries = glob(&pattern).map_err(|e| ExecError::ListFailed {
            path: path.to_string(),
            reason: format!("Glob pattern error: {}", e),
        })?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| ExecError::ListFailed {
                path: path.to_string(),
                reason: format!("Glob entry error: {}", e),
            })?;
            if !entry.is_dir() {
                debug!("{} in {} is not a directory", entry.display(), path);
                continue;
            }
            if let Some(name) = entry.file_name().and_then(|n| n.to_str()) {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }

    async fn run_command_with_env(
        &self,
        command: &str,
        env: &[(String, String)],
    ) -> Result<CommandOutput, ExecError> {
        debug!("Executing command: {}", command);

        let output = AsyncCommand::new("sh")
            .arg("-c")
            .arg(command)
            .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .output()
            .await
            .map_err(|e| ExecError::SpawnFailed {
                command: command.to_string(),
                reason: e.to_string(),
            })?;

        Ok(CommandOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

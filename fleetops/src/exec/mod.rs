//! Command execution capability
//!
//! Every task reaches the filesystem and external tools (`tar`, `aws`, `pg_dump`, `split`)
//! through a [`CommandExecutor`]. Two implementations exist:
//!
//! ```text
//! LocalExecutor  → sh -c / local filesystem
//! AgentExecutor  → HTTP → command agent (port 8745) → sh -c on the host
//! ```
//!
//! Scanners and archive stores depend only on the trait, so the same lifecycle runs against
//! local disk or a remote host.

pub mod agent;
pub mod local;

pub use agent::AgentExecutor;
pub use local::LocalExecutor;

use async_trait::async_trait;

use crate::errors::ExecError;

/// Result of a finished command
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }

    /// Convert a non-zero exit into [`ExecError::CommandFailed`]
    pub fn into_result(self, command: &str) -> Result<String, ExecError> {
        if self.success() {
            Ok(self.stdout)
        } else {
            let stderr = if self.stderr.is_empty() {
                self.stdout
            } else {
                self.stderr
            };
            Err(ExecError::CommandFailed {
                command: command.to_string(),
                status: self.status,
                stderr,
            })
        }
    }
}

#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Name of the target host, for logging
    fn host(&self) -> &str;

    /// Names of the immediate subdirectories of `path`
    async fn list_directories(&self, path: &str) -> Result<Vec<String>, ExecError>;

    /// Run a shell command with extra environment variables
    async fn run_command_with_env(
        &self,
        command: &str,
        env: &[(String, String)],
    ) -> Result<CommandOutput, ExecError>;

    async fn run_command(&self, command: &str) -> Result<CommandOutput, ExecError> {
        self.run_command_with_env(command, &[]).await
    }

    /// Run a command and require a zero exit status
    async fn run_checked(&self, command: &str) -> Result<String, ExecError> {
        self.run_command(command).await?.into_result(command)
    }
}

/// Quote a value for safe interpolation into a `sh -c` command line
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Last path component of a `/`-separated path, ignoring trailing slashes
pub fn basename(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Parent of a `/`-separated path, `"."` when there is none
pub fn dirname(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) => "/",
        Some(idx) => &trimmed[..idx],
        None => ".",
    }
}

/// Join a directory and a name with exactly one separator
pub fn join_path(dir: &str, name: &str) -> String {
    format!("{}/{}", dir.trim_end_matches('/'), name)
}

//! Local executor with scripted responses and a fake `pg_dump`

use async_trait::async_trait;
use regex::Regex;
use std::sync::Mutex;

use fleetops::errors::ExecError;
use fleetops::exec::{CommandExecutor, CommandOutput, LocalExecutor};

/// Runs commands locally unless a rule intercepts them
///
/// Every command line is recorded, intercepted or not.
pub struct ScriptedExecutor {
    inner: LocalExecutor,
    responses: Vec<(String, CommandOutput)>,
    dump_body: Option<Vec<u8>>,
    commands: Mutex<Vec<String>>,
    envs: Mutex<Vec<Vec<(String, String)>>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self {
            inner: LocalExecutor::new(),
            responses: Vec::new(),
            dump_body: None,
            commands: Mutex::new(Vec::new()),
            envs: Mutex::new(Vec::new()),
        }
    }

    /// Commands containing `needle` exit with `status` without running
    pub fn fail_when(mut self, needle: &str, status: i32, stderr: &str) -> Self {
        self.responses.push((
            needle.to_string(),
            CommandOutput {
                status,
                stdout: String::new(),
                stderr: stderr.to_string(),
            },
        ));
        self
    }

    /// Commands containing `needle` succeed with `stdout` without running
    pub fn respond_when(mut self, needle: &str, stdout: &str) -> Self {
        self.responses.push((
            needle.to_string(),
            CommandOutput {
                status: 0,
                stdout: stdout.to_string(),
                stderr: String::new(),
            },
        ));
        self
    }

    /// `pg_dump` writes `body` to its `--file` argument
    pub fn with_pg_dump(mut self, body: &[u8]) -> Self {
        self.dump_body = Some(body.to_vec());
        self
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    /// Environment passed with each recorded command
    pub fn envs(&self) -> Vec<Vec<(String, String)>> {
        self.envs.lock().unwrap().clone()
    }

    pub fn commands_containing(&self, needle: &str) -> Vec<String> {
        self.commands()
            .into_iter()
            .filter(|c| c.contains(needle))
            .collect()
    }

    fn fake_pg_dump(&self, command: &str, body: &[u8]) -> CommandOutput {
        let file = Regex::new(r"--file='([^']+)'")
            .unwrap()
            .captures(command)
            .map(|c| c[1].to_string());
        match file {
            Some(file) => match std::fs::write(&file, body) {
                Ok(()) => CommandOutput::default(),
                Err(e) => CommandOutput {
                    status: 1,
                    stdout: String::new(),
                    stderr: e.to_string(),
                },
            },
            None => CommandOutput {
                status: 1,
                stdout: String::new(),
                stderr: "pg_dump: no --file".to_string(),
            },
        }
    }
}

#[async_trait]
impl CommandExecutor for ScriptedExecutor {
    fn host(&self) -> &str {
        self.inner.host()
    }

    async fn list_directories(&self, path: &str) -> Result<Vec<String>, ExecError> {
        self.inner.list_directories(path).await
    }

    async fn run_command_with_env(
        &self,
        command: &str,
        env: &[(String, String)],
    ) -> Result<CommandOutput, ExecError> {
        self.commands.lock().unwrap().push(command.to_string());
        self.envs.lock().unwrap().push(env.to_vec());

        // First matching rule wins
        if let Some((_, output)) = self
            .responses
            .iter()
            .find(|(needle, _)| command.contains(needle.as_str()))
        {
            return Ok(output.clone());
        }

        if let Some(body) = &self.dump_body {
            if command.starts_with("pg_dump ") {
                return Ok(self.fake_pg_dump(command, body));
            }
        }

        self.inner.run_command_with_env(command, env).await
    }
}

//! Shell command steps.
//!
//! A [`CommandStep`] runs one shell command against a [`CommandContext`].
//! Captured output is written back into the context so later steps see it
//! as an environment variable.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Instant;

use anyhow::Context as _;
use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::Cancelled;
use crate::retry::RetryPolicyConfiguration;

use super::Step;

/// Shared state for a run of command steps.
#[derive(Debug, Clone, Default)]
pub struct CommandContext {
    /// Variables passed to every command. Captures are added here.
    pub env: HashMap<String, String>,

    /// Working directory for commands (current directory if unset).
    pub working_dir: Option<PathBuf>,

    /// Shell used to run commands (`/bin/sh` or `cmd.exe` if unset).
    pub shell: Option<String>,
}

impl CommandContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the working directory.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Look up a variable.
    pub fn var(&self, key: &str) -> Option<&str> {
        self.env.get(key).map(String::as_str)
    }

    fn shell(&self) -> (String, &'static str) {
        if cfg!(target_os = "windows") {
            let shell = self
                .shell
                .clone()
                .or_else(|| std::env::var("COMSPEC").ok())
                .unwrap_or_else(|| "cmd.exe".to_string());
            (shell, "/C")
        } else {
            let shell = self.shell.clone().unwrap_or_else(|| "/bin/sh".to_string());
            (shell, "-c")
        }
    }
}

/// A command exited unsuccessfully.
#[derive(Debug, Clone, Error)]
#[error("Command failed with exit code {code:?}: {command}")]
pub struct CommandFailed {
    /// The command line.
    pub command: String,
    /// Exit code (None if killed by signal).
    pub code: Option<i32>,
    /// Captured standard error.
    pub stderr: String,
}

/// A step that runs a shell command.
#[derive(Debug, Clone)]
pub struct CommandStep {
    name: String,
    command: String,
    dependencies: Vec<String>,
    retry: Option<RetryPolicyConfiguration>,
    capture: Option<String>,
    env: HashMap<String, String>,
}

impl CommandStep {
    /// Create a step running `command`.
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            dependencies: Vec::new(),
            retry: None,
            capture: None,
            env: HashMap::new(),
        }
    }

    /// Declare dependencies.
    pub fn depends_on<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies
            .extend(dependencies.into_iter().map(Into::into));
        self
    }

    /// Attach a retry policy.
    pub fn with_retry(mut self, policy: RetryPolicyConfiguration) -> Self {
        self.retry = Some(policy);
        self
    }

    /// Store trimmed stdout in the context under `variable`.
    pub fn capture(mut self, variable: impl Into<String>) -> Self {
        self.capture = Some(variable.into());
        self
    }

    /// Add a variable for this step only.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// The command line.
    pub fn command(&self) -> &str {
        &self.command
    }
}

#[async_trait]
impl Step<CommandContext> for CommandStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    fn retry_policy(&self) -> Option<&RetryPolicyConfiguration> {
        self.retry.as_ref()
    }

    async fn execute(
        &self,
        context: &mut CommandContext,
        token: &CancellationToken,
    ) -> anyhow::Result<()> {
        let start = Instant::now();
        let (shell, flag) = context.shell();

        let mut cmd = Command::new(&shell);
        cmd.arg(flag)
            .arg(&self.command)
            .envs(&context.env)
            .envs(&self.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &context.working_dir {
            cmd.current_dir(dir);
        }

        debug!(step = %self.name, command = %self.command, "Spawning command");
        let child = cmd
            .spawn()
            .with_context(|| format!("failed to spawn '{}' with {}", self.command, shell))?;

        // Dropping the child on cancellation kills it.
        let output = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(Cancelled.into()),
            output = child.wait_with_output() => output?,
        };

        debug!(
            step = %self.name,
            code = ?output.status.code(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Command finished"
        );

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(CommandFailed {
                command: self.command.clone(),
                code: output.status.code(),
                stderr,
            }
            .into());
        }

        if let Some(variable) = &self.capture {
            let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
            context.env.insert(variable.clone(), stdout);
        }

        Ok(())
    }
}

//! Command dispatching.
//!
//! This module provides the core command infrastructure:
//! - [`Command`] trait for implementing commands
//! - [`CommandResult`] for uniform result reporting
//! - [`CommandDispatcher`] for routing CLI subcommands

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::cli::args::{Cli, Commands, RunArgs};
use crate::error::Result;
use crate::ui::Output;

/// Exit code for a run stopped by cancellation (128 + SIGINT).
pub const EXIT_CANCELLED: i32 = 130;

/// Trait for command implementations.
///
/// Each CLI subcommand implements this trait to provide its execution logic.
#[async_trait]
pub trait Command: Send + Sync {
    /// Execute the command.
    ///
    /// `token` is cancelled when the user interrupts the process.
    async fn execute(&self, out: &Output, token: &CancellationToken) -> Result<CommandResult>;
}

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult {
    /// Whether the command succeeded.
    pub success: bool,

    /// Exit code to use (0 for success, non-zero for failure).
    pub exit_code: i32,
}

impl CommandResult {
    /// Create a successful result.
    pub fn success() -> Self {
        Self {
            success: true,
            exit_code: 0,
        }
    }

    /// Create a failure result.
    pub fn failure(exit_code: i32) -> Self {
        Self {
            success: false,
            exit_code,
        }
    }

    /// Create the result of a cancelled run.
    pub fn cancelled() -> Self {
        Self::failure(EXIT_CANCELLED)
    }
}

/// Dispatches CLI commands to their implementations.
pub struct CommandDispatcher {
    project_root: PathBuf,
    plan: Option<PathBuf>,
}

impl CommandDispatcher {
    /// Create a new dispatcher for the given project root.
    pub fn new(project_root: PathBuf, plan: Option<PathBuf>) -> Self {
        Self { project_root, plan }
    }

    /// Get the project root path.
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Dispatch and execute a command.
    pub async fn dispatch(
        &self,
        cli: &Cli,
        out: &Output,
        token: &CancellationToken,
    ) -> Result<CommandResult> {
        let root = &self.project_root;
        let plan = self.plan.clone();

        let cmd: Box<dyn Command> = match &cli.command {
            Some(Commands::Run(args)) => {
                Box::new(super::run::RunCommand::new(root, plan, args.clone()))
            }
            Some(Commands::List(args)) => {
                Box::new(super::list::ListCommand::new(root, plan, args.clone()))
            }
            Some(Commands::Lint(args)) => {
                Box::new(super::lint::LintCommand::new(root, plan, args.clone()))
            }
            Some(Commands::Completions(args)) => {
                Box::new(super::completions::CompletionsCommand::new(args.clone()))
            }
            // Default to run command with default args
            None => Box::new(super::run::RunCommand::new(root, plan, RunArgs::default())),
        };

        cmd.execute(out, token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_result_success() {
        let result = CommandResult::success();
        assert!(result.success);
        assert_eq!(result.exit_code, 0);
    }

    #[test]
    fn command_result_failure() {
        let result = CommandResult::failure(1);
        assert!(!result.success);
        assert_eq!(result.exit_code, 1);
    }

    #[test]
    fn command_result_cancelled() {
        let result = CommandResult::cancelled();
        assert!(!result.success);
        assert_eq!(result.exit_code, 130);
    }

    #[test]
    fn dispatcher_keeps_project_root() {
        let dispatcher = CommandDispatcher::new(PathBuf::from("/tmp/project"), None);
        assert_eq!(dispatcher.project_root(), Path::new("/tmp/project"));
    }
}

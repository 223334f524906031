//! Lint command implementation.
//!
//! The `bootkit lint` command validates the plan without running it.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::cli::args::LintArgs;
use crate::config::validate_plan;
use crate::error::Result;
use crate::ui::Output;

use super::dispatcher::{Command, CommandResult};
use super::load_or_report;

/// The lint command implementation.
pub struct LintCommand {
    project_root: PathBuf,
    plan: Option<PathBuf>,
    args: LintArgs,
}

impl LintCommand {
    /// Create a new lint command.
    pub fn new(project_root: &Path, plan: Option<PathBuf>, args: LintArgs) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            plan,
            args,
        }
    }

    /// Get the command arguments.
    pub fn args(&self) -> &LintArgs {
        &self.args
    }
}

#[async_trait]
impl Command for LintCommand {
    async fn execute(&self, out: &Output, _token: &CancellationToken) -> Result<CommandResult> {
        let Some(plan) = load_or_report(&self.project_root, self.plan.as_deref(), out)? else {
            return Ok(CommandResult::failure(1));
        };

        let errors = validate_plan(&plan);

        if self.args.json {
            let json = serde_json::to_string_pretty(&errors).map_err(anyhow::Error::from)?;
            println!("{}", json);
        } else if errors.is_empty() {
            out.success(&format!("Plan is valid ({} steps)", plan.steps.len()));
        } else {
            for error in &errors {
                out.error(&format!("[{}] {}", error.rule, error.message));
            }
            out.message(&format!("{} problem(s) found", errors.len()));
        }

        if errors.is_empty() {
            Ok(CommandResult::success())
        } else {
            Ok(CommandResult::failure(1))
        }
    }
}

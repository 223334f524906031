//! Run command implementation.
//!
//! The `bootkit run` command executes the plan.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cli::args::RunArgs;
use crate::config::{build_context, build_steps, validate_plan, PlanConfig};
use crate::error::{BootstrapError, Result};
use crate::retry::{DefaultRetryPolicyFactory, NullRetryPolicyFactory, RetryPolicyFactory};
use crate::runner::{BootstrapReport, Bootstrapper};
use crate::ui::{format_duration, ConsoleProgress, Output};

use super::dispatcher::{Command, CommandResult};
use super::load_or_report;

/// The run command implementation.
pub struct RunCommand {
    project_root: PathBuf,
    plan: Option<PathBuf>,
    args: RunArgs,
}

impl RunCommand {
    /// Create a new run command.
    pub fn new(project_root: &Path, plan: Option<PathBuf>, args: RunArgs) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            plan,
            args,
        }
    }

    /// Get the project root path.
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Get the command arguments.
    pub fn args(&self) -> &RunArgs {
        &self.args
    }

    fn retry_factory(&self) -> Arc<dyn RetryPolicyFactory> {
        if self.args.no_retry {
            debug!("Retries disabled");
            Arc::new(NullRetryPolicyFactory::new())
        } else {
            Arc::new(DefaultRetryPolicyFactory::default())
        }
    }

    fn descriptions(plan: &PlanConfig) -> HashMap<String, String> {
        plan.steps
            .iter()
            .filter_map(|s| Some((s.name.clone(), s.description.clone()?)))
            .collect()
    }

    fn print_summary(&self, out: &Output, report: &BootstrapReport) -> Result<()> {
        if self.args.json {
            let json = serde_json::to_string_pretty(report).map_err(anyhow::Error::from)?;
            println!("{}", json);
            return Ok(());
        }

        let retried = report.retried().count();
        let mut summary = format!(
            "Bootstrap complete: {} step(s) in {}",
            report.steps.len(),
            format_duration(report.duration)
        );
        if retried > 0 {
            summary.push_str(&format!(", {} needed retries", retried));
        }
        out.message("");
        out.success(&summary);
        Ok(())
    }
}

#[async_trait]
impl Command for RunCommand {
    async fn execute(&self, out: &Output, token: &CancellationToken) -> Result<CommandResult> {
        let Some(plan) = load_or_report(&self.project_root, self.plan.as_deref(), out)? else {
            return Ok(CommandResult::failure(1));
        };

        let problems = validate_plan(&plan);
        if !problems.is_empty() {
            for problem in &problems {
                out.error(&format!("[{}] {}", problem.rule, problem.message));
            }
            return Ok(CommandResult::failure(1));
        }

        if !self.args.json {
            out.header(plan.app_name.as_deref().unwrap_or("Bootstrapping"));
        }

        let progress = ConsoleProgress::new(out.theme().clone(), out.is_interactive())
            .quiet(out.is_quiet() || self.args.json)
            .with_descriptions(Self::descriptions(&plan));

        let mut bootstrapper = Bootstrapper::builder()
            .steps(build_steps(&plan))
            .retry_factory(self.retry_factory())
            .build();
        let mut context = build_context(&plan, &self.project_root);

        match bootstrapper.execute(&mut context, &progress, token).await {
            Ok(report) => {
                self.print_summary(out, &report)?;
                Ok(CommandResult::success())
            }
            Err(e @ BootstrapError::Cancelled { .. }) => {
                progress.abandon();
                out.warning(&e.to_string());
                Ok(CommandResult::cancelled())
            }
            Err(e) => {
                out.error(&e.to_string());
                Ok(CommandResult::failure(1))
            }
        }
    }
}

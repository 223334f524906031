//! List command implementation.
//!
//! The `bootkit list` command shows the plan's steps in execution order.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::cli::args::ListArgs;
use crate::config::{build_steps, PlanConfig};
use crate::error::Result;
use crate::runner::resolve_order;
use crate::ui::Output;

use super::dispatcher::{Command, CommandResult};
use super::load_or_report;

/// One row of `bootkit list --json`.
#[derive(Debug, Serialize)]
struct ListedStep<'a> {
    position: usize,
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    command: &'a str,
    depends_on: &'a [String],
    retries: u32,
}

/// The list command implementation.
pub struct ListCommand {
    project_root: PathBuf,
    plan: Option<PathBuf>,
    args: ListArgs,
}

impl ListCommand {
    /// Create a new list command.
    pub fn new(project_root: &Path, plan: Option<PathBuf>, args: ListArgs) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            plan,
            args,
        }
    }

    fn rows<'a>(plan: &'a PlanConfig, order: &[String]) -> Vec<ListedStep<'a>> {
        order
            .iter()
            .filter_map(|name| plan.step(name))
            .enumerate()
            .map(|(index, step)| ListedStep {
                position: index + 1,
                name: &step.name,
                description: step.description.as_deref(),
                command: step.command.as_deref().unwrap_or_default(),
                depends_on: &step.depends_on,
                retries: plan.effective_retry(step).map_or(0, |r| r.count),
            })
            .collect()
    }

    fn print_human(&self, out: &Output, plan: &PlanConfig, rows: &[ListedStep<'_>]) {
        let theme = out.theme();
        out.header(plan.app_name.as_deref().unwrap_or("Steps"));

        for row in rows {
            let mut line = format!(
                "{:>3}. {}",
                row.position,
                theme.format_step(row.name, row.description)
            );
            if !row.depends_on.is_empty() {
                line.push_str(&format!(
                    " {}",
                    theme
                        .dim
                        .apply_to(format!("(after {})", row.depends_on.join(", ")))
                ));
            }
            if row.retries > 0 {
                line.push_str(&format!(
                    " {}",
                    theme.info.apply_to(format!("[retry x{}]", row.retries))
                ));
            }
            println!("{}", line);
            println!("       {}", theme.command.apply_to(row.command));
        }
    }
}

#[async_trait]
impl Command for ListCommand {
    async fn execute(&self, out: &Output, _token: &CancellationToken) -> Result<CommandResult> {
        let Some(plan) = load_or_report(&self.project_root, self.plan.as_deref(), out)? else {
            return Ok(CommandResult::failure(1));
        };

        let steps = build_steps(&plan);
        let order: Vec<String> = match resolve_order(&steps) {
            Ok(order) => order.iter().map(|s| s.name().to_string()).collect(),
            Err(e) => {
                out.error(&e.to_string());
                return Ok(CommandResult::failure(1));
            }
        };

        let rows = Self::rows(&plan, &order);
        if self.args.json {
            let json = serde_json::to_string_pretty(&rows).map_err(anyhow::Error::from)?;
            println!("{}", json);
        } else {
            self.print_human(out, &plan, &rows);
        }

        Ok(CommandResult::success())
    }
}

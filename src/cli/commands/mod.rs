//! CLI command implementations.

pub mod completions;
pub mod dispatcher;
pub mod lint;
pub mod list;
pub mod run;

use std::path::Path;

use crate::config::{load_plan, PlanConfig};
use crate::error::{BootstrapError, Result};
use crate::ui::Output;

pub use dispatcher::{Command, CommandDispatcher, CommandResult, EXIT_CANCELLED};

/// Load the plan, printing loader problems.
///
/// Returns `Ok(None)` after reporting a missing or unparsable plan.
fn load_or_report(
    project_root: &Path,
    plan_override: Option<&Path>,
    out: &Output,
) -> Result<Option<PlanConfig>> {
    match load_plan(project_root, plan_override) {
        Ok(plan) => Ok(Some(plan)),
        Err(BootstrapError::ConfigNotFound { path }) => {
            out.error(&format!(
                "No plan found at {}. Create bootkit.yml or pass --plan.",
                path.display()
            ));
            Ok(None)
        }
        Err(BootstrapError::ConfigParseError { path, message }) => {
            out.error(&format!("Parse error in {}: {}", path.display(), message));
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

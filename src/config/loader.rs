//! Plan file discovery and loading.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::schema::PlanConfig;
use crate::error::{BootstrapError, Result};

/// Plan file names checked in the project root, in priority order.
pub const PLAN_FILES: [&str; 2] = ["bootkit.yml", ".bootkit/plan.yml"];

/// Find the plan file for a project root.
pub fn discover_plan(project_root: &Path) -> Option<PathBuf> {
    PLAN_FILES
        .iter()
        .map(|name| project_root.join(name))
        .find(|path| path.is_file())
}

/// Find the project root by walking up from `start`.
///
/// Looks for a plan file first, then a `.git` directory.
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        if discover_plan(&current).is_some() {
            return Some(current);
        }

        if current.join(".git").exists() {
            return Some(current);
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Load and parse a single plan file.
///
/// # Errors
///
/// Returns `ConfigNotFound` if the file doesn't exist.
/// Returns `ConfigParseError` if the YAML is invalid.
pub fn load_plan_file(path: &Path) -> Result<PlanConfig> {
    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            BootstrapError::ConfigNotFound {
                path: path.to_path_buf(),
            }
        } else {
            BootstrapError::Io(e)
        }
    })?;

    debug!(path = %path.display(), "Loaded plan file");
    parse_plan(&content, path)
}

/// Parse YAML content into a plan.
///
/// `source_path` is only used for error reporting.
pub fn parse_plan(content: &str, source_path: &Path) -> Result<PlanConfig> {
    // An empty file is an empty plan
    if content.trim().is_empty() {
        return Ok(PlanConfig::default());
    }

    serde_yaml::from_str(content).map_err(|e| BootstrapError::ConfigParseError {
        path: source_path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Load the plan for a project.
///
/// An explicit `plan_override` is loaded as is; otherwise the plan is
/// discovered in `project_root`.
pub fn load_plan(project_root: &Path, plan_override: Option<&Path>) -> Result<PlanConfig> {
    if let Some(path) = plan_override {
        return load_plan_file(path);
    }

    match discover_plan(project_root) {
        Some(path) => load_plan_file(&path),
        None => Err(BootstrapError::ConfigNotFound {
            path: project_root.join(PLAN_FILES[0]),
        }),
    }
}

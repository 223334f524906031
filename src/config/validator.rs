//! Plan validation rules.
//!
//! - Steps must have a non-empty, unique name
//! - Steps must have a command
//! - depends_on must reference existing steps
//! - No circular dependencies allowed
//! - capture must name a variable

use std::collections::HashSet;

use serde::Serialize;

use crate::config::schema::PlanConfig;
use crate::error::{BootstrapError, Result};
use crate::runner::DependencyGraph;

/// Validation error with context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    /// Rule identifier
    pub rule: String,
    /// Human-readable error message
    pub message: String,
    /// Step name if error is step-specific
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
}

impl ValidationError {
    fn new(rule: &str, message: String, step: Option<&str>) -> Self {
        Self {
            rule: rule.to_string(),
            message,
            step: step.map(str::to_string),
        }
    }
}

/// Validate a plan and return all errors.
///
/// Collects every problem instead of stopping at the first one.
pub fn validate_plan(plan: &PlanConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    errors.extend(validate_steps(plan));
    errors.extend(validate_dependencies(plan));

    errors
}

fn validate_steps(plan: &PlanConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let names: HashSet<&str> = plan.steps.iter().map(|s| s.name.as_str()).collect();
    let mut seen = HashSet::new();

    for (index, step) in plan.steps.iter().enumerate() {
        let name = step.name.trim();
        if name.is_empty() {
            errors.push(ValidationError::new(
                "empty-name",
                format!("Step #{} has no name", index + 1),
                None,
            ));
            continue;
        }

        if !seen.insert(step.name.as_str()) {
            errors.push(ValidationError::new(
                "duplicate-step",
                format!("Step '{}' is defined more than once", name),
                Some(name),
            ));
        }

        if step.command.as_deref().map_or(true, |c| c.trim().is_empty()) {
            errors.push(ValidationError::new(
                "missing-command",
                format!("Step '{}' must have a 'command'", name),
                Some(name),
            ));
        }

        for dep in &step.depends_on {
            if !names.contains(dep.as_str()) {
                errors.push(ValidationError::new(
                    "unknown-step",
                    format!("Step '{}' depends on '{}' which does not exist", name, dep),
                    Some(name),
                ));
            }
        }

        if step.capture.as_deref().is_some_and(|v| v.trim().is_empty()) {
            errors.push(ValidationError::new(
                "empty-capture",
                format!("Step '{}' has an empty 'capture' variable", name),
                Some(name),
            ));
        }
    }

    errors
}

/// Check for cycles among the well-formed part of the plan.
fn validate_dependencies(plan: &PlanConfig) -> Vec<ValidationError> {
    let mut seen = HashSet::new();
    let steps: Vec<_> = plan
        .steps
        .iter()
        .filter(|s| !s.name.trim().is_empty() && seen.insert(s.name.as_str()))
        .collect();

    let builder = steps.iter().fold(DependencyGraph::builder(), |builder, step| {
        let known = step
            .depends_on
            .iter()
            .filter(|dep| seen.contains(dep.as_str()))
            .cloned();
        builder.add_step(step.name.clone(), known)
    });

    let Ok(graph) = builder.build() else {
        return Vec::new();
    };

    match graph.find_cycle() {
        Some(cycle) => vec![ValidationError::new(
            "circular-dependency",
            format!("Circular dependency detected: {}", cycle.join(" -> ")),
            cycle.first().map(String::as_str),
        )],
        None => Vec::new(),
    }
}

/// Validate and return Result (for convenience).
///
/// # Errors
///
/// Returns `ConfigValidationError` if any validation rules fail.
pub fn validate(plan: &PlanConfig) -> Result<()> {
    let errors = validate_plan(plan);

    if errors.is_empty() {
        Ok(())
    } else {
        let messages: Vec<_> = errors.iter().map(|e| e.message.clone()).collect();
        Err(BootstrapError::ConfigValidationError {
            message: messages.join("; "),
        })
    }
}

//! Error types for bootkit operations.
//!
//! This module defines [`BootstrapError`], the only error type that crosses
//! the orchestrator's public boundary, and a [`Result`] type alias.
//!
//! # Error Handling Strategy
//!
//! - Configuration errors (duplicate names, unknown dependencies, cycles) are
//!   reported before any step runs
//! - Step bodies return `anyhow::Error`; a terminal step failure keeps it as
//!   the `source` of [`BootstrapError::StepFailed`]
//! - Cancellation is its own variant so callers can treat an intentional
//!   shutdown differently from a failure

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for bootkit operations.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Two steps in the same run share a name.
    #[error("Duplicate step name: '{name}'")]
    DuplicateStep { name: String },

    /// A step depends on a name that is not part of the run.
    #[error("Step '{step}' depends on unknown step '{dependency}'")]
    UnknownDependency { step: String, dependency: String },

    /// Step dependency cycle detected.
    #[error("Circular dependency detected: {cycle}")]
    CircularDependency { cycle: String },

    /// A step failed terminally (retries exhausted or not retryable).
    #[error("Step '{step}' failed after {attempts} attempt(s): {source:#}")]
    StepFailed {
        step: String,
        attempts: u32,
        #[source]
        source: anyhow::Error,
    },

    /// The run was cancelled through its cancellation token.
    #[error("{}", cancelled_message(.step.as_deref()))]
    Cancelled { step: Option<String> },

    /// The bootstrapper was asked to run again after a terminal run.
    #[error("Bootstrapper cannot run from state '{state}'")]
    InvalidState { state: String },

    /// Plan file not found at expected location.
    #[error("Plan not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Failed to parse plan file.
    #[error("Failed to parse plan at {path}: {message}")]
    ConfigParseError { path: PathBuf, message: String },

    /// Invalid plan structure or values.
    #[error("Invalid plan: {message}")]
    ConfigValidationError { message: String },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic wrapped error for anyhow interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn cancelled_message(step: Option<&str>) -> String {
    match step {
        Some(step) => format!("Bootstrap cancelled at step '{}'", step),
        None => "Bootstrap cancelled".to_string(),
    }
}

impl BootstrapError {
    /// Whether this error is the cancellation outcome rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, BootstrapError::Cancelled { .. })
    }

    /// Whether this error was detected while validating the step set.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            BootstrapError::DuplicateStep { .. }
                | BootstrapError::UnknownDependency { .. }
                | BootstrapError::CircularDependency { .. }
                | BootstrapError::ConfigNotFound { .. }
                | BootstrapError::ConfigParseError { .. }
                | BootstrapError::ConfigValidationError { .. }
        )
    }

    /// Name of the step the error is attributed to, if any.
    pub fn failed_step(&self) -> Option<&str> {
        match self {
            BootstrapError::StepFailed { step, .. } => Some(step),
            BootstrapError::Cancelled { step } => step.as_deref(),
            BootstrapError::UnknownDependency { step, .. } => Some(step),
            _ => None,
        }
    }
}

/// Marker error a step returns when it stopped because its token was cancelled.
///
/// The retry pipeline classifies this as cancellation, never as a retryable
/// or terminal failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Error)]
#[error("operation cancelled")]
pub struct Cancelled;

/// Result type alias for bootkit operations.
pub type Result<T> = std::result::Result<T, BootstrapError>;

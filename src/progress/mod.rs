//! Step progress events.
//!
//! The bootstrapper emits a [`StepProgress`] for every observable transition
//! of a step (`Started -> (Retrying)* -> Succeeded | Failed`) into a
//! [`ProgressSink`].

pub mod sink;

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use sink::{ChannelProgress, NoopProgress, ProgressLog, ProgressSink};

/// Status carried by a progress event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    /// The step is about to run its first attempt.
    Started,

    /// An attempt failed and the step will run again after a delay.
    Retrying,

    /// The step completed.
    Succeeded,

    /// The step failed terminally.
    Failed,
}

impl ProgressStatus {
    /// Check if this is a terminal state for the step.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProgressStatus::Succeeded | ProgressStatus::Failed)
    }

    /// Get a display character for this status.
    pub fn display_char(&self) -> char {
        match self {
            ProgressStatus::Started => '◉',
            ProgressStatus::Retrying => '↻',
            ProgressStatus::Succeeded => '✓',
            ProgressStatus::Failed => '✗',
        }
    }
}

impl fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProgressStatus::Started => "started",
            ProgressStatus::Retrying => "retrying",
            ProgressStatus::Succeeded => "succeeded",
            ProgressStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// A single progress event.
///
/// `attempt` is the execution attempt the event refers to: `1` for the
/// first run, and for `Retrying` the attempt that is about to start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepProgress {
    /// Step the event belongs to.
    pub step_name: String,

    /// Transition being reported.
    pub status: ProgressStatus,

    /// Execution attempt number (1-based).
    pub attempt: u32,

    /// Rendered failure, for `Retrying` and `Failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Backoff delay before the next attempt, for `Retrying`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<Duration>,

    /// When the event was emitted.
    pub timestamp: DateTime<Utc>,
}

impl StepProgress {
    fn new(step_name: &str, status: ProgressStatus, attempt: u32) -> Self {
        Self {
            step_name: step_name.to_string(),
            status,
            attempt,
            error: None,
            delay: None,
            timestamp: Utc::now(),
        }
    }

    /// The step is about to start.
    pub fn started(step_name: &str) -> Self {
        Self::new(step_name, ProgressStatus::Started, 1)
    }

    /// Attempt `next_attempt` will run after `delay` because of `error`.
    pub fn retrying(
        step_name: &str,
        next_attempt: u32,
        error: &anyhow::Error,
        delay: Duration,
    ) -> Self {
        Self {
            error: Some(format!("{:#}", error)),
            delay: Some(delay),
            ..Self::new(step_name, ProgressStatus::Retrying, next_attempt)
        }
    }

    /// The step completed on `attempt`.
    pub fn succeeded(step_name: &str, attempt: u32) -> Self {
        Self::new(step_name, ProgressStatus::Succeeded, attempt)
    }

    /// The step gave up on `attempt`.
    pub fn failed(step_name: &str, attempt: u32, error: &anyhow::Error) -> Self {
        Self {
            error: Some(format!("{:#}", error)),
            ..Self::new(step_name, ProgressStatus::Failed, attempt)
        }
    }

    /// Generate a summary line for display.
    pub fn summary_line(&self) -> String {
        let c = self.status.display_char();
        match self.status {
            ProgressStatus::Started => format!("{} {}", c, self.step_name),
            ProgressStatus::Retrying => {
                let delay = self.delay.map(format_delay).unwrap_or_default();
                format!(
                    "{} {} - attempt {} in {}",
                    c, self.step_name, self.attempt, delay
                )
            }
            ProgressStatus::Succeeded if self.attempt > 1 => {
                format!("{} {} (attempt {})", c, self.step_name, self.attempt)
            }
            ProgressStatus::Succeeded => format!("{} {}", c, self.step_name),
            ProgressStatus::Failed => {
                let error = self.error.as_deref().unwrap_or("unknown error");
                format!("{} {} - {}", c, self.step_name, error)
            }
        }
    }
}

fn format_delay(delay: Duration) -> String {
    if delay.as_secs() == 0 {
        format!("{}ms", delay.as_millis())
    } else {
        format!("{:.1}s", delay.as_secs_f64())
    }
}

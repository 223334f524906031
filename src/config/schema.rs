//! Plan file schema definitions.
//!
//! These types mirror the YAML structure of a `bootkit.yml` plan.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::retry::{
    BackoffType, RetryPolicyConfiguration, DEFAULT_INITIAL_DELAY, DEFAULT_MAX_DELAY,
    DEFAULT_RETRY_COUNT,
};
use crate::steps::CommandFailed;

/// Root plan structure.
///
/// # Example
///
/// ```yaml
/// app_name: MyApp
///
/// settings:
///   env:
///     RAILS_ENV: development
///   default_retry:
///     count: 2
///     initial_delay: 500ms
///
/// steps:
///   - name: bundle
///     command: bundle install
///   - name: database
///     command: bin/rails db:prepare
///     depends_on: [bundle]
///     retry:
///       count: 5
///       backoff: exponential
///       max_delay: 10s
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanConfig {
    /// Application name for display.
    pub app_name: Option<String>,

    /// Global settings.
    pub settings: Settings,

    /// Steps in input order.
    pub steps: Vec<StepConfig>,
}

impl PlanConfig {
    /// Look up a step by name.
    pub fn step(&self, name: &str) -> Option<&StepConfig> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// Step names in input order.
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name.as_str()).collect()
    }

    /// Retry settings that apply to `step`, falling back to the default.
    pub fn effective_retry<'a>(&'a self, step: &'a StepConfig) -> Option<&'a RetrySettings> {
        step.retry.as_ref().or(self.settings.default_retry.as_ref())
    }
}

/// Global settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Retry applied to steps that declare none.
    pub default_retry: Option<RetrySettings>,

    /// Shell used to run commands.
    pub shell: Option<String>,

    /// Variables seeded into every run.
    pub env: HashMap<String, String>,

    /// Working directory, relative to the project root.
    pub working_dir: Option<PathBuf>,
}

/// A single step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepConfig {
    /// Unique step name.
    pub name: String,

    /// Shown by `bootkit list`.
    pub description: Option<String>,

    /// Shell command to run.
    pub command: Option<String>,

    /// Steps that must succeed first.
    pub depends_on: Vec<String>,

    /// Retry behavior for this step.
    pub retry: Option<RetrySettings>,

    /// Context variable that receives the command's trimmed stdout.
    pub capture: Option<String>,

    /// Variables for this step only.
    pub env: HashMap<String, String>,
}

/// Retry block of a step or of `settings.default_retry`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Retries after the first failure.
    pub count: u32,

    /// Delay before the first retry.
    #[serde(with = "duration_format")]
    pub initial_delay: Duration,

    /// Growth of the delay.
    pub backoff: BackoffType,

    /// Cap on any single delay.
    #[serde(with = "duration_format")]
    pub max_delay: Duration,

    /// Randomize delays.
    pub jitter: bool,

    /// When non-empty, only command failures with one of these exit codes
    /// are retried.
    pub retry_on_exit_codes: Vec<i32>,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            count: DEFAULT_RETRY_COUNT,
            initial_delay: DEFAULT_INITIAL_DELAY,
            backoff: BackoffType::default(),
            max_delay: DEFAULT_MAX_DELAY,
            jitter: true,
            retry_on_exit_codes: Vec::new(),
        }
    }
}

impl RetrySettings {
    /// Convert into a runtime policy.
    pub fn to_policy(&self) -> RetryPolicyConfiguration {
        let policy = RetryPolicyConfiguration::new(self.count)
            .with_initial_delay(self.initial_delay)
            .with_backoff(self.backoff)
            .with_max_delay(self.max_delay)
            .with_jitter(self.jitter);

        if self.retry_on_exit_codes.is_empty() {
            return policy;
        }

        let codes = self.retry_on_exit_codes.clone();
        policy.retry_on(move |error| {
            error
                .downcast_ref::<CommandFailed>()
                .and_then(|failed| failed.code)
                .is_some_and(|code| codes.contains(&code))
        })
    }
}

/// Durations written as integer milliseconds or as `250ms`, `1.5s`, `2m`, `1h`.
pub mod duration_format {
    use std::time::Duration;

    use serde::{de, Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Millis(u64),
        Text(String),
    }

    /// Parse a duration string.
    pub fn parse(input: &str) -> Result<Duration, String> {
        let input = input.trim();
        let split = input
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(input.len());
        let (number, unit) = input.split_at(split);

        let value: f64 = number
            .parse()
            .map_err(|_| format!("invalid duration '{}'", input))?;
        let seconds = match unit.trim() {
            "" | "ms" => value / 1000.0,
            "s" => value,
            "m" => value * 60.0,
            "h" => value * 3600.0,
            other => return Err(format!("unknown duration unit '{}' in '{}'", other, input)),
        };

        Duration::try_from_secs_f64(seconds).map_err(|e| format!("invalid duration '{}': {}", input, e))
    }

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{}ms", duration.as_millis()))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Millis(ms) => Ok(Duration::from_millis(ms)),
            Raw::Text(text) => parse(&text).map_err(de::Error::custom),
        }
    }
}

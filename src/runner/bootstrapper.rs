//! Bootstrap run orchestration.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{BootstrapError, Result};
use crate::progress::{ProgressSink, StepProgress};
use crate::retry::{
    Clock, DefaultRetryPolicyFactory, RetryAttempt, RetryError, RetryPolicyFactory, TokioClock,
};
use crate::steps::Step;

use super::dependency::{resolve_order, DependencyGraph};

/// Lifecycle of a bootstrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BootstrapState {
    /// No run has happened yet.
    NotStarted,

    /// A run is in progress.
    Running,

    /// The last run finished every step.
    Completed,

    /// A step failed terminally, or the step set was invalid.
    Failed,

    /// The run was cancelled through its token.
    Cancelled,
}

impl BootstrapState {
    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BootstrapState::Completed | BootstrapState::Failed | BootstrapState::Cancelled
        )
    }
}

impl fmt::Display for BootstrapState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BootstrapState::NotStarted => "not_started",
            BootstrapState::Running => "running",
            BootstrapState::Completed => "completed",
            BootstrapState::Failed => "failed",
            BootstrapState::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// Outcome of one step in a successful run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepOutcome {
    /// Step name.
    pub name: String,
    /// Attempts it took to succeed.
    pub attempts: u32,
    /// Time from start to success, backoff delays included.
    pub duration: Duration,
}

/// Result of a successful run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BootstrapReport {
    /// Steps in the order they ran.
    pub steps: Vec<StepOutcome>,
    /// Total duration.
    pub duration: Duration,
}

impl BootstrapReport {
    /// Names of the steps in the order they ran.
    pub fn order(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name.as_str()).collect()
    }

    /// Look up one step's outcome.
    pub fn step(&self, name: &str) -> Option<&StepOutcome> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// Steps that needed more than one attempt.
    pub fn retried(&self) -> impl Iterator<Item = &StepOutcome> {
        self.steps.iter().filter(|s| s.attempts > 1)
    }
}

/// Runs a set of steps in dependency order, one at a time.
///
/// Each step runs through the retry pipeline its factory builds for it. The
/// first terminal failure stops the run; later steps never start.
pub struct Bootstrapper<C: Send> {
    steps: Vec<Box<dyn Step<C>>>,
    retry_factory: Arc<dyn RetryPolicyFactory>,
    clock: Arc<dyn Clock>,
    state: BootstrapState,
}

impl<C: Send> fmt::Debug for Bootstrapper<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.steps.iter().map(|s| s.name()).collect();
        f.debug_struct("Bootstrapper")
            .field("steps", &names)
            .field("state", &self.state)
            .finish()
    }
}

impl<C: Send> Bootstrapper<C> {
    /// Create a bootstrapper with the real clock and the default retry factory.
    pub fn new(steps: Vec<Box<dyn Step<C>>>) -> Self {
        Self::builder().steps(steps).build()
    }

    /// Start building a bootstrapper.
    pub fn builder() -> BootstrapperBuilder<C> {
        BootstrapperBuilder::new()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> BootstrapState {
        self.state
    }

    /// Number of registered steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether no steps are registered.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Names of the steps in the order they would run.
    pub fn execution_order(&self) -> Result<Vec<String>> {
        Ok(resolve_order(&self.steps)?
            .iter()
            .map(|s| s.name().to_string())
            .collect())
    }

    /// Run every step.
    ///
    /// A bootstrapper that completed may run again; one that failed or was
    /// cancelled returns [`BootstrapError::InvalidState`].
    pub async fn execute(
        &mut self,
        context: &mut C,
        progress: &dyn ProgressSink,
        token: &CancellationToken,
    ) -> Result<BootstrapReport> {
        match self.state {
            BootstrapState::NotStarted | BootstrapState::Completed => {}
            state => {
                return Err(BootstrapError::InvalidState {
                    state: state.to_string(),
                })
            }
        }

        self.state = BootstrapState::Running;
        let result = run_steps(
            &self.steps,
            self.retry_factory.as_ref(),
            self.clock.as_ref(),
            context,
            progress,
            token,
        )
        .await;

        self.state = match &result {
            Ok(_) => BootstrapState::Completed,
            Err(e) if e.is_cancelled() => BootstrapState::Cancelled,
            Err(_) => BootstrapState::Failed,
        };
        result
    }
}

async fn run_steps<C: Send>(
    steps: &[Box<dyn Step<C>>],
    retry_factory: &dyn RetryPolicyFactory,
    clock: &dyn Clock,
    context: &mut C,
    progress: &dyn ProgressSink,
    token: &CancellationToken,
) -> Result<BootstrapReport> {
    let graph = DependencyGraph::from_steps(steps)?;
    let order = graph.order_steps(steps)?;
    info!(steps = order.len(), "Starting bootstrap");

    let run_start = clock.now();
    let mut report = BootstrapReport::default();

    for (index, step) in order.iter().enumerate() {
        let name = step.name();

        if token.is_cancelled() {
            info!(step = %name, "Bootstrap cancelled before step");
            return Err(BootstrapError::Cancelled {
                step: Some(name.to_string()),
            });
        }

        progress.report(StepProgress::started(name));
        let pipeline = retry_factory.create(name, step.retry_policy());
        let step_start = clock.now();

        let observer = |retry: &RetryAttempt<'_>| {
            progress.report(StepProgress::retrying(
                name,
                retry.attempt + 1,
                retry.error,
                retry.delay,
            ));
        };

        match pipeline
            .execute_observed(*step, context, token, &observer)
            .await
        {
            Ok(attempts) => {
                let duration = clock.now().saturating_duration_since(step_start);
                progress.report(StepProgress::succeeded(name, attempts));
                info!(
                    step = %name,
                    attempts,
                    duration_ms = duration.as_millis() as u64,
                    "Step succeeded"
                );
                report.steps.push(StepOutcome {
                    name: name.to_string(),
                    attempts,
                    duration,
                });
            }
            Err(RetryError::Cancelled { attempts }) => {
                info!(step = %name, attempts, "Bootstrap cancelled during step");
                return Err(BootstrapError::Cancelled {
                    step: Some(name.to_string()),
                });
            }
            Err(
                RetryError::Exhausted { attempts, source }
                | RetryError::NotRetryable { attempts, source },
            ) => {
                progress.report(StepProgress::failed(name, attempts, &source));

                let not_run: Vec<&str> = order[index + 1..].iter().map(|s| s.name()).collect();
                let dependents = graph.transitive_dependents(name);
                warn!(
                    step = %name,
                    attempts,
                    not_run = ?not_run,
                    dependents = ?dependents,
                    "Step failed: {:#}",
                    source
                );

                return Err(BootstrapError::StepFailed {
                    step: name.to_string(),
                    attempts,
                    source,
                });
            }
        }
    }

    report.duration = clock.now().saturating_duration_since(run_start);
    info!(
        steps = report.steps.len(),
        duration_ms = report.duration.as_millis() as u64,
        "Bootstrap completed"
    );
    Ok(report)
}

/// Builder for [`Bootstrapper`].
pub struct BootstrapperBuilder<C: Send> {
    steps: Vec<Box<dyn Step<C>>>,
    clock: Option<Arc<dyn Clock>>,
    retry_factory: Option<Arc<dyn RetryPolicyFactory>>,
}

impl<C: Send> Default for BootstrapperBuilder<C> {
    fn default() -> Self {
        Self {
            steps: Vec::new(),
            clock: None,
            retry_factory: None,
        }
    }
}

impl<C: Send> BootstrapperBuilder<C> {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one step.
    pub fn step(mut self, step: impl Step<C> + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    /// Add several boxed steps.
    pub fn steps(mut self, steps: impl IntoIterator<Item = Box<dyn Step<C>>>) -> Self {
        self.steps.extend(steps);
        self
    }

    /// Time source for measuring steps. Also used for backoff delays when
    /// no retry factory is set.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Factory building each step's retry pipeline.
    pub fn retry_factory(mut self, factory: Arc<dyn RetryPolicyFactory>) -> Self {
        self.retry_factory = Some(factory);
        self
    }

    /// Build the bootstrapper.
    pub fn build(self) -> Bootstrapper<C> {
        let clock = self.clock.unwrap_or_else(|| Arc::new(TokioClock));
        let retry_factory = self.retry_factory.unwrap_or_else(|| {
            debug!("Using default retry policy factory");
            Arc::new(DefaultRetryPolicyFactory::new(Arc::clone(&clock)))
        });

        Bootstrapper {
            steps: self.steps,
            retry_factory,
            clock,
            state: BootstrapState::NotStarted,
        }
    }
}

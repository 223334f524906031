//! Executable retry pipeline wrapping a single fallible operation.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::Cancelled;

use super::clock::Clock;
use super::policy::{RetryAttempt, RetryPolicyConfiguration, RetryPredicate};

/// A fallible async unit of work driven by a [`RetryPipeline`].
///
/// Every [`Step`](crate::steps::Step) is an operation over its context.
#[async_trait]
pub trait Operation<S: Send>: Send + Sync {
    /// Run the operation once.
    async fn invoke(&self, state: &mut S, token: &CancellationToken) -> anyhow::Result<()>;
}

/// Why a pipeline gave up.
#[derive(Debug, Error)]
pub enum RetryError {
    /// Every allowed attempt failed.
    #[error("retries exhausted after {attempts} attempt(s)")]
    Exhausted {
        attempts: u32,
        #[source]
        source: anyhow::Error,
    },

    /// The retry predicate rejected the failure.
    #[error("non-retryable failure on attempt {attempts}")]
    NotRetryable {
        attempts: u32,
        #[source]
        source: anyhow::Error,
    },

    /// The token was cancelled during the operation or a backoff delay.
    #[error("cancelled after {attempts} attempt(s)")]
    Cancelled { attempts: u32 },
}

impl RetryError {
    /// Number of times the operation was started.
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Exhausted { attempts, .. }
            | RetryError::NotRetryable { attempts, .. }
            | RetryError::Cancelled { attempts } => *attempts,
        }
    }

    /// Whether this is the cancellation outcome.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RetryError::Cancelled { .. })
    }

    /// Consume the error, yielding the last failure if there was one.
    pub fn into_source(self) -> Option<anyhow::Error> {
        match self {
            RetryError::Exhausted { source, .. } | RetryError::NotRetryable { source, .. } => {
                Some(source)
            }
            RetryError::Cancelled { .. } => None,
        }
    }
}

/// Retry/backoff state machine for one step.
pub struct RetryPipeline {
    step: String,
    config: RetryPolicyConfiguration,
    default_retry_on: Option<RetryPredicate>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for RetryPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPipeline")
            .field("step", &self.step)
            .field("config", &self.config)
            .field("default_retry_on", &self.default_retry_on.is_some())
            .finish()
    }
}

impl RetryPipeline {
    /// Build a pipeline for `step` from `config`.
    pub fn new(
        step: impl Into<String>,
        config: RetryPolicyConfiguration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            step: step.into(),
            config,
            default_retry_on: None,
            clock,
        }
    }

    /// A pipeline that surfaces the first failure without delay.
    pub fn noop(step: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self::new(step, RetryPolicyConfiguration::no_retry(), clock)
    }

    /// Predicate used when the configuration carries none.
    ///
    /// Without either, every failure is retryable.
    pub fn with_default_predicate(mut self, predicate: Option<RetryPredicate>) -> Self {
        self.default_retry_on = predicate;
        self
    }

    /// Step this pipeline was built for.
    pub fn step(&self) -> &str {
        &self.step
    }

    /// Effective configuration.
    pub fn config(&self) -> &RetryPolicyConfiguration {
        &self.config
    }

    fn should_retry(&self, error: &anyhow::Error) -> bool {
        match self.config.retry_on.as_ref().or(self.default_retry_on.as_ref()) {
            Some(predicate) => predicate(error),
            None => true,
        }
    }

    /// Run `operation` until it succeeds, is rejected, runs out of retries, or is cancelled.
    ///
    /// Returns the number of attempts the successful run took.
    pub async fn execute<S, O>(
        &self,
        operation: &O,
        state: &mut S,
        token: &CancellationToken,
    ) -> Result<u32, RetryError>
    where
        S: Send,
        O: Operation<S> + ?Sized,
    {
        self.execute_observed(operation, state, token, &|_: &RetryAttempt<'_>| {})
            .await
    }

    /// Like [`execute`](Self::execute), also calling `observer` right after the
    /// configured `on_retry` hook.
    pub async fn execute_observed<S, O>(
        &self,
        operation: &O,
        state: &mut S,
        token: &CancellationToken,
        observer: &(dyn Fn(&RetryAttempt<'_>) + Send + Sync),
    ) -> Result<u32, RetryError>
    where
        S: Send,
        O: Operation<S> + ?Sized,
    {
        let mut attempt: u32 = 1;

        loop {
            if token.is_cancelled() {
                return Err(RetryError::Cancelled {
                    attempts: attempt - 1,
                });
            }

            let error = match operation.invoke(state, token).await {
                Ok(()) => return Ok(attempt),
                Err(error) => error,
            };

            if token.is_cancelled() || error.downcast_ref::<Cancelled>().is_some() {
                debug!(step = %self.step, attempt, "Operation stopped by cancellation");
                return Err(RetryError::Cancelled { attempts: attempt });
            }

            if !self.should_retry(&error) {
                debug!(step = %self.step, attempt, "Failure is not retryable");
                return Err(RetryError::NotRetryable {
                    attempts: attempt,
                    source: error,
                });
            }

            // The n-th failure is followed by the n-th retry.
            let retry = attempt;
            if retry > self.config.retry_count {
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    source: error,
                });
            }

            let delay = self.config.delay_for(retry);
            let info = RetryAttempt {
                step: &self.step,
                error: &error,
                delay,
                attempt: retry,
                max_retries: self.config.retry_count,
            };
            if let Some(hook) = &self.config.on_retry {
                hook(&info);
            }
            observer(&info);

            warn!(
                step = %self.step,
                retry,
                max_retries = self.config.retry_count,
                delay_ms = delay.as_millis() as u64,
                "Step failed, retrying: {:#}",
                error
            );

            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    return Err(RetryError::Cancelled { attempts: attempt });
                }
                _ = self.clock.sleep(delay) => {}
            }

            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::{BackoffType, InstantClock};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Fails the first `failures` invocations, then succeeds.
    struct Flaky {
        failures: u32,
        calls: AtomicU32,
    }

    impl Flaky {
        fn new(failures: u32) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
            }
        }

        fn always_failing() -> Self {
            Self::new(u32::MAX)
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Operation<()> for Flaky {
        async fn invoke(&self, _state: &mut (), _token: &CancellationToken) -> anyhow::Result<()> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                anyhow::bail!("transient failure {}", call);
            }
            Ok(())
        }
    }

    fn constant(retries: u32) -> RetryPolicyConfiguration {
        RetryPolicyConfiguration::new(retries)
            .with_backoff(BackoffType::Constant)
            .with_initial_delay(Duration::from_millis(10))
            .with_jitter(false)
    }

    #[tokio::test]
    async fn succeeds_first_time_without_sleeping() {
        let clock = Arc::new(InstantClock::new());
        let pipeline = RetryPipeline::new("a", constant(3), clock.clone());
        let op = Flaky::new(0);

        let attempts = pipeline
            .execute(&op, &mut (), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(attempts, 1);
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn always_failing_runs_retry_count_plus_one_times() {
        let clock = Arc::new(InstantClock::new());
        let pipeline = RetryPipeline::new("a", constant(3), clock.clone());
        let op = Flaky::always_failing();

        let err = pipeline
            .execute(&op, &mut (), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(op.calls(), 4);
        assert!(matches!(err, RetryError::Exhausted { attempts: 4, .. }));
        assert_eq!(clock.sleeps().len(), 3);
    }

    #[tokio::test]
    async fn exponential_delays_are_requested_from_clock() {
        let clock = Arc::new(InstantClock::new());
        let config = RetryPolicyConfiguration::new(6)
            .with_initial_delay(Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(30))
            .with_jitter(false);
        let pipeline = RetryPipeline::new("a", config, clock.clone());

        let _ = pipeline
            .execute(&Flaky::always_failing(), &mut (), &CancellationToken::new())
            .await;

        let secs: Vec<u64> = clock.sleeps().iter().map(|d| d.as_secs()).collect();
        assert_eq!(secs, vec![1, 2, 4, 8, 16, 30]);
    }

    #[tokio::test]
    async fn rejected_failure_is_not_retried() {
        let clock = Arc::new(InstantClock::new());
        let pipeline = RetryPipeline::new("a", constant(5).retry_on(|_| false), clock.clone());
        let op = Flaky::always_failing();

        let err = pipeline
            .execute(&op, &mut (), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(op.calls(), 1);
        assert!(matches!(err, RetryError::NotRetryable { attempts: 1, .. }));
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn predicate_sees_the_failure() {
        let clock = Arc::new(InstantClock::new());
        let config =
            constant(5).retry_on(|err| err.to_string().contains("transient failure 1"));
        let pipeline = RetryPipeline::new("a", config, clock);
        let op = Flaky::always_failing();

        let err = pipeline
            .execute(&op, &mut (), &CancellationToken::new())
            .await
            .unwrap_err();

        // First failure is retried, second is rejected.
        assert_eq!(op.calls(), 2);
        assert_eq!(err.attempts(), 2);
        assert!(err.into_source().unwrap().to_string().contains("2"));
    }

    #[tokio::test]
    async fn default_predicate_applies_when_config_has_none() {
        let clock = Arc::new(InstantClock::new());
        let default: RetryPredicate = Arc::new(|_| false);
        let pipeline =
            RetryPipeline::new("a", constant(5), clock).with_default_predicate(Some(default));
        let op = Flaky::always_failing();

        let err = pipeline
            .execute(&op, &mut (), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(op.calls(), 1);
        assert!(matches!(err, RetryError::NotRetryable { .. }));
    }

    #[tokio::test]
    async fn on_retry_runs_before_each_delay() {
        let seen: Arc<Mutex<Vec<(u32, u32, Duration)>>> = Arc::default();
        let recorder = seen.clone();
        let config = constant(2).on_retry(move |info| {
            recorder
                .lock()
                .unwrap()
                .push((info.attempt, info.max_retries, info.delay));
        });
        let pipeline = RetryPipeline::new("x", config, Arc::new(InstantClock::new()));

        let attempts = pipeline
            .execute(&Flaky::new(2), &mut (), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(attempts, 3);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                (1, 2, Duration::from_millis(10)),
                (2, 2, Duration::from_millis(10)),
            ]
        );
    }

    #[tokio::test]
    async fn observer_runs_alongside_hook() {
        let pipeline = RetryPipeline::new("x", constant(1), Arc::new(InstantClock::new()));
        let observed = AtomicU32::new(0);

        pipeline
            .execute_observed(
                &Flaky::new(1),
                &mut (),
                &CancellationToken::new(),
                &|info: &RetryAttempt<'_>| {
                    assert_eq!(info.step, "x");
                    observed.fetch_add(1, Ordering::SeqCst);
                },
            )
            .await
            .unwrap();

        assert_eq!(observed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn noop_pipeline_surfaces_first_failure() {
        let clock = Arc::new(InstantClock::new());
        let pipeline = RetryPipeline::noop("a", clock.clone());
        let op = Flaky::always_failing();

        let err = pipeline
            .execute(&op, &mut (), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(op.calls(), 1);
        assert_eq!(err.attempts(), 1);
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn cancelled_before_start_never_invokes() {
        let token = CancellationToken::new();
        token.cancel();
        let pipeline = RetryPipeline::new("a", constant(3), Arc::new(InstantClock::new()));
        let op = Flaky::new(0);

        let err = pipeline.execute(&op, &mut (), &token).await.unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(op.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_backoff_delay() {
        let token = CancellationToken::new();
        let config = RetryPolicyConfiguration::new(3)
            .with_backoff(BackoffType::Constant)
            .with_initial_delay(Duration::from_secs(3600))
            .with_max_delay(Duration::from_secs(3600))
            .with_jitter(false);
        let pipeline = RetryPipeline::new("a", config, Arc::new(crate::retry::TokioClock));
        let op = Flaky::always_failing();

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            canceller.cancel();
        });

        let started = tokio::time::Instant::now();
        let err = pipeline.execute(&op, &mut (), &token).await.unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(op.calls(), 1);
        assert!(started.elapsed() < Duration::from_secs(3600));
    }

    #[tokio::test]
    async fn cancelled_marker_is_not_a_failure() {
        struct StopsEarly;

        #[async_trait]
        impl Operation<()> for StopsEarly {
            async fn invoke(&self, _: &mut (), _: &CancellationToken) -> anyhow::Result<()> {
                Err(Cancelled.into())
            }
        }

        let pipeline = RetryPipeline::new("a", constant(3), Arc::new(InstantClock::new()));
        let err = pipeline
            .execute(&StopsEarly, &mut (), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, RetryError::Cancelled { attempts: 1 }));
    }
}

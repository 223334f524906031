//! Retry policy configuration and backoff computation.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Default delay before the first retry.
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(1);

/// Default upper bound on any computed delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Default number of retries after the first failure.
pub const DEFAULT_RETRY_COUNT: u32 = 3;

/// How the delay grows between successive retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffType {
    /// Every retry waits `initial_delay`.
    Constant,
    /// Retry `n` waits `initial_delay * n`.
    Linear,
    /// Retry `n` waits `initial_delay * 2^(n-1)`.
    #[default]
    Exponential,
}

impl fmt::Display for BackoffType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BackoffType::Constant => "constant",
            BackoffType::Linear => "linear",
            BackoffType::Exponential => "exponential",
        };
        write!(f, "{}", s)
    }
}

/// Information handed to the `on_retry` hook before each backoff delay.
#[derive(Debug)]
pub struct RetryAttempt<'a> {
    /// Step the pipeline belongs to.
    pub step: &'a str,
    /// Failure that triggered the retry.
    pub error: &'a anyhow::Error,
    /// Delay about to be waited out.
    pub delay: Duration,
    /// Retry number, starting at 1 for the first retry.
    pub attempt: u32,
    /// Configured retry count, not counting the first attempt.
    pub max_retries: u32,
}

/// Predicate deciding whether a failure is worth retrying.
pub type RetryPredicate = Arc<dyn Fn(&anyhow::Error) -> bool + Send + Sync>;

/// Observability hook invoked before each retry delay.
pub type RetryHook = Arc<dyn Fn(&RetryAttempt<'_>) + Send + Sync>;

/// Retry behavior for a single step.
///
/// # Example
///
/// ```
/// use bootkit::retry::{BackoffType, RetryPolicyConfiguration};
/// use std::time::Duration;
///
/// let policy = RetryPolicyConfiguration::new(3)
///     .with_backoff(BackoffType::Exponential)
///     .with_initial_delay(Duration::from_secs(1))
///     .with_max_delay(Duration::from_secs(30))
///     .with_jitter(false);
///
/// assert_eq!(policy.base_delay(1), Duration::from_secs(1));
/// assert_eq!(policy.base_delay(3), Duration::from_secs(4));
/// ```
#[derive(Clone)]
pub struct RetryPolicyConfiguration {
    /// Maximum retries after the first failure.
    pub retry_count: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Growth of the delay between retries.
    pub backoff_type: BackoffType,
    /// Upper bound on any computed delay, jitter included.
    pub max_delay: Duration,
    /// Randomize each delay within `[0.5x, 1.5x]`.
    pub use_jitter: bool,
    /// Decides whether a failure is retryable. `None` defers to the factory default.
    pub retry_on: Option<RetryPredicate>,
    /// Called before each delay. Must not be used for control flow.
    pub on_retry: Option<RetryHook>,
}

impl Default for RetryPolicyConfiguration {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_COUNT)
    }
}

impl fmt::Debug for RetryPolicyConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicyConfiguration")
            .field("retry_count", &self.retry_count)
            .field("initial_delay", &self.initial_delay)
            .field("backoff_type", &self.backoff_type)
            .field("max_delay", &self.max_delay)
            .field("use_jitter", &self.use_jitter)
            .field("retry_on", &self.retry_on.is_some())
            .field("on_retry", &self.on_retry.is_some())
            .finish()
    }
}

impl RetryPolicyConfiguration {
    /// Create a policy with the given retry count and default timing.
    pub fn new(retry_count: u32) -> Self {
        Self {
            retry_count,
            initial_delay: DEFAULT_INITIAL_DELAY,
            backoff_type: BackoffType::default(),
            max_delay: DEFAULT_MAX_DELAY,
            use_jitter: true,
            retry_on: None,
            on_retry: None,
        }
    }

    /// A policy that surfaces the first failure.
    pub fn no_retry() -> Self {
        Self {
            use_jitter: false,
            ..Self::new(0)
        }
    }

    /// Set the retry count.
    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    /// Set the delay before the first retry.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the backoff growth.
    pub fn with_backoff(mut self, backoff_type: BackoffType) -> Self {
        self.backoff_type = backoff_type;
        self
    }

    /// Set the delay ceiling.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Enable or disable jitter.
    pub fn with_jitter(mut self, use_jitter: bool) -> Self {
        self.use_jitter = use_jitter;
        self
    }

    /// Only retry failures for which `predicate` returns true.
    pub fn retry_on<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&anyhow::Error) -> bool + Send + Sync + 'static,
    {
        self.retry_on = Some(Arc::new(predicate));
        self
    }

    /// Install a hook that observes every retry.
    pub fn on_retry<F>(mut self, hook: F) -> Self
    where
        F: Fn(&RetryAttempt<'_>) + Send + Sync + 'static,
    {
        self.on_retry = Some(Arc::new(hook));
        self
    }

    /// Whether `other` retries the same way: equal timing and the same
    /// predicate and hook instances.
    pub fn same_policy(&self, other: &Self) -> bool {
        fn same_fn<T: ?Sized>(a: &Option<Arc<T>>, b: &Option<Arc<T>>) -> bool {
            match (a, b) {
                (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                (None, None) => true,
                _ => false,
            }
        }

        self.retry_count == other.retry_count
            && self.initial_delay == other.initial_delay
            && self.backoff_type == other.backoff_type
            && self.max_delay == other.max_delay
            && self.use_jitter == other.use_jitter
            && same_fn(&self.retry_on, &other.retry_on)
            && same_fn(&self.on_retry, &other.on_retry)
    }

    /// Total executions this policy allows (first attempt plus retries).
    pub fn max_attempts(&self) -> u32 {
        self.retry_count.saturating_add(1)
    }

    /// Delay before retry `attempt` (1-based), clamped to `max_delay`, without jitter.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let raw = match self.backoff_type {
            BackoffType::Constant => Some(self.initial_delay),
            BackoffType::Linear => self.initial_delay.checked_mul(attempt),
            BackoffType::Exponential => 2u32
                .checked_pow(attempt - 1)
                .and_then(|factor| self.initial_delay.checked_mul(factor)),
        };

        // Overflow can only mean the delay is past any sane ceiling.
        raw.unwrap_or(self.max_delay).min(self.max_delay)
    }

    /// Delay before retry `attempt`, with jitter drawn from the thread RNG when enabled.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.delay_with_rng(attempt, &mut rand::thread_rng())
    }

    /// Delay before retry `attempt`, with jitter drawn from `rng` when enabled.
    pub fn delay_with_rng<R: Rng>(&self, attempt: u32, rng: &mut R) -> Duration {
        let clamped = self.base_delay(attempt);
        if !self.use_jitter || clamped.is_zero() {
            return clamped;
        }

        let factor: f64 = rng.gen_range(0.5..=1.5);
        let jittered = (clamped.as_secs_f64() * factor).min(self.max_delay.as_secs_f64());
        Duration::try_from_secs_f64(jittered).unwrap_or(self.max_delay)
    }
}

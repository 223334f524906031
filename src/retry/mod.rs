//! Retry and backoff around step execution.
//!
//! - [`RetryPolicyConfiguration`] - Retry count, delay growth, jitter and hooks
//! - [`RetryPipeline`] - The state machine that drives one step's attempts
//! - [`RetryPolicyFactory`] - Builds a pipeline per step
//! - [`Clock`] - Injectable time source for measuring and waiting
//!
//! # Example
//!
//! ```
//! use bootkit::retry::{DefaultRetryPolicyFactory, RetryPolicyConfiguration, RetryPolicyFactory};
//!
//! let factory = DefaultRetryPolicyFactory::default();
//! let policy = RetryPolicyConfiguration::new(2);
//!
//! let pipeline = factory.create("migrate", Some(&policy));
//! assert_eq!(pipeline.config().max_attempts(), 3);
//!
//! // Steps without a policy get a single attempt.
//! let pipeline = factory.create("seed", None);
//! assert_eq!(pipeline.config().max_attempts(), 1);
//! ```

pub mod clock;
pub mod factory;
pub mod pipeline;
pub mod policy;

pub use clock::{Clock, InstantClock, TokioClock};
pub use factory::{DefaultRetryPolicyFactory, NullRetryPolicyFactory, RetryPolicyFactory};
pub use pipeline::{Operation, RetryError, RetryPipeline};
pub use policy::{
    BackoffType, RetryAttempt, RetryHook, RetryPolicyConfiguration, RetryPredicate,
    DEFAULT_INITIAL_DELAY, DEFAULT_MAX_DELAY, DEFAULT_RETRY_COUNT,
};

//! Per-step retry pipeline construction.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use super::clock::{Clock, TokioClock};
use super::pipeline::RetryPipeline;
use super::policy::{RetryPolicyConfiguration, RetryPredicate};

/// Builds the retry pipeline wrapping one step's execution.
pub trait RetryPolicyFactory: Send + Sync {
    /// Pipeline for `step_name`. `config` is `None` when the step declares no policy.
    fn create(
        &self,
        step_name: &str,
        config: Option<&RetryPolicyConfiguration>,
    ) -> Arc<RetryPipeline>;
}

/// Factory honoring each step's declared policy.
///
/// Pipelines are cached by step name for the lifetime of the factory. A
/// cached pipeline is only reused while the step's declared policy is
/// unchanged, so a factory shared between bootstrappers still honors each
/// one's configuration.
pub struct DefaultRetryPolicyFactory {
    clock: Arc<dyn Clock>,
    default_retry_on: Option<RetryPredicate>,
    cache: Mutex<HashMap<String, Arc<RetryPipeline>>>,
}

impl Default for DefaultRetryPolicyFactory {
    fn default() -> Self {
        Self::new(Arc::new(TokioClock))
    }
}

impl DefaultRetryPolicyFactory {
    /// Create a factory whose pipelines wait on `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            default_retry_on: None,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Predicate for policies that do not supply their own.
    ///
    /// Unset, every failure is considered retryable.
    pub fn with_default_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&anyhow::Error) -> bool + Send + Sync + 'static,
    {
        self.default_retry_on = Some(Arc::new(predicate));
        self
    }

    /// Number of pipelines built so far.
    pub fn cached(&self) -> usize {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl RetryPolicyFactory for DefaultRetryPolicyFactory {
    fn create(
        &self,
        step_name: &str,
        config: Option<&RetryPolicyConfiguration>,
    ) -> Arc<RetryPipeline> {
        let config = config
            .cloned()
            .unwrap_or_else(RetryPolicyConfiguration::no_retry);

        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(pipeline) = cache.get(step_name) {
            if pipeline.config().same_policy(&config) {
                debug!(step = %step_name, "Reusing cached retry pipeline");
                return Arc::clone(pipeline);
            }
            debug!(step = %step_name, "Retry policy changed, rebuilding pipeline");
        }

        debug!(
            step = %step_name,
            retries = config.retry_count,
            backoff = %config.backoff_type,
            "Building retry pipeline"
        );

        let pipeline = Arc::new(
            RetryPipeline::new(step_name, config, Arc::clone(&self.clock))
                .with_default_predicate(self.default_retry_on.clone()),
        );
        cache.insert(step_name.to_string(), Arc::clone(&pipeline));
        pipeline
    }
}

/// Factory that ignores every policy: each step gets exactly one attempt.
#[derive(Clone)]
pub struct NullRetryPolicyFactory {
    clock: Arc<dyn Clock>,
}

impl Default for NullRetryPolicyFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl NullRetryPolicyFactory {
    /// Create the no-op factory.
    pub fn new() -> Self {
        Self {
            clock: Arc::new(TokioClock),
        }
    }
}

impl RetryPolicyFactory for NullRetryPolicyFactory {
    fn create(
        &self,
        step_name: &str,
        _config: Option<&RetryPolicyConfiguration>,
    ) -> Arc<RetryPipeline> {
        Arc::new(RetryPipeline::noop(step_name, Arc::clone(&self.clock)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::InstantClock;

    #[test]
    fn missing_config_yields_no_retry_pipeline() {
        let factory = DefaultRetryPolicyFactory::new(Arc::new(InstantClock::new()));
        let pipeline = factory.create("seed", None);
        assert_eq!(pipeline.step(), "seed");
        assert_eq!(pipeline.config().retry_count, 0);
    }

    #[test]
    fn declared_config_is_used() {
        let factory = DefaultRetryPolicyFactory::new(Arc::new(InstantClock::new()));
        let config = RetryPolicyConfiguration::new(5);
        let pipeline = factory.create("migrate", Some(&config));
        assert_eq!(pipeline.config().retry_count, 5);
    }

    #[test]
    fn pipelines_are_cached_per_step_name() {
        let factory = DefaultRetryPolicyFactory::default();
        let config = RetryPolicyConfiguration::new(2);

        let first = factory.create("a", Some(&config));
        let second = factory.create("a", Some(&config));
        let other = factory.create("b", None);

        assert!(Arc::ptr_eq(&first, &second));
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(factory.cached(), 2);
    }

    #[test]
    fn changed_policy_rebuilds_cached_pipeline() {
        let factory = DefaultRetryPolicyFactory::default();

        let undeclared = factory.create("db", None);
        assert_eq!(undeclared.config().retry_count, 0);

        let declared = RetryPolicyConfiguration::new(3);
        let rebuilt = factory.create("db", Some(&declared));
        assert!(!Arc::ptr_eq(&undeclared, &rebuilt));
        assert_eq!(rebuilt.config().retry_count, 3);

        let again = factory.create("db", Some(&declared));
        assert!(Arc::ptr_eq(&rebuilt, &again));
        assert_eq!(factory.cached(), 1);
    }

    #[test]
    fn different_predicate_is_a_different_policy() {
        let factory = DefaultRetryPolicyFactory::default();
        let lenient = RetryPolicyConfiguration::new(2).retry_on(|_| true);
        let strict = RetryPolicyConfiguration::new(2).retry_on(|_| false);

        let first = factory.create("a", Some(&lenient));
        let second = factory.create("a", Some(&strict));

        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn separate_factories_do_not_share_cache() {
        let config = RetryPolicyConfiguration::new(2);
        let one = DefaultRetryPolicyFactory::default();
        let two = DefaultRetryPolicyFactory::default();

        let a = one.create("a", Some(&config));
        let b = two.create("a", Some(&config));

        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn null_factory_ignores_policy() {
        let factory = NullRetryPolicyFactory::new();
        let config = RetryPolicyConfiguration::new(10);
        let pipeline = factory.create("a", Some(&config));
        assert_eq!(pipeline.config().retry_count, 0);
        assert_eq!(pipeline.config().max_attempts(), 1);
    }
}

//! Closure-backed steps.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::retry::RetryPolicyConfiguration;

use super::Step;

/// Future returned by a [`FnStep`] body.
pub type StepFuture<'a> = BoxFuture<'a, anyhow::Result<()>>;

type StepFn<C> = dyn for<'a> Fn(&'a mut C, CancellationToken) -> StepFuture<'a> + Send + Sync;

/// A step whose work is a closure.
///
/// ```
/// use bootkit::steps::FnStep;
///
/// let step = FnStep::new("ping", |ctx: &mut u32, _token| {
///     Box::pin(async move {
///         *ctx += 1;
///         anyhow::Ok(())
///     })
/// });
/// # let _ = step;
/// ```
pub struct FnStep<C> {
    name: String,
    dependencies: Vec<String>,
    retry: Option<RetryPolicyConfiguration>,
    run: Arc<StepFn<C>>,
}

impl<C> fmt::Debug for FnStep<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnStep")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .field("retry", &self.retry)
            .finish()
    }
}

impl<C: Send + 'static> FnStep<C> {
    /// Create a step from an async body.
    pub fn new<F>(name: impl Into<String>, run: F) -> Self
    where
        F: for<'a> Fn(&'a mut C, CancellationToken) -> StepFuture<'a> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            dependencies: Vec::new(),
            retry: None,
            run: Arc::new(run),
        }
    }

    /// Create a step from a synchronous body.
    pub fn from_fn<F>(name: impl Into<String>, run: F) -> Self
    where
        F: Fn(&mut C) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self::new(name, move |ctx: &mut C, _token: CancellationToken| {
            let result = run(ctx);
            Box::pin(async move { result })
        })
    }

    /// Declare dependencies.
    pub fn depends_on<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies
            .extend(dependencies.into_iter().map(Into::into));
        self
    }

    /// Attach a retry policy.
    pub fn with_retry(mut self, policy: RetryPolicyConfiguration) -> Self {
        self.retry = Some(policy);
        self
    }
}

#[async_trait]
impl<C: Send + 'static> Step<C> for FnStep<C> {
    fn name(&self) -> &str {
        &self.name
    }

    fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    fn retry_policy(&self) -> Option<&RetryPolicyConfiguration> {
        self.retry.as_ref()
    }

    async fn execute(&self, context: &mut C, token: &CancellationToken) -> anyhow::Result<()> {
        (self.run)(context, token.clone()).await
    }
}

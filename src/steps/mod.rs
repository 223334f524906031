//! The step contract and the step kinds bootkit ships with.
//!
//! - [`Step`] - A named unit of initialization work with dependencies
//! - [`FnStep`] - A step backed by a closure
//! - [`CommandStep`] - A step that runs a shell command
//!
//! # Example
//!
//! ```
//! use bootkit::steps::{FnStep, Step};
//!
//! let step = FnStep::from_fn("load_config", |ctx: &mut Vec<String>| {
//!     ctx.push("config".to_string());
//!     Ok(())
//! })
//! .depends_on(["read_env"]);
//!
//! assert_eq!(step.name(), "load_config");
//! assert_eq!(step.dependencies(), ["read_env".to_string()]);
//! ```

pub mod command;
pub mod fn_step;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::retry::{Operation, RetryPolicyConfiguration};

pub use command::{CommandContext, CommandFailed, CommandStep};
pub use fn_step::{FnStep, StepFuture};

/// A named unit of initialization work.
///
/// `C` is the caller's context, shared mutably by every step of a run.
/// Steps run one at a time, so implementations need no locking around it.
#[async_trait]
pub trait Step<C: Send>: Send + Sync {
    /// Unique name within a run.
    fn name(&self) -> &str;

    /// Names of the steps that must succeed before this one runs.
    fn dependencies(&self) -> &[String] {
        &[]
    }

    /// Retry behavior. `None` means a single attempt.
    fn retry_policy(&self) -> Option<&RetryPolicyConfiguration> {
        None
    }

    /// Perform the work.
    ///
    /// Long-running implementations should watch `token` and return
    /// [`Cancelled`](crate::Cancelled) when it fires.
    async fn execute(&self, context: &mut C, token: &CancellationToken) -> anyhow::Result<()>;
}

#[async_trait]
impl<C, T> Operation<C> for T
where
    C: Send,
    T: Step<C> + ?Sized,
{
    async fn invoke(&self, state: &mut C, token: &CancellationToken) -> anyhow::Result<()> {
        self.execute(state, token).await
    }
}

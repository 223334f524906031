//! Bootkit - Dependency-ordered bootstrap sequencing.
//!
//! Bootkit runs a set of named initialization steps in an order that honors
//! their declared dependencies, retrying transient failures with configurable
//! backoff and reporting progress as it goes. The first terminal failure
//! stops the run.
//!
//! # Modules
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`config`] - Plan file loading, parsing, and validation
//! - [`error`] - Error types and result aliases
//! - [`progress`] - Step progress events and sinks
//! - [`retry`] - Retry policies, pipelines, and clocks
//! - [`runner`] - Dependency resolution and the bootstrapper
//! - [`steps`] - The step contract and built-in step kinds
//! - [`ui`] - Spinners and terminal output
//!
//! # Example
//!
//! ```
//! use bootkit::progress::ProgressLog;
//! use bootkit::retry::RetryPolicyConfiguration;
//! use bootkit::runner::Bootstrapper;
//! use bootkit::steps::FnStep;
//! use tokio_util::sync::CancellationToken;
//!
//! # tokio_test_block(async {
//! let mut bootstrapper = Bootstrapper::builder()
//!     .step(FnStep::from_fn("migrate", |log: &mut Vec<String>| {
//!         log.push("migrate".to_string());
//!         Ok(())
//!     }).depends_on(["connect"]))
//!     .step(FnStep::from_fn("connect", |log: &mut Vec<String>| {
//!         log.push("connect".to_string());
//!         Ok(())
//!     }).with_retry(RetryPolicyConfiguration::new(3)))
//!     .build();
//!
//! let mut log = Vec::new();
//! let progress = ProgressLog::new();
//! let report = bootstrapper
//!     .execute(&mut log, &progress, &CancellationToken::new())
//!     .await
//!     .unwrap();
//!
//! assert_eq!(log, ["connect", "migrate"]);
//! assert_eq!(report.order(), ["connect", "migrate"]);
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f)
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod progress;
pub mod retry;
pub mod runner;
pub mod steps;
pub mod ui;

pub use error::{BootstrapError, Cancelled, Result};

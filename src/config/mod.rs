//! Plan file loading, parsing, and validation.
//!
//! - Schema definitions in [`schema`]
//! - File discovery and loading in [`loader`]
//! - Validation in [`validator`]
//! - Conversion into runnable steps in [`build`]
//!
//! # Example
//!
//! ```
//! use bootkit::config::{build_steps, load_plan, validate};
//! use tempfile::TempDir;
//! use std::fs;
//!
//! let temp = TempDir::new().unwrap();
//! fs::write(
//!     temp.path().join("bootkit.yml"),
//!     "steps:\n  - name: hello\n    command: echo hello\n",
//! )
//! .unwrap();
//!
//! let plan = load_plan(temp.path(), None).unwrap();
//! validate(&plan).unwrap();
//! assert_eq!(build_steps(&plan).len(), 1);
//! ```
//!
//! # Plan File Locations
//!
//! The first of these found in the project root is used:
//! 1. `bootkit.yml`
//! 2. `.bootkit/plan.yml`

pub mod build;
pub mod loader;
pub mod schema;
pub mod validator;

pub use build::{build_context, build_step, build_steps};
pub use loader::{
    discover_plan, find_project_root, load_plan, load_plan_file, parse_plan, PLAN_FILES,
};
pub use schema::{PlanConfig, RetrySettings, Settings, StepConfig};
pub use validator::{validate, validate_plan, ValidationError};

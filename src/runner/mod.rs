//! Step execution orchestration.

pub mod bootstrapper;
pub mod dependency;

pub use bootstrapper::{
    BootstrapReport, BootstrapState, Bootstrapper, BootstrapperBuilder, StepOutcome,
};
pub use dependency::{resolve_order, DependencyGraph, DependencyGraphBuilder};

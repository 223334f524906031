//! Terminal output.
//!
//! - [`BootkitTheme`] - Colors and icons
//! - [`ConsoleProgress`] - A [`ProgressSink`](crate::progress::ProgressSink) that draws spinners
//! - [`Output`] - Status lines printed by commands

pub mod output;
pub mod progress;
pub mod theme;

pub use output::Output;
pub use progress::{format_duration, ConsoleProgress};
pub use theme::{should_use_colors, BootkitTheme};

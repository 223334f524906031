//! Terminal rendering of step progress.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};

use crate::progress::{ProgressSink, ProgressStatus, StepProgress};

use super::theme::BootkitTheme;

/// Renders progress events to the terminal.
///
/// In interactive mode each running step gets a spinner that is replaced by
/// its final line. Otherwise one plain line is printed per event.
pub struct ConsoleProgress {
    theme: BootkitTheme,
    interactive: bool,
    quiet: bool,
    descriptions: HashMap<String, String>,
    running: Mutex<Option<RunningStep>>,
}

struct RunningStep {
    started: Instant,
    bar: Option<ProgressBar>,
}

impl ConsoleProgress {
    /// Create a renderer.
    pub fn new(theme: BootkitTheme, interactive: bool) -> Self {
        Self {
            theme,
            interactive,
            quiet: false,
            descriptions: HashMap::new(),
            running: Mutex::new(None),
        }
    }

    /// Only print failures.
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Descriptions shown next to step names.
    pub fn with_descriptions(mut self, descriptions: HashMap<String, String>) -> Self {
        self.descriptions = descriptions;
        self
    }

    fn spinner(&self, message: String) -> ProgressBar {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner()
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
                .template("{spinner:.magenta} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(message);
        bar.enable_steady_tick(Duration::from_millis(80));
        bar
    }

    fn finish(&self, running: Option<RunningStep>, line: String) {
        match running.and_then(|r| r.bar) {
            Some(bar) => {
                bar.set_style(
                    ProgressStyle::default_spinner()
                        .template("{msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                );
                bar.finish_with_message(line);
            }
            None => println!("{}", line),
        }
    }

    fn render(&self, event: &StepProgress) {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);

        match event.status {
            ProgressStatus::Started => {
                let title = self.theme.format_step(
                    &event.step_name,
                    self.descriptions.get(&event.step_name).map(String::as_str),
                );
                let bar = if self.quiet {
                    None
                } else if self.interactive {
                    Some(self.spinner(title))
                } else {
                    println!("{}", title);
                    None
                };
                *running = Some(RunningStep {
                    started: Instant::now(),
                    bar,
                });
            }
            ProgressStatus::Retrying => {
                if self.quiet {
                    return;
                }
                let line = self.theme.format_warning(&format!(
                    "{} failed, attempt {} in {}: {}",
                    event.step_name,
                    event.attempt,
                    format_duration(event.delay.unwrap_or_default()),
                    event.error.as_deref().unwrap_or("unknown error")
                ));
                match running.as_ref().and_then(|r| r.bar.as_ref()) {
                    Some(bar) => bar.println(format!("  {}", line)),
                    None => println!("  {}", line),
                }
            }
            ProgressStatus::Succeeded => {
                let step = running.take();
                if self.quiet {
                    return;
                }
                let elapsed = step.as_ref().map(|r| r.started.elapsed()).unwrap_or_default();
                let mut message = event.step_name.clone();
                if event.attempt > 1 {
                    message.push_str(&format!(" (attempt {})", event.attempt));
                }
                let line = format!(
                    "{} {}",
                    self.theme.format_success(&message),
                    self.theme.duration.apply_to(format_duration(elapsed))
                );
                self.finish(step, line);
            }
            ProgressStatus::Failed => {
                let step = running.take();
                let line = self.theme.format_error(&format!(
                    "{} - {}",
                    event.step_name,
                    event.error.as_deref().unwrap_or("unknown error")
                ));
                self.finish(step, line);
            }
        }
    }

    /// Clear a spinner left behind by a cancelled run.
    pub fn abandon(&self) {
        let running = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(bar) = running.and_then(|r| r.bar) {
            bar.finish_and_clear();
        }
    }
}

impl ProgressSink for ConsoleProgress {
    fn report(&self, event: StepProgress) {
        self.render(&event);
    }
}

/// Format a duration for display.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 1.0 {
        format!("{}ms", d.as_millis())
    } else if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        let mins = secs / 60.0;
        format!("{:.1}m", mins)
    }
}

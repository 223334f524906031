//! Plain message output for commands.

use super::theme::BootkitTheme;

/// How commands print status lines.
#[derive(Debug, Clone)]
pub struct Output {
    theme: BootkitTheme,
    interactive: bool,
    quiet: bool,
}

impl Output {
    /// Create an output handle.
    pub fn new(theme: BootkitTheme, interactive: bool, quiet: bool) -> Self {
        Self {
            theme,
            interactive,
            quiet,
        }
    }

    /// Theme in use.
    pub fn theme(&self) -> &BootkitTheme {
        &self.theme
    }

    /// Whether the terminal can show spinners.
    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    /// Whether only errors are shown.
    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    /// Print a plain line.
    pub fn message(&self, msg: &str) {
        if !self.quiet {
            println!("{}", msg);
        }
    }

    /// Print a header banner.
    pub fn header(&self, title: &str) {
        if !self.quiet {
            println!("{}\n", self.theme.format_header(title));
        }
    }

    /// Print a success line.
    pub fn success(&self, msg: &str) {
        if !self.quiet {
            println!("{}", self.theme.format_success(msg));
        }
    }

    /// Print a warning line to stderr.
    pub fn warning(&self, msg: &str) {
        eprintln!("{}", self.theme.warning.apply_to(format!("⚠ {}", msg)));
    }

    /// Print an error line to stderr. Shown even when quiet.
    pub fn error(&self, msg: &str) {
        eprintln!("{}", self.theme.format_error(msg));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exposes_mode() {
        let out = Output::new(BootkitTheme::plain(), false, true);
        assert!(out.is_quiet());
        assert!(!out.is_interactive());
        assert_eq!(out.theme().format_success("x"), "✓ x");
    }
}

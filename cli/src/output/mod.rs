//! Terminal output for the `devpilot` command line.

pub mod json;
pub mod styles;

use console::Term;
use owo_colors::OwoColorize as _;
pub use styles::Styles;

/// Status-line printer shared by the human-readable command paths.
pub struct OutputContext {
    pub styles: Styles,
    /// Drop everything except failures.
    pub quiet: bool,
}

impl OutputContext {
    /// Colors are used only on a terminal, and never with `--no-color` or
    /// `NO_COLOR` set.
    #[must_use]
    pub fn new(no_color: bool, quiet: bool) -> Self {
        let mut styles = Styles::default();
        if !no_color && Term::stdout().is_term() && std::env::var_os("NO_COLOR").is_none() {
            styles.colorize();
        }
        Self { styles, quiet }
    }

    /// `✓ msg` on stdout.
    pub fn success(&self, msg: &str) {
        if !self.quiet {
            println!("  {} {msg}", "✓".style(self.styles.ok));
        }
    }

    /// `⚠ msg` on stdout, for decisions that wait on `--confirm`.
    pub fn warn(&self, msg: &str) {
        if !self.quiet {
            println!("  {} {msg}", "⚠".style(self.styles.confirm));
        }
    }

    /// `✗ msg` on stderr. Printed even when quiet.
    pub fn error(&self, msg: &str) {
        eprintln!("  {} {msg}", "✗".style(self.styles.failed));
    }

    pub fn header(&self, msg: &str) {
        if !self.quiet {
            println!("  {}", msg.style(self.styles.title));
        }
    }

    /// Closing line of `devpilot run`: a success line for exit code 0,
    /// otherwise an error line.
    pub fn finished(&self, summary: &str, success: bool) {
        if success {
            self.success(summary);
        } else {
            self.error(summary);
        }
    }
}

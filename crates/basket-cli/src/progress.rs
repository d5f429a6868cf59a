//! Terminal spinner for long-running counts.
//!
//! Everything here is a no-op when output is quiet, so commands can drive a
//! `Progress` unconditionally.

use indicatif::{ProgressBar, ProgressStyle};
use std::borrow::Cow;
use std::time::Duration;

const TICK_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";
const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Spinner tied to one step of a command.
pub struct Progress {
    bar: Option<ProgressBar>,
}

impl Progress {
    /// Start spinning with `message` unless `quiet`.
    pub fn start(message: impl Into<Cow<'static, str>>, quiet: bool) -> Self {
        if quiet {
            return Self { bar: None };
        }
        let bar = ProgressBar::new_spinner()
            .with_style(style("{spinner:.cyan} {msg}").tick_chars(TICK_CHARS))
            .with_message(message);
        bar.enable_steady_tick(TICK_INTERVAL);
        Self { bar: Some(bar) }
    }

    #[cfg(test)]
    fn is_active(&self) -> bool {
        self.bar.is_some()
    }

    /// Stop with a green check mark.
    pub fn succeed(self, message: impl Into<Cow<'static, str>>) {
        self.stop("{prefix:.green} {msg}", "✓", message);
    }

    /// Stop with a red cross.
    pub fn fail(self, message: impl Into<Cow<'static, str>>) {
        self.stop("{prefix:.red} {msg}", "✗", message);
    }

    fn stop(self, template: &str, mark: &'static str, message: impl Into<Cow<'static, str>>) {
        if let Some(bar) = self.bar {
            bar.set_style(style(template));
            bar.set_prefix(mark);
            bar.finish_with_message(message);
        }
    }
}

// Templates are constants; fall back to the plain spinner rather than panic
fn style(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template).unwrap_or_else(|_| ProgressStyle::default_spinner())
}

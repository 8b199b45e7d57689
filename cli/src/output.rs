//! Terminal output utilities for styled CLI output.

use console::{Term, style};
use std::fmt::Display;
use wellspring_maintenance::bulk::{MutatorPhase, ProgressEvent, ProgressSink};

/// Terminal output helper for consistent styled output.
#[derive(Clone)]
pub struct Output {
    term: Term,
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

impl Output {
    /// Create a new output helper writing to stdout.
    pub fn new() -> Self {
        Self {
            term: Term::stdout(),
        }
    }

    /// Print a success message with a green checkmark.
    pub fn success(&self, message: impl Display) {
        drop(
            self.term
                .write_line(&format!("{} {}", style("✓").green().bold(), message)),
        );
    }

    /// Print an error message with a red X.
    pub fn error(&self, message: impl Display) {
        drop(
            self.term
                .write_line(&format!("{} {}", style("✗").red().bold(), message)),
        );
    }

    /// Print a warning message with a yellow warning sign.
    pub fn warning(&self, message: impl Display) {
        drop(
            self.term
                .write_line(&format!("{} {}", style("⚠").yellow().bold(), message)),
        );
    }

    /// Print an info message with a blue info icon.
    pub fn info(&self, message: impl Display) {
        drop(
            self.term
                .write_line(&format!("{} {}", style("ℹ").blue().bold(), message)),
        );
    }

    /// Print a plain message without any prefix.
    pub fn print(&self, message: impl Display) {
        drop(self.term.write_line(&message.to_string()));
    }

    pub fn newline(&self) {
        drop(self.term.write_line(""));
    }

    pub fn header(&self, message: impl Display) {
        drop(
            self.term
                .write_line(&style(message).bold().cyan().to_string()),
        );
    }

    /// Print a labeled value with indentation.
    pub fn labeled_indent(&self, label: impl Display, value: impl Display, indent: usize) {
        let spaces = " ".repeat(indent);
        drop(
            self.term
                .write_line(&format!("{spaces}{}: {}", style(label).dim(), value)),
        );
    }

    /// Print a dim/muted message.
    pub fn dim(&self, message: impl Display) {
        drop(self.term.write_line(&style(message).dim().to_string()));
    }
}

/// Renders bulk-run progress as terminal lines.
pub struct TerminalProgress {
    out: Output,
}

impl TerminalProgress {
    pub fn new(out: Output) -> Self {
        Self { out }
    }
}

impl ProgressSink for TerminalProgress {
    fn on_progress(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::PhaseEntered(MutatorPhase::Mutating) => self.out.dim("Deleting..."),
            ProgressEvent::PhaseEntered(_) => {}
            ProgressEvent::PageFetched {
                page,
                matched_so_far,
            } => self
                .out
                .dim(format!("Fetched page {page} ({matched_so_far} matched so far)")),
            ProgressEvent::BatchDeleted {
                deleted_so_far,
                total,
            } => self
                .out
                .info(format!("Deleted {deleted_so_far} of {total}")),
            ProgressEvent::BatchFailed {
                batch,
                size,
                message,
            } => self
                .out
                .error(format!("Batch {batch} ({size} items) failed: {message}")),
        }
    }
}

/// Human-readable byte count, e.g. `1.5 MiB`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1536), "1.5 KiB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MiB");
    }
}

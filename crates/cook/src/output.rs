//! Diagnostics on stderr. Stdout is reserved for cooked HTML and listings.

use std::fmt::Display;

use console::{Style, Term};

/// Styled stderr writer shared by the commands.
pub(crate) struct Output {
    term: Term,
    warning: Style,
    error: Style,
    heading: Style,
    hint: Style,
}

impl Output {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            term: Term::stderr(),
            warning: Style::new().yellow().bold(),
            error: Style::new().red().bold(),
            heading: Style::new().cyan().bold(),
            hint: Style::new().dim(),
        }
    }

    /// Print `warning: <msg>` with a yellow prefix.
    pub(crate) fn warning(&self, msg: &str) {
        let _ = self
            .term
            .write_line(&format!("{} {msg}", self.warning.apply_to("warning:")));
    }

    /// Print `error: <err>` with a red prefix.
    pub(crate) fn error(&self, err: &dyn Display) {
        let _ = self
            .term
            .write_line(&format!("{} {err}", self.error.apply_to("error:")));
    }

    /// Print a section heading above a listing.
    pub(crate) fn heading(&self, msg: &str) {
        let _ = self.term.write_line(&self.heading.apply_to(msg).to_string());
    }

    /// Print a dimmed legend or hint line.
    pub(crate) fn hint(&self, msg: &str) {
        let _ = self.term.write_line(&self.hint.apply_to(msg).to_string());
    }
}

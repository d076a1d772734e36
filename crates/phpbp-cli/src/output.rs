//! Build log formatting.
//!
//! Platforms show buildpack output verbatim, so every line follows the
//! usual markers: `-----> ` for a step, seven spaces for detail, ` !     `
//! for anything the user must read.

use console::{style, StyledObject, Term};
use std::io::Write;

const SECTION: &str = "-----> ";
const INDENT: &str = "       ";
const ALERT: &str = " !     ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Verbosity {
    Quiet,
    #[default]
    Normal,
    Verbose,
}

#[derive(Clone)]
pub struct Output {
    term: Term,
    verbosity: Verbosity,
}

impl Output {
    pub fn new() -> Self {
        Self {
            term: Term::stdout(),
            verbosity: Verbosity::Normal,
        }
    }

    pub fn set_verbosity(&mut self, verbosity: Verbosity) {
        self.verbosity = verbosity;
    }

    fn emit(&self, level: Verbosity, line: StyledObject<String>) {
        if self.verbosity >= level {
            let _ = writeln!(&self.term, "{}", line);
        }
    }

    pub fn section(&self, title: &str) {
        self.emit(Verbosity::Normal, style(format!("{}{}", SECTION, title)).bold());
    }

    pub fn info(&self, message: &str) {
        self.emit(Verbosity::Normal, style(format!("{}{}", INDENT, message)));
    }

    pub fn verbose(&self, message: &str) {
        self.emit(Verbosity::Verbose, style(format!("{}{}", INDENT, message)).dim());
    }

    /// Shown even with `--quiet`
    pub fn warning(&self, message: &str) {
        self.emit(Verbosity::Quiet, style(alert(message)).yellow());
    }

    /// Always shown, on stderr
    pub fn error(&self, message: &str) {
        let _ = writeln!(Term::stderr(), "{}", style(alert(message)).red().bold());
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

/// Prefix every line of `message` with the alert marker
pub fn alert(message: &str) -> String {
    message
        .lines()
        .map(|line| format!("{}{}", ALERT, line))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_prefixes_each_line() {
        assert_eq!(alert("one\ntwo"), " !     one\n !     two");
    }

    #[test]
    fn test_quiet_still_shows_warnings() {
        assert!(Verbosity::Quiet < Verbosity::Normal);
        assert!(Verbosity::Normal < Verbosity::Verbose);
        assert_eq!(Verbosity::default(), Verbosity::Normal);
    }
}

//! Move display surface.
//! The loop receives a display reference at construction; there is no
//! ambient global surface. [`ConsoleDisplay`] is the terminal rendition of
//! an always-on-top overlay: one line per suggestion.

use std::io::{self, Write};

use crate::error::DisplayError;

/// Shows the latest suggestion to the user. Must return promptly; the loop
/// treats failures as log-and-continue.
pub trait MoveDisplay: Send + Sync {
    fn show(&self, suggestion: &str) -> Result<(), DisplayError>;
}

/// Writes suggestions to stdout.
#[derive(Debug, Default)]
pub struct ConsoleDisplay;

impl MoveDisplay for ConsoleDisplay {
    fn show(&self, suggestion: &str) -> Result<(), DisplayError> {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        writeln!(out, "Best move: {suggestion}")?;
        out.flush()?;
        Ok(())
    }
}

//! User-facing diagnostics.
//!
//! Problems in the compiled program (name conflicts, constant conditions,
//! values implicitly widened to float, ...) are accumulated in a
//! [`Diagnostics`] list so that one run reports as many independent
//! problems as possible. The compiler never prints them; the caller decides
//! how to render the `(severity, message, position)` triples.
//!
//! # Example
//!
//! ```ignore
//! let mut diagnostics = Diagnostics::new();
//! diagnostics.warning("condition is always true", stmt_position);
//!
//! assert!(!diagnostics.has_errors());
//! assert_eq!(diagnostics.warning_count(), 1);
//! ```

use std::fmt;

use crate::position::Position;

/// The severity level of a diagnostic message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// The program is invalid; no instruction stream may be produced.
    Error,
    /// The program compiles, but probably not the way the author intended.
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => f.write_str("error"),
            Severity::Warning => f.write_str("warning"),
            Severity::Info => f.write_str("info"),
        }
    }
}

/// A single message about the compiled program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub position: Position,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>, position: Position) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
            position,
        }
    }

    pub fn warning(message: impl Into<String>, position: Position) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
            position,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.position, self.severity, self.message)
    }
}

/// An ordered collection of diagnostics.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Diagnostics {
    diagnostics: Vec<Diagnostic>,
    has_errors: bool,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a diagnostic to the collection.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        if diagnostic.severity == Severity::Error {
            self.has_errors = true;
        }
        self.diagnostics.push(diagnostic);
    }

    pub fn error(&mut self, message: impl Into<String>, position: Position) {
        self.push(Diagnostic::error(message, position));
    }

    pub fn warning(&mut self, message: impl Into<String>, position: Position) {
        self.push(Diagnostic::warning(message, position));
    }

    /// Moves every diagnostic of `other` to the end of this collection.
    pub fn extend(&mut self, other: Diagnostics) {
        for diagnostic in other.diagnostics {
            self.push(diagnostic);
        }
    }

    /// Returns `true` if the collection contains any error diagnostics.
    ///
    /// Tracked on insertion, so this does not scan the list.
    pub fn has_errors(&self) -> bool {
        self.has_errors
    }

    pub fn has_warnings(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Warning)
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
    }

    pub fn count(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for diagnostic in &self.diagnostics {
            writeln!(f, "{}", diagnostic)?;
        }
        Ok(())
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.diagnostics.into_iter()
    }
}

//! Source location tracking for diagnostics.
//!
//! Provides [`Position`], attached to every AST node. Positions are only
//! ever used for reporting; no stage makes a semantic decision on them.

use std::fmt;
use std::sync::Arc;

/// A location in a source file: the line and the column range on that line.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Position {
    /// Name of the source file (or module) the node came from.
    pub file: Arc<str>,
    /// Line number (1-indexed).
    pub line: u32,
    /// First column (0-indexed).
    pub start_col: u32,
    /// Last column (0-indexed).
    pub end_col: u32,
}

impl Position {
    /// Create a position in `file`.
    pub fn new(file: impl Into<Arc<str>>, line: u32, start_col: u32, end_col: u32) -> Self {
        Self {
            file: file.into(),
            line,
            start_col,
            end_col,
        }
    }

    /// A position that points nowhere in particular, for synthesized nodes
    /// built outside of any source file.
    pub fn synthetic() -> Self {
        Self::new("<generated>", 0, 0, 0)
    }
}

impl fmt::Debug for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.start_col + 1)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}: line {} col {}-{}]",
            self.file,
            self.line,
            self.start_col + 1,
            self.end_col + 1
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_one_based_columns() {
        let pos = Position::new("main.oct", 12, 4, 9);
        assert_eq!(pos.to_string(), "[main.oct: line 12 col 5-10]");
    }

    #[test]
    fn debug_is_compact() {
        let pos = Position::new("lib.oct", 3, 0, 2);
        assert_eq!(format!("{:?}", pos), "lib.oct:3:1");
    }

    #[test]
    fn clones_share_the_file_name() {
        let pos = Position::new("a.oct", 1, 0, 0);
        let copy = pos.clone();
        assert!(Arc::ptr_eq(&pos.file, &copy.file));
        assert_eq!(pos, copy);
    }
}

//! Fatal compiler errors.
//!
//! Errors in this module signal a broken invariant inside the compiler:
//! an earlier pass let through something a later pass cannot handle. They
//! propagate out of the pipeline with `?` and are never recovered from.
//! Mistakes in the user's program are reported as
//! [`Diagnostic`](crate::Diagnostic)s instead.
//!
//! ## Error Hierarchy
//!
//! ```text
//! CompilerError
//! ├── tree structure    - DetachedNode, UndefinedSymbol, NotADeclaration
//! ├── typing            - InvalidDatatype, NarrowingConversion, InvalidLiteral,
//! │                       ValueOutOfRange
//! ├── constant values   - NotConstant, InvalidArraySize
//! ├── lowering          - Unsupported, Lowering
//! ├── heap store        - StringTooLong, UnknownHeapId, HeapTypeMismatch,
//! │                       HeapLengthMismatch
//! └── optimizer driver  - NoFixedPoint
//! ```

use thiserror::Error;

use crate::datatype::DataType;
use crate::heap::HeapId;
use crate::position::Position;

/// A fatal, unrecoverable compiler error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompilerError {
    /// A scope lookup walked up from a node that is not linked into the tree.
    #[error("scope lookup on a detached node")]
    DetachedNode,

    /// A name that earlier passes should have validated does not resolve.
    #[error("undefined symbol '{name}' at {position}")]
    UndefinedSymbol { name: String, position: Position },

    /// A name resolved to something that carries no datatype.
    #[error("'{name}' does not name a typed declaration at {position}")]
    NotADeclaration { name: String, position: Position },

    /// An operation was asked of a datatype that does not support it.
    #[error("invalid datatype {datatype} at {position}: {detail}")]
    InvalidDatatype {
        datatype: DataType,
        detail: String,
        position: Position,
    },

    /// A value would lose information in an implicit conversion.
    #[error("narrowing type conversion from {from} to {to} at {position}")]
    NarrowingConversion {
        from: DataType,
        to: DataType,
        position: Position,
    },

    /// A literal whose payload does not match its datatype.
    #[error("literal payload does not match datatype {datatype} at {position}")]
    InvalidLiteral {
        datatype: DataType,
        position: Position,
    },

    #[error("value {value} out of range for {datatype}")]
    ValueOutOfRange { value: String, datatype: DataType },

    /// A value that must be known at compile time is not.
    #[error("need constant value expression for {what} at {position}")]
    NotConstant { what: String, position: Position },

    /// An array or matrix declared with a negative number of elements.
    #[error("invalid array size {size} at {position}")]
    InvalidArraySize { size: i64, position: Position },

    /// A construct the code generator does not handle.
    #[error("not supported at {position}: {what}")]
    Unsupported { what: String, position: Position },

    /// A lowering failure with a specific reason.
    #[error("{message} {position}")]
    Lowering { message: String, position: Position },

    #[error("string length {length} exceeds the maximum of 255")]
    StringTooLong { length: usize },

    #[error("heap value {id} does not exist")]
    UnknownHeapId { id: HeapId },

    #[error("heap value type mismatch: expected {expected}, found {found}")]
    HeapTypeMismatch { expected: DataType, found: DataType },

    #[error("heap string length mismatch: expected {expected}, found {found}")]
    HeapLengthMismatch { expected: usize, found: usize },

    /// The optimizer kept rewriting the tree past the configured pass limit.
    #[error("optimizer did not reach a fixed point within {limit} passes")]
    NoFixedPoint { limit: usize },
}

impl CompilerError {
    /// Shorthand for a [`CompilerError::Lowering`] error.
    pub fn lowering(message: impl Into<String>, position: &Position) -> Self {
        CompilerError::Lowering {
            message: message.into(),
            position: position.clone(),
        }
    }

    /// Shorthand for a [`CompilerError::Unsupported`] error.
    pub fn unsupported(what: impl Into<String>, position: &Position) -> Self {
        CompilerError::Unsupported {
            what: what.into(),
            position: position.clone(),
        }
    }

    /// The source position the error refers to, if any.
    pub fn position(&self) -> Option<&Position> {
        match self {
            CompilerError::UndefinedSymbol { position, .. }
            | CompilerError::NotADeclaration { position, .. }
            | CompilerError::InvalidDatatype { position, .. }
            | CompilerError::NarrowingConversion { position, .. }
            | CompilerError::InvalidLiteral { position, .. }
            | CompilerError::NotConstant { position, .. }
            | CompilerError::InvalidArraySize { position, .. }
            | CompilerError::Unsupported { position, .. }
            | CompilerError::Lowering { position, .. } => Some(position),
            CompilerError::DetachedNode
            | CompilerError::ValueOutOfRange { .. }
            | CompilerError::StringTooLong { .. }
            | CompilerError::UnknownHeapId { .. }
            | CompilerError::HeapTypeMismatch { .. }
            | CompilerError::HeapLengthMismatch { .. }
            | CompilerError::NoFixedPoint { .. } => None,
        }
    }
}

/// Result type for operations that can fail fatally.
pub type Result<T> = std::result::Result<T, CompilerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowering_message_includes_position() {
        let pos = Position::new("main.oct", 4, 2, 7);
        let err = CompilerError::lowering("break outside of loop statement block", &pos);
        assert_eq!(
            err.to_string(),
            "break outside of loop statement block [main.oct: line 4 col 3-8]"
        );
        assert_eq!(err.position(), Some(&pos));
    }

    #[test]
    fn narrowing_display() {
        let err = CompilerError::NarrowingConversion {
            from: DataType::Word,
            to: DataType::UByte,
            position: Position::new("a.oct", 1, 0, 0),
        };
        assert_eq!(
            err.to_string(),
            "narrowing type conversion from WORD to UBYTE at [a.oct: line 1 col 1-1]"
        );
    }

    #[test]
    fn positionless_errors() {
        assert_eq!(CompilerError::DetachedNode.position(), None);
        assert_eq!(CompilerError::NoFixedPoint { limit: 3 }.position(), None);
    }
}

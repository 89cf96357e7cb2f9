//! Core types shared by every stage of the octet compiler.
//!
//! This crate is a leaf: it knows nothing about syntax trees or bytecode.
//! It provides the vocabulary the stages talk in.
//!
//! ## Modules
//!
//! - [`position`]: source positions attached to every node
//! - [`datatype`]: datatypes, registers, status flags, branch conditions,
//!   and the arithmetic promotion table
//! - [`value`]: typed immediate values
//! - [`heap`]: content store for strings and arrays
//! - [`diagnostics`]: user-facing messages
//! - [`error`]: fatal compiler errors

pub mod datatype;
pub mod diagnostics;
pub mod error;
pub mod heap;
pub mod position;
pub mod value;

pub use datatype::{
    BranchCondition, CommonType, DataType, IMPLICIT_FLOAT_WARNING, INTEGER_TYPES, NUMERIC_TYPES,
    Register, StatusFlag, common_datatype,
};
pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use error::{CompilerError, Result};
pub use heap::{HeapId, HeapValue, HeapValues, MAX_STRING_LENGTH};
pub use position::Position;
pub use value::Value;

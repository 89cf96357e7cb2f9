//! Octet: semantic core of a compiler for a small imperative language
//! targeting 8/16-bit machines.
//!
//! Parsing and assembly are left to the caller. Build the tree with
//! [`AstBuilder`](prelude::AstBuilder) (or from a parser), hand it to
//! [`Compiler::compile`](prelude::Compiler::compile), and pass the
//! resulting [`Program`](prelude::Program) to a back end.
//!
//! ```
//! use octet::prelude::*;
//!
//! let mut b = AstBuilder::new("hello.oct");
//! let x = b.var(DataType::UByte, "x", None);
//! let target = b.target_var("x");
//! let five = b.int(5);
//! let two = b.int(2);
//! let product = b.binary(five, BinaryOp::Mul, two);
//! let assign = b.assign(target, product);
//! let start = b.subroutine("start", vec![], vec![], vec![assign]);
//! let main = b.block("main", vec![x, start]);
//! let mut ast = b.module("hello", vec![main]);
//!
//! let result = Compiler::compile(&mut ast, &CompilerOptions::default()).unwrap();
//! assert!(result.is_success());
//! ```

pub use octet_compiler as compiler;
pub use octet_core as core;

pub mod prelude {
    pub use octet_compiler::ast::{
        AssignTarget, Ast, AstBuilder, BinaryOp, Expr, Literal, LiteralValue, PrefixOp, Stmt,
    };
    pub use octet_compiler::bytecode::{
        Instruction, Opcode, Operation, Program, ProgramBlock, StorageClass, Variable,
    };
    pub use octet_compiler::{CompilationResult, Compiler, CompilerOptions};
    pub use octet_core::{
        BranchCondition, CompilerError, DataType, Diagnostic, Diagnostics, Position, Register,
        Result, Severity, Value,
    };
}

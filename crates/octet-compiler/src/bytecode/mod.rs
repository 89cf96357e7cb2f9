//! The lowered form of a program.
//!
//! - [`Opcode`] - the stack machine instruction set
//! - [`Instruction`] - labels and operations of the instruction stream
//! - [`Program`] - per-block instruction streams and variables tables
//! - [`Syscall`] - runtime routines behind builtin functions

mod instruction;
mod opcode;
mod program;
mod syscall;

pub use instruction::{Instruction, Label, Operation};
pub use opcode::Opcode;
pub use program::{MemoryPointer, Program, ProgramBlock, StorageClass, Variable};
pub use syscall::Syscall;

//! Instruction stream emitter.
//!
//! The [`ProgramEmitter`] appends labels and operations to the current
//! program block, fills in the block's variables table, and hands out
//! unique labels for the control flow it lowers.
//!
//! # Example
//!
//! ```
//! use octet_compiler::bytecode::Opcode;
//! use octet_compiler::emit::ProgramEmitter;
//! use octet_core::Value;
//!
//! let mut emitter = ProgramEmitter::new("prog");
//! emitter.begin_block("main", "main", None);
//! emitter.emit_arg(Opcode::PushByte, Value::UByte(42));
//! emitter.emit_label_ref(Opcode::PopVarByte, "main.x");
//!
//! let program = emitter.finish();
//! assert_eq!(program.opcodes().count(), 2);
//! ```

mod loops;

pub use loops::LoopLabels;

use octet_core::{DataType, Position, Value};

use crate::bytecode::{
    Instruction, Label, MemoryPointer, Opcode, Operation, Program, ProgramBlock, Variable,
};

/// Prefix of every label the emitter generates.
pub const GENERATED_LABEL_PREFIX: &str = "_octet_stmt_";

/// Emits the instruction streams of a program, one block at a time.
pub struct ProgramEmitter {
    program: Program,

    /// Enclosing loops of the statement being lowered
    loops: LoopLabels,

    /// Sequence number of the statement being lowered
    statement: u32,
}

impl ProgramEmitter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            program: Program::new(name),
            loops: LoopLabels::new(),
            statement: 0,
        }
    }

    /// Start a new block; everything emitted afterwards lands in it.
    pub fn begin_block(&mut self, scoped_name: &str, name: &str, address: Option<u16>) {
        self.program
            .blocks
            .push(ProgramBlock::new(scoped_name, name, address));
    }

    fn block(&mut self) -> &mut ProgramBlock {
        if self.program.blocks.is_empty() {
            self.program.blocks.push(ProgramBlock::default());
        }
        let last = self.program.blocks.len() - 1;
        &mut self.program.blocks[last]
    }

    pub fn finish(self) -> Program {
        self.program
    }

    // ==========================================================================
    // Instructions
    // ==========================================================================

    pub fn instr(&mut self, op: Operation) {
        self.block().instructions.push(Instruction::Op(op));
    }

    pub fn emit(&mut self, opcode: Opcode) {
        self.instr(Operation::new(opcode));
    }

    pub fn emit_arg(&mut self, opcode: Opcode, arg: Value) {
        self.instr(Operation::new(opcode).with_arg(arg));
    }

    /// Emit an operation referring to a variable, register or label by name.
    pub fn emit_label_ref(&mut self, opcode: Opcode, label: impl Into<String>) {
        self.instr(Operation::new(opcode).with_label(label));
    }

    pub fn label(&mut self, name: impl Into<String>) {
        self.block().instructions.push(Instruction::Label(Label {
            name: name.into(),
            is_procedure: false,
        }));
    }

    /// A label that starts a subroutine.
    pub fn proc_label(&mut self, name: impl Into<String>) {
        self.block().instructions.push(Instruction::Label(Label {
            name: name.into(),
            is_procedure: true,
        }));
    }

    /// Source position marker for the statement being lowered.
    pub fn line(&mut self, position: &Position) {
        self.emit_label_ref(Opcode::Line, position.to_string());
    }

    pub fn last_instruction(&self) -> Option<&Instruction> {
        self.program
            .blocks
            .last()
            .and_then(|b| b.instructions.last())
    }

    pub fn remove_last_instruction(&mut self) -> Option<Instruction> {
        self.block().instructions.pop()
    }

    // ==========================================================================
    // Tables
    // ==========================================================================

    pub fn variable(&mut self, variable: Variable) {
        self.block().variables.push(variable);
    }

    pub fn memory_pointer(&mut self, name: impl Into<String>, address: u16, datatype: DataType) {
        self.block().memory_pointers.push(MemoryPointer {
            name: name.into(),
            address,
            datatype,
        });
    }

    // ==========================================================================
    // Labels and loops
    // ==========================================================================

    /// Advance to the next statement; generated labels are unique per
    /// statement.
    pub fn next_statement(&mut self) {
        self.statement += 1;
    }

    /// A fresh label belonging to the current statement.
    pub fn make_label(&mut self, postfix: &str) -> String {
        self.statement += 1;
        format!("{GENERATED_LABEL_PREFIX}{}_{postfix}", self.statement)
    }

    pub fn enter_loop(&mut self, break_label: &str, continue_label: &str) {
        self.loops.enter_loop(break_label, continue_label);
    }

    pub fn exit_loop(&mut self) {
        self.loops.exit_loop();
    }

    pub fn break_label(&self) -> Option<String> {
        self.loops.break_label().map(str::to_string)
    }

    pub fn continue_label(&self) -> Option<String> {
        self.loops.continue_label().map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::StorageClass;

    #[test]
    fn emits_into_current_block() {
        let mut emitter = ProgramEmitter::new("prog");
        emitter.begin_block("first", "first", None);
        emitter.emit(Opcode::Nop);
        emitter.begin_block("second", "second", Some(0x4000));
        emitter.label("here");
        emitter.emit_label_ref(Opcode::Jump, "here");

        let program = emitter.finish();
        assert_eq!(program.blocks.len(), 2);
        assert_eq!(program.blocks[0].instructions.len(), 1);
        assert_eq!(program.blocks[1].labels().collect::<Vec<_>>(), vec!["here"]);
        assert_eq!(program.blocks[1].address, Some(0x4000));
    }

    #[test]
    fn emitting_without_block_creates_one() {
        let mut emitter = ProgramEmitter::new("prog");
        emitter.emit(Opcode::Return);
        assert_eq!(emitter.finish().blocks.len(), 1);
    }

    #[test]
    fn generated_labels_are_unique() {
        let mut emitter = ProgramEmitter::new("prog");
        let a = emitter.make_label("loop");
        let b = emitter.make_label("loop");
        assert_ne!(a, b);
        assert!(a.starts_with(GENERATED_LABEL_PREFIX));
        assert!(a.ends_with("_loop"));
    }

    #[test]
    fn remove_last_instruction() {
        let mut emitter = ProgramEmitter::new("prog");
        emitter.emit(Opcode::Nop);
        emitter.emit(Opcode::Return);
        assert_eq!(
            emitter.remove_last_instruction().and_then(|i| i.opcode()),
            Some(Opcode::Return)
        );
        assert_eq!(
            emitter.last_instruction().and_then(|i| i.opcode()),
            Some(Opcode::Nop)
        );
    }

    #[test]
    fn tables() {
        let mut emitter = ProgramEmitter::new("prog");
        emitter.begin_block("main", "main", None);
        emitter.variable(Variable {
            name: "main.screen".into(),
            datatype: DataType::UByte,
            storage: StorageClass::MemoryMapped(0x0400),
            size: 1,
            initial: None,
        });
        emitter.memory_pointer("main.chrout", 0xffd2, DataType::UByte);
        let program = emitter.finish();
        assert_eq!(program.blocks[0].variables.len(), 1);
        assert_eq!(program.blocks[0].memory_pointers[0].address, 0xffd2);
    }

    #[test]
    fn loop_labels() {
        let mut emitter = ProgramEmitter::new("prog");
        assert_eq!(emitter.break_label(), None);
        emitter.enter_loop("out", "again");
        assert_eq!(emitter.break_label().as_deref(), Some("out"));
        assert_eq!(emitter.continue_label().as_deref(), Some("again"));
        emitter.exit_loop();
        assert_eq!(emitter.continue_label(), None);
    }
}

//! `goto`, `break` and `continue`.

use octet_core::{CompilerError, Position, Result, Value};

use super::StmtCompiler;
use crate::ast::{JumpTarget, Stmt};
use crate::bytecode::{Opcode, Operation};
use crate::scope::Declaration;
use crate::types;

impl StmtCompiler<'_> {
    /// Jump to `target`, unconditionally or with the given conditional
    /// jump or branch instruction.
    pub(super) fn lower_jump(
        &mut self,
        target: &JumpTarget,
        opcode: Option<Opcode>,
        position: &Position,
    ) -> Result<()> {
        let ast = self.ast;
        let opcode = opcode.unwrap_or(Opcode::Jump);
        let operation = match target {
            JumpTarget::Generated(label) => Operation::new(opcode).with_label(label.clone()),
            JumpTarget::Address(address) => {
                if opcode.is_branch() {
                    return Err(CompilerError::lowering(
                        "cannot branch to address, should use absolute jump instead",
                        position,
                    ));
                }
                Operation::new(opcode).with_arg(Value::UWord(*address))
            }
            JumpTarget::Identifier(id) => {
                let invalid = || {
                    CompilerError::lowering(
                        format!("invalid jump target {}", types::identifier_name(ast, *id)),
                        position,
                    )
                };
                let Declaration::Stmt(decl) = types::resolve_identifier(ast, *id)? else {
                    return Err(invalid());
                };
                match ast.stmt(decl) {
                    Stmt::Label(_) | Stmt::Subroutine(_) => {
                        Operation::new(opcode).with_label(ast.scoped_name(decl)?)
                    }
                    _ => return Err(invalid()),
                }
            }
        };
        self.emitter.line(position);
        self.emitter.instr(operation);
        Ok(())
    }

    pub(super) fn lower_break(&mut self, position: &Position) -> Result<()> {
        self.emitter.line(position);
        let label = self.emitter.break_label().ok_or_else(|| {
            CompilerError::lowering("break outside of loop statement block", position)
        })?;
        self.emitter.emit_label_ref(Opcode::Jump, label);
        Ok(())
    }

    pub(super) fn lower_continue(&mut self, position: &Position) -> Result<()> {
        self.emitter.line(position);
        let label = self.emitter.continue_label().ok_or_else(|| {
            CompilerError::lowering("continue outside of loop statement block", position)
        })?;
        self.emitter.emit_label_ref(Opcode::Jump, label);
        Ok(())
    }
}

//! Statement lowering.
//!
//! The [`StmtCompiler`] walks the optimized tree in program order and
//! emits, per block:
//! - the variables table of the block and every scope nested in it
//! - the block's statements, with generated labels for control flow
//! - the bodies of its subroutines, bracketed by procedure markers
//!
//! The tree is only read. Everything the lowering synthesizes (loop
//! counters, branch targets) exists in the instruction stream alone.
//!
//! # Example
//!
//! ```ignore
//! let program = stmt::lower_program(&ast)?;
//!
//! for block in &program.blocks {
//!     println!("{}", block.scoped_name);
//! }
//! ```

mod assignment;
mod block;
mod for_stmt;
mod if_stmt;
mod jump_stmt;
mod return_stmt;
mod while_stmt;

use octet_core::{CompilerError, DataType, Position, Result};

use crate::ast::{Ast, ExprId, Stmt, StmtId};
use crate::bytecode::{Opcode, Program};
use crate::emit::ProgramEmitter;
use crate::expr::ExprCompiler;
use crate::types;

/// Lowers statements into the current program block.
pub struct StmtCompiler<'a> {
    ast: &'a Ast,
    emitter: &'a mut ProgramEmitter,
}

/// Lower every module of `ast` into one program.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn lower_program(ast: &Ast) -> Result<Program> {
    let name = ast
        .module_ids()
        .first()
        .map(|&m| ast.module(m).name.clone())
        .unwrap_or_default();
    let mut emitter = ProgramEmitter::new(name);
    let mut compiler = StmtCompiler::new(ast, &mut emitter);
    for module in ast.module_ids() {
        for &id in &ast.module(module).statements {
            compiler.lower_top_level(id)?;
        }
    }
    let program = emitter.finish();
    tracing::debug!(
        blocks = program.blocks.len(),
        instructions = program.instructions().count(),
        "lowered program"
    );
    Ok(program)
}

impl<'a> StmtCompiler<'a> {
    pub fn new(ast: &'a Ast, emitter: &'a mut ProgramEmitter) -> Self {
        Self { ast, emitter }
    }

    /// An expression compiler emitting into the same stream.
    pub fn expr(&mut self) -> ExprCompiler<'_> {
        ExprCompiler::new(self.ast, &mut *self.emitter)
    }

    fn lower_top_level(&mut self, id: StmtId) -> Result<()> {
        match self.ast.stmt(id) {
            Stmt::Block(_) => self.lower_block(id),
            _ => self.lower(id),
        }
    }

    /// Lower one statement.
    pub fn lower(&mut self, id: StmtId) -> Result<()> {
        let ast = self.ast;
        let position = ast.stmt_position(id);
        self.emitter.next_statement();
        match ast.stmt(id) {
            Stmt::Label(_) => {
                let name = ast.scoped_name(id)?;
                self.emitter.label(name);
                Ok(())
            }
            Stmt::Assignment(assignment) => self.lower_assignment(assignment, position),
            Stmt::PostIncrDecr { target, op } => self.lower_post_incr_decr(target, *op, position),
            Stmt::Jump(target) => self.lower_jump(target, None, position),
            Stmt::FunctionCall(call) => {
                self.emitter.line(position);
                let results = self.expr().lower_call(call, position)?;
                self.discard(&results, position)
            }
            Stmt::If {
                condition,
                true_part,
                else_part,
            } => self.lower_if(*condition, *true_part, *else_part, position),
            Stmt::Branch {
                condition,
                true_part,
                else_part,
            } => self.lower_branch(*condition, *true_part, *else_part, position),
            Stmt::Break => self.lower_break(position),
            Stmt::Continue => self.lower_continue(position),
            Stmt::For(for_loop) => self.lower_for(for_loop, position),
            Stmt::While { condition, body } => self.lower_while(*condition, *body, position),
            Stmt::Repeat { body, until } => self.lower_repeat(*body, *until, position),
            Stmt::Return { values } => self.lower_return(id, values, position),
            Stmt::AnonymousScope(scope) => self.lower_statements(&scope.statements),
            Stmt::StatementList(list) => self.lower_statements(list),
            Stmt::Directive(directive) => match directive.name.as_str() {
                "%breakpoint" => {
                    self.emitter.line(position);
                    self.emitter.emit(Opcode::Breakpoint);
                    Ok(())
                }
                "%asminclude" | "%asmbinary" => Err(CompilerError::unsupported(
                    format!("{} directive", directive.name),
                    position,
                )),
                _ => Ok(()),
            },
            Stmt::InlineAssembly { assembly } => {
                self.emitter
                    .emit_label_ref(Opcode::InlineAssembly, assembly.clone());
                Ok(())
            }
            Stmt::Block(_) => Err(CompilerError::lowering(
                "blocks can only appear at module level",
                position,
            )),
            // declarations are in the variables table; subroutine bodies
            // follow their enclosing block
            Stmt::VarDecl(_) | Stmt::Subroutine(_) | Stmt::Nop => Ok(()),
        }
    }

    pub fn lower_statements(&mut self, statements: &[StmtId]) -> Result<()> {
        for &id in statements {
            self.lower(id)?;
        }
        Ok(())
    }

    /// Drop unused call results from the stack.
    fn discard(&mut self, results: &[DataType], position: &Position) -> Result<()> {
        for &dt in results {
            let opcode = Opcode::discard_for(dt).ok_or_else(|| CompilerError::InvalidDatatype {
                datatype: dt,
                detail: "cannot discard a value of this datatype".into(),
                position: position.clone(),
            })?;
            self.emitter.emit(opcode);
        }
        Ok(())
    }

    /// The conditional jump taken when the truth value of `condition`
    /// equals `when_true`.
    fn condition_opcode(
        &self,
        condition: ExprId,
        when_true: bool,
        position: &Position,
    ) -> Result<Opcode> {
        let Some(dt) = types::resulting_datatype(self.ast, condition)? else {
            return Err(CompilerError::lowering(
                "cannot determine the datatype of this condition",
                position,
            ));
        };
        let Some(opcode) = Opcode::conditional_jump_for(dt, when_true) else {
            return Err(CompilerError::InvalidDatatype {
                datatype: dt,
                detail: "invalid condition datatype (expected byte or word)".into(),
                position: position.clone(),
            });
        };
        Ok(opcode)
    }

    /// Jump to `label` when the truth value of `condition` equals
    /// `when_true`.
    fn jump_on_condition(
        &mut self,
        condition: ExprId,
        when_true: bool,
        label: &str,
        position: &Position,
    ) -> Result<()> {
        let opcode = self.condition_opcode(condition, when_true, position)?;
        self.expr().lower(condition)?;
        self.emitter.emit_label_ref(opcode, label);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::lower;
    use octet_core::DataType;

    use crate::ast::AstBuilder;

    #[test]
    fn call_statement_discards_results() {
        let mut b = AstBuilder::new("t.oct");
        let value = b.int(1);
        let ret = b.ret(vec![value]);
        let one = b.subroutine("one", vec![], vec![DataType::UByte], vec![ret]);
        let call = b.call_stmt("one", vec![]);
        let start = b.subroutine("start", vec![], vec![], vec![call]);
        let main = b.block("main", vec![start, one]);
        let program = lower(b.module("t", vec![main]));

        let opcodes: Vec<Opcode> = program.opcodes().collect();
        let call_at = opcodes.iter().position(|&op| op == Opcode::Call).unwrap();
        assert_eq!(opcodes[call_at + 1], Opcode::DiscardByte);
    }

    #[test]
    fn breakpoint_directive() {
        let mut b = AstBuilder::new("t.oct");
        let brk = b.directive("%breakpoint", vec![]);
        let start = b.subroutine("start", vec![], vec![], vec![brk]);
        let main = b.block("main", vec![start]);
        let program = lower(b.module("t", vec![main]));
        assert!(program.opcodes().any(|op| op == Opcode::Breakpoint));
    }

    #[test]
    fn inline_assembly_is_passed_through() {
        let mut b = AstBuilder::new("t.oct");
        let asm = b.asm(" nop");
        let start = b.subroutine("start", vec![], vec![], vec![asm]);
        let main = b.block("main", vec![start]);
        let program = lower(b.module("t", vec![main]));
        let op = program
            .instructions()
            .filter_map(|i| i.as_operation())
            .find(|op| op.opcode == Opcode::InlineAssembly)
            .unwrap();
        assert_eq!(op.call_label.as_deref(), Some(" nop"));
    }
}

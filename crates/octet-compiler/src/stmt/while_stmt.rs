//! `while` and `repeat` loops.

use octet_core::{Position, Result};

use super::StmtCompiler;
use crate::ast::{ExprId, StmtId};
use crate::bytecode::Opcode;

impl StmtCompiler<'_> {
    /// Compile a while loop. The condition is tested at the bottom.
    ///
    /// Layout:
    /// ```text
    /// JUMP continue
    /// loop:
    /// [body]
    /// continue:
    /// [condition]
    /// JNZ/JNZW loop
    /// break:
    /// NOP
    /// ```
    pub(super) fn lower_while(
        &mut self,
        condition: ExprId,
        body: StmtId,
        position: &Position,
    ) -> Result<()> {
        let start = self.emitter.make_label("loop");
        let brk = self.emitter.make_label("break");
        let cont = self.emitter.make_label("continue");
        self.emitter.line(position);

        self.emitter.enter_loop(&brk, &cont);
        self.emitter.emit_label_ref(Opcode::Jump, cont.clone());
        self.emitter.label(start.clone());
        let lowered = self.lower(body).and_then(|()| {
            self.emitter.label(cont);
            self.jump_on_condition(condition, true, &start, position)
        });
        self.emitter.exit_loop();
        lowered?;

        self.emitter.label(brk);
        self.emitter.emit(Opcode::Nop);
        Ok(())
    }

    /// Compile a repeat-until loop.
    ///
    /// Layout:
    /// ```text
    /// loop:
    /// [body]
    /// continue:
    /// [until condition]
    /// JZ/JZW loop
    /// break:
    /// NOP
    /// ```
    pub(super) fn lower_repeat(
        &mut self,
        body: StmtId,
        until: ExprId,
        position: &Position,
    ) -> Result<()> {
        let start = self.emitter.make_label("loop");
        let cont = self.emitter.make_label("continue");
        let brk = self.emitter.make_label("break");
        self.emitter.line(position);

        self.emitter.enter_loop(&brk, &cont);
        self.emitter.label(start.clone());
        let lowered = self.lower(body).and_then(|()| {
            self.emitter.label(cont);
            self.jump_on_condition(until, false, &start, position)
        });
        self.emitter.exit_loop();
        lowered?;

        self.emitter.label(brk);
        self.emitter.emit(Opcode::Nop);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::{AstBuilder, BinaryOp};
    use crate::bytecode::Opcode;
    use crate::testing::start_opcodes;
    use octet_core::DataType;

    #[test]
    fn while_tests_condition_at_the_bottom() {
        let mut b = AstBuilder::new("t.oct");
        let x = b.var(DataType::UByte, "x", None);
        let target = b.target_var("x");
        let decr = b.decr(target);
        let left = b.ident("x");
        let zero = b.int(0);
        let condition = b.binary(left, BinaryOp::NotEqual, zero);
        let stmt = b.while_loop(condition, vec![decr]);
        let opcodes = start_opcodes(&mut b, vec![x], vec![stmt]);
        assert_eq!(
            opcodes,
            vec![
                Opcode::Line,
                Opcode::Jump,
                Opcode::Line,
                Opcode::DecVarUb,
                Opcode::PushVarByte,
                Opcode::PushByte,
                Opcode::NotequalByte,
                Opcode::Jnz,
                Opcode::Nop
            ]
        );
    }

    #[test]
    fn repeat_loops_while_condition_is_false() {
        let mut b = AstBuilder::new("t.oct");
        let w = b.var(DataType::UWord, "w", None);
        let target = b.target_var("w");
        let incr = b.incr(target);
        let until = b.ident("w");
        let stmt = b.repeat(vec![incr], until);
        let opcodes = start_opcodes(&mut b, vec![w], vec![stmt]);
        assert_eq!(
            opcodes,
            vec![
                Opcode::Line,
                Opcode::Line,
                Opcode::IncVarUw,
                Opcode::PushVarWord,
                Opcode::Jzw,
                Opcode::Nop
            ]
        );
    }
}

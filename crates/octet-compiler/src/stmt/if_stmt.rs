//! `if` statements and status-flag branches.

use octet_core::{BranchCondition, Position, Result};

use super::StmtCompiler;
use crate::ast::{ExprId, JumpTarget, Stmt, StmtId};
use crate::bytecode::Opcode;

impl StmtCompiler<'_> {
    /// Compile an `if` statement.
    ///
    /// Layout:
    /// ```text
    /// [condition]
    /// JZ/JZW else
    /// [true part]
    /// JUMP end
    /// else:
    /// [else part]
    /// end:
    /// NOP
    /// ```
    ///
    /// Without an else part the jump goes straight to `end`. A true part
    /// that is a single `goto` becomes `JNZ/JNZW target` followed by the
    /// else part.
    pub(super) fn lower_if(
        &mut self,
        condition: ExprId,
        true_part: StmtId,
        else_part: StmtId,
        position: &Position,
    ) -> Result<()> {
        let ast = self.ast;
        self.emitter.line(position);
        let true_statements = scope_statements(ast.stmt(true_part));
        let else_statements = scope_statements(ast.stmt(else_part));

        if let [single] = true_statements {
            if let Stmt::Jump(target) = ast.stmt(*single) {
                let opcode = self.condition_opcode(condition, true, position)?;
                self.expr().lower(condition)?;
                let at = ast.stmt_position(*single);
                self.lower_jump(target, Some(opcode), at)?;
                return self.lower_statements(else_statements);
            }
        }

        let end = self.emitter.make_label("end");
        if else_statements.is_empty() {
            self.jump_on_condition(condition, false, &end, position)?;
            self.lower_statements(true_statements)?;
        } else {
            let other = self.emitter.make_label("else");
            self.jump_on_condition(condition, false, &other, position)?;
            self.lower_statements(true_statements)?;
            self.emitter.emit_label_ref(Opcode::Jump, end.clone());
            self.emitter.label(other);
            self.lower_statements(else_statements)?;
        }
        self.emitter.label(end);
        self.emitter.emit(Opcode::Nop);
        Ok(())
    }

    /// Compile a branch on a status flag.
    ///
    /// Layout:
    /// ```text
    /// B<complement> else
    /// [true part]
    /// JUMP end
    /// else:
    /// [else part]
    /// end:
    /// NOP
    /// ```
    ///
    /// When both parts are just a `goto` (or the else part is empty), only
    /// the branch instructions themselves are emitted.
    pub(super) fn lower_branch(
        &mut self,
        condition: BranchCondition,
        true_part: StmtId,
        else_part: StmtId,
        position: &Position,
    ) -> Result<()> {
        let ast = self.ast;
        let true_statements = scope_statements(ast.stmt(true_part));
        let else_statements = scope_statements(ast.stmt(else_part));
        if true_statements.is_empty() && else_statements.is_empty() {
            return Ok(());
        }
        self.emitter.line(position);

        let label_jump = |id: StmtId| match ast.stmt(id) {
            Stmt::Jump(target @ (JumpTarget::Identifier(_) | JumpTarget::Generated(_))) => {
                Some((target, ast.stmt_position(id)))
            }
            _ => None,
        };
        let true_jump = true_statements.first().and_then(|&id| label_jump(id));
        let else_jump = else_statements.first().map(|&id| label_jump(id));
        if let (Some((target, at)), None | Some(Some(_))) = (true_jump, else_jump) {
            self.lower_jump(target, Some(branch_opcode(condition)), at)?;
            if let Some(Some((target, at))) = else_jump {
                let opcode = branch_opcode(condition.complement());
                self.lower_jump(target, Some(opcode), at)?;
            }
            return Ok(());
        }

        let end = self.emitter.make_label("end");
        let skip = branch_opcode(condition.complement());
        if else_statements.is_empty() {
            self.emitter.emit_label_ref(skip, end.clone());
            self.lower_statements(true_statements)?;
        } else {
            let otherwise = self.emitter.make_label("else");
            self.emitter.emit_label_ref(skip, otherwise.clone());
            self.lower_statements(true_statements)?;
            self.emitter.emit_label_ref(Opcode::Jump, end.clone());
            self.emitter.label(otherwise);
            self.lower_statements(else_statements)?;
        }
        self.emitter.label(end);
        self.emitter.emit(Opcode::Nop);
        Ok(())
    }
}

fn scope_statements(stmt: &Stmt) -> &[StmtId] {
    stmt.statements().map(Vec::as_slice).unwrap_or(&[])
}

/// The branch instruction taken when `condition` holds.
pub(super) fn branch_opcode(condition: BranchCondition) -> Opcode {
    match condition {
        BranchCondition::Cs => Opcode::Bcs,
        BranchCondition::Cc => Opcode::Bcc,
        BranchCondition::Eq | BranchCondition::Z => Opcode::Bz,
        BranchCondition::Ne | BranchCondition::Nz => Opcode::Bnz,
        BranchCondition::Vs => Opcode::Bvs,
        BranchCondition::Vc => Opcode::Bvc,
        BranchCondition::Mi | BranchCondition::Neg => Opcode::Bneg,
        BranchCondition::Pl | BranchCondition::Pos => Opcode::Bpos,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::AstBuilder;
    use crate::testing::start_opcodes;
    use octet_core::DataType;

    #[test]
    fn if_else_layout() {
        let mut b = AstBuilder::new("t.oct");
        let x = b.var(DataType::UByte, "x", None);
        let condition = b.ident("x");
        let target = b.target_var("x");
        let one = b.int(1);
        let then = b.assign(target, one);
        let target = b.target_var("x");
        let two = b.int(2);
        let otherwise = b.assign(target, two);
        let stmt = b.if_else(condition, vec![then], vec![otherwise]);
        let opcodes = start_opcodes(&mut b, vec![x], vec![stmt]);
        assert_eq!(
            opcodes,
            vec![
                Opcode::Line,
                Opcode::PushVarByte,
                Opcode::Jz,
                Opcode::Line,
                Opcode::PushByte,
                Opcode::PopVarByte,
                Opcode::Jump,
                Opcode::Line,
                Opcode::PushByte,
                Opcode::PopVarByte,
                Opcode::Nop,
            ]
        );
    }

    #[test]
    fn word_condition_uses_word_jump() {
        let mut b = AstBuilder::new("t.oct");
        let w = b.var(DataType::UWord, "w", None);
        let condition = b.ident("w");
        let nop = b.asm(" nop");
        let stmt = b.if_else(condition, vec![nop], vec![]);
        let opcodes = start_opcodes(&mut b, vec![w], vec![stmt]);
        assert_eq!(
            opcodes,
            vec![
                Opcode::Line,
                Opcode::PushVarWord,
                Opcode::Jzw,
                Opcode::InlineAssembly,
                Opcode::Nop
            ]
        );
    }

    #[test]
    fn if_goto_is_a_single_conditional_jump() {
        let mut b = AstBuilder::new("t.oct");
        let x = b.var(DataType::UByte, "x", None);
        let label = b.label("there");
        let condition = b.ident("x");
        let jump = b.jump("there");
        let stmt = b.if_else(condition, vec![jump], vec![]);
        let opcodes = start_opcodes(&mut b, vec![x], vec![stmt, label]);
        assert_eq!(
            opcodes,
            vec![Opcode::Line, Opcode::PushVarByte, Opcode::Line, Opcode::Jnz]
        );
    }

    #[test]
    fn branch_with_gotos() {
        let mut b = AstBuilder::new("t.oct");
        let here = b.label("here");
        let there = b.label("there");
        let to_here = b.jump("here");
        let to_there = b.jump("there");
        let stmt = b.branch(BranchCondition::Cs, vec![to_here], vec![to_there]);
        let opcodes = start_opcodes(&mut b, vec![], vec![here, stmt, there]);
        assert_eq!(
            opcodes,
            vec![
                Opcode::Line,
                Opcode::Line,
                Opcode::Bcs,
                Opcode::Line,
                Opcode::Bcc,
            ]
        );
    }

    #[test]
    fn branch_general_form_uses_complement() {
        let mut b = AstBuilder::new("t.oct");
        let nop = b.asm(" nop");
        let stmt = b.branch(BranchCondition::Mi, vec![nop], vec![]);
        let opcodes = start_opcodes(&mut b, vec![], vec![stmt]);
        assert_eq!(
            opcodes,
            vec![
                Opcode::Line,
                Opcode::Bpos,
                Opcode::InlineAssembly,
                Opcode::Nop,
            ]
        );
    }

    #[test]
    fn empty_branch_emits_nothing() {
        let mut b = AstBuilder::new("t.oct");
        let stmt = b.branch(BranchCondition::Z, vec![], vec![]);
        assert!(start_opcodes(&mut b, vec![], vec![stmt]).is_empty());
    }

    #[test]
    fn complement_table() {
        for (condition, taken, complement) in [
            (BranchCondition::Cs, Opcode::Bcs, Opcode::Bcc),
            (BranchCondition::Eq, Opcode::Bz, Opcode::Bnz),
            (BranchCondition::Nz, Opcode::Bnz, Opcode::Bz),
            (BranchCondition::Vc, Opcode::Bvc, Opcode::Bvs),
            (BranchCondition::Neg, Opcode::Bneg, Opcode::Bpos),
            (BranchCondition::Pl, Opcode::Bpos, Opcode::Bneg),
        ] {
            assert_eq!(branch_opcode(condition), taken);
            assert_eq!(branch_opcode(condition.complement()), complement);
        }
    }
}

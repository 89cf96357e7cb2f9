//! Assignments and `++`/`--`.

use octet_core::{CompilerError, DataType, Position, Result, Value, common_datatype};

use super::StmtCompiler;
use crate::ast::{AssignTarget, Assignment, BinaryOp, Expr, ExprId, IncrDecr, VarDeclKind};
use crate::bytecode::Opcode;
use crate::conversion::{self, StoreConversion};
use crate::operators;
use crate::types;

/// Picks the opcode flavour of one datatype.
type OpcodeFor = fn(DataType) -> Option<Opcode>;

impl StmtCompiler<'_> {
    pub(super) fn lower_assignment(
        &mut self,
        assignment: &Assignment,
        position: &Position,
    ) -> Result<()> {
        self.emitter.line(position);
        match (assignment.targets.as_slice(), assignment.aug_op) {
            ([target], None) => self.assign_value(target, assignment.value, position),
            ([target], Some(op)) => self.assign_augmented(target, op, assignment.value, position),
            (targets, None) if targets.len() > 1 => {
                self.assign_results(targets, assignment.value, position)
            }
            _ => Err(CompilerError::lowering("malformed assignment", position)),
        }
    }

    /// `target = value`
    pub(super) fn assign_value(
        &mut self,
        target: &AssignTarget,
        value: ExprId,
        position: &Position,
    ) -> Result<()> {
        let mut expr = self.expr();
        let target_dt = expr.target_datatype(target, position)?;
        expr.lower_for_store(value, target_dt)?;
        expr.pop_into(target, position)
    }

    /// `target op= value`, left for targets the tree cannot read back
    /// (memory locations): the current value is read, combined and written.
    fn assign_augmented(
        &mut self,
        target: &AssignTarget,
        op: BinaryOp,
        value: ExprId,
        position: &Position,
    ) -> Result<()> {
        let mut expr = self.expr();
        let target_dt = expr.target_datatype(target, position)?;
        if op.is_shift() {
            expr.push_target(target)?;
            expr.shift_top(op, target_dt, value)?;
            return expr.pop_into(target, position);
        }

        let value_dt = expr.datatype(value)?;
        let detail = format!("operator {op} on incompatible datatypes {target_dt} and {value_dt}");
        let operation_dt = common_datatype(target_dt, value_dt)
            .map(|common| common.datatype)
            .ok_or_else(|| CompilerError::InvalidDatatype {
                datatype: value_dt,
                detail,
                position: position.clone(),
            })?;
        let opcode = operators::binary_opcode(op, operation_dt, position)?;
        expr.push_target(target)?;
        if let Some(widen) = conversion::widening(target_dt, operation_dt, position)? {
            expr.emitter().emit(widen);
        }
        expr.lower_as(value, operation_dt)?;
        expr.emitter().emit(opcode);
        let result_dt = if op.is_comparison() || op.is_logical() {
            DataType::UByte
        } else {
            operation_dt
        };
        match conversion::store(result_dt, target_dt, position)? {
            StoreConversion::Direct => {}
            StoreConversion::Convert(cast) => expr.emitter().emit(cast),
            StoreConversion::AddressOf => {
                return Err(CompilerError::lowering("cannot store an address here", position));
            }
        }
        expr.pop_into(target, position)
    }

    /// `t1, t2 = call()`: a call with several register results. The
    /// first result is on top of the stack.
    fn assign_results(
        &mut self,
        targets: &[AssignTarget],
        value: ExprId,
        position: &Position,
    ) -> Result<()> {
        let ast = self.ast;
        let Expr::FunctionCall(call) = ast.expr(value) else {
            return Err(CompilerError::unsupported(
                "multiple assignment targets for a value that is not a subroutine call",
                position,
            ));
        };
        let is_register = |t: &AssignTarget| matches!(t, AssignTarget::Register(_));
        if !targets.iter().all(is_register) {
            return Err(CompilerError::unsupported(
                "multiple assignment targets that are not all registers",
                position,
            ));
        }
        let mut expr = self.expr();
        let results = expr.lower_call(call, position)?;
        if results.len() != targets.len() {
            return Err(CompilerError::lowering(
                format!(
                    "number of return values ({}) doesn't match number of assignment targets ({})",
                    results.len(),
                    targets.len()
                ),
                position,
            ));
        }
        for (target, &result_dt) in targets.iter().zip(&results) {
            let target_dt = expr.target_datatype(target, position)?;
            match conversion::store(result_dt, target_dt, position)? {
                StoreConversion::Direct => {}
                StoreConversion::Convert(cast) => expr.emitter().emit(cast),
                StoreConversion::AddressOf => {
                    return Err(CompilerError::lowering("cannot store an address here", position));
                }
            }
            expr.pop_into(target, position)?;
        }
        Ok(())
    }

    pub(super) fn lower_post_incr_decr(
        &mut self,
        target: &AssignTarget,
        op: IncrDecr,
        position: &Position,
    ) -> Result<()> {
        let ast = self.ast;
        self.emitter.line(position);
        let incr = op == IncrDecr::Incr;
        let select = |dt, inc: OpcodeFor, dec: OpcodeFor| if incr { inc(dt) } else { dec(dt) };
        let verb = if incr { "increment" } else { "decrement" };
        let invalid = |dt: DataType| CompilerError::InvalidDatatype {
            datatype: dt,
            detail: format!("cannot {verb} a value of this datatype"),
            position: position.clone(),
        };

        match *target {
            AssignTarget::Register(register) => {
                if register.is_pair() {
                    let name = register.name();
                    return Err(CompilerError::unsupported(
                        format!("incrementing or decrementing register pair {name}"),
                        position,
                    ));
                }
                let opcode = if incr { Opcode::IncVarUb } else { Opcode::DecVarUb };
                self.emitter.emit_label_ref(opcode, register.name());
            }
            AssignTarget::Identifier(id) => {
                let (decl_id, decl) = types::target_var(ast, id)?;
                let dt = decl.datatype;
                match decl.kind {
                    VarDeclKind::Var => {
                        let opcode = select(dt, Opcode::inc_var_for, Opcode::dec_var_for)
                            .ok_or_else(|| invalid(dt))?;
                        let name = ast.scoped_name(decl_id)?;
                        self.emitter.emit_label_ref(opcode, name);
                    }
                    VarDeclKind::Memory if dt.is_byte() => {
                        let address = self.expr().memory_address(decl, position)?;
                        let opcode = if incr { Opcode::IncMemory } else { Opcode::DecMemory };
                        self.emitter.emit_arg(opcode, Value::UWord(address));
                    }
                    VarDeclKind::Memory => {
                        // read, adjust by one, write back
                        let one = Value::numeric(dt, 1.0)?;
                        let arith = if incr { BinaryOp::Add } else { BinaryOp::Sub };
                        let opcode = operators::binary_opcode(arith, dt, position)?;
                        let mut expr = self.expr();
                        expr.lower(id)?;
                        expr.push_value(one, position)?;
                        expr.emitter().emit(opcode);
                        expr.pop_into(target, position)?;
                    }
                    VarDeclKind::Const => {
                        return Err(CompilerError::lowering(
                            format!("cannot assign to constant {}", decl.name),
                            position,
                        ));
                    }
                }
            }
            AssignTarget::ArrayIndexed(id) => {
                let Expr::ArrayIndexed { array, index } = *ast.expr(id) else {
                    return Err(CompilerError::lowering("malformed indexed target", position));
                };
                let mut expr = self.expr();
                let (element, name) = expr.indexed_array(array)?;
                expr.lower_index(index)?;
                let opcode = select(element, Opcode::inc_indexed_for, Opcode::dec_indexed_for)
                    .ok_or_else(|| invalid(element))?;
                self.emitter.emit_label_ref(opcode, name);
            }
            AssignTarget::Memory(address) => match self.expr().constant_address(address)? {
                Some(address) => {
                    let opcode = if incr { Opcode::IncMemory } else { Opcode::DecMemory };
                    self.emitter.emit_arg(opcode, Value::UWord(address));
                }
                None => {
                    self.expr().lower_as(address, DataType::UWord)?;
                    let opcode = if incr { Opcode::PopIncMemory } else { Opcode::PopDecMemory };
                    self.emitter.emit(opcode);
                }
            },
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::{AstBuilder, BinaryOp, RegisterOrFlag, RegisterSet};
    use crate::bytecode::Opcode;
    use crate::testing::{lower, start_opcodes};
    use octet_core::{DataType, Register};

    #[test]
    fn byte_value_widens_into_word_target() {
        let mut b = AstBuilder::new("t.oct");
        let w = b.var(DataType::Word, "w", None);
        let x = b.var(DataType::UByte, "x", None);
        let target = b.target_var("w");
        let value = b.ident("x");
        let assign = b.assign(target, value);
        let opcodes = start_opcodes(&mut b, vec![w, x], vec![assign]);
        assert_eq!(
            opcodes,
            vec![
                Opcode::Line,
                Opcode::PushVarByte,
                Opcode::CastUbToW,
                Opcode::PopVarWord,
            ]
        );
    }

    #[test]
    fn literal_is_pushed_in_target_type() {
        let mut b = AstBuilder::new("t.oct");
        let f = b.var(DataType::Float, "f", None);
        let target = b.target_var("f");
        let value = b.int(3);
        let assign = b.assign(target, value);
        let opcodes = start_opcodes(&mut b, vec![f], vec![assign]);
        assert_eq!(
            opcodes,
            vec![Opcode::Line, Opcode::PushFloat, Opcode::PopVarFloat]
        );
    }

    #[test]
    fn word_into_byte_is_rejected() {
        let mut b = AstBuilder::new("t.oct");
        let x = b.var(DataType::UByte, "x", None);
        let w = b.var(DataType::UWord, "w", None);
        let target = b.target_var("x");
        let value = b.ident("w");
        let assign = b.assign(target, value);
        let start = b.subroutine("start", vec![], vec![], vec![assign]);
        let main = b.block("main", vec![x, w, start]);
        let err = crate::testing::try_lower(b.module("t", vec![main])).unwrap_err();
        assert!(matches!(err, octet_core::CompilerError::NarrowingConversion { .. }));
    }

    #[test]
    fn memory_writes() {
        let mut b = AstBuilder::new("t.oct");
        let address = b.int(0xd020);
        let target = b.target_memory(address);
        let value = b.int(1);
        let assign = b.assign(target, value);
        let address = b.int(0xd021);
        let target = b.target_memory(address);
        let incr = b.incr(target);
        let opcodes = start_opcodes(&mut b, vec![], vec![assign, incr]);
        assert_eq!(
            opcodes,
            vec![
                Opcode::Line,
                Opcode::PushByte,
                Opcode::PopMemByte,
                Opcode::Line,
                Opcode::IncMemory,
            ]
        );
    }

    #[test]
    fn augmented_memory_assignment() {
        let mut b = AstBuilder::new("t.oct");
        let address = b.int(0xd020);
        let target = b.target_memory(address);
        let value = b.int(2);
        let assign = b.aug_assign(target, BinaryOp::Add, value);
        let opcodes = start_opcodes(&mut b, vec![], vec![assign]);
        assert_eq!(
            opcodes,
            vec![
                Opcode::Line,
                Opcode::PushMemUb,
                Opcode::PushByte,
                Opcode::AddUb,
                Opcode::PopMemByte,
            ]
        );
    }

    #[test]
    fn increments() {
        let mut b = AstBuilder::new("t.oct");
        let w = b.var(DataType::UWord, "w", None);
        let target = b.target_var("w");
        let incr = b.incr(target);
        let target = b.target_register(Register::Y);
        let decr = b.decr(target);
        let opcodes = start_opcodes(&mut b, vec![w], vec![incr, decr]);
        assert_eq!(
            opcodes,
            vec![
                Opcode::Line,
                Opcode::IncVarUw,
                Opcode::Line,
                Opcode::DecVarUb,
            ]
        );
    }

    #[test]
    fn register_results_are_popped_in_order() {
        let mut b = AstBuilder::new("t.oct");
        let read = b.asm_subroutine(
            "read",
            Some(0xff00),
            vec![],
            vec![
                (DataType::UByte, RegisterOrFlag::Register(Register::A)),
                (DataType::UWord, RegisterOrFlag::Register(Register::XY)),
            ],
            RegisterSet::empty(),
            vec![],
        );
        let a = b.var(DataType::UByte, "a", None);
        let w = b.var(DataType::UWord, "w", None);
        let value = b.call("read", vec![]);
        let first = b.target_var("a");
        let second = b.target_var("w");
        let assign = b.assign_many(vec![first, second], value);
        let start = b.subroutine("start", vec![], vec![], vec![assign]);
        let main = b.block("main", vec![read, a, w, start]);
        let program = lower(b.module("t", vec![main]));

        let opcodes: Vec<Opcode> = program.opcodes().collect();
        let call_at = opcodes.iter().position(|&op| op == Opcode::Call).unwrap();
        assert_eq!(
            &opcodes[call_at..call_at + 5],
            &[
                Opcode::Call,
                Opcode::PushRegXyWord,
                Opcode::PushVarByte,
                Opcode::PopVarByte,
                Opcode::PopVarWord
            ]
        );
    }
}

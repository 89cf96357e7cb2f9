//! `for` loops over ranges and iterables.
//!
//! The final value of the loop variable after the loop is undefined.

use octet_core::{
    BranchCondition, CompilerError, DataType, Position, Register, Result, Value, common_datatype,
};

use super::StmtCompiler;
use super::if_stmt::branch_opcode;
use crate::ast::{AssignTarget, BinaryOp, Expr, ExprId, ForLoop, Stmt, StmtId, VarDeclKind};
use crate::bytecode::Opcode;
use crate::operators;
use crate::resolve::desugar::LOOP_INDEX_VARIABLE;
use crate::types::{self, ConstantRange};

/// Steps up to this size are unrolled into single increments.
const MAX_UNROLLED_STEP: i64 = 8;

/// Iterables are indexed with a byte counter.
const MAX_ITERABLE_LENGTH: usize = 255;

const X_LOOP_REGISTER: &str =
    "loop variable cannot use X register because that is used as internal stack pointer";

/// The variable or register a loop counts with.
struct LoopVar {
    target: AssignTarget,
    /// Label the variable instructions refer to
    name: String,
    datatype: DataType,
}

impl StmtCompiler<'_> {
    pub(super) fn lower_for(&mut self, for_loop: &ForLoop, position: &Position) -> Result<()> {
        let ast = self.ast;
        let is_filler = |s: &StmtId| matches!(ast.stmt(*s), Stmt::VarDecl(_) | Stmt::Nop);
        let body_is_empty = ast
            .stmt(for_loop.body)
            .statements()
            .is_none_or(|list| list.iter().all(is_filler));
        if body_is_empty {
            return Ok(());
        }
        self.emitter.line(position);
        let var = self.loop_var(for_loop, position)?;

        match ast.expr(for_loop.iterable) {
            Expr::Range { from, to, step } => match types::constant_range(ast, for_loop.iterable)? {
                Some(range) => self.lower_constant_range(&var, range, for_loop.body, position),
                None => self.lower_variable_range(&var, *from, *to, *step, for_loop.body, position),
            },
            Expr::Identifier(_) => {
                if for_loop.loop_register == Some(Register::X) {
                    return Err(CompilerError::lowering(X_LOOP_REGISTER, position));
                }
                self.lower_iteration(&var, for_loop.iterable, for_loop.body, position)
            }
            Expr::Literal(_) => Err(CompilerError::lowering(
                "literal value in loop must have been moved to heap already",
                position,
            )),
            _ => Err(CompilerError::lowering(
                "loop over something that isn't iterable",
                position,
            )),
        }
    }

    fn loop_var(&self, for_loop: &ForLoop, position: &Position) -> Result<LoopVar> {
        let ast = self.ast;
        if let Some(register) = for_loop.loop_register {
            if register.is_pair() {
                return Err(CompilerError::unsupported(
                    format!("register pair {register} as loop variable"),
                    position,
                ));
            }
            return Ok(LoopVar {
                target: AssignTarget::Register(register),
                name: register.name().to_string(),
                datatype: register.datatype(),
            });
        }
        let loop_var = for_loop
            .loop_var
            .ok_or_else(|| CompilerError::lowering("for loop without a loop variable", position))?;
        let (decl_id, decl) = types::target_var(ast, loop_var)?;
        if decl.kind != VarDeclKind::Var {
            return Err(CompilerError::unsupported(
                format!("loop variable {} that is not a plain variable", decl.name),
                position,
            ));
        }
        Ok(LoopVar {
            target: AssignTarget::Identifier(loop_var),
            name: ast.scoped_name(decl_id)?,
            datatype: decl.datatype,
        })
    }

    /// Compile a loop over a range with constant bounds and step.
    ///
    /// Layout:
    /// ```text
    /// LV = first
    /// loop:
    /// [body]
    /// continue:
    /// LV += step          (unrolled INC/DEC for small steps)
    /// PUSH LV
    /// CMP last+step
    /// BNZ loop            (BPOS loop when counting down to zero)
    /// break:
    /// NOP
    /// ```
    ///
    /// An empty range emits nothing; a single value runs the body once.
    fn lower_constant_range(
        &mut self,
        var: &LoopVar,
        range: ConstantRange,
        body: StmtId,
        position: &Position,
    ) -> Result<()> {
        let dt = var.datatype;
        let Some(last) = range.final_value() else {
            return Ok(());
        };
        if !dt.is_integer() {
            return Err(CompilerError::lowering("range must be byte or word", position));
        }
        if !dt.holds(range.first) || !dt.holds(last) {
            return Err(CompilerError::lowering(
                format!("range out of bounds for {dt}"),
                position,
            ));
        }
        let first = Value::integer(dt, range.first)?;
        self.store_loop_var(var, first, position)?;

        if range.count() == 1 {
            return self.lower_once(body);
        }

        let start = self.emitter.make_label("loop");
        let cont = self.emitter.make_label("continue");
        let brk = self.emitter.make_label("break");
        self.emitter.enter_loop(&brk, &cont);
        self.emitter.label(start.clone());
        let lowered = self.lower(body).and_then(|()| {
            self.emitter.label(cont);
            self.step_loop_var(var, range.step, position)?;
            if counts_down_to_zero(dt, range.first, last, range.step) {
                self.emitter
                    .emit_label_ref(branch_opcode(BranchCondition::Pos), start);
                return Ok(());
            }
            let check = wrap(dt, last + range.step)?;
            let compare = Opcode::cmp_for(dt).ok_or_else(|| {
                CompilerError::lowering(format!("invalid loop variable datatype {dt}"), position)
            })?;
            self.expr().push_target(&var.target)?;
            self.emitter.emit_arg(compare, check);
            self.emitter.emit_label_ref(Opcode::Bnz, start);
            Ok(())
        });
        self.emitter.exit_loop();
        lowered?;

        self.emitter.label(brk);
        self.emitter.emit(Opcode::Nop);
        Ok(())
    }

    /// The body of a loop over a single value. `break` and `continue` both
    /// leave it.
    fn lower_once(&mut self, body: StmtId) -> Result<()> {
        let ast = self.ast;
        let leaves = ast
            .statements_under(body)
            .into_iter()
            .any(|s| matches!(ast.stmt(s), Stmt::Break | Stmt::Continue));
        if !leaves {
            return self.lower(body);
        }
        let end = self.emitter.make_label("end");
        self.emitter.enter_loop(&end, &end);
        let lowered = self.lower(body);
        self.emitter.exit_loop();
        lowered?;
        self.emitter.label(end);
        self.emitter.emit(Opcode::Nop);
        Ok(())
    }

    /// Compile a loop over a range whose bounds are not all constant. Only
    /// steps of 1 and -1 are supported.
    ///
    /// Layout:
    /// ```text
    /// LV = from
    /// [LV > to]           ([LV < to] when counting down)
    /// JNZ break
    /// loop:
    /// [body]
    /// continue:
    /// [LV == to]
    /// JNZ break
    /// INC/DEC LV
    /// JUMP loop
    /// break:
    /// NOP
    /// ```
    fn lower_variable_range(
        &mut self,
        var: &LoopVar,
        from: ExprId,
        to: ExprId,
        step: Option<ExprId>,
        body: StmtId,
        position: &Position,
    ) -> Result<()> {
        let ast = self.ast;
        let step = match step {
            None => Some(1),
            Some(step) => {
                let value = types::const_value(ast, step)?;
                value.and_then(|lit| lit.as_integer())
            }
        };
        let Some(step) = step else {
            return Err(CompilerError::unsupported("for loop with a non-constant step", position));
        };
        if step != 1 && step != -1 {
            return Err(CompilerError::unsupported(
                "for loop over a variable range with a step other than 1 or -1",
                position,
            ));
        }

        let mut expr = self.expr();
        expr.lower_for_store(from, var.datatype)?;
        expr.pop_into(&var.target, position)?;

        let start = self.emitter.make_label("loop");
        let cont = self.emitter.make_label("continue");
        let brk = self.emitter.make_label("break");
        let past_end = if step > 0 { BinaryOp::Greater } else { BinaryOp::Less };
        self.compare_loop_var(var, past_end, to, position)?;
        self.emitter.emit_label_ref(Opcode::Jnz, brk.clone());

        self.emitter.enter_loop(&brk, &cont);
        self.emitter.label(start.clone());
        let lowered = self.lower(body).and_then(|()| {
            self.emitter.label(cont);
            self.compare_loop_var(var, BinaryOp::Equal, to, position)?;
            self.emitter.emit_label_ref(Opcode::Jnz, brk.clone());
            self.step_loop_var(var, step, position)?;
            self.emitter.emit_label_ref(Opcode::Jump, start);
            Ok(())
        });
        self.emitter.exit_loop();
        lowered?;

        self.emitter.label(brk);
        self.emitter.emit(Opcode::Nop);
        Ok(())
    }

    /// Compile a loop over the elements of a string or array.
    ///
    /// Layout:
    /// ```text
    /// index = 0
    /// loop:
    /// LV = iterable[index]
    /// [body]
    /// continue:
    /// INC index
    /// PUSH index
    /// CMP element count
    /// BNZ loop
    /// break:
    /// NOP
    /// ```
    fn lower_iteration(
        &mut self,
        var: &LoopVar,
        iterable: ExprId,
        body: StmtId,
        position: &Position,
    ) -> Result<()> {
        let ast = self.ast;
        let (decl_id, decl) = types::target_var(ast, iterable)?;
        let dt = decl.datatype;
        if matches!(dt, DataType::StrP | DataType::StrPs) {
            return Err(CompilerError::lowering(
                format!("can't iterate string type {dt}"),
                position,
            ));
        }
        let element = dt.is_iterable().then(|| dt.element_type()).flatten();
        let Some(element) = element else {
            return Err(CompilerError::lowering(
                "loop over something that isn't iterable",
                position,
            ));
        };
        if element != var.datatype {
            return Err(CompilerError::lowering(
                format!(
                    "loop variable type {} doesn't match the element type {} of the iterable",
                    var.datatype, element
                ),
                position,
            ));
        }
        let count = types::element_count(ast, decl)?;
        if count > MAX_ITERABLE_LENGTH {
            return Err(CompilerError::lowering(
                format!("cannot iterate over more than {MAX_ITERABLE_LENGTH} elements"),
                position,
            ));
        }
        if count == 0 {
            return Ok(());
        }
        let count = Value::integer(DataType::UByte, count as i64)?;
        let Some(index) = self.scope_member(body, LOOP_INDEX_VARIABLE) else {
            return Err(CompilerError::lowering("loop index variable was not declared", position));
        };
        let index = ast.scoped_name(index)?;
        let array = ast.scoped_name(decl_id)?;
        let read = Opcode::read_indexed_for(element).ok_or_else(|| {
            CompilerError::lowering(format!("cannot index elements of type {element}"), position)
        })?;

        self.emitter.emit_arg(Opcode::PushByte, Value::UByte(0));
        self.emitter.emit_label_ref(Opcode::PopVarByte, &index);

        let start = self.emitter.make_label("loop");
        let cont = self.emitter.make_label("continue");
        let brk = self.emitter.make_label("break");
        self.emitter.enter_loop(&brk, &cont);
        self.emitter.label(start.clone());
        self.emitter.emit_label_ref(Opcode::PushVarByte, &index);
        self.emitter.emit_label_ref(read, array);
        let popped = self.expr().pop_into(&var.target, position);
        let lowered = popped.and_then(|()| self.lower(body)).map(|()| {
            self.emitter.label(cont);
            self.emitter.emit_label_ref(Opcode::IncVarUb, index.clone());
            self.emitter.emit_label_ref(Opcode::PushVarByte, index);
            self.emitter.emit_arg(Opcode::CmpUb, count);
            self.emitter.emit_label_ref(Opcode::Bnz, start);
        });
        self.emitter.exit_loop();
        lowered?;

        self.emitter.label(brk);
        self.emitter.emit(Opcode::Nop);
        Ok(())
    }

    fn store_loop_var(&mut self, var: &LoopVar, value: Value, position: &Position) -> Result<()> {
        let mut expr = self.expr();
        expr.push_value(value, position)?;
        expr.pop_into(&var.target, position)
    }

    /// `LV += step`: single increments for small steps, arithmetic otherwise.
    fn step_loop_var(&mut self, var: &LoopVar, step: i64, position: &Position) -> Result<()> {
        let dt = var.datatype;
        let invalid = || invalid_loop_var(dt, position);
        if (1..=MAX_UNROLLED_STEP).contains(&step) {
            let opcode = Opcode::inc_var_for(dt).ok_or_else(invalid)?;
            for _ in 0..step {
                self.emitter.emit_label_ref(opcode, var.name.clone());
            }
            return Ok(());
        }
        if (-MAX_UNROLLED_STEP..=-1).contains(&step) {
            let opcode = Opcode::dec_var_for(dt).ok_or_else(invalid)?;
            for _ in 0..step.unsigned_abs() {
                self.emitter.emit_label_ref(opcode, var.name.clone());
            }
            return Ok(());
        }
        let op = if step > 0 { BinaryOp::Add } else { BinaryOp::Sub };
        let opcode = operators::binary_opcode(op, dt, position)?;
        let amount = Value::integer(dt, step.abs())?;
        let mut expr = self.expr();
        expr.push_target(&var.target)?;
        expr.push_value(amount, position)?;
        expr.emitter().emit(opcode);
        expr.pop_into(&var.target, position)
    }

    /// Push the truth value of `LV op bound`.
    fn compare_loop_var(
        &mut self,
        var: &LoopVar,
        op: BinaryOp,
        bound: ExprId,
        position: &Position,
    ) -> Result<()> {
        let mut expr = self.expr();
        let bound_dt = expr.datatype(bound)?;
        let var_dt = var.datatype;
        let dt = common_datatype(var_dt, bound_dt)
            .map(|common| common.datatype)
            .ok_or_else(|| CompilerError::InvalidDatatype {
                datatype: bound_dt,
                detail: format!("range bound does not match loop variable type {var_dt}"),
                position: position.clone(),
            })?;
        let opcode = operators::binary_opcode(op, dt, position)?;
        expr.push_target(&var.target)?;
        if let Some(widen) = crate::conversion::widening(var.datatype, dt, position)? {
            expr.emitter().emit(widen);
        }
        expr.lower_as(bound, dt)?;
        expr.emitter().emit(opcode);
        Ok(())
    }
}

/// Whether the loop can end on the sign flag: counting down to zero in
/// small steps from a value the flags still see as positive.
fn counts_down_to_zero(dt: DataType, first: i64, last: i64, step: i64) -> bool {
    let positive_max = if dt.is_byte() { 127 } else { 32767 };
    last == 0 && first > 0 && first <= positive_max && (-MAX_UNROLLED_STEP..=-1).contains(&step)
}

/// `value` wrapped into the two's complement range of `dt`.
fn invalid_loop_var(dt: DataType, position: &Position) -> CompilerError {
    CompilerError::lowering(format!("invalid loop variable datatype {dt}"), position)
}

fn wrap(dt: DataType, value: i64) -> Result<Value> {
    let bits = u32::from(dt.width()) * 8;
    let modulus = 1_i64 << bits;
    let mut wrapped = value.rem_euclid(modulus);
    if dt.is_signed() && wrapped >= modulus / 2 {
        wrapped -= modulus;
    }
    Value::integer(dt, wrapped)
}

//! Binary operators.
//!
//! Both operands are promoted to their arithmetic-common datatype before
//! the operation. When the expression's own datatype differs from that
//! (bitwise operators keep the left operand's type, floor division of a
//! float yields an integer, division by a large constant narrows) the
//! result is cast afterwards. Comparisons and logical operators always
//! produce a byte truth value.

use octet_core::{CompilerError, DataType, Result, Value, common_datatype};

use super::ExprCompiler;
use crate::ast::{BinaryOp, ExprId};
use crate::bytecode::{Opcode, Syscall};
use crate::conversion;
use crate::operators;
use crate::types;

impl ExprCompiler<'_> {
    pub(super) fn lower_binary(
        &mut self,
        id: ExprId,
        left: ExprId,
        op: BinaryOp,
        right: ExprId,
    ) -> Result<()> {
        let ast = self.ast;
        let position = ast.expr_position(id);
        if op.is_shift() {
            return self.lower_shift(left, op, right);
        }

        let left_dt = self.datatype(left)?;
        let right_dt = self.datatype(right)?;
        let operation_dt = common_datatype(left_dt, right_dt)
            .ok_or_else(|| {
                self.invalid_datatype(
                    left_dt,
                    format!("operator {op} on incompatible datatypes {left_dt} and {right_dt}"),
                    position,
                )
            })?
            .datatype;

        let opcode = operators::binary_opcode(op, operation_dt, position)?;
        self.lower_as(left, operation_dt)?;
        self.lower_as(right, operation_dt)?;
        self.emitter.emit(opcode);
        if op == BinaryOp::FloorDiv && opcode == Opcode::DivF {
            let floor = Value::UByte(Syscall::FuncFloor.into());
            self.emitter.emit_arg(Opcode::Syscall, floor);
        }

        if !(op.is_comparison() || op.is_logical()) {
            let result_dt = types::resulting_datatype(ast, id)?.unwrap_or(operation_dt);
            if let Some(cast) = conversion::cast_opcode(operation_dt, result_dt) {
                self.emitter.emit(cast);
            }
        }
        Ok(())
    }

    /// Shift by a constant amount: one single-bit shift per position.
    fn lower_shift(&mut self, left: ExprId, op: BinaryOp, right: ExprId) -> Result<()> {
        let dt = self.datatype(left)?;
        self.lower(left)?;
        self.shift_top(op, dt, right)
    }

    /// Shift the `datatype` value on top of the stack by the constant
    /// `amount`.
    pub fn shift_top(&mut self, op: BinaryOp, datatype: DataType, amount: ExprId) -> Result<()> {
        let ast = self.ast;
        let position = ast.expr_position(amount);
        let opcode = operators::shift_opcode(op, datatype, position)?;
        let amount = types::require_const_integer(ast, amount, "shift amount")?;
        if amount < 0 {
            return Err(CompilerError::lowering("negative shift amount", position));
        }
        let bits = i64::from(datatype.width()) * 8;
        for _ in 0..amount.min(bits) {
            self.emitter.emit(opcode);
        }
        Ok(())
    }
}

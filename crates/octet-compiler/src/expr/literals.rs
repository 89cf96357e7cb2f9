//! Literal values.

use octet_core::{CompilerError, DataType, Position, Result, Value};

use super::ExprCompiler;
use crate::ast::{ExprId, Literal};
use crate::bytecode::Opcode;

impl ExprCompiler<'_> {
    pub(super) fn push_literal(&mut self, literal: &Literal, position: &Position) -> Result<()> {
        let dt = literal.datatype();
        if !literal.is_numeric() {
            return Err(CompilerError::lowering(
                "string or array literal should have been moved into a variable",
                position,
            ));
        }
        let value = literal.to_value().ok_or_else(|| CompilerError::InvalidLiteral {
            datatype: dt,
            position: position.clone(),
        })?;
        self.push_value(value, position)
    }

    pub(crate) fn push_value(&mut self, value: Value, position: &Position) -> Result<()> {
        let dt = value.datatype();
        let opcode = self.select(Opcode::push_for(dt), dt, position)?;
        self.emitter.emit_arg(opcode, value);
        Ok(())
    }

    /// Push a numeric literal directly as `datatype`. Returns `false` when
    /// `id` is not such a literal, or its value does not fit.
    pub(super) fn push_literal_as(&mut self, id: ExprId, datatype: DataType) -> Result<bool> {
        let ast = self.ast;
        if !datatype.is_numeric() {
            return Ok(false);
        }
        let Some(literal) = ast.expr(id).as_literal() else {
            return Ok(false);
        };
        if !literal.is_numeric() {
            return Ok(false);
        }
        let Some(converted) = literal.into_datatype(datatype) else {
            return Ok(false);
        };
        self.push_literal(&converted, ast.expr_position(id))?;
        Ok(true)
    }
}

//! Explicit `as` conversions.

use octet_core::{DataType, Position, Result};

use super::ExprCompiler;
use crate::ast::ExprId;
use crate::conversion;

impl ExprCompiler<'_> {
    /// `expression as datatype`. Casting a string or array to `uword`
    /// takes its address.
    pub(super) fn lower_cast(
        &mut self,
        expression: ExprId,
        datatype: DataType,
        position: &Position,
    ) -> Result<()> {
        let from = self.datatype(expression)?;
        if from.is_heap_type() && datatype == DataType::UWord {
            return self.push_address(expression);
        }
        let opcode = conversion::cast(from, datatype, position)?;
        self.lower(expression)?;
        if let Some(opcode) = opcode {
            self.emitter.emit(opcode);
        }
        Ok(())
    }
}

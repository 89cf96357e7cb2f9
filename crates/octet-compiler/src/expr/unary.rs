//! Prefix operators.

use octet_core::{Position, Result};

use super::ExprCompiler;
use crate::ast::{ExprId, PrefixOp};
use crate::operators;

impl ExprCompiler<'_> {
    pub(super) fn lower_prefix(
        &mut self,
        op: PrefixOp,
        operand: ExprId,
        position: &Position,
    ) -> Result<()> {
        let dt = self.datatype(operand)?;
        let opcode = operators::prefix_opcode(op, dt, position)?;
        self.lower(operand)?;
        if let Some(opcode) = opcode {
            self.emitter.emit(opcode);
        }
        Ok(())
    }
}

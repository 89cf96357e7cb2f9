//! Return statements.

use octet_core::{CompilerError, Position, Result};

use super::StmtCompiler;
use crate::ast::{ExprId, NodeRef, StmtId};
use crate::bytecode::Opcode;

impl StmtCompiler<'_> {
    /// Compile a return. Values are pushed last to first so the caller
    /// finds the first one on top.
    ///
    /// Layout:
    /// ```text
    /// [value n] .. [value 1]
    /// LINE
    /// RETURN
    /// ```
    pub(super) fn lower_return(
        &mut self,
        id: StmtId,
        values: &[ExprId],
        position: &Position,
    ) -> Result<()> {
        let ast = self.ast;
        let return_types = match ast.defining_subroutine(NodeRef::Stmt(id))? {
            Some(sub) => ast
                .stmt(sub)
                .as_subroutine()
                .map(|s| s.return_types.clone())
                .unwrap_or_default(),
            None => Vec::new(),
        };
        if !values.is_empty() && values.len() != return_types.len() {
            return Err(CompilerError::lowering(
                format!(
                    "number of return values ({}) doesn't match the subroutine's return types ({})",
                    values.len(),
                    return_types.len()
                ),
                position,
            ));
        }
        for (&value, &datatype) in values.iter().zip(&return_types).rev() {
            self.expr().lower_for_store(value, datatype)?;
        }
        self.emitter.line(position);
        self.emitter.emit(Opcode::Return);
        Ok(())
    }
}

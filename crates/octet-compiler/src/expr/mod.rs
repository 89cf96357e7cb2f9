//! Expression lowering.
//!
//! The [`ExprCompiler`] emits the instructions that leave an expression's
//! value on the stack. Datatypes come from [`types`](crate::types): the
//! tree is never annotated, so each operand's type is asked for when it is
//! lowered, and conversions are emitted wherever an operand meets a wider
//! operation, parameter or target type.
//!
//! # Example
//!
//! ```ignore
//! let mut compiler = ExprCompiler::new(&ast, &mut emitter);
//!
//! // Push the value, promoted to the operation's datatype
//! compiler.lower_as(operand, DataType::UWord)?;
//! ```

mod assignment;
mod binary;
mod calls;
mod cast;
mod identifiers;
mod literals;
mod unary;

use octet_core::{CompilerError, DataType, Position, Result};

use crate::ast::{Ast, Expr, ExprId};
use crate::bytecode::Opcode;
use crate::conversion::{self, StoreConversion};
use crate::emit::ProgramEmitter;
use crate::types;

/// Lowers expressions onto the evaluation stack.
pub struct ExprCompiler<'a> {
    ast: &'a Ast,
    emitter: &'a mut ProgramEmitter,
}

impl<'a> ExprCompiler<'a> {
    pub fn new(ast: &'a Ast, emitter: &'a mut ProgramEmitter) -> Self {
        Self { ast, emitter }
    }

    pub fn emitter(&mut self) -> &mut ProgramEmitter {
        &mut *self.emitter
    }

    /// The static datatype of an expression that must have one.
    pub fn datatype(&self, id: ExprId) -> Result<DataType> {
        types::resulting_datatype(self.ast, id)?.ok_or_else(|| {
            CompilerError::lowering(
                "cannot determine the datatype of this expression",
                self.ast.expr_position(id),
            )
        })
    }

    /// Push the value of `id`.
    pub fn lower(&mut self, id: ExprId) -> Result<()> {
        let ast = self.ast;
        let position = ast.expr_position(id);
        match ast.expr(id) {
            Expr::Literal(lit) => self.push_literal(lit, position),
            Expr::Identifier(_) => self.lower_identifier(id),
            Expr::Register(register) => {
                self.push_register(*register);
                Ok(())
            }
            Expr::Prefix { op, operand } => self.lower_prefix(*op, *operand, position),
            Expr::Binary { left, op, right } => self.lower_binary(id, *left, *op, *right),
            Expr::ArrayIndexed { array, index } => self.lower_indexed_read(*array, *index),
            Expr::FunctionCall(call) => self.lower_call_value(call, position),
            Expr::Range { .. } => Err(CompilerError::lowering(
                "it's not possible to just have a range expression that has to be translated",
                position,
            )),
            Expr::TypeCast {
                expression,
                datatype,
            } => self.lower_cast(*expression, *datatype, position),
            Expr::DirectMemoryRead { address } => self.lower_memory_read(*address),
        }
    }

    /// Push the value of `id` as a `datatype`, widening it if needed.
    /// Numeric literals are pushed in the wanted type directly.
    pub fn lower_as(&mut self, id: ExprId, datatype: DataType) -> Result<()> {
        if self.push_literal_as(id, datatype)? {
            return Ok(());
        }
        let ast = self.ast;
        let from = self.datatype(id)?;
        self.lower(id)?;
        if let Some(opcode) = conversion::widening(from, datatype, ast.expr_position(id))? {
            self.emitter.emit(opcode);
        }
        Ok(())
    }

    /// Push the value of `id` ready to be stored into a `target` of the
    /// given datatype.
    pub fn lower_for_store(&mut self, id: ExprId, target: DataType) -> Result<()> {
        if self.push_literal_as(id, target)? {
            return Ok(());
        }
        let ast = self.ast;
        let position = ast.expr_position(id);
        match conversion::store(self.datatype(id)?, target, position)? {
            StoreConversion::Direct => self.lower(id),
            StoreConversion::Convert(opcode) => {
                self.lower(id)?;
                self.emitter.emit(opcode);
                Ok(())
            }
            StoreConversion::AddressOf => self.push_address(id),
        }
    }

    fn invalid_datatype(
        &self,
        datatype: DataType,
        detail: impl Into<String>,
        position: &Position,
    ) -> CompilerError {
        CompilerError::InvalidDatatype {
            datatype,
            detail: detail.into(),
            position: position.clone(),
        }
    }

    /// A per-datatype opcode, failing when the datatype has none.
    fn select(
        &self,
        opcode: Option<Opcode>,
        datatype: DataType,
        position: &Position,
    ) -> Result<Opcode> {
        opcode.ok_or_else(|| {
            self.invalid_datatype(datatype, "no instruction for this datatype", position)
        })
    }
}


//! Variables, registers, indexed elements and memory reads.

use octet_core::{CompilerError, DataType, Position, Register, Result, Value};

use super::ExprCompiler;
use crate::ast::{ExprId, VarDecl, VarDeclKind};
use crate::bytecode::Opcode;
use crate::types;

impl ExprCompiler<'_> {
    pub(super) fn lower_identifier(&mut self, id: ExprId) -> Result<()> {
        let ast = self.ast;
        let position = ast.expr_position(id);
        let (decl_id, decl) = types::target_var(ast, id)?;
        let dt = decl.datatype;
        match decl.kind {
            VarDeclKind::Var if dt.is_heap_type() => {
                let name = ast.scoped_name(decl_id)?;
                self.emitter.emit_label_ref(Opcode::PushAddrHeapVar, name);
            }
            VarDeclKind::Var => {
                let opcode = self.select(Opcode::push_var_for(dt), dt, position)?;
                let name = ast.scoped_name(decl_id)?;
                self.emitter.emit_label_ref(opcode, name);
            }
            VarDeclKind::Memory if dt.is_heap_type() => {
                let address = Value::UWord(self.memory_address(decl, position)?);
                self.emitter.emit_arg(Opcode::PushWord, address);
            }
            VarDeclKind::Memory => {
                let address = self.memory_address(decl, position)?;
                let opcode = self.select(Opcode::push_mem_for(dt), dt, position)?;
                self.emitter.emit_arg(opcode, Value::UWord(address));
            }
            VarDeclKind::Const if dt.is_heap_type() => {
                let name = ast.scoped_name(decl_id)?;
                self.emitter.emit_label_ref(Opcode::PushAddrHeapVar, name);
            }
            VarDeclKind::Const => {
                let value = decl
                    .value
                    .map(|v| types::const_value(ast, v))
                    .transpose()?
                    .flatten()
                    .ok_or_else(|| CompilerError::NotConstant {
                        what: format!("constant {}", decl.name),
                        position: position.clone(),
                    })?;
                let value = value.into_datatype(dt).unwrap_or(value);
                self.push_literal(&value, position)?;
            }
        }
        Ok(())
    }

    /// The fixed address of a memory-mapped variable.
    pub(crate) fn memory_address(&self, decl: &VarDecl, position: &Position) -> Result<u16> {
        let value = decl.value.ok_or_else(|| CompilerError::NotConstant {
            what: format!("address of {}", decl.name),
            position: position.clone(),
        })?;
        let address = types::require_const_integer(self.ast, value, "memory address")?;
        u16::try_from(address).map_err(|_| CompilerError::ValueOutOfRange {
            value: address.to_string(),
            datatype: DataType::UWord,
        })
    }

    pub(crate) fn push_register(&mut self, register: Register) {
        let opcode = match register {
            Register::AX => Opcode::PushRegAxWord,
            Register::AY => Opcode::PushRegAyWord,
            Register::XY => Opcode::PushRegXyWord,
            Register::A | Register::X | Register::Y => Opcode::PushVarByte,
        };
        self.emitter.emit_label_ref(opcode, register.name());
    }

    /// Push the address of a string or array variable.
    pub(crate) fn push_address(&mut self, id: ExprId) -> Result<()> {
        let ast = self.ast;
        let position = ast.expr_position(id);
        let not_addressable = || {
            CompilerError::lowering(
                "can only take address of a literal string value or a string/array variable",
                position,
            )
        };
        if ast.expr(id).as_identifier().is_none() {
            return Err(not_addressable());
        }
        let (decl_id, decl) = types::target_var(ast, id)?;
        if !decl.datatype.is_heap_type() {
            return Err(not_addressable());
        }
        if decl.kind == VarDeclKind::Memory {
            let address = Value::UWord(self.memory_address(decl, position)?);
            self.emitter.emit_arg(Opcode::PushWord, address);
        } else {
            let name = ast.scoped_name(decl_id)?;
            self.emitter.emit_label_ref(Opcode::PushAddrHeapVar, name);
        }
        Ok(())
    }

    /// The element datatype and scoped name of an indexed array.
    pub(crate) fn indexed_array(&self, array: ExprId) -> Result<(DataType, String)> {
        let ast = self.ast;
        let (decl_id, decl) = types::target_var(ast, array)?;
        let position = ast.expr_position(array);
        let element = decl.datatype.element_type().ok_or_else(|| {
            self.invalid_datatype(decl.datatype, "cannot index a scalar", position)
        })?;
        Ok((element, ast.scoped_name(decl_id)?))
    }

    /// Push the array index; indexes are integers.
    pub(crate) fn lower_index(&mut self, index: ExprId) -> Result<()> {
        let dt = self.datatype(index)?;
        if !dt.is_integer() {
            return Err(self.invalid_datatype(
                dt,
                "array index must be an integer",
                self.ast.expr_position(index),
            ));
        }
        self.lower(index)
    }

    pub(crate) fn lower_indexed_read(&mut self, array: ExprId, index: ExprId) -> Result<()> {
        let ast = self.ast;
        let position = ast.expr_position(array);
        let (element, name) = self.indexed_array(array)?;
        self.lower_index(index)?;
        let flavour = Opcode::read_indexed_for(element);
        let opcode = self.select(flavour, element, position)?;
        self.emitter.emit_label_ref(opcode, name);
        Ok(())
    }

    /// The constant address of a memory access, if it has one.
    pub(crate) fn constant_address(&self, address: ExprId) -> Result<Option<u16>> {
        let value = types::const_value(self.ast, address)?;
        let Some(value) = value.and_then(|l| l.as_integer()) else {
            return Ok(None);
        };
        u16::try_from(value)
            .map(Some)
            .map_err(|_| CompilerError::ValueOutOfRange {
                value: value.to_string(),
                datatype: DataType::UWord,
            })
    }

    pub(super) fn lower_memory_read(&mut self, address: ExprId) -> Result<()> {
        match self.constant_address(address)? {
            Some(address) => {
                let address = Value::UWord(address);
                self.emitter.emit_arg(Opcode::PushMemUb, address);
            }
            None => {
                self.lower_as(address, DataType::UWord)?;
                self.emitter.emit(Opcode::PushMemRead);
            }
        }
        Ok(())
    }
}

//! Assignment targets: storing the stack top, and reading a target's
//! current value.

use octet_core::{CompilerError, DataType, Position, Register, Result, Value};

use super::ExprCompiler;
use crate::ast::{AssignTarget, Expr, ExprId, VarDeclKind};
use crate::bytecode::Opcode;
use crate::types;

impl ExprCompiler<'_> {
    /// The assignment target an expression denotes, for builtins that
    /// write back into their argument.
    pub fn target_from_expr(&self, id: ExprId) -> Result<AssignTarget> {
        let ast = self.ast;
        match ast.expr(id) {
            Expr::Identifier(_) => Ok(AssignTarget::Identifier(id)),
            Expr::Register(register) => Ok(AssignTarget::Register(*register)),
            Expr::ArrayIndexed { .. } => Ok(AssignTarget::ArrayIndexed(id)),
            Expr::DirectMemoryRead { address } => Ok(AssignTarget::Memory(*address)),
            _ => Err(CompilerError::lowering(
                "cannot assign to this expression",
                ast.expr_position(id),
            )),
        }
    }

    pub fn target_datatype(&self, target: &AssignTarget, position: &Position) -> Result<DataType> {
        let datatype = types::target_datatype(self.ast, target)?;
        datatype.ok_or_else(|| {
            CompilerError::lowering(
                "cannot determine the datatype of the assignment target",
                position,
            )
        })
    }

    /// Pop the stack top into `target`.
    pub fn pop_into(&mut self, target: &AssignTarget, position: &Position) -> Result<()> {
        let ast = self.ast;
        match *target {
            AssignTarget::Register(register) => {
                self.pop_register(register);
                Ok(())
            }
            AssignTarget::Identifier(id) => {
                let (decl_id, decl) = types::target_var(ast, id)?;
                let dt = decl.datatype;
                if dt.is_heap_type() {
                    return Err(CompilerError::unsupported(
                        format!("assigning to the {dt} variable {}", decl.name),
                        position,
                    ));
                }
                match decl.kind {
                    VarDeclKind::Var => {
                        let opcode = self.select(Opcode::pop_var_for(dt), dt, position)?;
                        let name = ast.scoped_name(decl_id)?;
                        self.emitter.emit_label_ref(opcode, name);
                    }
                    VarDeclKind::Memory => {
                        let address = self.memory_address(decl, position)?;
                        let opcode = self.select(Opcode::pop_mem_for(dt), dt, position)?;
                        self.emitter.emit_arg(opcode, Value::UWord(address));
                    }
                    VarDeclKind::Const => {
                        return Err(CompilerError::lowering(
                            format!("cannot assign to constant {}", decl.name),
                            position,
                        ));
                    }
                }
                Ok(())
            }
            AssignTarget::ArrayIndexed(id) => {
                let Expr::ArrayIndexed { array, index } = *ast.expr(id) else {
                    return Err(CompilerError::lowering(
                        "malformed indexed assignment target",
                        position,
                    ));
                };
                let (element, name) = self.indexed_array(array)?;
                self.lower_index(index)?;
                let flavour = Opcode::write_indexed_for(element);
                let opcode = self.select(flavour, element, position)?;
                self.emitter.emit_label_ref(opcode, name);
                Ok(())
            }
            AssignTarget::Memory(address) => {
                match self.constant_address(address)? {
                    Some(address) => {
                        let address = Value::UWord(address);
                        self.emitter.emit_arg(Opcode::PopMemByte, address);
                    }
                    None => {
                        self.lower_as(address, DataType::UWord)?;
                        self.emitter.emit(Opcode::PopMemWrite);
                    }
                }
                Ok(())
            }
        }
    }

    /// Push the value `target` currently holds.
    pub fn push_target(&mut self, target: &AssignTarget) -> Result<()> {
        match *target {
            AssignTarget::Register(register) => {
                self.push_register(register);
                Ok(())
            }
            AssignTarget::Identifier(id) | AssignTarget::ArrayIndexed(id) => self.lower(id),
            AssignTarget::Memory(address) => self.lower_memory_read(address),
        }
    }

    pub(crate) fn pop_register(&mut self, register: Register) {
        let opcode = match register {
            Register::AX => Opcode::PopRegAxWord,
            Register::AY => Opcode::PopRegAyWord,
            Register::XY => Opcode::PopRegXyWord,
            Register::A | Register::X | Register::Y => Opcode::PopVarByte,
        };
        self.emitter.emit_label_ref(opcode, register.name());
    }
}

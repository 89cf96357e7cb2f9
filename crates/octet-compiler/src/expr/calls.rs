//! Subroutine and builtin function calls.
//!
//! A call leaves its results on the stack with the first result on top.
//! Subroutines with memory parameters receive their arguments by popping
//! into the parameter variables before the `CALL`; register subroutines get
//! theirs in CPU registers and the carry flag, and push their register
//! results after returning.

use octet_core::{CompilerError, DataType, Position, Register, Result, StatusFlag, Value};

use super::ExprCompiler;
use crate::ast::{ExprId, FunctionCall, RegisterOrFlag, RegisterSet, Stmt, StmtId, Subroutine};
use crate::builtins::BuiltinFunction;
use crate::bytecode::{Opcode, Syscall};
use crate::conversion;
use crate::scope::Declaration;
use crate::types;

impl ExprCompiler<'_> {
    /// Lower a call; returns the datatypes of the results it pushed, in
    /// stack order from the top.
    pub fn lower_call(
        &mut self,
        call: &FunctionCall,
        position: &Position,
    ) -> Result<Vec<DataType>> {
        let ast = self.ast;
        match types::resolve_identifier(ast, call.target)? {
            Declaration::Builtin(function) => self.lower_builtin(function, &call.args, position),
            Declaration::Stmt(target) => match ast.stmt(target) {
                Stmt::Subroutine(sub) => {
                    self.lower_subroutine_call(target, sub, &call.args, position)
                }
                Stmt::Label(_) => {
                    let name = ast.scoped_name(target)?;
                    self.emitter.emit_label_ref(Opcode::Call, name);
                    Ok(Vec::new())
                }
                _ => Err(CompilerError::lowering(
                    format!("cannot call {}", types::identifier_name(ast, call.target)),
                    position,
                )),
            },
        }
    }

    /// A call used as a value: exactly one result.
    pub(super) fn lower_call_value(
        &mut self,
        call: &FunctionCall,
        position: &Position,
    ) -> Result<()> {
        match self.lower_call(call, position)?.len() {
            1 => Ok(()),
            0 => Err(CompilerError::lowering("function call has no result value", position)),
            _ => Err(CompilerError::unsupported(
                "multiple return values in an expression",
                position,
            )),
        }
    }

    // =========================================================================
    // Subroutines
    // =========================================================================

    fn lower_subroutine_call(
        &mut self,
        target: StmtId,
        sub: &Subroutine,
        args: &[ExprId],
        position: &Position,
    ) -> Result<Vec<DataType>> {
        let name = self.ast.scoped_name(target)?;
        if args.len() != sub.parameters.len() {
            return Err(CompilerError::lowering(
                format!(
                    "invalid number of arguments for {name}: expected {}, got {}",
                    sub.parameters.len(),
                    args.len()
                ),
                position,
            ));
        }

        let mut save_x = sub.asm_clobbers.contains(RegisterSet::X);
        if sub.asm_parameter_registers.is_empty() {
            if save_x {
                self.emitter.emit(Opcode::Rsavex);
            }
            for (&arg, param) in args.iter().zip(&sub.parameters) {
                // strings and arrays are passed by address
                let dt = if param.datatype.is_heap_type() {
                    self.push_address(arg)?;
                    DataType::UWord
                } else {
                    self.lower_as(arg, param.datatype)?;
                    param.datatype
                };
                let opcode = self.select(Opcode::pop_var_for(dt), dt, position)?;
                self.emitter
                    .emit_label_ref(opcode, format!("{name}.{}", param.name));
            }
        } else {
            if sub.asm_parameter_registers.len() != sub.parameters.len() {
                return Err(CompilerError::unsupported(
                    "mix of register and non-register subroutine arguments",
                    position,
                ));
            }
            save_x |= sub.asm_parameter_registers.iter().any(|p| {
                matches!(p, RegisterOrFlag::Register(register) if register.uses_x())
            });
            if save_x {
                self.emitter.emit(Opcode::Rsavex);
            }
            let registers = &sub.asm_parameter_registers;
            self.lower_register_arguments(args, registers, position)?;
        }

        self.emitter.emit_label_ref(Opcode::Call, name);
        if save_x {
            self.emitter.emit(Opcode::Rrestorex);
        }

        if sub.asm_return_registers.is_empty() {
            return Ok(sub.return_types.clone());
        }
        let mut results = Vec::with_capacity(sub.asm_return_registers.len());
        for returned in sub.asm_return_registers.iter().rev() {
            match returned {
                RegisterOrFlag::Register(register) => {
                    self.push_register(*register);
                    results.push(register.datatype());
                }
                RegisterOrFlag::Flag(_) => {
                    return Err(CompilerError::unsupported(
                        "subroutine result in a status flag",
                        position,
                    ));
                }
            }
        }
        results.reverse();
        Ok(results)
    }

    /// Load register arguments. The carry flag is set last, since loading
    /// registers may disturb it.
    fn lower_register_arguments(
        &mut self,
        args: &[ExprId],
        registers: &[RegisterOrFlag],
        position: &Position,
    ) -> Result<()> {
        let ast = self.ast;
        let mut carry = None;
        for (&arg, register) in args.iter().zip(registers) {
            match *register {
                RegisterOrFlag::Flag(StatusFlag::Pc) => {
                    let value = types::const_value(ast, arg)?
                        .and_then(|lit| lit.as_boolean())
                        .ok_or_else(|| CompilerError::NotConstant {
                            what: "carry flag argument".into(),
                            position: ast.expr_position(arg).clone(),
                        })?;
                    carry = Some(value);
                }
                RegisterOrFlag::Flag(_) => {
                    return Err(CompilerError::unsupported(
                        "only the carry flag can pass an argument",
                        position,
                    ));
                }
                RegisterOrFlag::Register(register) => {
                    self.load_register(arg, register, position)?;
                }
            }
        }
        match carry {
            Some(true) => self.emitter.emit(Opcode::Sec),
            Some(false) => self.emitter.emit(Opcode::Clc),
            None => {}
        }
        Ok(())
    }

    fn load_register(
        &mut self,
        arg: ExprId,
        register: Register,
        position: &Position,
    ) -> Result<()> {
        let Some((low, high)) = register.halves() else {
            self.lower_for_store(arg, DataType::UByte)?;
            self.pop_register(register);
            return Ok(());
        };
        let dt = self.datatype(arg)?;
        match dt {
            dt if dt.is_byte() => {
                self.lower(arg)?;
                self.pop_register(low);
                self.emitter.emit_arg(Opcode::PushByte, Value::UByte(0));
                self.pop_register(high);
            }
            dt if dt.is_word() => {
                self.lower(arg)?;
                self.pop_register(register);
            }
            dt if dt.is_heap_type() => {
                self.push_address(arg)?;
                self.pop_register(register);
            }
            dt => {
                return Err(CompilerError::unsupported(
                    format!("passing a {dt} value in register pair {register}"),
                    position,
                ));
            }
        }
        Ok(())
    }

    // =========================================================================
    // Builtins
    // =========================================================================

    fn lower_builtin(
        &mut self,
        function: &'static BuiltinFunction,
        args: &[ExprId],
        position: &Position,
    ) -> Result<Vec<DataType>> {
        let name = function.name;
        if args.len() != function.params.len() {
            return Err(CompilerError::lowering(
                format!(
                    "invalid number of arguments for {name}: expected {}, got {}",
                    function.params.len(),
                    args.len()
                ),
                position,
            ));
        }
        match name {
            "swap" => {
                self.lower_swap(args[0], args[1], position)?;
                return Ok(Vec::new());
            }
            "len" => return self.lower_len(args[0], position),
            _ => {}
        }

        let mut arg_types = Vec::with_capacity(args.len());
        for (&arg, param) in args.iter().zip(function.params) {
            let dt = self.datatype(arg)?;
            arg_types.push(dt);
            if param.datatypes.contains(&dt) {
                self.lower(arg)?;
                continue;
            }
            let target = param
                .datatypes
                .iter()
                .copied()
                .find(|&to| conversion::widening(dt, to, position).is_ok())
                .ok_or_else(|| {
                    self.invalid_datatype(
                        dt,
                        format!(
                            "argument {} of {name}() does not accept this datatype",
                            param.name
                        ),
                        position,
                    )
                })?;
            self.lower_as(arg, target)?;
        }
        let first = arg_types.first().copied();

        match name {
            "any" | "all" | "min" | "max" | "sum" | "avg" => {
                self.lower_reduction(name, args[0], position)?;
            }
            "abs" => match first {
                Some(DataType::Byte) => self.emitter.emit(Opcode::AbsB),
                Some(DataType::Word) => self.emitter.emit(Opcode::AbsW),
                Some(DataType::Float) => self.emitter.emit(Opcode::AbsF),
                _ => {}
            },
            "msb" => self.emitter.emit(Opcode::Msb),
            "mkword" => self.emitter.emit(Opcode::Mkword),
            "lsl" | "lsr" | "rol" | "ror" | "rol2" | "ror2" => {
                let dt = first.unwrap_or(DataType::UByte);
                let detail = format!("{name}() of this datatype");
                let opcode = in_place_opcode(name, dt)
                    .ok_or_else(|| self.invalid_datatype(dt, detail, position))?;
                self.emitter.emit(opcode);
                let target = self.target_from_expr(args[0])?;
                self.pop_into(&target, position)?;
            }
            "set_carry" => self.emitter.emit(Opcode::Sec),
            "clear_carry" => self.emitter.emit(Opcode::Clc),
            "set_irqd" => self.emitter.emit(Opcode::Sei),
            "clear_irqd" => self.emitter.emit(Opcode::Cli),
            "rsave" => self.emitter.emit(Opcode::Rsave),
            "rrestore" => self.emitter.emit(Opcode::Rrestore),
            _ => {
                let syscall = Syscall::for_function(name).ok_or_else(|| {
                    CompilerError::unsupported(format!("builtin function {name}()"), position)
                })?;
                self.syscall(syscall);
            }
        }
        Ok(function.return_type(&arg_types).into_iter().collect())
    }

    fn syscall(&mut self, syscall: Syscall) {
        self.emitter
            .emit_arg(Opcode::Syscall, Value::UByte(syscall.into()));
    }

    /// `len()` of a string is computed at run time; an array's length is
    /// fixed by its declaration.
    fn lower_len(&mut self, arg: ExprId, position: &Position) -> Result<Vec<DataType>> {
        let dt = self.datatype(arg)?;
        match dt {
            DataType::Str | DataType::StrS => {
                self.push_address(arg)?;
                self.syscall(Syscall::LenStr);
            }
            DataType::StrP | DataType::StrPs => {
                self.push_address(arg)?;
                self.syscall(Syscall::LenStrp);
            }
            dt if dt.is_array() => {
                let (_, decl) = types::target_var(self.ast, arg)?;
                let count = types::element_count(self.ast, decl)?;
                let count = i64::try_from(count).unwrap_or(i64::MAX);
                let count = Value::integer(DataType::UWord, count)?;
                self.push_value(count, position)?;
            }
            dt => {
                let detail = "len() of a value that is not iterable";
                return Err(self.invalid_datatype(dt, detail, position));
            }
        }
        Ok(vec![DataType::UWord])
    }

    /// Reductions over an array whose address is already on the stack.
    fn lower_reduction(&mut self, name: &str, array: ExprId, position: &Position) -> Result<()> {
        let ast = self.ast;
        let (_, decl) = types::target_var(ast, array)?;
        let missing_array = format!("{name}() needs an array");
        let element = decl
            .datatype
            .element_type()
            .ok_or_else(|| self.invalid_datatype(decl.datatype, missing_array, position))?;
        let count = types::element_count(ast, decl)?;
        let count = i64::try_from(count).unwrap_or(i64::MAX);
        let count_value = Value::integer(DataType::UByte, count)?;
        self.push_value(count_value, position)?;

        let reduced = if name == "avg" { "sum" } else { name };
        let unsupported = format!("{name}() of this element type");
        let syscall = Syscall::reduction(reduced, element)
            .ok_or_else(|| self.invalid_datatype(element, unsupported, position))?;
        self.syscall(syscall);
        if name == "avg" {
            let sum_dt = match element {
                DataType::UByte | DataType::UWord => DataType::UWord,
                DataType::Byte | DataType::Word => DataType::Word,
                other => other,
            };
            if let Some(cast) = conversion::cast_opcode(sum_dt, DataType::Float) {
                self.emitter.emit(cast);
            }
            self.push_value(Value::float(count as f64), position)?;
            self.emitter.emit(Opcode::DivF);
        }
        Ok(())
    }

    /// `swap(a, b)`: push both, pop back crosswise.
    fn lower_swap(&mut self, first: ExprId, second: ExprId, position: &Position) -> Result<()> {
        let ast = self.ast;
        let first_dt = self.datatype(first)?;
        let second_dt = self.datatype(second)?;
        if first_dt != second_dt {
            return Err(CompilerError::lowering(
                "swap requires 2 args of identical type",
                position,
            ));
        }
        if types::const_value(ast, first)?.is_some() || types::const_value(ast, second)?.is_some() {
            return Err(CompilerError::lowering(
                "swap requires 2 variables, not constant value(s)",
                position,
            ));
        }
        if ast.expr(first) == ast.expr(second) {
            return Err(CompilerError::lowering("swap should have 2 different args", position));
        }
        if !first_dt.is_numeric() {
            return Err(CompilerError::lowering("cannot swap arrays or strings", position));
        }
        let first_target = self.target_from_expr(first)?;
        let second_target = self.target_from_expr(second)?;
        self.lower(first)?;
        self.lower(second)?;
        self.pop_into(&first_target, position)?;
        self.pop_into(&second_target, position)
    }
}

fn in_place_opcode(name: &str, dt: DataType) -> Option<Opcode> {
    let opcode = match (name, dt) {
        ("lsl", dt) if dt.is_byte() => Opcode::ShlByte,
        ("lsl", dt) if dt.is_word() => Opcode::ShlWord,
        ("lsr", DataType::UByte) => Opcode::ShrUbyte,
        ("lsr", DataType::Byte) => Opcode::ShrSbyte,
        ("lsr", DataType::UWord) => Opcode::ShrUword,
        ("lsr", DataType::Word) => Opcode::ShrSword,
        ("rol", dt) if dt.is_byte() => Opcode::RolByte,
        ("rol", dt) if dt.is_word() => Opcode::RolWord,
        ("ror", dt) if dt.is_byte() => Opcode::RorByte,
        ("ror", dt) if dt.is_word() => Opcode::RorWord,
        ("rol2", dt) if dt.is_byte() => Opcode::Rol2Byte,
        ("rol2", dt) if dt.is_word() => Opcode::Rol2Word,
        ("ror2", dt) if dt.is_byte() => Opcode::Ror2Byte,
        ("ror2", dt) if dt.is_word() => Opcode::Ror2Word,
        _ => return None,
    };
    Some(opcode)
}

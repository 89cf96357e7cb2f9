//! Static datatype queries.
//!
//! Nothing here mutates the tree: later stages ask for the datatype or
//! constant value of an expression whenever they need it. `Ok(None)` from
//! [`resulting_datatype`] means the type is genuinely data dependent;
//! a name that does not resolve is a fatal error because resolution must
//! already have reported it.

use octet_core::{
    CompilerError, DataType, Diagnostics, HeapValue, IMPLICIT_FLOAT_WARNING, Result,
    common_datatype,
};

use crate::ast::{
    AssignTarget, Ast, BinaryOp, Expr, ExprId, FunctionCall, Literal, LiteralValue, NodeRef,
    Stmt, StmtId, VarDecl, VarDeclKind,
};
use crate::builtins::ConstArg;
use crate::fold::{self, Folded};
use crate::scope::{self, Declaration};

// ============================================================================
// Name resolution helpers
// ============================================================================

/// What the identifier expression `id` refers to, if anything.
pub fn declaration_of(ast: &Ast, id: ExprId) -> Result<Option<Declaration>> {
    match ast.expr(id) {
        Expr::Identifier(ident) => scope::lookup(ast, &ident.name, NodeRef::Expr(id)),
        _ => Ok(None),
    }
}

/// Like [`declaration_of`], but an unresolved name is fatal.
pub fn resolve_identifier(ast: &Ast, id: ExprId) -> Result<Declaration> {
    declaration_of(ast, id)?.ok_or_else(|| CompilerError::UndefinedSymbol {
        name: identifier_name(ast, id),
        position: ast.expr_position(id).clone(),
    })
}

/// The variable declaration an identifier refers to.
pub fn target_var(ast: &Ast, id: ExprId) -> Result<(StmtId, &VarDecl)> {
    let decl = resolve_identifier(ast, id)?;
    decl.stmt()
        .and_then(|s| ast.stmt(s).as_var_decl().map(|v| (s, v)))
        .ok_or_else(|| CompilerError::NotADeclaration {
            name: identifier_name(ast, id),
            position: ast.expr_position(id).clone(),
        })
}

pub fn identifier_name(ast: &Ast, id: ExprId) -> String {
    match ast.expr(id) {
        Expr::Identifier(ident) => ident.joined(),
        other => format!("{other:?}"),
    }
}

// ============================================================================
// Datatypes
// ============================================================================

/// The static datatype of an expression.
pub fn resulting_datatype(ast: &Ast, id: ExprId) -> Result<Option<DataType>> {
    match ast.expr(id) {
        Expr::Literal(lit) => Ok(Some(lit.datatype())),
        Expr::Identifier(_) => match resolve_identifier(ast, id)? {
            Declaration::Stmt(s) => match ast.stmt(s) {
                Stmt::VarDecl(decl) => Ok(Some(decl.datatype)),
                _ => Err(CompilerError::NotADeclaration {
                    name: identifier_name(ast, id),
                    position: ast.expr_position(id).clone(),
                }),
            },
            Declaration::Builtin(f) => Err(CompilerError::NotADeclaration {
                name: f.name.to_string(),
                position: ast.expr_position(id).clone(),
            }),
        },
        Expr::Register(register) => Ok(Some(register.datatype())),
        Expr::Prefix { operand, .. } => resulting_datatype(ast, *operand),
        Expr::Binary { left, op, right } => binary_datatype(ast, id, *left, *op, *right),
        Expr::ArrayIndexed { array, .. } => {
            let (_, decl) = target_var(ast, *array)?;
            decl.datatype
                .element_type()
                .map(Some)
                .ok_or_else(|| CompilerError::InvalidDatatype {
                    datatype: decl.datatype,
                    detail: "cannot index a scalar".into(),
                    position: ast.expr_position(id).clone(),
                })
        }
        Expr::FunctionCall(call) => call_datatype(ast, id, call),
        Expr::Range { from, to, .. } => {
            let from = resulting_datatype(ast, *from)?;
            let to = resulting_datatype(ast, *to)?;
            let (Some(from), Some(to)) = (from, to) else {
                return Ok(None);
            };
            Ok(match (from.is_string(), to.is_string()) {
                (true, _) => Some(from),
                (_, true) => Some(to),
                _ => common_datatype(from, to).map(|c| c.datatype),
            })
        }
        Expr::TypeCast { datatype, .. } => Ok(Some(*datatype)),
        Expr::DirectMemoryRead { .. } => Ok(Some(DataType::UByte)),
    }
}

fn binary_datatype(
    ast: &Ast,
    id: ExprId,
    left: ExprId,
    op: BinaryOp,
    right: ExprId,
) -> Result<Option<DataType>> {
    if op.is_comparison() || op.is_logical() {
        return Ok(Some(DataType::UByte));
    }
    let left_dt = resulting_datatype(ast, left)?;
    if op.is_bitwise() || op.is_shift() {
        return Ok(left_dt);
    }
    let (Some(left_dt), Some(right_dt)) = (left_dt, resulting_datatype(ast, right)?) else {
        return Ok(None);
    };
    let incompatible = || CompilerError::InvalidDatatype {
        datatype: left_dt,
        detail: format!("arithmetic operation on incompatible datatypes: {left_dt} and {right_dt}"),
        position: ast.expr_position(id).clone(),
    };
    if !left_dt.is_numeric() || !right_dt.is_numeric() {
        return Err(incompatible());
    }

    match op {
        BinaryOp::FloorDiv => Ok(Some(match left_dt {
            DataType::Float if right_dt.is_integer() => right_dt,
            DataType::Float => DataType::Word,
            integer => integer,
        })),
        BinaryOp::Div => {
            let divisor = const_value(ast, right)?.and_then(|lit| lit.as_f64());
            if let Some(c) = divisor {
                let narrow = (left_dt.is_byte()
                    && (right_dt.is_word() || right_dt == DataType::Float)
                    && c.abs() >= 256.0)
                    || (left_dt.is_word() && right_dt == DataType::Float && c.abs() >= 65536.0);
                if narrow {
                    return Ok(Some(left_dt));
                }
            }
            common_datatype(left_dt, right_dt)
                .map(|c| Some(c.datatype))
                .ok_or_else(incompatible)
        }
        _ => common_datatype(left_dt, right_dt)
            .map(|c| Some(c.datatype))
            .ok_or_else(incompatible),
    }
}

fn call_datatype(ast: &Ast, id: ExprId, call: &FunctionCall) -> Result<Option<DataType>> {
    if let Some(value) = const_value(ast, id)? {
        return Ok(Some(value.datatype()));
    }
    match resolve_identifier(ast, call.target)? {
        Declaration::Builtin(f) => {
            let mut args = Vec::with_capacity(call.args.len());
            for &arg in &call.args {
                match resulting_datatype(ast, arg)? {
                    Some(dt) => args.push(dt),
                    None => return Ok(None),
                }
            }
            Ok(f.return_type(&args))
        }
        Declaration::Stmt(s) => match ast.stmt(s) {
            Stmt::Subroutine(sub) => match sub.return_types.as_slice() {
                [] => Ok(None),
                [single] => Ok(Some(*single)),
                _ => Err(CompilerError::unsupported(
                    "multiple return values in an expression",
                    ast.expr_position(id),
                )),
            },
            _ => Ok(None),
        },
    }
}

/// The datatype an assignment target stores.
pub fn target_datatype(ast: &Ast, target: &AssignTarget) -> Result<Option<DataType>> {
    match target {
        AssignTarget::Register(register) => Ok(Some(register.datatype())),
        AssignTarget::Identifier(id) | AssignTarget::ArrayIndexed(id) => {
            resulting_datatype(ast, *id)
        }
        AssignTarget::Memory(_) => Ok(Some(DataType::UByte)),
    }
}

/// Whether a `for` loop may range over the expression.
pub fn is_iterable(ast: &Ast, id: ExprId) -> Result<bool> {
    Ok(match ast.expr(id) {
        Expr::Range { .. } => true,
        Expr::Literal(lit) => lit.datatype().is_iterable(),
        Expr::Identifier(_) => match declaration_of(ast, id)?.and_then(Declaration::stmt) {
            Some(s) => ast
                .stmt(s)
                .as_var_decl()
                .is_some_and(|d| d.datatype.is_iterable()),
            None => false,
        },
        _ => false,
    })
}

// ============================================================================
// Constant values
// ============================================================================

/// The literal an expression always evaluates to, if it is a compile-time
/// constant.
pub fn const_value(ast: &Ast, id: ExprId) -> Result<Option<Literal>> {
    match ast.expr(id) {
        Expr::Literal(lit) => match lit.value() {
            LiteralValue::Array(elements) => {
                for &element in elements {
                    if const_value(ast, element)?.is_none() {
                        return Ok(None);
                    }
                }
                Ok(Some(lit.clone()))
            }
            _ => Ok(Some(lit.clone())),
        },
        Expr::Identifier(_) => {
            let Some(Declaration::Stmt(s)) = declaration_of(ast, id)? else {
                return Ok(None);
            };
            match ast.stmt(s) {
                Stmt::VarDecl(decl) if decl.kind == VarDeclKind::Const => match decl.value {
                    Some(value) => Ok(const_value(ast, value)?
                        .map(|lit| lit.into_datatype(decl.datatype).unwrap_or(lit))),
                    None => Ok(None),
                },
                _ => Ok(None),
            }
        }
        Expr::Prefix { op, operand } => {
            Ok(const_value(ast, *operand)?.and_then(|lit| fold::fold_prefix(*op, &lit)))
        }
        Expr::Binary { left, op, right } => {
            let (Some(l), Some(r)) = (const_value(ast, *left)?, const_value(ast, *right)?) else {
                return Ok(None);
            };
            Ok(match fold::fold_binary(&l, *op, &r) {
                Folded::Value(lit) => Some(lit),
                Folded::DivisionByZero | Folded::NotFoldable => None,
            })
        }
        Expr::TypeCast {
            expression,
            datatype,
        } => Ok(const_value(ast, *expression)?.and_then(|lit| fold::cast_literal(&lit, *datatype))),
        Expr::FunctionCall(call) => {
            let Some(Declaration::Builtin(f)) = declaration_of(ast, call.target)? else {
                return Ok(None);
            };
            let Some(eval) = f.const_eval else {
                return Ok(None);
            };
            match const_args(ast, f.name, &call.args)? {
                Some(args) => eval(&args, ast.expr_position(id)),
                None => Ok(None),
            }
        }
        Expr::Register(_)
        | Expr::ArrayIndexed { .. }
        | Expr::Range { .. }
        | Expr::DirectMemoryRead { .. } => Ok(None),
    }
}

/// Constant arguments for a builtin's evaluator, or `None` when any
/// argument is not constant.
fn const_args(ast: &Ast, function: &str, args: &[ExprId]) -> Result<Option<Vec<ConstArg>>> {
    let mut out = Vec::with_capacity(args.len());
    for &arg in args {
        let mut value = const_value(ast, arg)?;
        // The length of a variable is fixed even though its contents are not.
        if value.is_none() && function == "len" {
            if let Some(Declaration::Stmt(s)) = declaration_of(ast, arg)? {
                if let Some(Some(init)) = ast.stmt(s).as_var_decl().map(|d| d.value) {
                    value = const_value(ast, init)?;
                }
            }
        }
        match value.map(|lit| const_arg(ast, &lit)).transpose()?.flatten() {
            Some(arg) => out.push(arg),
            None => return Ok(None),
        }
    }
    Ok(Some(out))
}

fn const_arg(ast: &Ast, lit: &Literal) -> Result<Option<ConstArg>> {
    Ok(match lit.value() {
        LiteralValue::Integer(_) | LiteralValue::Float(_) => lit.as_f64().map(|value| {
            ConstArg::Number {
                datatype: lit.datatype(),
                value,
            }
        }),
        LiteralValue::Str(text) => Some(ConstArg::Str(text.clone())),
        LiteralValue::Array(elements) => {
            let mut values = Vec::with_capacity(elements.len());
            for &element in elements {
                match const_value(ast, element)?.and_then(|e| e.as_f64()) {
                    Some(v) => values.push(v),
                    None => return Ok(None),
                }
            }
            Some(ConstArg::Array {
                datatype: lit.datatype(),
                values,
            })
        }
        LiteralValue::Heap(heap_id) => Some(match ast.heap.get(*heap_id)? {
            HeapValue::Str { text, .. } => ConstArg::Str(text.clone()),
            HeapValue::IntArray { datatype, values } => ConstArg::Array {
                datatype: *datatype,
                values: values.iter().map(|v| f64::from(*v)).collect(),
            },
            HeapValue::FloatArray { values } => ConstArg::Array {
                datatype: DataType::ArrayF,
                values: values.iter().map(|v| v.0).collect(),
            },
        }),
    })
}

/// The constant integer value of an expression, or a fatal error naming
/// `what` needed it.
pub fn require_const_integer(ast: &Ast, id: ExprId, what: &str) -> Result<i64> {
    const_value(ast, id)?
        .and_then(|lit| lit.as_integer())
        .ok_or_else(|| CompilerError::NotConstant {
            what: what.to_string(),
            position: ast.expr_position(id).clone(),
        })
}

/// A range expression whose bounds and step are all integer constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstantRange {
    pub first: i64,
    pub last: i64,
    pub step: i64,
}

impl ConstantRange {
    /// Number of values the range produces. A step pointing away from the
    /// end gives an empty range.
    pub fn count(&self) -> u64 {
        let (first, last, step) = (self.first, self.last, self.step);
        if step == 0 || (first <= last && step < 0) || (first > last && step > 0) {
            return 0;
        }
        first.abs_diff(last) / step.unsigned_abs() + 1
    }

    /// The last value actually produced; differs from `last` when the step
    /// overshoots it.
    pub fn final_value(&self) -> Option<i64> {
        let count = i64::try_from(self.count()).ok()?;
        (count > 0).then(|| self.first + (count - 1) * self.step)
    }
}

/// The constant bounds of a range expression. A missing step is 1.
pub fn constant_range(ast: &Ast, id: ExprId) -> Result<Option<ConstantRange>> {
    let Expr::Range { from, to, step } = ast.expr(id) else {
        return Ok(None);
    };
    let integer = |e: ExprId| -> Result<Option<i64>> {
        Ok(const_value(ast, e)?.and_then(|lit| lit.as_integer()))
    };
    let (Some(first), Some(last)) = (integer(*from)?, integer(*to)?) else {
        return Ok(None);
    };
    let step = match step {
        Some(step) => match integer(*step)? {
            Some(step) => step,
            None => return Ok(None),
        },
        None => 1,
    };
    Ok(Some(ConstantRange { first, last, step }))
}

// ============================================================================
// Storage
// ============================================================================

/// Number of elements of an array, string, or matrix declaration.
pub fn element_count(ast: &Ast, decl: &VarDecl) -> Result<usize> {
    if let Some(size) = &decl.array_size {
        let x = require_const_integer(ast, size.x, "arrayspec")?;
        let y = match size.y {
            Some(y) => require_const_integer(ast, y, "arrayspec")?,
            None => 1,
        };
        return usize::try_from(x * y).map_err(|_| CompilerError::InvalidArraySize {
            size: x * y,
            position: ast.expr_position(size.x).clone(),
        });
    }
    let Some(value) = decl.value else {
        return Ok(0);
    };
    match ast.expr(value) {
        Expr::Literal(lit) => match lit.value() {
            LiteralValue::Heap(id) => Ok(ast.heap.get(*id)?.len()),
            LiteralValue::Str(text) => Ok(text.chars().count()),
            LiteralValue::Array(elements) => Ok(elements.len()),
            _ => Ok(0),
        },
        _ => Err(CompilerError::NotConstant {
            what: "arrayspec".into(),
            position: ast.expr_position(value).clone(),
        }),
    }
}

/// Bytes of storage a variable occupies.
pub fn memory_size(ast: &Ast, decl: &VarDecl) -> Result<usize> {
    let dt = decl.datatype;
    if let Some(size) = dt.scalar_size() {
        return Ok(size);
    }
    let count = element_count(ast, decl)?;
    Ok(match dt {
        dt if dt.is_string() => count + 1,
        DataType::ArrayUw | DataType::ArrayW => count * 2,
        DataType::ArrayF => count * 5,
        _ => count,
    })
}

// ============================================================================
// Advisories
// ============================================================================

/// Warns about every arithmetic expression that silently widens an integer
/// operand into a float.
pub fn float_widening_warnings(ast: &Ast, diagnostics: &mut Diagnostics) -> Result<()> {
    for node in ast.reachable_nodes() {
        let NodeRef::Expr(id) = node else { continue };
        let Expr::Binary { left, op, right } = ast.expr(id) else {
            continue;
        };
        if !(op.is_arithmetic() || matches!(op, BinaryOp::Div)) {
            continue;
        }
        let (Some(l), Some(r)) = (resulting_datatype(ast, *left)?, resulting_datatype(ast, *right)?)
        else {
            continue;
        };
        if common_datatype(l, r).is_some_and(|c| c.converted_to_float) {
            diagnostics.warning(IMPLICIT_FLOAT_WARNING, ast.expr_position(id).clone());
        }
    }
    Ok(())
}

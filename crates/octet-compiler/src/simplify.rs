//! Algebraic simplification of binary expressions.
//!
//! Rules assume the constant operand is on the right; `+` and `*` with a
//! constant on the left are first swapped. An operand is only dropped or
//! duplicated when evaluating it has no side effects.

use octet_core::{DataType, Result};

use crate::ast::{
    Ast, BinaryOp, Expr, ExprId, FunctionCall, IdentifierRef, Literal, PrefixOp, Transform,
};
use crate::scope::Declaration;
use crate::types;

/// The expression simplifier. Holds no state; every rewrite reports itself
/// through the walk's changed flag.
#[derive(Debug, Default)]
pub struct Simplifier;

impl Transform for Simplifier {
    fn transform_expr(&mut self, ast: &mut Ast, id: ExprId) -> Result<bool> {
        let Expr::Binary { left, op, right } = *ast.expr(id) else {
            return Ok(false);
        };
        let operands = Operands {
            left,
            right,
            left_val: types::const_value(ast, left)?,
            right_val: types::const_value(ast, right)?,
        };
        if operands.left_val.is_some() && operands.right_val.is_some() {
            return Ok(false);
        }
        if adjust_datatypes(ast, &operands)? {
            return Ok(true);
        }
        if matches!(op, BinaryOp::Add | BinaryOp::Mul) && operands.left_val.is_some() {
            ast.replace_expr(
                id,
                Expr::Binary {
                    left: right,
                    op,
                    right: left,
                },
            );
            return Ok(true);
        }

        let rewrite = match op {
            BinaryOp::Or | BinaryOp::And | BinaryOp::Xor => logical(ast, op, &operands)?,
            BinaryOp::BitOr | BinaryOp::BitXor | BinaryOp::BitAnd => bitwise(ast, op, &operands)?,
            BinaryOp::Add => additive(&operands),
            BinaryOp::Sub => subtractive(&operands),
            BinaryOp::Mul => multiplicative(ast, &operands)?,
            BinaryOp::Div | BinaryOp::FloorDiv => division(ast, id, op, &operands)?,
            BinaryOp::Pow => power(ast, &operands)?,
            _ => None,
        };
        match rewrite {
            Some(rewrite) => {
                apply(ast, id, rewrite);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

struct Operands {
    left: ExprId,
    right: ExprId,
    left_val: Option<Literal>,
    right_val: Option<Literal>,
}

impl Operands {
    fn right_is(&self, number: f64) -> bool {
        self.right_val.as_ref().is_some_and(|v| v.is_number(number))
    }

    fn left_is(&self, number: f64) -> bool {
        self.left_val.as_ref().is_some_and(|v| v.is_number(number))
    }
}

/// What replaces the binary expression.
enum Rewrite {
    /// One of the operands, unchanged.
    Operand(ExprId),
    Literal(Literal),
    Expr(Expr),
}

fn apply(ast: &mut Ast, id: ExprId, rewrite: Rewrite) {
    let kind = match rewrite {
        Rewrite::Operand(operand) => ast.expr(operand).clone(),
        Rewrite::Literal(lit) => Expr::Literal(lit),
        Rewrite::Expr(kind) => kind,
    };
    ast.replace_expr(id, kind);
}

// ============================================================================
// Rules
// ============================================================================

/// Moves a constant operand into the other operand's datatype when the
/// value survives the move.
fn adjust_datatypes(ast: &mut Ast, operands: &Operands) -> Result<bool> {
    let (constant, value, other) = match (&operands.left_val, &operands.right_val) {
        (Some(v), None) => (operands.left, v, operands.right),
        (None, Some(v)) => (operands.right, v, operands.left),
        _ => return Ok(false),
    };
    let Some(target) = types::resulting_datatype(ast, other)? else {
        return Ok(false);
    };
    if target == value.datatype() || !target.is_integer() {
        return Ok(false);
    }
    let Some(adjusted) = value.as_integer().and_then(|v| Literal::integer(target, v)) else {
        return Ok(false);
    };
    ast.replace_expr(constant, Expr::Literal(adjusted));
    Ok(true)
}

fn logical(ast: &Ast, op: BinaryOp, o: &Operands) -> Result<Option<Rewrite>> {
    let left = o.left_val.as_ref().and_then(Literal::as_boolean);
    let right = o.right_val.as_ref().and_then(Literal::as_boolean);
    let (constant, other) = match (left, right) {
        (Some(c), None) => (c, o.right),
        (None, Some(c)) => (c, o.left),
        _ => return Ok(None),
    };
    Ok(match (op, constant) {
        (BinaryOp::Or, true) if is_pure(ast, other)? => {
            Some(Rewrite::Literal(Literal::boolean(true)))
        }
        (BinaryOp::And, false) if is_pure(ast, other)? => {
            Some(Rewrite::Literal(Literal::boolean(false)))
        }
        (BinaryOp::Or | BinaryOp::Xor, false) | (BinaryOp::And, true) => {
            Some(Rewrite::Operand(other))
        }
        (BinaryOp::Xor, true) => Some(Rewrite::Expr(Expr::Prefix {
            op: PrefixOp::Not,
            operand: other,
        })),
        _ => None,
    })
}

fn bitwise(ast: &Ast, op: BinaryOp, o: &Operands) -> Result<Option<Rewrite>> {
    let other = if o.left_is(0.0) {
        o.right
    } else if o.right_is(0.0) {
        o.left
    } else {
        return Ok(None);
    };
    Ok(match op {
        BinaryOp::BitOr | BinaryOp::BitXor => Some(Rewrite::Operand(other)),
        _ if is_pure(ast, other)? => Some(Rewrite::Literal(Literal::boolean(false))),
        _ => None,
    })
}

fn additive(o: &Operands) -> Option<Rewrite> {
    o.right_is(0.0).then_some(Rewrite::Operand(o.left))
}

fn subtractive(o: &Operands) -> Option<Rewrite> {
    if o.right_is(0.0) {
        return Some(Rewrite::Operand(o.left));
    }
    o.left_is(0.0).then(|| {
        Rewrite::Expr(Expr::Prefix {
            op: PrefixOp::Minus,
            operand: o.right,
        })
    })
}

fn multiplicative(ast: &Ast, o: &Operands) -> Result<Option<Rewrite>> {
    let Some(constant) = &o.right_val else {
        return Ok(None);
    };
    Ok(if constant.is_number(1.0) {
        Some(Rewrite::Operand(o.left))
    } else if constant.is_number(-1.0) {
        Some(Rewrite::Expr(Expr::Prefix {
            op: PrefixOp::Minus,
            operand: o.left,
        }))
    } else if constant.is_number(0.0) && is_pure(ast, o.left)? {
        Literal::numeric(constant.datatype(), 0.0).map(Rewrite::Literal)
    } else {
        None
    })
}

fn division(ast: &mut Ast, id: ExprId, op: BinaryOp, o: &Operands) -> Result<Option<Rewrite>> {
    if o.left_is(0.0) && is_pure(ast, o.right)? {
        return Ok(o.left_val.clone().map(Rewrite::Literal));
    }
    let Some(divisor) = o.right_val.as_ref().and_then(Literal::as_f64) else {
        return Ok(None);
    };
    let left_dt = types::resulting_datatype(ast, o.left)?;

    if divisor == 1.0 || divisor == -1.0 {
        let rounds = op == BinaryOp::FloorDiv && left_dt == Some(DataType::Float);
        let mut operand = o.left;
        if rounds {
            // x // 1 is floor(x), x // -1 is -ceil(x), both in the result type
            let Some(result_dt) = types::resulting_datatype(ast, id)? else {
                return Ok(None);
            };
            let rounding = if divisor == 1.0 { "floor" } else { "ceil" };
            let call = builtin_call(ast, rounding, o.left);
            let cast = Expr::TypeCast {
                expression: call,
                datatype: result_dt,
            };
            if divisor == 1.0 {
                return Ok(Some(Rewrite::Expr(cast)));
            }
            operand = ast.add_expr(cast, ast.expr_position(id).clone());
        }
        return Ok(Some(if divisor == 1.0 {
            Rewrite::Operand(operand)
        } else {
            Rewrite::Expr(Expr::Prefix {
                op: PrefixOp::Minus,
                operand,
            })
        }));
    }

    let beyond = match left_dt {
        Some(DataType::UByte) => divisor.abs() >= 256.0,
        Some(DataType::UWord) => divisor.abs() >= 65536.0,
        _ => false,
    };
    if beyond && is_pure(ast, o.left)? {
        return Ok(left_dt
            .and_then(|dt| Literal::integer(dt, 0))
            .map(Rewrite::Literal));
    }
    Ok(None)
}

fn power(ast: &mut Ast, o: &Operands) -> Result<Option<Rewrite>> {
    if o.left_is(1.0) && is_pure(ast, o.right)? {
        return Ok(o.left_val.clone().map(Rewrite::Literal));
    }
    let Some(exponent) = o.right_val.as_ref().and_then(Literal::as_f64) else {
        return Ok(None);
    };
    let position = ast.expr_position(o.left).clone();
    let pure = is_pure(ast, o.left)?;

    if exponent == 1.0 {
        return Ok(Some(Rewrite::Operand(o.left)));
    }
    if exponent == 0.0 {
        return Ok(if pure {
            Literal::optimal_integer(1).map(Rewrite::Literal)
        } else {
            None
        });
    }
    if exponent == 0.5 {
        let mut argument = o.left;
        if types::resulting_datatype(ast, o.left)? != Some(DataType::Float) {
            argument = ast.add_expr(
                Expr::TypeCast {
                    expression: o.left,
                    datatype: DataType::Float,
                },
                position,
            );
        }
        let call = builtin_call(ast, "sqrt", argument);
        return Ok(Some(Rewrite::Expr(ast.expr(call).clone())));
    }

    let factors = match exponent {
        e if e == -1.0 => 1,
        e if (e == 2.0 || e == 3.0 || e == -2.0 || e == -3.0) && pure => e.abs() as usize,
        _ => return Ok(None),
    };
    let mut product = o.left;
    for _ in 1..factors {
        let factor = ast.clone_expr(o.left);
        product = ast.add_expr(
            Expr::Binary {
                left: factor,
                op: BinaryOp::Mul,
                right: product,
            },
            position.clone(),
        );
    }
    if exponent > 0.0 {
        return Ok(Some(Rewrite::Expr(ast.expr(product).clone())));
    }
    let one = ast.add_expr(Expr::Literal(Literal::float(1.0)), position);
    Ok(Some(Rewrite::Expr(Expr::Binary {
        left: one,
        op: BinaryOp::Div,
        right: product,
    })))
}

fn builtin_call(ast: &mut Ast, name: &str, argument: ExprId) -> ExprId {
    let position = ast.expr_position(argument).clone();
    let target = ast.add_expr(Expr::Identifier(IdentifierRef::new(name)), position.clone());
    ast.add_expr(
        Expr::FunctionCall(FunctionCall {
            target,
            args: vec![argument],
        }),
        position,
    )
}

/// Whether evaluating the expression can have no effect besides its value.
pub fn is_pure(ast: &Ast, id: ExprId) -> Result<bool> {
    match ast.expr(id) {
        Expr::FunctionCall(call) => {
            let pure_target = matches!(
                types::declaration_of(ast, call.target)?,
                Some(Declaration::Builtin(f)) if f.pure
            );
            if !pure_target {
                return Ok(false);
            }
        }
        Expr::DirectMemoryRead { .. } => return Ok(false),
        _ => {}
    }
    for child in ast.expr(id).children() {
        if !is_pure(ast, child)? {
            return Ok(false);
        }
    }
    Ok(true)
}

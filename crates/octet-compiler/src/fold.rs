//! Constant folding.
//!
//! [`fold_prefix`], [`fold_binary`] and [`cast_literal`] evaluate operators
//! on literal operands; [`ConstantFolder`] applies them across the tree and
//! substitutes the values of named constants.

use octet_core::{DataType, Diagnostics, Result};
use rustc_hash::FxHashSet;

use crate::ast::{
    AssignTarget, Ast, BinaryOp, Expr, ExprId, JumpTarget, Literal, LiteralValue, Parent,
    PrefixOp, Stmt, StmtId, Transform, VarDeclKind,
};
use crate::scope::Declaration;
use crate::types;

/// Outcome of evaluating a binary operator on two literals.
#[derive(Debug, Clone, PartialEq)]
pub enum Folded {
    Value(Literal),
    DivisionByZero,
    /// The operator does not apply to these operands, or the result does
    /// not fit any datatype.
    NotFoldable,
}

// ============================================================================
// Evaluation
// ============================================================================

pub fn fold_prefix(op: PrefixOp, operand: &Literal) -> Option<Literal> {
    let dt = operand.datatype();
    match (op, operand.value()) {
        (PrefixOp::Plus, _) if operand.is_numeric() => Some(operand.clone()),
        (PrefixOp::Minus, LiteralValue::Integer(v)) => Literal::optimal_integer(-v),
        (PrefixOp::Minus, LiteralValue::Float(v)) => Some(Literal::float(-v.0)),
        (PrefixOp::Invert, LiteralValue::Integer(v)) => match dt {
            DataType::UByte => Literal::integer(dt, !v & 0xff),
            DataType::UWord => Literal::integer(dt, !v & 0xffff),
            _ => Literal::integer(dt, !v),
        },
        (PrefixOp::Not, _) if operand.is_numeric() => {
            operand.as_boolean().map(|b| Literal::boolean(!b))
        }
        _ => None,
    }
}

pub fn fold_binary(left: &Literal, op: BinaryOp, right: &Literal) -> Folded {
    if let (LiteralValue::Str(l), LiteralValue::Str(r)) = (left.value(), right.value()) {
        return match op {
            BinaryOp::Equal => Folded::Value(Literal::boolean(l == r)),
            BinaryOp::NotEqual => Folded::Value(Literal::boolean(l != r)),
            _ => Folded::NotFoldable,
        };
    }
    let (Some(l), Some(r)) = (left.as_f64(), right.as_f64()) else {
        return Folded::NotFoldable;
    };
    if op.is_comparison() {
        let result = match op {
            BinaryOp::Less => l < r,
            BinaryOp::Greater => l > r,
            BinaryOp::LessEq => l <= r,
            BinaryOp::GreaterEq => l >= r,
            BinaryOp::Equal => l == r,
            _ => l != r,
        };
        return Folded::Value(Literal::boolean(result));
    }
    if op.is_logical() {
        let (l, r) = (l != 0.0, r != 0.0);
        let result = match op {
            BinaryOp::And => l && r,
            BinaryOp::Or => l || r,
            _ => l != r,
        };
        return Folded::Value(Literal::boolean(result));
    }

    match (left.as_integer(), right.as_integer()) {
        (Some(l), Some(r)) => fold_integers(l, op, r),
        _ => fold_floats(l, op, r),
    }
}

fn fold_integers(l: i64, op: BinaryOp, r: i64) -> Folded {
    let result = match op {
        BinaryOp::Add => l.checked_add(r),
        BinaryOp::Sub => l.checked_sub(r),
        BinaryOp::Mul => l.checked_mul(r),
        BinaryOp::Div | BinaryOp::FloorDiv | BinaryOp::Rem if r == 0 => {
            return Folded::DivisionByZero;
        }
        BinaryOp::Div => l.checked_div(r),
        BinaryOp::FloorDiv => Some(l.div_euclid(r) - i64::from(r < 0 && l.rem_euclid(r) != 0)),
        BinaryOp::Rem => l.checked_rem(r),
        BinaryOp::Pow => {
            return match u32::try_from(r) {
                Ok(exponent) => l
                    .checked_pow(exponent)
                    .and_then(Literal::optimal_integer)
                    .map_or(Folded::NotFoldable, Folded::Value),
                Err(_) => Folded::Value(Literal::optimal_numeric((l as f64).powf(r as f64))),
            };
        }
        BinaryOp::BitAnd => Some(l & r),
        BinaryOp::BitOr => Some(l | r),
        BinaryOp::BitXor => Some(l ^ r),
        BinaryOp::Shl => u32::try_from(r).ok().and_then(|r| l.checked_shl(r)),
        BinaryOp::Shr => u32::try_from(r).ok().and_then(|r| l.checked_shr(r)),
        _ => None,
    };
    result
        .and_then(Literal::optimal_integer)
        .map_or(Folded::NotFoldable, Folded::Value)
}

fn fold_floats(l: f64, op: BinaryOp, r: f64) -> Folded {
    let result = match op {
        BinaryOp::Add => l + r,
        BinaryOp::Sub => l - r,
        BinaryOp::Mul => l * r,
        BinaryOp::Div | BinaryOp::FloorDiv | BinaryOp::Rem if r == 0.0 => {
            return Folded::DivisionByZero;
        }
        BinaryOp::Div => l / r,
        BinaryOp::FloorDiv => (l / r).floor(),
        BinaryOp::Rem => l % r,
        BinaryOp::Pow => l.powf(r),
        _ => return Folded::NotFoldable,
    };
    if result.is_finite() {
        Folded::Value(Literal::optimal_numeric(result))
    } else {
        Folded::NotFoldable
    }
}

/// An explicit cast of a literal, when the value survives it.
pub fn cast_literal(value: &Literal, target: DataType) -> Option<Literal> {
    match value.value() {
        LiteralValue::Integer(v) if target == DataType::Float => Some(Literal::float(*v as f64)),
        LiteralValue::Integer(v) => Literal::integer(target, *v),
        LiteralValue::Float(v) if target == DataType::Float => Some(Literal::float(v.0)),
        LiteralValue::Float(v) if target.is_integer() => {
            Literal::integer(target, v.0.trunc() as i64)
        }
        _ => value.into_datatype(target),
    }
}

// ============================================================================
// Tree pass
// ============================================================================

/// Replaces constant expressions with literals.
///
/// Keeps its diagnostics across repeated runs so a problem is reported once
/// even though the optimizer revisits the same node many times.
#[derive(Debug, Default)]
pub struct ConstantFolder {
    diagnostics: Diagnostics,
    reported: FxHashSet<ExprId>,
}

impl ConstantFolder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take_diagnostics(&mut self) -> Diagnostics {
        std::mem::take(&mut self.diagnostics)
    }

    fn report(&mut self, ast: &Ast, id: ExprId, message: String) {
        if self.reported.insert(id) {
            let position = ast.expr_position(id).clone();
            self.diagnostics.error(message, position);
        }
    }

    fn fold_expr(&mut self, ast: &Ast, id: ExprId) -> Result<Option<Literal>> {
        Ok(match ast.expr(id) {
            Expr::Identifier(_) if is_value_position(ast, id) => constant_of(ast, id)?,
            Expr::Prefix { op, operand } => ast
                .expr(*operand)
                .as_literal()
                .and_then(|lit| fold_prefix(*op, lit)),
            Expr::Binary { left, op, right } => {
                let left = ast.expr(*left).as_literal();
                let right = ast.expr(*right).as_literal();
                let (Some(l), Some(r)) = (left, right) else {
                    return Ok(None);
                };
                match fold_binary(l, *op, r) {
                    Folded::Value(lit) => Some(lit),
                    Folded::DivisionByZero => {
                        self.report(ast, id, "division by zero".into());
                        None
                    }
                    Folded::NotFoldable => None,
                }
            }
            Expr::TypeCast {
                expression,
                datatype,
            } => ast
                .expr(*expression)
                .as_literal()
                .and_then(|lit| cast_literal(lit, *datatype)),
            Expr::FunctionCall(_) => types::const_value(ast, id)?,
            _ => None,
        })
    }

    /// Brings a declaration's literal initializer to the declared datatype.
    fn fold_initializer(&mut self, ast: &mut Ast, stmt: StmtId) -> bool {
        let Stmt::VarDecl(decl) = ast.stmt(stmt) else {
            return false;
        };
        if decl.kind == VarDeclKind::Memory || !decl.datatype.is_numeric() {
            return false;
        }
        let Some(value) = decl.value else {
            return false;
        };
        let Some(lit) = ast.expr(value).as_literal() else {
            return false;
        };
        if lit.datatype() == decl.datatype || !lit.is_numeric() {
            return false;
        }
        match lit.into_datatype(decl.datatype) {
            Some(converted) => {
                ast.replace_expr(value, Expr::Literal(converted));
                true
            }
            None => {
                let message = format!(
                    "initial value {} out of range for {} '{}'",
                    lit.as_f64().unwrap_or_default(),
                    decl.datatype,
                    decl.name
                );
                self.report(ast, value, message);
                false
            }
        }
    }
}

impl Transform for ConstantFolder {
    fn transform_stmt(&mut self, ast: &mut Ast, id: StmtId) -> Result<bool> {
        Ok(self.fold_initializer(ast, id))
    }

    fn transform_expr(&mut self, ast: &mut Ast, id: ExprId) -> Result<bool> {
        let Some(lit) = self.fold_expr(ast, id)? else {
            return Ok(false);
        };
        if ast.expr(id).as_literal() == Some(&lit) {
            return Ok(false);
        }
        ast.replace_expr(id, Expr::Literal(lit));
        Ok(true)
    }
}

/// The value of a numeric named constant.
fn constant_of(ast: &Ast, id: ExprId) -> Result<Option<Literal>> {
    let Some(Declaration::Stmt(s)) = types::declaration_of(ast, id)? else {
        return Ok(None);
    };
    match ast.stmt(s) {
        Stmt::VarDecl(decl) if decl.kind == VarDeclKind::Const && decl.datatype.is_numeric() => {
            types::const_value(ast, id)
        }
        _ => Ok(None),
    }
}

/// Whether the identifier `id` is read for its value, as opposed to naming
/// a callee, an indexed array, a jump target, or a store.
fn is_value_position(ast: &Ast, id: ExprId) -> bool {
    match ast.parent(crate::ast::NodeRef::Expr(id)) {
        Parent::Expr(owner) => match ast.expr(owner) {
            Expr::FunctionCall(call) => call.target != id,
            Expr::ArrayIndexed { array, .. } => *array != id,
            _ => true,
        },
        Parent::Stmt(owner) => match ast.stmt(owner) {
            Stmt::FunctionCall(call) => call.target != id,
            Stmt::Jump(JumpTarget::Identifier(target)) => *target != id,
            Stmt::For(fl) => fl.loop_var != Some(id),
            Stmt::Assignment(assign) => !assign
                .targets
                .iter()
                .any(|t| matches!(t, AssignTarget::Identifier(t) if *t == id)),
            Stmt::PostIncrDecr { target, .. } => {
                !matches!(target, AssignTarget::Identifier(t) if *t == id)
            }
            _ => true,
        },
        Parent::Module(_) | Parent::Detached => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{AstBuilder, walk_tree};

    fn int(v: i64) -> Literal {
        Literal::optimal_integer(v).unwrap()
    }

    fn fold(left: Literal, op: BinaryOp, right: Literal) -> Folded {
        fold_binary(&left, op, &right)
    }

    fn value(v: i64) -> Folded {
        Folded::Value(int(v))
    }

    fn truth(v: bool) -> Folded {
        Folded::Value(Literal::boolean(v))
    }

    #[test]
    fn integer_arithmetic_picks_the_narrowest_type() {
        assert_eq!(fold(int(5), BinaryOp::Mul, int(2)), value(10));
        assert_eq!(fold(int(200), BinaryOp::Add, int(100)), value(300));
        assert_eq!(fold(int(1), BinaryOp::Sub, int(3)), value(-2));
        assert_eq!(fold(int(60000), BinaryOp::Mul, int(2)), Folded::NotFoldable);
    }

    #[test]
    fn division_flavours() {
        assert_eq!(fold(int(7), BinaryOp::Div, int(2)), value(3));
        assert_eq!(fold(int(-7), BinaryOp::FloorDiv, int(2)), value(-4));
        assert_eq!(fold(int(7), BinaryOp::Rem, int(3)), value(1));
        let half = fold(Literal::float(7.0), BinaryOp::Div, int(2));
        assert_eq!(half, Folded::Value(Literal::float(3.5)));
        assert_eq!(fold(int(1), BinaryOp::Div, int(0)), Folded::DivisionByZero);
        let zero = Literal::float(0.0);
        assert_eq!(
            fold(Literal::float(1.0), BinaryOp::Rem, zero),
            Folded::DivisionByZero
        );
    }

    #[test]
    fn comparisons_and_logic_give_booleans() {
        assert_eq!(fold(int(1), BinaryOp::Less, int(2)), truth(true));
        assert_eq!(fold(int(0), BinaryOp::Or, int(0)), truth(false));
        let a = Literal::str("a");
        assert_eq!(fold(a.clone(), BinaryOp::Equal, a.clone()), truth(true));
        assert_eq!(fold(a, BinaryOp::Add, int(1)), Folded::NotFoldable);
    }

    #[test]
    fn bit_operations() {
        assert_eq!(fold(int(1), BinaryOp::Shl, int(8)), value(256));
        assert_eq!(fold(int(0xf0), BinaryOp::BitAnd, int(0x3c)), value(0x30));
        assert_eq!(fold_prefix(PrefixOp::Invert, &int(0)), Some(int(255)));
        let word_zero = Literal::integer(DataType::UWord, 0).unwrap();
        assert_eq!(
            fold_prefix(PrefixOp::Invert, &word_zero),
            Literal::integer(DataType::UWord, 0xffff)
        );
        assert_eq!(fold_prefix(PrefixOp::Minus, &int(5)), Some(int(-5)));
        let not_five = fold_prefix(PrefixOp::Not, &int(5));
        assert_eq!(not_five, Some(Literal::boolean(false)));
    }

    #[test]
    fn casts_keep_representable_values() {
        let float = Literal::float(3.9);
        assert_eq!(cast_literal(&float, DataType::UByte), Some(int(3)));
        assert_eq!(cast_literal(&int(300), DataType::UByte), None);
        let three = cast_literal(&int(3), DataType::Float);
        assert_eq!(three, Some(Literal::float(3.0)));
    }

    #[test]
    fn folder_substitutes_constants_and_reports_once() {
        let mut b = AstBuilder::new("fold.oct");
        let two = b.int(2);
        let limit = b.constant(DataType::UByte, "LIMIT", two);
        let y = b.var(DataType::UWord, "y", None);
        let l = b.ident("LIMIT");
        let five = b.int(5);
        let product = b.binary(l, BinaryOp::Mul, five);
        let target = b.target_var("y");
        let assign = b.assign(target, product);
        let one = b.int(1);
        let zero = b.int(0);
        let bad = b.binary(one, BinaryOp::Div, zero);
        let target = b.target_var("y");
        let divide = b.assign(target, bad);
        let main = b.block("main", vec![limit, y, assign, divide]);
        let mut ast = b.module("prog", vec![main]);

        let mut folder = ConstantFolder::new();
        assert!(walk_tree(&mut folder, &mut ast).unwrap());
        assert_eq!(ast.expr(product).as_literal(), Some(&int(10)));
        walk_tree(&mut folder, &mut ast).unwrap();
        let diagnostics = folder.take_diagnostics();
        assert_eq!(diagnostics.error_count(), 1);
        assert!(ast.expr(bad).as_literal().is_none());
    }

    #[test]
    fn initializers_take_the_declared_type() {
        let mut b = AstBuilder::new("fold.oct");
        let five = b.int(5);
        let w = b.var(DataType::UWord, "w", Some(five));
        let big = b.int(300);
        let small = b.var(DataType::UByte, "small", Some(big));
        let main = b.block("main", vec![w, small]);
        let mut ast = b.module("prog", vec![main]);

        let mut folder = ConstantFolder::new();
        walk_tree(&mut folder, &mut ast).unwrap();
        assert_eq!(
            ast.expr(five).as_literal(),
            Literal::integer(DataType::UWord, 5).as_ref()
        );
        assert_eq!(folder.take_diagnostics().error_count(), 1);
    }
}

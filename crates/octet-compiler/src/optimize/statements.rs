//! Removes and simplifies statements with no observable effect.

use octet_core::{Diagnostics, Result};
use rustc_hash::FxHashSet;
use tracing::debug;

use crate::ast::{
    AssignTarget, Assignment, Ast, BinaryOp, Expr, ExprId, FunctionCall, IdentifierRef, IncrDecr,
    JumpTarget, Label, Literal, NodeRef, ScopeId, Stmt, StmtId, Transform,
};
use crate::scope::Declaration;
use crate::types;

pub const DISCARDED_RESULT_WARNING: &str =
    "statement has no effect (function return value is discarded)";
pub const ALWAYS_TRUE_WARNING: &str = "condition is always true";
pub const ALWAYS_FALSE_WARNING: &str = "condition is always false";

/// Prefix of the labels synthesized for endless loops.
pub const BACK_LABEL_PREFIX: &str = "_octet_back_";

/// Self-assignments adding or subtracting up to this much become
/// increments or decrements.
const MAX_INCREMENTS: f64 = 8.0;

/// The statement optimizer.
///
/// Keeps its diagnostics across repeated runs, like the constant folder,
/// so a warning about a statement it leaves in place is given once.
#[derive(Debug, Default)]
pub struct StatementOptimizer {
    diagnostics: Diagnostics,
    reported: FxHashSet<StmtId>,
}

impl StatementOptimizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take_diagnostics(&mut self) -> Diagnostics {
        std::mem::take(&mut self.diagnostics)
    }

    fn warn(&mut self, ast: &Ast, id: StmtId, message: &str) {
        if self.reported.insert(id) {
            debug!(message, position = %ast.stmt_position(id), "optimizer warning");
            let position = ast.stmt_position(id).clone();
            self.diagnostics.warning(message, position);
        }
    }

    /// Splices statement lists and drops no-ops in every module's top-level
    /// statements. Scopes below are handled as the walk passes them.
    pub fn clean_modules(&mut self, ast: &mut Ast) -> bool {
        let mut changed = false;
        for module in ast.module_ids() {
            if let Some(cleaned) = cleaned_list(ast, &ast.module(module).statements) {
                ast.module_mut(module).statements = cleaned;
                changed = true;
            }
        }
        changed
    }

    // ========================================================================
    // Calls and jumps
    // ========================================================================

    fn call_statement(&mut self, ast: &mut Ast, id: StmtId, call: &FunctionCall) -> Result<bool> {
        if let Some(Declaration::Builtin(function)) = types::declaration_of(ast, call.target)? {
            if function.pure {
                self.warn(ast, id, DISCARDED_RESULT_WARNING);
                ast.replace_stmt(id, Stmt::Nop);
                return Ok(true);
            }
            return Ok(false);
        }
        redirect_call(ast, NodeRef::Stmt(id), call)
    }

    fn jump(&mut self, ast: &mut Ast, id: StmtId, target: &JumpTarget) -> Result<bool> {
        let JumpTarget::Identifier(target) = target else {
            return Ok(false);
        };
        let Some(Declaration::Stmt(current)) = types::declaration_of(ast, *target)? else {
            return Ok(false);
        };
        let replacement = match final_destination(ast, current)? {
            Some(Destination::Address(address)) => JumpTarget::Address(address),
            Some(Destination::Decl(decl)) if decl != current => {
                let Some(name) = qualified_reference(ast, NodeRef::Stmt(id), decl)? else {
                    return Ok(false);
                };
                let ident = ast.add_expr(
                    Expr::Identifier(name),
                    ast.expr_position(*target).clone(),
                );
                JumpTarget::Identifier(ident)
            }
            _ => return Ok(false),
        };
        ast.replace_stmt(id, Stmt::Jump(replacement));
        Ok(true)
    }

    // ========================================================================
    // Constant conditions
    // ========================================================================

    fn if_statement(
        &mut self,
        ast: &mut Ast,
        id: StmtId,
        condition: ExprId,
        true_part: StmtId,
        else_part: StmtId,
    ) -> Result<bool> {
        let Some(taken) = constant_condition(ast, condition)? else {
            return Ok(false);
        };
        let (message, part) = if taken {
            (ALWAYS_TRUE_WARNING, true_part)
        } else {
            (ALWAYS_FALSE_WARNING, else_part)
        };
        self.warn(ast, id, message);
        ast.replace_stmt(id, ast.stmt(part).clone());
        Ok(true)
    }

    fn while_loop(
        &mut self,
        ast: &mut Ast,
        id: StmtId,
        condition: ExprId,
        body: StmtId,
    ) -> Result<bool> {
        let Some(enters) = constant_condition(ast, condition)? else {
            return Ok(false);
        };
        if !enters {
            self.warn(ast, id, ALWAYS_FALSE_WARNING);
            ast.replace_stmt(id, Stmt::Nop);
            return Ok(true);
        }
        self.warn(ast, id, ALWAYS_TRUE_WARNING);
        if exits_loop(ast, body) {
            return Ok(false);
        }
        endless_loop(ast, id, body, condition)?;
        Ok(true)
    }

    fn repeat_loop(
        &mut self,
        ast: &mut Ast,
        id: StmtId,
        body: StmtId,
        until: ExprId,
    ) -> Result<bool> {
        let Some(done) = constant_condition(ast, until)? else {
            return Ok(false);
        };
        self.warn(
            ast,
            id,
            if done {
                ALWAYS_TRUE_WARNING
            } else {
                ALWAYS_FALSE_WARNING
            },
        );
        if exits_loop(ast, body) {
            return Ok(false);
        }
        if done {
            ast.replace_stmt(id, ast.stmt(body).clone());
        } else {
            endless_loop(ast, id, body, until)?;
        }
        Ok(true)
    }

    /// A loop over a constant range of at most one value needs no loop.
    fn for_loop(&mut self, ast: &mut Ast, id: StmtId) -> Result<bool> {
        let Stmt::For(for_loop) = ast.stmt(id).clone() else {
            return Ok(false);
        };
        let Some(range) = types::constant_range(ast, for_loop.iterable)? else {
            return Ok(false);
        };
        match range.count() {
            0 => {
                self.warn(ast, id, "for loop over an empty range is never executed");
                ast.replace_stmt(id, Stmt::Nop);
                Ok(true)
            }
            1 => {
                let position = ast.stmt_position(id).clone();
                let (target, target_dt) = match (for_loop.loop_register, for_loop.loop_var) {
                    (Some(register), _) => {
                        (AssignTarget::Register(register), Some(register.datatype()))
                    }
                    (None, Some(var)) => {
                        let datatype = types::resulting_datatype(ast, var)?;
                        (AssignTarget::Identifier(ast.clone_expr(var)), datatype)
                    }
                    (None, None) => return Ok(false),
                };
                let Some(first) = Literal::optimal_integer(range.first) else {
                    return Ok(false);
                };
                let value = target_dt
                    .and_then(|dt| first.into_datatype(dt))
                    .unwrap_or(first);
                let value = ast.add_expr(Expr::Literal(value), position.clone());
                let assignment = ast.add_stmt(
                    Stmt::Assignment(Assignment {
                        targets: vec![target],
                        aug_op: None,
                        value,
                    }),
                    position,
                );
                let scope = ScopeId::Stmt(for_loop.body);
                ast.insert_statements(scope, 0, &[assignment])?;
                ast.replace_stmt(id, ast.stmt(for_loop.body).clone());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    // ========================================================================
    // Self-assignments
    // ========================================================================

    fn assignment(&mut self, ast: &mut Ast, id: StmtId, assignment: &Assignment) -> Result<bool> {
        if assignment.aug_op.is_some() {
            return Ok(false);
        }
        let [target] = assignment.targets.as_slice() else {
            return Ok(false);
        };
        if same_location(ast, target, assignment.value) {
            ast.replace_stmt(id, Stmt::Nop);
            return Ok(true);
        }

        let Expr::Binary { left, op, right } = *ast.expr(assignment.value) else {
            return Ok(false);
        };
        if !same_location(ast, target, left) {
            return Ok(false);
        }
        let Some(amount) = types::const_value(ast, right)?.and_then(|lit| lit.as_f64()) else {
            return Ok(false);
        };
        let target_dt = types::target_datatype(ast, target)?;
        let integral = target_dt.is_some_and(|dt| dt.is_integer());
        let whole = amount.fract() == 0.0;
        let position = ast.stmt_position(id).clone();

        let neutral = match op {
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::BitOr | BinaryOp::BitXor => amount == 0.0,
            BinaryOp::Shl | BinaryOp::Shr => amount == 0.0,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Pow => amount == 1.0,
            // floor division by one only changes floats
            BinaryOp::FloorDiv => integral && amount == 1.0,
            _ => false,
        };
        if neutral {
            ast.replace_stmt(id, Stmt::Nop);
            return Ok(true);
        }

        match op {
            BinaryOp::Add | BinaryOp::Sub
                if integral && whole && (1.0..=MAX_INCREMENTS).contains(&amount) =>
            {
                let step = if op == BinaryOp::Add {
                    IncrDecr::Incr
                } else {
                    IncrDecr::Decr
                };
                let mut steps = Vec::new();
                for _ in 0..amount as usize {
                    let target = clone_target(ast, target);
                    let stmt = Stmt::PostIncrDecr { target, op: step };
                    steps.push(ast.add_stmt(stmt, position.clone()));
                }
                ast.replace_stmt(id, Stmt::StatementList(steps));
                Ok(true)
            }
            // x %= 1 clears an integer instead of leaving it alone
            BinaryOp::Rem if integral && amount == 1.0 => {
                let Some(zero) = target_dt.and_then(|dt| Literal::integer(dt, 0)) else {
                    return Ok(false);
                };
                ast.replace_expr(assignment.value, Expr::Literal(zero));
                Ok(true)
            }
            BinaryOp::Shl | BinaryOp::Shr if integral && whole && amount > 0.0 => {
                let limit = if target_dt.is_some_and(|dt| dt.is_byte()) {
                    7.0
                } else {
                    15.0
                };
                if amount > limit {
                    let Some(zero) = target_dt.and_then(|dt| Literal::integer(dt, 0)) else {
                        return Ok(false);
                    };
                    ast.replace_expr(assignment.value, Expr::Literal(zero));
                    return Ok(true);
                }
                let function = if op == BinaryOp::Shl { "lsl" } else { "lsr" };
                let mut shifts = Vec::new();
                for _ in 0..amount as usize {
                    let operand = target_expr(ast, target, &position);
                    let callee = ast.add_expr(
                        Expr::Identifier(IdentifierRef::new(function)),
                        position.clone(),
                    );
                    shifts.push(ast.add_stmt(
                        Stmt::FunctionCall(FunctionCall {
                            target: callee,
                            args: vec![operand],
                        }),
                        position.clone(),
                    ));
                }
                ast.replace_stmt(id, Stmt::StatementList(shifts));
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

impl Transform for StatementOptimizer {
    fn transform_stmt(&mut self, ast: &mut Ast, id: StmtId) -> Result<bool> {
        match ast.stmt(id).clone() {
            Stmt::FunctionCall(call) => self.call_statement(ast, id, &call),
            Stmt::Jump(target) => self.jump(ast, id, &target),
            Stmt::If {
                condition,
                true_part,
                else_part,
            } => self.if_statement(ast, id, condition, true_part, else_part),
            Stmt::While { condition, body } => self.while_loop(ast, id, condition, body),
            Stmt::Repeat { body, until } => self.repeat_loop(ast, id, body, until),
            Stmt::For(_) => self.for_loop(ast, id),
            Stmt::Assignment(assignment) => self.assignment(ast, id, &assignment),
            kind => {
                let Some(cleaned) = kind.statements().and_then(|list| cleaned_list(ast, list))
                else {
                    return Ok(false);
                };
                let mut kind = kind;
                if let Some(statements) = kind.statements_mut() {
                    *statements = cleaned;
                }
                ast.replace_stmt(id, kind);
                Ok(true)
            }
        }
    }

    fn transform_expr(&mut self, ast: &mut Ast, id: ExprId) -> Result<bool> {
        let Expr::FunctionCall(call) = ast.expr(id).clone() else {
            return Ok(false);
        };
        redirect_call(ast, NodeRef::Expr(id), &call)
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// The statement list with nested statement lists spliced in and no-ops
/// removed, or `None` if there was nothing to clean.
fn cleaned_list(ast: &Ast, list: &[StmtId]) -> Option<Vec<StmtId>> {
    let needs_cleaning = list
        .iter()
        .any(|&s| matches!(ast.stmt(s), Stmt::Nop | Stmt::StatementList(_)));
    if !needs_cleaning {
        return None;
    }
    let mut cleaned = Vec::with_capacity(list.len());
    for &stmt in list {
        match ast.stmt(stmt) {
            Stmt::Nop => {}
            Stmt::StatementList(inner) => cleaned.extend(
                inner
                    .iter()
                    .copied()
                    .filter(|&s| !matches!(ast.stmt(s), Stmt::Nop)),
            ),
            _ => cleaned.push(stmt),
        }
    }
    Some(cleaned)
}

fn constant_condition(ast: &Ast, condition: ExprId) -> Result<Option<bool>> {
    Ok(types::const_value(ast, condition)?.and_then(|lit| lit.as_boolean()))
}

/// Whether a `break` or `continue` below `stmt` leaves the loop that owns
/// `stmt`. Nested loops own their own.
fn exits_loop(ast: &Ast, stmt: StmtId) -> bool {
    match ast.stmt(stmt) {
        Stmt::Break | Stmt::Continue => true,
        Stmt::For(_) | Stmt::While { .. } | Stmt::Repeat { .. } => false,
        Stmt::If {
            true_part,
            else_part,
            ..
        }
        | Stmt::Branch {
            true_part,
            else_part,
            ..
        } => exits_loop(ast, *true_part) || exits_loop(ast, *else_part),
        other => other
            .statements()
            .is_some_and(|list| list.iter().any(|&s| exits_loop(ast, s))),
    }
}

/// Replaces a loop by its body, wrapped in a label and a jump back to it.
fn endless_loop(ast: &mut Ast, id: StmtId, body: StmtId, condition: ExprId) -> Result<()> {
    let position = ast.expr_position(condition).clone();
    let name = format!("{BACK_LABEL_PREFIX}{}", ast.next_sequence());
    let label = ast.add_stmt(Stmt::Label(Label { name: name.clone() }), position.clone());
    let reference = Expr::Identifier(IdentifierRef::new(&name));
    let target = ast.add_expr(reference, position.clone());
    let jump = ast.add_stmt(Stmt::Jump(JumpTarget::Identifier(target)), position);
    let scope = ScopeId::Stmt(body);
    ast.insert_statements(scope, 0, &[label])?;
    let end = ast.scope_statements(scope).len();
    ast.insert_statements(scope, end, &[jump])?;
    ast.replace_stmt(id, ast.stmt(body).clone());
    Ok(())
}

/// Whether assigning `value` to `target` stores what is already there.
fn same_location(ast: &Ast, target: &AssignTarget, value: ExprId) -> bool {
    match (target, ast.expr(value)) {
        (AssignTarget::Register(register), Expr::Register(other)) => register == other,
        (AssignTarget::Identifier(ident), Expr::Identifier(other)) => {
            ast.expr(*ident).as_identifier() == Some(other)
        }
        (AssignTarget::ArrayIndexed(indexed), Expr::ArrayIndexed { array, index }) => {
            let Expr::ArrayIndexed {
                array: target_array,
                index: target_index,
            } = ast.expr(*indexed)
            else {
                return false;
            };
            let same_array = ast.expr(*array).as_identifier().is_some()
                && ast.expr(*array).as_identifier() == ast.expr(*target_array).as_identifier();
            let constant_index = |e: ExprId| ast.expr(e).as_literal().and_then(Literal::as_integer);
            same_array
                && constant_index(*index).is_some()
                && constant_index(*index) == constant_index(*target_index)
        }
        _ => false,
    }
}

fn clone_target(ast: &mut Ast, target: &AssignTarget) -> AssignTarget {
    match target {
        AssignTarget::Register(register) => AssignTarget::Register(*register),
        AssignTarget::Identifier(id) => AssignTarget::Identifier(ast.clone_expr(*id)),
        AssignTarget::ArrayIndexed(id) => AssignTarget::ArrayIndexed(ast.clone_expr(*id)),
        AssignTarget::Memory(id) => AssignTarget::Memory(ast.clone_expr(*id)),
    }
}

/// A fresh expression reading the target.
fn target_expr(
    ast: &mut Ast,
    target: &AssignTarget,
    position: &octet_core::Position,
) -> ExprId {
    match target {
        AssignTarget::Register(register) => {
            ast.add_expr(Expr::Register(*register), position.clone())
        }
        AssignTarget::Identifier(id) | AssignTarget::ArrayIndexed(id) => ast.clone_expr(*id),
        AssignTarget::Memory(address) => {
            let address = ast.clone_expr(*address);
            ast.add_expr(Expr::DirectMemoryRead { address }, position.clone())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Destination {
    Address(u16),
    Decl(StmtId),
}

/// The jump that a subroutine starts with, skipping declarations.
fn leading_jump(ast: &Ast, subroutine: StmtId) -> Option<&JumpTarget> {
    let sub = ast.stmt(subroutine).as_subroutine()?;
    let first = sub
        .statements
        .iter()
        .map(|&s| ast.stmt(s))
        .find(|s| !matches!(s, Stmt::VarDecl(_) | Stmt::Directive(_) | Stmt::Nop))?;
    match first {
        Stmt::Jump(target) => Some(target),
        _ => None,
    }
}

/// Follows subroutines that immediately jump elsewhere to where the chain
/// ends. `None` if `start` does not begin with a jump.
fn final_destination(ast: &Ast, start: StmtId) -> Result<Option<Destination>> {
    let mut visited = FxHashSet::default();
    let mut destination = None;
    let mut current = start;
    while visited.insert(current) {
        match leading_jump(ast, current) {
            Some(JumpTarget::Address(address)) => return Ok(Some(Destination::Address(*address))),
            Some(JumpTarget::Identifier(target)) => match types::declaration_of(ast, *target)? {
                Some(Declaration::Stmt(decl)) => {
                    destination = Some(Destination::Decl(decl));
                    current = decl;
                }
                _ => break,
            },
            Some(JumpTarget::Generated(_)) | None => break,
        }
    }
    Ok(destination)
}

/// A dotted reference to `decl` usable from `from`, if both live in the
/// same module.
fn qualified_reference(ast: &Ast, from: NodeRef, decl: StmtId) -> Result<Option<IdentifierRef>> {
    if ast.defining_module(from)? != ast.defining_module(NodeRef::Stmt(decl))? {
        return Ok(None);
    }
    Ok(Some(IdentifierRef::new(&ast.scoped_name(decl)?)))
}

/// Calls a subroutine that only jumps to another parameterless subroutine
/// with the same results directly.
fn redirect_call(ast: &mut Ast, from: NodeRef, call: &FunctionCall) -> Result<bool> {
    let Some(Declaration::Stmt(callee)) = types::declaration_of(ast, call.target)? else {
        return Ok(false);
    };
    let Some(Destination::Decl(destination)) = final_destination(ast, callee)? else {
        return Ok(false);
    };
    if destination == callee {
        return Ok(false);
    }
    let (Some(old), Some(new)) = (
        ast.stmt(callee).as_subroutine(),
        ast.stmt(destination).as_subroutine(),
    ) else {
        return Ok(false);
    };
    let compatible = old.parameters.is_empty()
        && new.parameters.is_empty()
        && old.return_types == new.return_types
        && old.asm_return_registers == new.asm_return_registers;
    if !compatible {
        return Ok(false);
    }
    let Some(name) = qualified_reference(ast, from, destination)? else {
        return Ok(false);
    };
    ast.replace_expr(call.target, Expr::Identifier(name));
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{AstBuilder, walk_tree};
    use octet_core::{DataType, Register};

    /// Runs the optimizer until it stops changing anything.
    fn optimized(ast: &mut Ast) -> Diagnostics {
        let mut optimizer = StatementOptimizer::new();
        for _ in 0..20 {
            let mut changed = walk_tree(&mut optimizer, ast).unwrap();
            changed |= optimizer.clean_modules(ast);
            ast.relink();
            if !changed {
                return optimizer.take_diagnostics();
            }
        }
        panic!("statement optimizer did not settle");
    }

    fn main_statements(ast: &Ast, main: StmtId) -> Vec<&Stmt> {
        ast.scope_statements(ScopeId::Stmt(main))
            .iter()
            .map(|&s| ast.stmt(s))
            .collect()
    }

    #[test]
    fn discarded_pure_calls_are_removed() {
        let mut b = AstBuilder::new("opt.oct");
        let arg = b.float(1.0);
        let call = b.call_stmt("sin", vec![arg]);
        let keep = b.call_stmt("rsave", vec![]);
        let main = b.block("main", vec![call, keep]);
        let mut ast = b.module("prog", vec![main]);

        let diagnostics = optimized(&mut ast);
        assert_eq!(ast.scope_statements(ScopeId::Stmt(main)), &[keep]);
        let warnings: Vec<_> = diagnostics.warnings().map(|d| d.message.as_str()).collect();
        assert_eq!(warnings, vec![DISCARDED_RESULT_WARNING]);
    }

    #[test]
    fn constant_if_keeps_the_taken_branch() {
        let mut b = AstBuilder::new("opt.oct");
        let a = b.call_stmt("a", vec![]);
        let not_taken = b.call_stmt("b", vec![]);
        let condition = b.boolean(true);
        let if_stmt = b.if_else(condition, vec![a], vec![not_taken]);
        let main = b.block("main", vec![if_stmt]);
        let mut ast = b.module("prog", vec![main]);

        let diagnostics = optimized(&mut ast);
        assert!(matches!(ast.stmt(if_stmt), Stmt::AnonymousScope(s) if s.statements == vec![a]));
        assert!(!ast.reachable_nodes().contains(&NodeRef::Stmt(not_taken)));
        assert_eq!(diagnostics.warning_count(), 1);
    }

    #[test]
    fn while_true_becomes_label_and_jump() {
        let mut b = AstBuilder::new("opt.oct");
        let work = b.call_stmt("rsave", vec![]);
        let condition = b.int(1);
        let while_stmt = b.while_loop(condition, vec![work]);
        let main = b.block("main", vec![while_stmt]);
        let mut ast = b.module("prog", vec![main]);

        optimized(&mut ast);
        let Stmt::AnonymousScope(body) = ast.stmt(while_stmt) else {
            panic!("expected the loop body");
        };
        let kinds: Vec<&Stmt> = body.statements.iter().map(|&s| ast.stmt(s)).collect();
        assert_eq!(kinds.len(), 3);
        let Stmt::Label(label) = kinds[0] else {
            panic!("expected a label first");
        };
        assert!(label.name.starts_with(BACK_LABEL_PREFIX));
        let Stmt::Jump(JumpTarget::Identifier(target)) = kinds[2] else {
            panic!("expected a jump last");
        };
        assert_eq!(
            ast.expr(*target).as_identifier().map(IdentifierRef::joined),
            Some(label.name.clone())
        );
    }

    #[test]
    fn loops_with_break_are_kept() {
        let mut b = AstBuilder::new("opt.oct");
        let brk = b.brk();
        let condition = b.boolean(true);
        let while_stmt = b.while_loop(condition, vec![brk]);
        let never = b.boolean(false);
        let dead = b.while_loop(never, vec![]);
        let main = b.block("main", vec![while_stmt, dead]);
        let mut ast = b.module("prog", vec![main]);

        let diagnostics = optimized(&mut ast);
        assert!(matches!(ast.stmt(while_stmt), Stmt::While { .. }));
        assert_eq!(ast.scope_statements(ScopeId::Stmt(main)), &[while_stmt]);
        assert_eq!(diagnostics.warning_count(), 2);
    }

    #[test]
    fn repeat_until_true_runs_once() {
        let mut b = AstBuilder::new("opt.oct");
        let work = b.call_stmt("rsave", vec![]);
        let until = b.boolean(true);
        let repeat = b.repeat(vec![work], until);
        let main = b.block("main", vec![repeat]);
        let mut ast = b.module("prog", vec![main]);

        optimized(&mut ast);
        assert!(matches!(ast.stmt(repeat), Stmt::AnonymousScope(s) if s.statements == vec![work]));
    }

    #[test]
    fn single_value_range_loses_its_loop() {
        let mut b = AstBuilder::new("opt.oct");
        let i = b.var(DataType::UByte, "i", None);
        let work = b.call_stmt("rsave", vec![]);
        let for_stmt = b.for_range("i", 1, 1, vec![work]);
        let main = b.block("main", vec![i, for_stmt]);
        let mut ast = b.module("prog", vec![main]);

        optimized(&mut ast);
        let Stmt::AnonymousScope(body) = ast.stmt(for_stmt) else {
            panic!("expected the loop body");
        };
        assert_eq!(body.statements.len(), 2);
        let Stmt::Assignment(init) = ast.stmt(body.statements[0]) else {
            panic!("expected the loop variable assignment");
        };
        assert_eq!(
            ast.expr(init.value).as_literal(),
            Literal::integer(DataType::UByte, 1).as_ref()
        );
        assert_eq!(body.statements[1], work);
    }

    #[test]
    fn neutral_self_assignments_vanish() {
        let mut b = AstBuilder::new("opt.oct");
        let x = b.var(DataType::UByte, "x", None);
        let mut statements = vec![x];
        for (op, amount) in [
            (BinaryOp::Add, 0),
            (BinaryOp::Sub, 0),
            (BinaryOp::Mul, 1),
            (BinaryOp::Div, 1),
            (BinaryOp::Pow, 1),
            (BinaryOp::FloorDiv, 1),
            (BinaryOp::BitOr, 0),
            (BinaryOp::BitXor, 0),
            (BinaryOp::Shl, 0),
        ] {
            let left = b.ident("x");
            let right = b.int(amount);
            let value = b.binary(left, op, right);
            let target = b.target_var("x");
            statements.push(b.assign(target, value));
        }
        let same = b.ident("x");
        let target = b.target_var("x");
        statements.push(b.assign(target, same));
        let main = b.block("main", statements);
        let mut ast = b.module("prog", vec![main]);

        optimized(&mut ast);
        assert_eq!(ast.scope_statements(ScopeId::Stmt(main)), &[x]);
    }

    #[test]
    fn small_additions_become_increments() {
        let mut b = AstBuilder::new("opt.oct");
        let left = b.register(Register::A);
        let right = b.int(3);
        let value = b.binary(left, BinaryOp::Sub, right);
        let target = b.target_register(Register::A);
        let assign = b.assign(target, value);
        let main = b.block("main", vec![assign]);
        let mut ast = b.module("prog", vec![main]);

        optimized(&mut ast);
        let statements = main_statements(&ast, main);
        assert_eq!(statements.len(), 3);
        assert!(statements.iter().all(|s| matches!(
            s,
            Stmt::PostIncrDecr {
                target: AssignTarget::Register(Register::A),
                op: IncrDecr::Decr
            }
        )));
    }

    #[test]
    fn remainder_by_one_clears_integers() {
        let mut b = AstBuilder::new("opt.oct");
        let x = b.var(DataType::UByte, "x", None);
        let left = b.ident("x");
        let right = b.int(1);
        let value = b.binary(left, BinaryOp::Rem, right);
        let target = b.target_var("x");
        let assign = b.assign(target, value);
        let main = b.block("main", vec![x, assign]);
        let mut ast = b.module("prog", vec![main]);

        optimized(&mut ast);
        assert_eq!(ast.scope_statements(ScopeId::Stmt(main)), &[x, assign]);
        let Stmt::Assignment(cleared) = ast.stmt(assign) else {
            panic!("expected assignment");
        };
        let zero = ast.expr(cleared.value).as_literal().unwrap();
        assert_eq!(zero.datatype(), DataType::UByte);
        assert_eq!(zero.as_integer(), Some(0));
    }

    #[test]
    fn float_floor_division_by_one_is_kept() {
        let mut b = AstBuilder::new("opt.oct");
        let f = b.var(DataType::Float, "f", None);
        let left = b.ident("f");
        let right = b.int(1);
        let value = b.binary(left, BinaryOp::FloorDiv, right);
        let target = b.target_var("f");
        let assign = b.assign(target, value);
        let main = b.block("main", vec![f, assign]);
        let mut ast = b.module("prog", vec![main]);

        optimized(&mut ast);
        assert_eq!(ast.scope_statements(ScopeId::Stmt(main)), &[f, assign]);
    }

    #[test]
    fn shifts_unroll_or_clear() {
        let mut b = AstBuilder::new("opt.oct");
        let x = b.var(DataType::UByte, "x", None);
        let left = b.ident("x");
        let right = b.int(2);
        let value = b.binary(left, BinaryOp::Shl, right);
        let target = b.target_var("x");
        let shift = b.assign(target, value);
        let left = b.ident("x");
        let right = b.int(9);
        let value = b.binary(left, BinaryOp::Shr, right);
        let target = b.target_var("x");
        let clear = b.assign(target, value);
        let main = b.block("main", vec![x, shift, clear]);
        let mut ast = b.module("prog", vec![main]);

        optimized(&mut ast);
        let statements = main_statements(&ast, main);
        assert_eq!(statements.len(), 4);
        for stmt in &statements[1..3] {
            let Stmt::FunctionCall(call) = stmt else {
                panic!("expected lsl call");
            };
            let callee = ast.expr(call.target).as_identifier();
            assert_eq!(callee.map(IdentifierRef::joined), Some("lsl".to_string()));
        }
        let Stmt::Assignment(cleared) = statements[3] else {
            panic!("expected assignment");
        };
        assert!(ast.expr(cleared.value).as_literal().is_some_and(|l| l.is_number(0.0)));
    }

    #[test]
    fn calls_and_jumps_skip_trampolines() {
        let mut b = AstBuilder::new("opt.oct");
        let body = b.call_stmt("rsave", vec![]);
        let real = b.subroutine("real", vec![], vec![], vec![body]);
        let hop = b.jump("main.real");
        let trampoline = b.subroutine("trampoline", vec![], vec![], vec![hop]);
        let call = b.call_stmt("trampoline", vec![]);
        let jump = b.jump("trampoline");
        let start = b.subroutine("start", vec![], vec![], vec![call, jump]);
        let main = b.block("main", vec![real, trampoline, start]);
        let mut ast = b.module("prog", vec![main]);

        optimized(&mut ast);
        let Stmt::FunctionCall(call) = ast.stmt(call) else {
            panic!("expected call");
        };
        let callee = ast.expr(call.target).as_identifier();
        assert_eq!(
            callee.map(IdentifierRef::joined),
            Some("main.real".to_string())
        );
        let Stmt::Jump(JumpTarget::Identifier(target)) = ast.stmt(jump) else {
            panic!("expected jump");
        };
        assert_eq!(
            ast.expr(*target).as_identifier().map(IdentifierRef::joined),
            Some("main.real".to_string())
        );
    }

    #[test]
    fn jump_cycles_terminate() {
        let mut b = AstBuilder::new("opt.oct");
        let to_b = b.jump("main.second");
        let first = b.subroutine("first", vec![], vec![], vec![to_b]);
        let to_a = b.jump("main.first");
        let second = b.subroutine("second", vec![], vec![], vec![to_a]);
        let call = b.call_stmt("first", vec![]);
        let start = b.subroutine("start", vec![], vec![], vec![call]);
        let main = b.block("main", vec![first, second, start]);
        let mut ast = b.module("prog", vec![main]);
        optimized(&mut ast);
    }
}

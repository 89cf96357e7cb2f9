//! The single rewrite mechanism every pass uses.
//!
//! A [`Transform`] is handed each node after all of that node's children
//! have been handed to it (post-order), and may replace the node in place.
//! It reports whether it changed anything; the walk ORs those answers so
//! a driver can iterate until nothing changes.

use octet_core::Result;

use super::{Ast, ExprId, NodeRef, StmtId};

/// A tree rewrite. Both hooks default to "leave the node alone".
pub trait Transform {
    fn transform_stmt(&mut self, ast: &mut Ast, id: StmtId) -> Result<bool> {
        let _ = (ast, id);
        Ok(false)
    }

    fn transform_expr(&mut self, ast: &mut Ast, id: ExprId) -> Result<bool> {
        let _ = (ast, id);
        Ok(false)
    }
}

/// Applies `t` to every node of every module.
pub fn walk_tree<T: Transform + ?Sized>(t: &mut T, ast: &mut Ast) -> Result<bool> {
    let mut changed = false;
    for module in ast.module_ids() {
        let statements = ast.module(module).statements.clone();
        for stmt in statements {
            changed |= walk_stmt(t, ast, stmt)?;
        }
    }
    Ok(changed)
}

/// Applies `t` to the children of `id`, then to `id` itself.
pub fn walk_stmt<T: Transform + ?Sized>(t: &mut T, ast: &mut Ast, id: StmtId) -> Result<bool> {
    let mut changed = false;
    for child in ast.stmt(id).children() {
        changed |= match child {
            NodeRef::Stmt(s) => walk_stmt(t, ast, s)?,
            NodeRef::Expr(e) => walk_expr(t, ast, e)?,
        };
    }
    changed |= t.transform_stmt(ast, id)?;
    Ok(changed)
}

/// Applies `t` to the children of `id`, then to `id` itself.
pub fn walk_expr<T: Transform + ?Sized>(t: &mut T, ast: &mut Ast, id: ExprId) -> Result<bool> {
    let mut changed = false;
    for child in ast.expr(id).children() {
        changed |= walk_expr(t, ast, child)?;
    }
    changed |= t.transform_expr(ast, id)?;
    Ok(changed)
}

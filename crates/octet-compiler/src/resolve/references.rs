//! Checks that every identifier resolves, recording what it resolves to.

use octet_core::{Diagnostics, Result};

use crate::ast::{Ast, Expr, ExprId, NodeRef, Parent, Stmt};
use crate::scope::{self, Declaration, UsedNames};

pub fn check(ast: &Ast, used: &mut UsedNames, diagnostics: &mut Diagnostics) -> Result<()> {
    for node in ast.reachable_nodes() {
        let NodeRef::Expr(id) = node else { continue };
        let Expr::Identifier(ident) = ast.expr(id) else {
            continue;
        };
        match scope::lookup(ast, &ident.name, node)? {
            Some(Declaration::Stmt(decl)) => used.record(&ast.scoped_name(decl)?),
            Some(Declaration::Builtin(_)) => {}
            None => {
                let what = if is_call_target(ast, id) {
                    "undefined function or subroutine"
                } else {
                    "undefined symbol"
                };
                diagnostics.error(
                    format!("{what}: {}", ident.joined()),
                    ast.expr_position(id).clone(),
                );
            }
        }
    }
    Ok(())
}

fn is_call_target(ast: &Ast, id: ExprId) -> bool {
    match ast.parent(NodeRef::Expr(id)) {
        Parent::Expr(owner) => {
            matches!(ast.expr(owner), Expr::FunctionCall(call) if call.target == id)
        }
        Parent::Stmt(owner) => {
            matches!(ast.stmt(owner), Stmt::FunctionCall(call) if call.target == id)
        }
        Parent::Module(_) | Parent::Detached => false,
    }
}

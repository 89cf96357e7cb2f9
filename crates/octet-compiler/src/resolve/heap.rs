//! Backing variables for heap literals.
//!
//! A string or array literal used anywhere but as a declaration's initial
//! value needs storage with a name. Collecting the literals and rewriting
//! the tree happen in two separate steps so the traversal never sees a
//! half-rewritten tree.

use octet_core::{DataType, HeapId, Result};
use rustc_hash::FxHashSet;

use crate::ast::{
    Ast, Expr, ExprId, IdentifierRef, Literal, NodeRef, Parent, ScopeId, Stmt, VarDecl,
    VarDeclKind,
};
use crate::scope;

/// A heap literal that needs a backing variable.
#[derive(Debug, Clone, PartialEq)]
struct PendingValue {
    literal: ExprId,
    scope: ScopeId,
    heap_id: HeapId,
    datatype: DataType,
}

pub fn variable_name(heap_id: HeapId) -> String {
    format!("auto_heap_value_{heap_id}")
}

/// Declares a backing variable for every loose heap literal and replaces
/// the literal with a reference to it. Returns the number of variables
/// declared.
pub fn materialize(ast: &mut Ast) -> Result<usize> {
    let pending = collect(ast)?;
    if pending.is_empty() {
        return Ok(0);
    }

    let mut declared = FxHashSet::default();
    let mut created = 0;
    for value in &pending {
        let name = variable_name(value.heap_id);
        if declared.insert((value.scope, value.heap_id))
            && scope::member(ast, value.scope, &name).is_none()
        {
            let position = ast.expr_position(value.literal).clone();
            let Some(literal) = Literal::heap(value.datatype, value.heap_id) else {
                continue;
            };
            let initial = ast.add_expr(Expr::Literal(literal), position.clone());
            let decl = ast.add_stmt(
                Stmt::VarDecl(VarDecl {
                    kind: VarDeclKind::Var,
                    datatype: value.datatype,
                    array_size: None,
                    name: name.clone(),
                    value: Some(initial),
                    auto_generated: false,
                }),
                position,
            );
            let end = ast.scope_statements(value.scope).len();
            ast.insert_statements(value.scope, end, &[decl])?;
            created += 1;
        }
        ast.replace_expr(value.literal, Expr::Identifier(IdentifierRef::new(&name)));
    }
    Ok(created)
}

fn collect(ast: &Ast) -> Result<Vec<PendingValue>> {
    let mut pending = Vec::new();
    for node in ast.reachable_nodes() {
        let NodeRef::Expr(id) = node else { continue };
        let Some(literal) = ast.expr(id).as_literal() else {
            continue;
        };
        let Some(heap_id) = literal.heap_id() else {
            continue;
        };
        if let Parent::Stmt(owner) = ast.parent(node) {
            if matches!(ast.stmt(owner), Stmt::VarDecl(decl) if decl.value == Some(id)) {
                continue;
            }
        }
        pending.push(PendingValue {
            literal: id,
            scope: ast.defining_scope(node)?,
            heap_id,
            datatype: literal.datatype(),
        });
    }
    Ok(pending)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::AstBuilder;

    #[test]
    fn one_variable_per_scope_and_value() {
        let mut b = AstBuilder::new("heap.oct");
        let mut ast_calls = Vec::new();
        for _ in 0..2 {
            let text = b.literal(Literal::str("x"));
            ast_calls.push((text, b.call_stmt("print", vec![text])));
        }
        let main = b.block("main", ast_calls.iter().map(|(_, s)| *s).collect());
        let mut ast = b.module("prog", vec![main]);
        let id = ast.heap.add_string(DataType::Str, "x").unwrap();
        for (text, _) in &ast_calls {
            let lit = Literal::heap(DataType::Str, id).unwrap();
            ast.replace_expr(*text, Expr::Literal(lit));
        }

        assert_eq!(materialize(&mut ast).unwrap(), 1);
        ast.relink();
        for (text, _) in &ast_calls {
            assert_eq!(
                ast.expr(*text).as_identifier().map(IdentifierRef::joined),
                Some(variable_name(id))
            );
        }
        let last = *ast.scope_statements(ScopeId::Stmt(main)).last().unwrap();
        let name = variable_name(id);
        assert_eq!(ast.stmt(last).declared_name(), Some(name.as_str()));
        assert_eq!(materialize(&mut ast).unwrap(), 0);
    }
}

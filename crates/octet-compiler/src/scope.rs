//! Name lookup over the scope tree.
//!
//! A dotted name is looked up from the root of the referencing node's
//! module, one scope per segment. A plain name is looked up in the
//! innermost enclosing scope first, then outward, so inner declarations
//! shadow outer ones. Builtin function names are recognised before any of
//! that and can never be shadowed.
//!
//! Statement lists spliced in by the optimizer are transparent: their
//! members count as direct members of the surrounding scope.

use octet_core::Result;
use rustc_hash::FxHashSet;

use crate::ast::{Ast, NodeRef, Parent, ScopeId, Stmt, StmtId};
use crate::builtins::{self, BuiltinFunction};

/// What a name resolves to.
#[derive(Debug, Clone, Copy)]
pub enum Declaration {
    Builtin(&'static BuiltinFunction),
    /// A block, subroutine, label, variable, or anonymous scope.
    Stmt(StmtId),
}

impl Declaration {
    pub fn stmt(self) -> Option<StmtId> {
        match self {
            Declaration::Stmt(id) => Some(id),
            Declaration::Builtin(_) => None,
        }
    }
}

/// Resolves `name` as seen from `from`.
///
/// Returns `Ok(None)` when nothing matches; fails only when `from` is not
/// linked into the tree.
pub fn lookup(ast: &Ast, name: &[String], from: NodeRef) -> Result<Option<Declaration>> {
    let Some(last) = name.last() else {
        return Ok(None);
    };
    if let Some(builtin) = builtins::builtin(last) {
        return Ok(Some(Declaration::Builtin(builtin)));
    }

    if name.len() > 1 {
        let module = ast.defining_module(from)?;
        let mut scope = ScopeId::Module(module);
        for segment in &name[..name.len() - 1] {
            match sub_scope(ast, scope, segment) {
                Some(inner) => scope = ScopeId::Stmt(inner),
                None => return Ok(None),
            }
        }
        return Ok(member(ast, scope, last).map(Declaration::Stmt));
    }

    let mut scope = Some(start_scope(ast, from)?);
    while let Some(current) = scope {
        if let Some(found) = member(ast, current, last) {
            return Ok(Some(Declaration::Stmt(found)));
        }
        scope = ast.enclosing_scope(current)?;
    }
    Ok(None)
}

/// Where an unqualified lookup from `from` begins.
///
/// A `for` loop's variable is looked up from inside the loop body, where
/// a loop that declares its own variable puts the declaration.
fn start_scope(ast: &Ast, from: NodeRef) -> Result<ScopeId> {
    if let NodeRef::Expr(id) = from {
        if let Parent::Stmt(owner) = ast.parent(from) {
            if let Stmt::For(fl) = ast.stmt(owner) {
                if fl.loop_var == Some(id) {
                    return Ok(ScopeId::Stmt(fl.body));
                }
            }
        }
    }
    ast.defining_scope(from)
}

/// Looks up a fully-qualified name from the root of `module`'s tree
/// without reference to any particular node.
pub fn lookup_qualified(ast: &Ast, scope: ScopeId, name: &str) -> Option<StmtId> {
    let segments: Vec<&str> = name.split('.').collect();
    let (last, path) = segments.split_last()?;
    let mut scope = scope;
    for segment in path {
        scope = ScopeId::Stmt(sub_scope(ast, scope, segment)?);
    }
    member(ast, scope, last)
}

/// A label, variable, or nested scope declared directly in `scope`.
///
/// Labels and variables win over nested scopes of the same name.
pub fn member(ast: &Ast, scope: ScopeId, name: &str) -> Option<StmtId> {
    let mut members = Vec::new();
    collect_members(ast, ast.scope_statements(scope), &mut members);
    let named: Vec<StmtId> = members
        .into_iter()
        .filter(|id| ast.stmt(*id).declared_name() == Some(name))
        .collect();
    named
        .iter()
        .find(|id| matches!(ast.stmt(**id), Stmt::Label(_) | Stmt::VarDecl(_)))
        .or_else(|| named.iter().find(|id| ast.stmt(**id).is_scope()))
        .copied()
}

/// A nested scope declared directly in `scope`.
pub fn sub_scope(ast: &Ast, scope: ScopeId, name: &str) -> Option<StmtId> {
    let mut members = Vec::new();
    collect_members(ast, ast.scope_statements(scope), &mut members);
    members
        .into_iter()
        .find(|id| ast.stmt(*id).is_scope() && ast.stmt(*id).declared_name() == Some(name))
}

/// Every statement directly in a scope, looking through statement lists.
pub fn scope_members(ast: &Ast, scope: ScopeId) -> Vec<StmtId> {
    let mut members = Vec::new();
    collect_members(ast, ast.scope_statements(scope), &mut members);
    members
}

fn collect_members(ast: &Ast, statements: &[StmtId], out: &mut Vec<StmtId>) {
    for &id in statements {
        match ast.stmt(id) {
            Stmt::StatementList(list) => collect_members(ast, list, out),
            _ => out.push(id),
        }
    }
}

/// Fully-qualified names that are referenced somewhere, plus every scope
/// prefix of those names and the program entry points.
///
/// Later stages can use this to drop blocks nothing refers to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsedNames {
    names: FxHashSet<String>,
}

impl UsedNames {
    pub fn new(entry_points: &[String]) -> Self {
        let mut used = Self::default();
        for name in entry_points {
            used.record(name);
        }
        used
    }

    /// Marks `name` and each of its scope prefixes as used.
    pub fn record(&mut self, name: &str) {
        let mut name = name;
        loop {
            self.names.insert(name.to_string());
            match name.rsplit_once('.') {
                Some((prefix, _)) => name = prefix,
                None => break,
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// All names, sorted.
    pub fn sorted(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.names.iter().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{AstBuilder, ExprId};
    use octet_core::DataType;

    fn path(dotted: &str) -> Vec<String> {
        dotted.split('.').map(str::to_string).collect()
    }

    /// `count` at block level and inside `main.start`, plus a reference
    /// expression inside `start`.
    fn shadowing_tree() -> (Ast, StmtId, StmtId, ExprId) {
        let mut b = AstBuilder::new("scope.oct");
        let outer = b.var(DataType::UByte, "count", None);
        let inner = b.var(DataType::UByte, "count", None);
        let reference = b.ident("count");
        let target = b.target_var("x");
        let assign = b.assign(target, reference);
        let start = b.subroutine("start", vec![], vec![], vec![inner, assign]);
        let main = b.block("main", vec![outer, start]);
        (b.module("prog", vec![main]), outer, inner, reference)
    }

    #[test]
    fn unqualified_lookup_prefers_the_innermost_scope() {
        let (ast, _, inner, reference) = shadowing_tree();
        let found = lookup(&ast, &path("count"), NodeRef::Expr(reference)).unwrap();
        assert_eq!(found.and_then(Declaration::stmt), Some(inner));
    }

    #[test]
    fn qualified_lookup_starts_at_the_root() {
        let (ast, outer, inner, reference) = shadowing_tree();
        let found = lookup(&ast, &path("main.count"), NodeRef::Expr(reference)).unwrap();
        assert_eq!(found.and_then(Declaration::stmt), Some(outer));
        let found = lookup(&ast, &path("main.start.count"), NodeRef::Expr(reference)).unwrap();
        assert_eq!(found.and_then(Declaration::stmt), Some(inner));
        let missing = lookup(&ast, &path("nope.count"), NodeRef::Expr(reference)).unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn builtins_win_over_everything() {
        let (ast, _, _, reference) = shadowing_tree();
        let found = lookup(&ast, &path("sin"), NodeRef::Expr(reference)).unwrap();
        assert!(matches!(found, Some(Declaration::Builtin(f)) if f.name == "sin"));
    }

    #[test]
    fn statement_lists_are_transparent() {
        let mut b = AstBuilder::new("scope.oct");
        let hidden = b.var(DataType::UByte, "hidden", None);
        let main = b.block("main", vec![]);
        let mut ast = b.module("prog", vec![main]);
        let list = ast.add_stmt(
            Stmt::StatementList(vec![hidden]),
            ast.stmt_position(main).clone(),
        );
        let scope = ScopeId::Stmt(main);
        ast.insert_statements(scope, 0, &[list]).unwrap();
        assert_eq!(member(&ast, ScopeId::Stmt(main), "hidden"), Some(hidden));
    }

    #[test]
    fn detached_lookup_is_fatal() {
        let mut b = AstBuilder::new("scope.oct");
        let stray = b.ident("x");
        let ast = b.module("prog", vec![]);
        assert!(lookup(&ast, &path("x"), NodeRef::Expr(stray)).is_err());
    }

    #[test]
    fn used_names_include_prefixes() {
        let mut used = UsedNames::new(&["main".to_string(), "main.start".to_string()]);
        used.record("gfx.plot.x");
        assert_eq!(
            used.sorted(),
            vec!["gfx", "gfx.plot", "gfx.plot.x", "main", "main.start"]
        );
    }
}

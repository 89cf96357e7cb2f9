//! The syntax tree: an arena of statements and expressions addressed by id.
//!
//! Every node records its parent, so any node can find the scope it is
//! declared in by walking upward. Parent links are not patched as nodes are
//! rewritten; instead [`Ast::relink`] recomputes all of them in one linear
//! pass after each rewrite round. Nodes that a rewrite cut out of the tree
//! stay in the arena, detached, and are never visited again.
//!
//! # Example
//!
//! ```ignore
//! let mut ast = Ast::new();
//! let module = ast.add_module("prog", Position::synthetic());
//! let decl = ast.add_stmt(Stmt::VarDecl(..), pos.clone());
//! ast.module_mut(module).statements.push(decl);
//! ast.relink();
//!
//! let scope = ast.defining_scope(NodeRef::Stmt(decl))?;
//! assert_eq!(scope, ScopeId::Module(module));
//! ```

mod builder;
mod expr;
pub(crate) mod index;
mod link;
mod stmt;
mod transform;

pub use builder::AstBuilder;
pub use expr::{BinaryOp, Expr, FunctionCall, IdentifierRef, Literal, LiteralValue, PrefixOp};
pub use stmt::{
    AnonymousScope, ArraySize, AssignTarget, Assignment, Block, Directive, DirectiveArg, ForLoop,
    IncrDecr, JumpTarget, Label, RegisterOrFlag, RegisterSet, Stmt, Subroutine,
    SubroutineParameter, VarDecl, VarDeclKind,
};
pub use transform::{Transform, walk_expr, walk_stmt, walk_tree};

use octet_core::{CompilerError, HeapValues, Position, Result};
use rustc_hash::FxHashMap;

use index::{IndexVec, simple_index};

simple_index! {
    /// Identifies a statement in the arena.
    pub struct StmtId;
}

simple_index! {
    /// Identifies an expression in the arena.
    pub struct ExprId;
}

simple_index! {
    /// Identifies a module (a root scope).
    pub struct ModuleId;
}

/// The owner of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Parent {
    /// Not linked into the tree. Terminates every upward walk.
    Detached,
    Module(ModuleId),
    Stmt(StmtId),
    Expr(ExprId),
}

/// Any node of the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRef {
    Stmt(StmtId),
    Expr(ExprId),
}

/// A node that opens a name scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeId {
    Module(ModuleId),
    /// A block, subroutine, or anonymous scope statement.
    Stmt(StmtId),
}

/// An arena slot.
#[derive(Debug, Clone)]
pub struct Node<T> {
    pub kind: T,
    pub position: Position,
    parent: Parent,
}

/// A compilation unit's root scope.
#[derive(Debug, Clone)]
pub struct Module {
    pub name: String,
    pub position: Position,
    pub statements: Vec<StmtId>,
}

/// All modules of one compilation, plus the heap store their literals point
/// into.
#[derive(Debug, Default)]
pub struct Ast {
    modules: IndexVec<ModuleId, Module>,
    stmts: IndexVec<StmtId, Node<Stmt>>,
    exprs: IndexVec<ExprId, Node<Expr>>,
    scoped_names: FxHashMap<StmtId, String>,
    pub heap: HeapValues,
    sequence: u32,
}

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Arena access
    // ========================================================================

    pub fn add_module(&mut self, name: impl Into<String>, position: Position) -> ModuleId {
        self.modules.push(Module {
            name: name.into(),
            position,
            statements: Vec::new(),
        })
    }

    /// Allocates a detached statement.
    pub fn add_stmt(&mut self, kind: Stmt, position: Position) -> StmtId {
        self.stmts.push(Node {
            kind,
            position,
            parent: Parent::Detached,
        })
    }

    /// Allocates a detached expression.
    pub fn add_expr(&mut self, kind: Expr, position: Position) -> ExprId {
        self.exprs.push(Node {
            kind,
            position,
            parent: Parent::Detached,
        })
    }

    pub fn module(&self, id: ModuleId) -> &Module {
        &self.modules[id]
    }

    pub fn module_mut(&mut self, id: ModuleId) -> &mut Module {
        &mut self.modules[id]
    }

    pub fn module_ids(&self) -> Vec<ModuleId> {
        self.modules.indices().collect()
    }

    pub fn stmt(&self, id: StmtId) -> &Stmt {
        &self.stmts[id].kind
    }

    pub fn stmt_mut(&mut self, id: StmtId) -> &mut Stmt {
        &mut self.stmts[id].kind
    }

    pub fn stmt_position(&self, id: StmtId) -> &Position {
        &self.stmts[id].position
    }

    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id].kind
    }

    pub fn expr_mut(&mut self, id: ExprId) -> &mut Expr {
        &mut self.exprs[id].kind
    }

    pub fn expr_position(&self, id: ExprId) -> &Position {
        &self.exprs[id].position
    }

    pub fn position(&self, node: NodeRef) -> &Position {
        match node {
            NodeRef::Stmt(id) => self.stmt_position(id),
            NodeRef::Expr(id) => self.expr_position(id),
        }
    }

    pub fn parent(&self, node: NodeRef) -> Parent {
        match node {
            NodeRef::Stmt(id) => self.stmts[id].parent,
            NodeRef::Expr(id) => self.exprs[id].parent,
        }
    }

    /// Replaces a statement in place, keeping its id and parent, and links
    /// the new children to it.
    pub fn replace_stmt(&mut self, id: StmtId, kind: Stmt) {
        self.stmts[id].kind = kind;
        let parent = self.stmts[id].parent;
        self.link_stmt_subtree(id, parent);
    }

    /// Replaces an expression in place, keeping its id and parent, and links
    /// the new children to it.
    pub fn replace_expr(&mut self, id: ExprId, kind: Expr) {
        self.exprs[id].kind = kind;
        let parent = self.exprs[id].parent;
        self.link_expr_subtree(id, parent);
    }

    /// A fresh number, unique within this tree, for generated names.
    pub fn next_sequence(&mut self) -> u32 {
        self.sequence += 1;
        self.sequence
    }

    /// Allocates a detached anonymous scope with a generated name.
    pub fn add_anonymous_scope(&mut self, statements: Vec<StmtId>, position: Position) -> StmtId {
        let name = format!("<anon-{}>", self.next_sequence());
        self.add_stmt(
            Stmt::AnonymousScope(AnonymousScope { name, statements }),
            position,
        )
    }

    /// Deep-copies an expression subtree. The copy is detached.
    pub fn clone_expr(&mut self, id: ExprId) -> ExprId {
        let mut kind = self.expr(id).clone();
        match &mut kind {
            Expr::Literal(_) | Expr::Identifier(_) | Expr::Register(_) => {}
            Expr::Prefix { operand, .. } => *operand = self.clone_expr(*operand),
            Expr::Binary { left, right, .. } => {
                *left = self.clone_expr(*left);
                *right = self.clone_expr(*right);
            }
            Expr::ArrayIndexed { array, index } => {
                *array = self.clone_expr(*array);
                *index = self.clone_expr(*index);
            }
            Expr::FunctionCall(call) => {
                call.target = self.clone_expr(call.target);
                for arg in call.args.iter_mut() {
                    *arg = self.clone_expr(*arg);
                }
            }
            Expr::Range { from, to, step } => {
                *from = self.clone_expr(*from);
                *to = self.clone_expr(*to);
                if let Some(step) = step {
                    *step = self.clone_expr(*step);
                }
            }
            Expr::TypeCast { expression, .. } => *expression = self.clone_expr(*expression),
            Expr::DirectMemoryRead { address } => *address = self.clone_expr(*address),
        }
        if let Expr::Literal(lit) = &mut kind {
            if let LiteralValue::Array(elements) = lit.value() {
                let copies: Vec<ExprId> = elements
                    .clone()
                    .into_iter()
                    .map(|e| self.clone_expr(e))
                    .collect();
                if let Some(copy) = Literal::new(lit.datatype(), LiteralValue::Array(copies)) {
                    *lit = copy;
                }
            }
        }
        let position = self.expr_position(id).clone();
        let copy = self.add_expr(kind, position);
        self.link_expr_subtree(copy, Parent::Detached);
        copy
    }

    // ========================================================================
    // Scopes
    // ========================================================================

    /// The statements owned by a scope, in program order.
    pub fn scope_statements(&self, scope: ScopeId) -> &[StmtId] {
        match scope {
            ScopeId::Module(m) => &self.modules[m].statements,
            ScopeId::Stmt(s) => self.stmt(s).statements().map(Vec::as_slice).unwrap_or(&[]),
        }
    }

    pub fn scope_statements_mut(&mut self, scope: ScopeId) -> Option<&mut Vec<StmtId>> {
        match scope {
            ScopeId::Module(m) => Some(&mut self.modules[m].statements),
            ScopeId::Stmt(s) => self.stmt_mut(s).statements_mut(),
        }
    }

    pub fn scope_name(&self, scope: ScopeId) -> &str {
        match scope {
            ScopeId::Module(m) => &self.modules[m].name,
            ScopeId::Stmt(s) => self.stmt(s).declared_name().unwrap_or(""),
        }
    }

    /// Inserts detached statements into a scope at `index` and links them.
    pub fn insert_statements(
        &mut self,
        scope: ScopeId,
        index: usize,
        ids: &[StmtId],
    ) -> Result<()> {
        let parent = match scope {
            ScopeId::Module(m) => Parent::Module(m),
            ScopeId::Stmt(s) => Parent::Stmt(s),
        };
        let list = self
            .scope_statements_mut(scope)
            .ok_or(CompilerError::DetachedNode)?;
        let index = index.min(list.len());
        list.splice(index..index, ids.iter().copied());
        for &id in ids {
            self.link_stmt_subtree(id, parent);
        }
        Ok(())
    }

    /// Finds the innermost scope enclosing `node`.
    ///
    /// Fails with [`CompilerError::DetachedNode`] when the upward walk hits a
    /// node that is not linked into any module.
    pub fn defining_scope(&self, node: NodeRef) -> Result<ScopeId> {
        let mut parent = self.parent(node);
        loop {
            parent = match parent {
                Parent::Detached => return Err(CompilerError::DetachedNode),
                Parent::Module(m) => return Ok(ScopeId::Module(m)),
                Parent::Stmt(s) if self.stmt(s).is_scope() => return Ok(ScopeId::Stmt(s)),
                Parent::Stmt(s) => self.stmts[s].parent,
                Parent::Expr(e) => self.exprs[e].parent,
            };
        }
    }

    /// The parent scope of a scope; `None` for modules.
    pub fn enclosing_scope(&self, scope: ScopeId) -> Result<Option<ScopeId>> {
        match scope {
            ScopeId::Module(_) => Ok(None),
            ScopeId::Stmt(s) => self.defining_scope(NodeRef::Stmt(s)).map(Some),
        }
    }

    /// The module a node belongs to.
    pub fn defining_module(&self, node: NodeRef) -> Result<ModuleId> {
        let mut scope = self.defining_scope(node)?;
        while let Some(outer) = self.enclosing_scope(scope)? {
            scope = outer;
        }
        match scope {
            ScopeId::Module(m) => Ok(m),
            ScopeId::Stmt(_) => Err(CompilerError::DetachedNode),
        }
    }

    /// The innermost subroutine enclosing `node`, if any.
    pub fn defining_subroutine(&self, node: NodeRef) -> Result<Option<StmtId>> {
        let mut scope = self.defining_scope(node)?;
        loop {
            match scope {
                ScopeId::Module(_) => return Ok(None),
                ScopeId::Stmt(s) if matches!(self.stmt(s), Stmt::Subroutine(_)) => {
                    return Ok(Some(s));
                }
                ScopeId::Stmt(s) => scope = self.defining_scope(NodeRef::Stmt(s))?,
            }
        }
    }

    /// The fully-qualified name of a declaration: enclosing scope names
    /// (modules excluded) joined with the declaration's own name.
    ///
    /// Cached by [`Ast::relink`]; computed on the fly for declarations added
    /// since.
    pub fn scoped_name(&self, id: StmtId) -> Result<String> {
        if let Some(name) = self.scoped_names.get(&id) {
            return Ok(name.clone());
        }
        let own = self.stmt(id).declared_name().unwrap_or("").to_string();
        let mut segments = vec![own];
        let mut scope = self.defining_scope(NodeRef::Stmt(id))?;
        while let ScopeId::Stmt(s) = scope {
            segments.push(self.stmt(s).declared_name().unwrap_or("").to_string());
            scope = self.defining_scope(NodeRef::Stmt(s))?;
        }
        segments.reverse();
        Ok(segments.join("."))
    }
}

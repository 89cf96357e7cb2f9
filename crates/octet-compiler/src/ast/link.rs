//! Parent linking and child enumeration.

use super::{
    AssignTarget, Ast, Expr, ExprId, JumpTarget, LiteralValue, NodeRef, Parent, Stmt, StmtId,
};

impl Stmt {
    /// Owned children in program order.
    pub fn children(&self) -> Vec<NodeRef> {
        let mut out = Vec::new();
        let target = |out: &mut Vec<NodeRef>, target: &AssignTarget| {
            if let Some(e) = target.expr() {
                out.push(NodeRef::Expr(e));
            }
        };
        match self {
            Stmt::Directive(_)
            | Stmt::Label(_)
            | Stmt::Break
            | Stmt::Continue
            | Stmt::InlineAssembly { .. }
            | Stmt::Nop => {}
            Stmt::Block(b) => out.extend(b.statements.iter().map(|s| NodeRef::Stmt(*s))),
            Stmt::VarDecl(decl) => {
                if let Some(size) = &decl.array_size {
                    out.push(NodeRef::Expr(size.x));
                    out.extend(size.y.map(NodeRef::Expr));
                }
                out.extend(decl.value.map(NodeRef::Expr));
            }
            Stmt::Assignment(assign) => {
                for t in &assign.targets {
                    target(&mut out, t);
                }
                out.push(NodeRef::Expr(assign.value));
            }
            Stmt::PostIncrDecr { target: t, .. } => target(&mut out, t),
            Stmt::Jump(JumpTarget::Identifier(e)) => out.push(NodeRef::Expr(*e)),
            Stmt::Jump(_) => {}
            Stmt::FunctionCall(call) => {
                out.push(NodeRef::Expr(call.target));
                out.extend(call.args.iter().map(|a| NodeRef::Expr(*a)));
            }
            Stmt::If {
                condition,
                true_part,
                else_part,
            } => {
                out.push(NodeRef::Expr(*condition));
                out.push(NodeRef::Stmt(*true_part));
                out.push(NodeRef::Stmt(*else_part));
            }
            Stmt::Branch {
                true_part,
                else_part,
                ..
            } => {
                out.push(NodeRef::Stmt(*true_part));
                out.push(NodeRef::Stmt(*else_part));
            }
            Stmt::For(fl) => {
                out.extend(fl.loop_var.map(NodeRef::Expr));
                out.push(NodeRef::Expr(fl.iterable));
                out.push(NodeRef::Stmt(fl.body));
            }
            Stmt::While { condition, body } => {
                out.push(NodeRef::Expr(*condition));
                out.push(NodeRef::Stmt(*body));
            }
            Stmt::Repeat { body, until } => {
                out.push(NodeRef::Stmt(*body));
                out.push(NodeRef::Expr(*until));
            }
            Stmt::Return { values } => out.extend(values.iter().map(|v| NodeRef::Expr(*v))),
            Stmt::Subroutine(sub) => out.extend(sub.statements.iter().map(|s| NodeRef::Stmt(*s))),
            Stmt::AnonymousScope(scope) => {
                out.extend(scope.statements.iter().map(|s| NodeRef::Stmt(*s)))
            }
            Stmt::StatementList(list) => out.extend(list.iter().map(|s| NodeRef::Stmt(*s))),
        }
        out
    }
}

impl Expr {
    /// Owned children in evaluation order.
    pub fn children(&self) -> Vec<ExprId> {
        match self {
            Expr::Literal(lit) => match lit.value() {
                LiteralValue::Array(elements) => elements.clone(),
                _ => Vec::new(),
            },
            Expr::Identifier(_) | Expr::Register(_) => Vec::new(),
            Expr::Prefix { operand, .. } => vec![*operand],
            Expr::Binary { left, right, .. } => vec![*left, *right],
            Expr::ArrayIndexed { array, index } => vec![*array, *index],
            Expr::FunctionCall(call) => {
                let mut out = vec![call.target];
                out.extend(call.args.iter().copied());
                out
            }
            Expr::Range { from, to, step } => {
                let mut out = vec![*from, *to];
                out.extend(*step);
                out
            }
            Expr::TypeCast { expression, .. } => vec![*expression],
            Expr::DirectMemoryRead { address } => vec![*address],
        }
    }
}

impl Ast {
    /// Recomputes every parent link and the scoped-name cache from the
    /// module roots down.
    ///
    /// Nodes not reachable from a module end up [`Parent::Detached`].
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn relink(&mut self) {
        for node in self.stmts.iter_mut() {
            node.parent = Parent::Detached;
        }
        for node in self.exprs.iter_mut() {
            node.parent = Parent::Detached;
        }
        self.scoped_names.clear();

        let mut path = Vec::new();
        for module in self.modules.indices() {
            let statements = self.modules[module].statements.clone();
            for stmt in statements {
                self.link_stmt(stmt, Parent::Module(module), &mut path, true);
            }
        }
    }

    /// Links a statement subtree under `parent` without touching the rest
    /// of the tree.
    pub(crate) fn link_stmt_subtree(&mut self, id: StmtId, parent: Parent) {
        let mut path = Vec::new();
        self.link_stmt(id, parent, &mut path, false);
    }

    /// Links an expression subtree under `parent`.
    pub(crate) fn link_expr_subtree(&mut self, id: ExprId, parent: Parent) {
        self.exprs[id].parent = parent;
        for child in self.expr(id).children() {
            self.link_expr_subtree(child, Parent::Expr(id));
        }
    }

    fn link_stmt(&mut self, id: StmtId, parent: Parent, path: &mut Vec<String>, cache: bool) {
        self.stmts[id].parent = parent;
        let name = self.stmt(id).declared_name().map(str::to_string);
        if cache {
            if let Some(name) = &name {
                let scoped = if path.is_empty() {
                    name.clone()
                } else {
                    format!("{}.{}", path.join("."), name)
                };
                self.scoped_names.insert(id, scoped);
            }
        } else {
            self.scoped_names.remove(&id);
        }

        let opens_scope = self.stmt(id).is_scope();
        if opens_scope {
            path.push(name.unwrap_or_default());
        }
        for child in self.stmt(id).children() {
            match child {
                NodeRef::Stmt(s) => self.link_stmt(s, Parent::Stmt(id), path, cache),
                NodeRef::Expr(e) => self.link_expr_subtree(e, Parent::Stmt(id)),
            }
        }
        if opens_scope {
            path.pop();
        }
    }

    /// Every node reachable from the modules, in pre-order.
    pub fn reachable_nodes(&self) -> Vec<NodeRef> {
        let mut out = Vec::new();
        for module in self.modules.iter() {
            for &stmt in &module.statements {
                self.collect_stmt(stmt, &mut out);
            }
        }
        out
    }

    /// Every statement reachable from `id`, `id` included, in pre-order.
    pub fn statements_under(&self, id: StmtId) -> Vec<StmtId> {
        let mut nodes = Vec::new();
        self.collect_stmt(id, &mut nodes);
        nodes
            .into_iter()
            .filter_map(|n| match n {
                NodeRef::Stmt(s) => Some(s),
                NodeRef::Expr(_) => None,
            })
            .collect()
    }

    fn collect_stmt(&self, id: StmtId, out: &mut Vec<NodeRef>) {
        out.push(NodeRef::Stmt(id));
        for child in self.stmt(id).children() {
            match child {
                NodeRef::Stmt(s) => self.collect_stmt(s, out),
                NodeRef::Expr(e) => self.collect_expr(e, out),
            }
        }
    }

    fn collect_expr(&self, id: ExprId, out: &mut Vec<NodeRef>) {
        out.push(NodeRef::Expr(id));
        for child in self.expr(id).children() {
            self.collect_expr(child, out);
        }
    }
}

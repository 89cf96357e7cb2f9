//! The symbol table and the name errors found while building it.

use octet_core::{Diagnostics, Position, Result};
use rustc_hash::FxHashMap;

use crate::ast::{Ast, NodeRef, ScopeId, Stmt, StmtId};
use crate::builtins;
use crate::scope;

/// Fully-qualified name to declaring statement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolTable {
    symbols: FxHashMap<String, StmtId>,
}

impl SymbolTable {
    pub fn get(&self, name: &str) -> Option<StmtId> {
        self.symbols.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// All entries, sorted by name.
    pub fn sorted(&self) -> Vec<(&str, StmtId)> {
        let mut entries: Vec<(&str, StmtId)> =
            self.symbols.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
        entries
    }
}

struct Builder<'a> {
    ast: &'a Ast,
    table: SymbolTable,
    diagnostics: &'a mut Diagnostics,
}

/// Records every block, subroutine, label and variable in program order.
pub fn build(ast: &Ast, diagnostics: &mut Diagnostics) -> Result<SymbolTable> {
    let mut builder = Builder {
        ast,
        table: SymbolTable::default(),
        diagnostics,
    };
    for node in ast.reachable_nodes() {
        if let NodeRef::Stmt(id) = node {
            builder.visit(id)?;
        }
    }
    Ok(builder.table)
}

impl Builder<'_> {
    fn visit(&mut self, id: StmtId) -> Result<()> {
        let ast = self.ast;
        let position = ast.stmt_position(id).clone();
        match ast.stmt(id) {
            Stmt::Block(_) => self.bind(id)?,
            Stmt::VarDecl(decl) => {
                if builtins::is_builtin(&decl.name) {
                    self.builtin_redefined(position);
                }
                self.bind(id)?;
            }
            Stmt::Label(label) => {
                if builtins::is_builtin(&label.name) {
                    self.builtin_redefined(position);
                } else {
                    self.bind(id)?;
                }
            }
            Stmt::Subroutine(sub) => {
                if builtins::is_builtin(&sub.name) {
                    self.builtin_redefined(position);
                    return Ok(());
                }
                if sub.parameters.iter().any(|p| builtins::is_builtin(&p.name)) {
                    self.diagnostics.error(
                        "builtin function name cannot be used as parameter",
                        position.clone(),
                    );
                }
                self.bind(id)?;
                self.check_parameter_shadowing(id)?;
            }
            _ => {}
        }
        Ok(())
    }

    fn bind(&mut self, id: StmtId) -> Result<()> {
        let ast = self.ast;
        let scoped = ast.scoped_name(id)?;
        match self.table.symbols.get(&scoped) {
            Some(&existing) => {
                let name = ast.stmt(id).declared_name().unwrap_or_default();
                let first = ast.stmt_position(existing).clone();
                self.conflict(name, ast.stmt_position(id).clone(), first);
            }
            None => {
                self.table.symbols.insert(scoped, id);
            }
        }
        Ok(())
    }

    /// A local variable or label may not reuse a parameter's name.
    fn check_parameter_shadowing(&mut self, id: StmtId) -> Result<()> {
        let ast = self.ast;
        let Some(sub) = ast.stmt(id).as_subroutine() else {
            return Ok(());
        };
        let sub_position = ast.stmt_position(id).clone();
        for member in scope::scope_members(ast, ScopeId::Stmt(id)) {
            let (name, generated) = match ast.stmt(member) {
                Stmt::VarDecl(decl) => (decl.name.as_str(), decl.auto_generated),
                Stmt::Label(label) => (label.name.as_str(), false),
                _ => continue,
            };
            if !generated && sub.parameters.iter().any(|p| p.name == name) {
                let position = ast.stmt_position(member).clone();
                self.conflict(name, position, sub_position.clone());
            }
        }
        Ok(())
    }

    fn conflict(&mut self, name: &str, position: Position, existing: Position) {
        self.diagnostics.error(
            format!(
                "name conflict '{name}', first defined in {} line {}",
                existing.file, existing.line
            ),
            position,
        );
    }

    fn builtin_redefined(&mut self, position: Position) {
        self.diagnostics
            .error("builtin function cannot be redefined", position);
    }
}

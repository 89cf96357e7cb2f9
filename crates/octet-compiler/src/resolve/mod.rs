//! Symbol resolution.
//!
//! Runs once over freshly built modules, before any optimization:
//!
//! 1. [`desugar`]: rewrites that must happen before names are bound
//!    (augmented assignments, `lsb`, parameter and loop variable
//!    declarations, heap interning of string and array literals)
//! 2. [`heap`]: backing variables for heap literals used outside a
//!    declaration
//! 3. [`symbols`]: the symbol table and its name errors
//! 4. [`references`]: every identifier must resolve; resolved names are
//!    recorded as used
//!
//! The tree is relinked between steps that change its shape.

pub mod desugar;
pub mod heap;
pub mod references;
pub mod symbols;

pub use symbols::SymbolTable;

use octet_core::{Diagnostics, Result};
use tracing::debug;

use crate::ast::{Ast, walk_tree};
use crate::scope::UsedNames;

/// Output of the resolution pass.
#[derive(Debug, Default)]
pub struct ResolutionOutput {
    /// Fully-qualified name to declaring statement.
    pub symbols: SymbolTable,
    /// Names something refers to, plus the entry points.
    pub used: UsedNames,
    /// Number of backing variables created for heap literals.
    pub heap_variables: usize,
    /// Name errors and advisories.
    pub diagnostics: Diagnostics,
}

/// Binds names and prepares the tree for type queries.
pub struct ResolutionPass<'a> {
    entry_points: &'a [String],
    diagnostics: Diagnostics,
}

impl<'a> ResolutionPass<'a> {
    pub fn new(entry_points: &'a [String]) -> Self {
        Self {
            entry_points,
            diagnostics: Diagnostics::new(),
        }
    }

    /// Run the pass. User errors end up in the output's diagnostics; only
    /// broken tree invariants fail.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn run(mut self, ast: &mut Ast) -> Result<ResolutionOutput> {
        ast.relink();

        let mut desugar = desugar::Desugar::new(&mut self.diagnostics);
        let rewritten = walk_tree(&mut desugar, ast)?;
        ast.relink();

        let heap_variables = heap::materialize(ast)?;
        ast.relink();
        debug!(rewritten, heap_variables, "desugared tree");

        let symbols = symbols::build(ast, &mut self.diagnostics)?;
        let mut used = UsedNames::new(self.entry_points);
        references::check(ast, &mut used, &mut self.diagnostics)?;
        debug!(
            symbols = symbols.len(),
            used = used.len(),
            errors = self.diagnostics.error_count(),
            "resolved names"
        );

        Ok(ResolutionOutput {
            symbols,
            used,
            heap_variables,
            diagnostics: self.diagnostics,
        })
    }
}

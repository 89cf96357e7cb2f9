//! The optimizer: constant folding, expression simplification and
//! statement optimization, repeated until a pass changes nothing.
//!
//! Every rewrite can expose another (a folded condition makes an `if`
//! constant, a removed `if` leaves a no-op for the container cleanup), so
//! the three run in turn, with the tree relinked after each, until none of
//! them reports a change. A pass limit turns a rule cycle into an error
//! instead of a hang.

pub mod statements;

pub use statements::StatementOptimizer;

use octet_core::{CompilerError, Diagnostics, Result};
use tracing::debug;

use crate::ast::{Ast, walk_tree};
use crate::fold::ConstantFolder;
use crate::options::CompilerOptions;
use crate::simplify::Simplifier;

/// Output of the optimizer.
#[derive(Debug, Default)]
pub struct OptimizerOutput {
    /// Passes that changed the tree. Zero means it was already optimal.
    pub passes: usize,
    /// Folding errors and optimizer warnings.
    pub diagnostics: Diagnostics,
}

/// Drives the optimization passes to a fixed point.
pub struct Optimizer {
    max_passes: usize,
    optimize: bool,
}

impl Optimizer {
    pub fn new(options: &CompilerOptions) -> Self {
        Self {
            max_passes: options.max_optimizer_passes,
            optimize: options.optimize,
        }
    }

    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn run(self, ast: &mut Ast) -> Result<OptimizerOutput> {
        let mut folder = ConstantFolder::new();
        let mut statements = StatementOptimizer::new();
        let mut passes = 0;

        loop {
            let mut changed = walk_tree(&mut folder, ast)?;
            ast.relink();
            if self.optimize {
                changed |= walk_tree(&mut Simplifier, ast)?;
                ast.relink();
                changed |= walk_tree(&mut statements, ast)?;
                changed |= statements.clean_modules(ast);
                ast.relink();
            }
            if !changed {
                break;
            }
            passes += 1;
            if passes >= self.max_passes {
                return Err(CompilerError::NoFixedPoint {
                    limit: self.max_passes,
                });
            }
        }
        debug!(passes, "optimizer reached a fixed point");

        let mut diagnostics = folder.take_diagnostics();
        diagnostics.extend(statements.take_diagnostics());
        Ok(OptimizerOutput {
            passes,
            diagnostics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{AstBuilder, BinaryOp, Expr, Literal, ScopeId, Stmt};
    use octet_core::DataType;

    fn program() -> (Ast, crate::ast::StmtId, crate::ast::ExprId) {
        let mut b = AstBuilder::new("optimize.oct");
        let limit = b.int(4);
        let limit = b.constant(DataType::UByte, "LIMIT", limit);
        let y = b.var(DataType::UByte, "y", None);
        let five = b.int(5);
        let two = b.ident("LIMIT");
        let product = b.binary(five, BinaryOp::Mul, two);
        let target = b.target_var("y");
        let assign = b.assign(target, product);
        let condition = b.ident("LIMIT");
        let work = b.call_stmt("rsave", vec![]);
        let if_stmt = b.if_else(condition, vec![work], vec![]);
        let main = b.block("main", vec![limit, y, assign, if_stmt]);
        (b.module("prog", vec![main]), main, product)
    }

    #[test]
    fn folding_exposes_statement_rewrites() {
        let (mut ast, main, product) = program();
        let output = Optimizer::new(&CompilerOptions::default())
            .run(&mut ast)
            .unwrap();
        assert!(output.passes > 0);
        assert_eq!(
            ast.expr(product).as_literal(),
            Literal::integer(DataType::UByte, 20).as_ref()
        );
        let last = *ast.scope_statements(ScopeId::Stmt(main)).last().unwrap();
        assert!(matches!(ast.stmt(last), Stmt::AnonymousScope(_)));
        assert_eq!(output.diagnostics.warning_count(), 1);
    }

    #[test]
    fn second_run_changes_nothing() {
        let (mut ast, _, _) = program();
        let options = CompilerOptions::default();
        Optimizer::new(&options).run(&mut ast).unwrap();
        let again = Optimizer::new(&options).run(&mut ast).unwrap();
        assert_eq!(again.passes, 0);
    }

    #[test]
    fn folding_only_when_not_optimizing() {
        let (mut ast, main, product) = program();
        let options = CompilerOptions::default().with_optimize(false);
        let output = Optimizer::new(&options).run(&mut ast).unwrap();
        assert!(matches!(ast.expr(product), Expr::Literal(_)));
        let last = *ast.scope_statements(ScopeId::Stmt(main)).last().unwrap();
        assert!(matches!(ast.stmt(last), Stmt::If { .. }));
        assert!(output.diagnostics.is_empty());
    }

    #[test]
    fn pass_limit_is_enforced() {
        let (mut ast, _, _) = program();
        let options = CompilerOptions::default().with_max_optimizer_passes(1);
        let error = Optimizer::new(&options).run(&mut ast).unwrap_err();
        assert!(matches!(error, CompilerError::NoFixedPoint { limit: 1 }));
    }
}

//! Octet Compiler
//!
//! The semantic core of the compiler: everything between the parser and
//! the assembly back end.
//!
//! ## Pipeline
//!
//! - **Resolution**: desugar, bind names, record what is used
//! - **Optimization**: fold constants, simplify expressions and statements
//!   until nothing changes
//! - **Lowering**: emit the stack machine instruction stream and the
//!   variables table of every block
//!
//! User errors found by a stage are collected as diagnostics and stop the
//! pipeline after that stage. Broken invariants fail immediately with a
//! [`CompilerError`].
//!
//! ## Modules
//!
//! - [`ast`]: Arena syntax tree, parent links, tree transforms, builder
//! - [`scope`]: Name lookup over nested scopes
//! - [`builtins`]: Builtin function table
//! - [`resolve`]: Symbol resolution pass
//! - [`types`]: Datatype and constant value queries
//! - [`fold`]: Constant folding
//! - [`simplify`]: Expression simplifier
//! - [`optimize`]: Statement optimizer and fixed-point driver
//! - [`bytecode`]: Opcodes, instructions, programs
//! - [`emit`]: Instruction stream emitter
//! - [`conversion`], [`operators`]: Datatype to opcode selection
//! - [`stmt`], [`expr`]: Lowering of statements and expressions

pub mod ast;
pub mod builtins;
pub mod bytecode;
pub mod conversion;
pub mod emit;
pub mod expr;
pub mod fold;
pub mod operators;
pub mod optimize;
pub mod options;
pub mod resolve;
pub mod scope;
pub mod simplify;
pub mod stmt;
pub mod types;

#[cfg(test)]
mod testing;

pub use ast::{Ast, AstBuilder};
pub use bytecode::{Opcode, Program};
pub use emit::ProgramEmitter;
pub use expr::ExprCompiler;
pub use optimize::Optimizer;
pub use options::CompilerOptions;
pub use resolve::{ResolutionPass, SymbolTable};
pub use stmt::StmtCompiler;

// Re-export the error types from core for convenience
pub use octet_core::{CompilerError, Diagnostic, Diagnostics, Result};

use tracing::{debug, info_span};

/// Result of compilation.
#[derive(Debug)]
pub struct CompilationResult {
    /// The lowered program. `None` when a stage reported errors.
    pub program: Option<Program>,
    /// Errors and warnings of every stage that ran.
    pub diagnostics: Diagnostics,
    /// Optimizer passes that changed the tree.
    pub optimizer_passes: usize,
}

impl CompilationResult {
    /// Check if compilation succeeded (no errors).
    pub fn is_success(&self) -> bool {
        self.program.is_some() && !self.diagnostics.has_errors()
    }
}

/// The main compiler entry point.
pub struct Compiler;

impl Compiler {
    /// Compile the modules of `ast`. The tree is rewritten in place.
    ///
    /// Returns an error only for broken invariants; user mistakes end up
    /// in the result's diagnostics with no program.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn compile(ast: &mut Ast, options: &CompilerOptions) -> Result<CompilationResult> {
        let mut diagnostics = Diagnostics::new();

        let resolved = {
            let _span = info_span!("resolve").entered();
            ResolutionPass::new(&options.entry_point).run(ast)?
        };
        debug!(symbols = resolved.symbols.len(), "resolution finished");
        diagnostics.extend(resolved.diagnostics);
        if diagnostics.has_errors() {
            return Ok(Self::failed(diagnostics, 0));
        }
        // before folding hides the mixed operands
        types::float_widening_warnings(ast, &mut diagnostics)?;

        let optimized = {
            let _span = info_span!("optimize").entered();
            Optimizer::new(options).run(ast)?
        };
        for warning in optimized.diagnostics.warnings() {
            debug!(message = %warning.message, "optimizer warning");
        }
        diagnostics.extend(optimized.diagnostics);
        if diagnostics.has_errors() {
            return Ok(Self::failed(diagnostics, optimized.passes));
        }

        let program = {
            let _span = info_span!("lower").entered();
            stmt::lower_program(ast)?
        };

        Ok(CompilationResult {
            program: Some(program),
            diagnostics,
            optimizer_passes: optimized.passes,
        })
    }

    fn failed(diagnostics: Diagnostics, optimizer_passes: usize) -> CompilationResult {
        debug!(errors = diagnostics.error_count(), "compilation aborted");
        CompilationResult {
            program: None,
            diagnostics,
            optimizer_passes,
        }
    }
}

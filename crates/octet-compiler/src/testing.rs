//! Helpers for lowering tests.

use octet_core::Result;

use crate::ast::{Ast, AstBuilder, StmtId};
use crate::bytecode::{Opcode, Program};
use crate::options::CompilerOptions;
use crate::resolve::ResolutionPass;
use crate::stmt;

/// Resolve and lower without optimizing, so the stream mirrors the tree
/// as built. Name diagnostics are ignored.
pub fn try_lower(mut ast: Ast) -> Result<Program> {
    let options = CompilerOptions::default();
    ResolutionPass::new(&options.entry_point).run(&mut ast)?;
    stmt::lower_program(&ast)
}

pub fn lower(ast: Ast) -> Program {
    try_lower(ast).expect("lowering failed")
}

/// Lower `stmts` as the body of `main.start`, with `decls` declared in
/// block `main`, and return the opcodes of the subroutine body.
pub fn start_opcodes(b: &mut AstBuilder, decls: Vec<StmtId>, stmts: Vec<StmtId>) -> Vec<Opcode> {
    let start = b.subroutine("start", vec![], vec![], stmts);
    let mut main_statements = decls;
    main_statements.push(start);
    let main = b.block("main", main_statements);
    let builder = std::mem::replace(b, AstBuilder::new("t.oct"));
    let program = lower(builder.module("t", vec![main]));
    program
        .opcodes()
        .skip_while(|&op| op != Opcode::StartProcdef)
        .skip(2)
        .take_while(|&op| op != Opcode::EndProcdef)
        .collect()
}

//! Blocks, subroutines, and the variables table.

use octet_core::{CompilerError, DataType, Result};

use super::StmtCompiler;
use crate::ast::{NodeRef, ScopeId, Stmt, StmtId, VarDeclKind};
use crate::bytecode::{Opcode, StorageClass, Variable};
use crate::types;

const KERNEL_BODY: &str = "kernel subroutines (with memory address) can't have a body";

impl StmtCompiler<'_> {
    /// Lower a module-level block into its own program block.
    ///
    /// Layout:
    /// ```text
    /// %variables          (block, subroutines, nested scopes)
    /// block.<name>:
    /// LINE
    /// [statements]
    /// [subroutines]
    /// ```
    pub fn lower_block(&mut self, id: StmtId) -> Result<()> {
        let ast = self.ast;
        let Stmt::Block(block) = ast.stmt(id) else {
            return Err(CompilerError::lowering("expected a block", ast.stmt_position(id)));
        };
        let scoped_name = ast.scoped_name(id)?;
        let address = block.address;
        self.emitter.begin_block(&scoped_name, &block.name, address);
        self.declare_variables(id)?;
        self.emitter.label(format!("block.{scoped_name}"));
        self.emitter.line(ast.stmt_position(id));
        self.lower_statements(&block.statements)?;
        self.lower_subroutines(&block.statements)
    }

    fn lower_subroutines(&mut self, statements: &[StmtId]) -> Result<()> {
        let ast = self.ast;
        for &id in statements {
            match ast.stmt(id) {
                Stmt::Subroutine(_) => self.lower_subroutine(id)?,
                Stmt::StatementList(list) => self.lower_subroutines(list)?,
                _ => {}
            }
        }
        Ok(())
    }

    /// Lower a subroutine body. The caller has already stored the
    /// arguments into the parameter variables.
    ///
    /// Layout:
    /// ```text
    /// <scoped name>:      (procedure label)
    /// START_PROCDEF
    /// LINE
    /// [statements]
    /// [nested subroutines]
    /// END_PROCDEF
    /// ```
    ///
    /// A subroutine at a fixed address only becomes a memory pointer.
    fn lower_subroutine(&mut self, id: StmtId) -> Result<()> {
        let ast = self.ast;
        let position = ast.stmt_position(id);
        let Stmt::Subroutine(sub) = ast.stmt(id) else {
            return Err(CompilerError::lowering("expected a subroutine", position));
        };
        let scoped_name = ast.scoped_name(id)?;

        if let Some(address) = sub.asm_address {
            if !sub.statements.is_empty() {
                return Err(CompilerError::lowering(
                    format!("{KERNEL_BODY}: {scoped_name}"),
                    position,
                ));
            }
            self.emitter
                .memory_pointer(scoped_name, address, DataType::UByte);
            return Ok(());
        }

        self.emitter.proc_label(scoped_name);
        self.emitter.emit(Opcode::StartProcdef);
        self.emitter.line(position);
        self.lower_statements(&sub.statements)?;
        self.lower_subroutines(&sub.statements)?;
        self.emitter.emit(Opcode::EndProcdef);
        Ok(())
    }

    /// Enter every variable declared in `scope` or below into the current
    /// block's table. Constants are folded into their uses and get no
    /// storage.
    fn declare_variables(&mut self, scope: StmtId) -> Result<()> {
        let ast = self.ast;
        for id in ast.statements_under(scope) {
            let Stmt::VarDecl(decl) = ast.stmt(id) else {
                continue;
            };
            let storage = match decl.kind {
                VarDeclKind::Const => continue,
                VarDeclKind::Memory => {
                    let address = self.expr().memory_address(decl, ast.stmt_position(id))?;
                    StorageClass::MemoryMapped(address)
                }
                VarDeclKind::Var => {
                    if ast.defining_subroutine(NodeRef::Stmt(id))?.is_some() {
                        StorageClass::StackLocal
                    } else {
                        StorageClass::BlockStatic
                    }
                }
            };
            let initial = match decl.value {
                Some(value) if decl.kind == VarDeclKind::Var => {
                    let literal = types::const_value(ast, value)?;
                    literal.and_then(|lit| lit.to_value())
                }
                _ => None,
            };
            self.emitter.variable(Variable {
                name: ast.scoped_name(id)?,
                datatype: decl.datatype,
                storage,
                size: types::memory_size(ast, decl)?,
                initial,
            });
        }
        Ok(())
    }

    /// Whether `scope` declares `name` directly.
    pub(super) fn scope_member(&self, scope: StmtId, name: &str) -> Option<StmtId> {
        crate::scope::member(self.ast, ScopeId::Stmt(scope), name)
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::{AstBuilder, RegisterSet};
    use crate::bytecode::{Instruction, Opcode, StorageClass};
    use crate::testing::{lower, try_lower};
    use octet_core::{DataType, Value};

    #[test]
    fn block_layout() {
        let mut b = AstBuilder::new("t.oct");
        let nop = b.nop();
        let start = b.subroutine("start", vec![], vec![], vec![nop]);
        let main = b.block("main", vec![start]);
        let program = lower(b.module("t", vec![main]));

        let block = program.block("main").unwrap();
        let labels: Vec<_> = block.labels().collect();
        assert_eq!(labels, vec!["block.main", "main.start"]);
        assert!(matches!(
            block.instructions.iter().find(|i| i.label_name() == Some("main.start")),
            Some(Instruction::Label(label)) if label.is_procedure
        ));
        let opcodes: Vec<Opcode> = block.opcodes().collect();
        assert_eq!(opcodes.first(), Some(&Opcode::Line));
        assert_eq!(opcodes.last(), Some(&Opcode::EndProcdef));
        assert!(opcodes.contains(&Opcode::StartProcdef));
    }

    #[test]
    fn variables_table_storage_classes() {
        let mut b = AstBuilder::new("t.oct");
        let three = b.int(3);
        let counter = b.var(DataType::UByte, "counter", Some(three));
        let address = b.int(0xd020);
        let border = b.memory(DataType::UByte, "border", address);
        let ten = b.int(10);
        let limit = b.constant(DataType::UByte, "limit", ten);
        let local = b.var(DataType::UWord, "local", None);
        let start = b.subroutine("start", vec![], vec![], vec![local]);
        let main = b.block("main", vec![counter, border, limit, start]);
        let program = lower(b.module("t", vec![main]));

        let counter = program.variable("main.counter").unwrap();
        assert_eq!(counter.storage, StorageClass::BlockStatic);
        assert_eq!(counter.size, 1);
        assert_eq!(counter.initial, Some(Value::UByte(3)));

        let border = program.variable("main.border").unwrap();
        assert_eq!(border.storage, StorageClass::MemoryMapped(0xd020));

        let local = program.variable("main.start.local").unwrap();
        assert_eq!(local.storage, StorageClass::StackLocal);
        assert_eq!(local.size, 2);

        assert!(program.variable("main.limit").is_none());
    }

    #[test]
    fn kernel_subroutine_becomes_memory_pointer() {
        let mut b = AstBuilder::new("t.oct");
        let chrout = b.asm_subroutine(
            "chrout",
            Some(0xffd2),
            vec![],
            vec![],
            RegisterSet::empty(),
            vec![],
        );
        let start = b.subroutine("start", vec![], vec![], vec![]);
        let main = b.block("main", vec![chrout, start]);
        let program = lower(b.module("t", vec![main]));

        let block = program.block("main").unwrap();
        assert_eq!(block.memory_pointers.len(), 1);
        assert_eq!(block.memory_pointers[0].name, "main.chrout");
        assert_eq!(block.memory_pointers[0].address, 0xffd2);
        assert!(!block.labels().any(|l| l == "main.chrout"));
    }

    #[test]
    fn kernel_subroutine_with_body_is_rejected() {
        let mut b = AstBuilder::new("t.oct");
        let nop = b.asm(" rts");
        let chrout = b.asm_subroutine(
            "chrout",
            Some(0xffd2),
            vec![],
            vec![],
            RegisterSet::empty(),
            vec![nop],
        );
        let start = b.subroutine("start", vec![], vec![], vec![]);
        let main = b.block("main", vec![chrout, start]);
        let err = try_lower(b.module("t", vec![main])).unwrap_err();
        assert!(err.to_string().contains("can't have a body"));
    }
}

//! Programmatic tree construction.
//!
//! The parser that normally feeds the compiler lives outside this crate.
//! [`AstBuilder`] stands in for it: tests, benches and embedders build
//! trees node by node and get back a linked [`Ast`].
//!
//! Each statement is placed on its own source line, so diagnostics from
//! built trees still point somewhere distinct.

use std::sync::Arc;

use octet_core::{BranchCondition, DataType, Position, Register};

use super::{
    ArraySize, AssignTarget, Assignment, Ast, BinaryOp, Block, Directive, DirectiveArg, Expr,
    ExprId, ForLoop, FunctionCall, IdentifierRef, IncrDecr, JumpTarget, Label, Literal, ModuleId,
    PrefixOp, RegisterOrFlag, RegisterSet, Stmt, StmtId, Subroutine, SubroutineParameter, VarDecl,
    VarDeclKind,
};

pub struct AstBuilder {
    ast: Ast,
    file: Arc<str>,
    line: u32,
}

impl AstBuilder {
    pub fn new(file: &str) -> Self {
        Self {
            ast: Ast::new(),
            file: Arc::from(file),
            line: 1,
        }
    }

    /// Places the next nodes on `line`.
    pub fn at_line(&mut self, line: u32) -> &mut Self {
        self.line = line;
        self
    }

    /// Direct access to the tree under construction, e.g. for the heap store.
    pub fn ast_mut(&mut self) -> &mut Ast {
        &mut self.ast
    }

    fn position(&self) -> Position {
        Position::new(self.file.clone(), self.line, 0, 0)
    }

    fn expr(&mut self, kind: Expr) -> ExprId {
        let position = self.position();
        self.ast.add_expr(kind, position)
    }

    fn stmt(&mut self, kind: Stmt) -> StmtId {
        let position = self.position();
        self.line += 1;
        self.ast.add_stmt(kind, position)
    }

    fn scope(&mut self, statements: Vec<StmtId>) -> StmtId {
        let position = self.position();
        self.ast.add_anonymous_scope(statements, position)
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    pub fn literal(&mut self, literal: Literal) -> ExprId {
        self.expr(Expr::Literal(literal))
    }

    /// An integer literal of the narrowest type holding `value`; values
    /// outside word range become floats.
    pub fn int(&mut self, value: i64) -> ExprId {
        let literal = Literal::optimal_integer(value).unwrap_or(Literal::float(value as f64));
        self.literal(literal)
    }

    /// An integer literal of an explicit type, falling back to the
    /// narrowest type when `datatype` cannot hold `value`.
    pub fn typed(&mut self, datatype: DataType, value: i64) -> ExprId {
        match Literal::integer(datatype, value) {
            Some(literal) => self.literal(literal),
            None => self.int(value),
        }
    }

    pub fn float(&mut self, value: f64) -> ExprId {
        self.literal(Literal::float(value))
    }

    pub fn boolean(&mut self, value: bool) -> ExprId {
        self.literal(Literal::boolean(value))
    }

    pub fn string(&mut self, text: &str) -> ExprId {
        self.literal(Literal::str(text))
    }

    /// An array literal; `element` selects the array type.
    pub fn array(&mut self, element: DataType, elements: Vec<ExprId>) -> ExprId {
        let literal = Literal::array(element, elements.clone())
            .or_else(|| Literal::array(DataType::UByte, elements))
            .unwrap_or(Literal::boolean(false));
        self.literal(literal)
    }

    pub fn ident(&mut self, dotted: &str) -> ExprId {
        self.expr(Expr::Identifier(IdentifierRef::new(dotted)))
    }

    pub fn register(&mut self, register: Register) -> ExprId {
        self.expr(Expr::Register(register))
    }

    pub fn binary(&mut self, left: ExprId, op: BinaryOp, right: ExprId) -> ExprId {
        self.expr(Expr::Binary { left, op, right })
    }

    pub fn prefix(&mut self, op: PrefixOp, operand: ExprId) -> ExprId {
        self.expr(Expr::Prefix { op, operand })
    }

    pub fn call(&mut self, name: &str, args: Vec<ExprId>) -> ExprId {
        let target = self.ident(name);
        self.expr(Expr::FunctionCall(FunctionCall { target, args }))
    }

    pub fn index(&mut self, array: &str, index: ExprId) -> ExprId {
        let array = self.ident(array);
        self.expr(Expr::ArrayIndexed { array, index })
    }

    pub fn range(&mut self, from: ExprId, to: ExprId, step: Option<ExprId>) -> ExprId {
        self.expr(Expr::Range { from, to, step })
    }

    pub fn cast(&mut self, expression: ExprId, datatype: DataType) -> ExprId {
        self.expr(Expr::TypeCast {
            expression,
            datatype,
        })
    }

    pub fn mem_read(&mut self, address: ExprId) -> ExprId {
        self.expr(Expr::DirectMemoryRead { address })
    }

    // ========================================================================
    // Declarations
    // ========================================================================

    fn decl(
        &mut self,
        kind: VarDeclKind,
        datatype: DataType,
        name: &str,
        array_size: Option<ArraySize>,
        value: Option<ExprId>,
    ) -> StmtId {
        self.stmt(Stmt::VarDecl(VarDecl {
            kind,
            datatype,
            array_size,
            name: name.to_string(),
            value,
            auto_generated: false,
        }))
    }

    pub fn var(&mut self, datatype: DataType, name: &str, value: Option<ExprId>) -> StmtId {
        self.decl(VarDeclKind::Var, datatype, name, None, value)
    }

    pub fn constant(&mut self, datatype: DataType, name: &str, value: ExprId) -> StmtId {
        self.decl(VarDeclKind::Const, datatype, name, None, Some(value))
    }

    /// A variable mapped at a fixed memory address.
    pub fn memory(&mut self, datatype: DataType, name: &str, address: ExprId) -> StmtId {
        self.decl(VarDeclKind::Memory, datatype, name, None, Some(address))
    }

    /// An array, string or matrix variable with an explicit size.
    pub fn array_var(
        &mut self,
        datatype: DataType,
        name: &str,
        size: ExprId,
        value: Option<ExprId>,
    ) -> StmtId {
        let size = ArraySize { x: size, y: None };
        self.decl(VarDeclKind::Var, datatype, name, Some(size), value)
    }

    pub fn matrix_var(&mut self, name: &str, x: ExprId, y: ExprId) -> StmtId {
        let size = ArraySize { x, y: Some(y) };
        self.decl(VarDeclKind::Var, DataType::MatrixUb, name, Some(size), None)
    }

    pub fn label(&mut self, name: &str) -> StmtId {
        self.stmt(Stmt::Label(Label {
            name: name.to_string(),
        }))
    }

    // ========================================================================
    // Assignments
    // ========================================================================

    pub fn target_var(&mut self, name: &str) -> AssignTarget {
        AssignTarget::Identifier(self.ident(name))
    }

    pub fn target_register(&mut self, register: Register) -> AssignTarget {
        AssignTarget::Register(register)
    }

    pub fn target_index(&mut self, array: &str, index: ExprId) -> AssignTarget {
        AssignTarget::ArrayIndexed(self.index(array, index))
    }

    pub fn target_memory(&mut self, address: ExprId) -> AssignTarget {
        AssignTarget::Memory(address)
    }

    pub fn assign(&mut self, target: AssignTarget, value: ExprId) -> StmtId {
        self.assign_many(vec![target], value)
    }

    /// One value stored into several targets, as with multi-value asm returns.
    pub fn assign_many(&mut self, targets: Vec<AssignTarget>, value: ExprId) -> StmtId {
        self.stmt(Stmt::Assignment(Assignment {
            targets,
            aug_op: None,
            value,
        }))
    }

    /// `target op= value`
    pub fn aug_assign(&mut self, target: AssignTarget, op: BinaryOp, value: ExprId) -> StmtId {
        self.stmt(Stmt::Assignment(Assignment {
            targets: vec![target],
            aug_op: Some(op),
            value,
        }))
    }

    pub fn incr(&mut self, target: AssignTarget) -> StmtId {
        self.stmt(Stmt::PostIncrDecr {
            target,
            op: IncrDecr::Incr,
        })
    }

    pub fn decr(&mut self, target: AssignTarget) -> StmtId {
        self.stmt(Stmt::PostIncrDecr {
            target,
            op: IncrDecr::Decr,
        })
    }

    // ========================================================================
    // Control flow
    // ========================================================================

    pub fn call_stmt(&mut self, name: &str, args: Vec<ExprId>) -> StmtId {
        let target = self.ident(name);
        self.stmt(Stmt::FunctionCall(FunctionCall { target, args }))
    }

    pub fn if_else(
        &mut self,
        condition: ExprId,
        true_part: Vec<StmtId>,
        else_part: Vec<StmtId>,
    ) -> StmtId {
        let true_part = self.scope(true_part);
        let else_part = self.scope(else_part);
        self.stmt(Stmt::If {
            condition,
            true_part,
            else_part,
        })
    }

    pub fn branch(
        &mut self,
        condition: BranchCondition,
        true_part: Vec<StmtId>,
        else_part: Vec<StmtId>,
    ) -> StmtId {
        let true_part = self.scope(true_part);
        let else_part = self.scope(else_part);
        self.stmt(Stmt::Branch {
            condition,
            true_part,
            else_part,
        })
    }

    /// `for [decl_type] var in iterable { body }`
    pub fn for_loop(
        &mut self,
        decl_type: Option<DataType>,
        var: &str,
        iterable: ExprId,
        body: Vec<StmtId>,
    ) -> StmtId {
        let loop_var = Some(self.ident(var));
        let body = self.scope(body);
        self.stmt(Stmt::For(ForLoop {
            loop_register: None,
            decl_type,
            loop_var,
            iterable,
            body,
        }))
    }

    /// `for var in from to to { body }` over an already declared variable.
    pub fn for_range(&mut self, var: &str, from: i64, to: i64, body: Vec<StmtId>) -> StmtId {
        let from = self.int(from);
        let to = self.int(to);
        let range = self.range(from, to, None);
        self.for_loop(None, var, range, body)
    }

    pub fn for_register(
        &mut self,
        register: Register,
        iterable: ExprId,
        body: Vec<StmtId>,
    ) -> StmtId {
        let body = self.scope(body);
        self.stmt(Stmt::For(ForLoop {
            loop_register: Some(register),
            decl_type: None,
            loop_var: None,
            iterable,
            body,
        }))
    }

    pub fn while_loop(&mut self, condition: ExprId, body: Vec<StmtId>) -> StmtId {
        let body = self.scope(body);
        self.stmt(Stmt::While { condition, body })
    }

    pub fn repeat(&mut self, body: Vec<StmtId>, until: ExprId) -> StmtId {
        let body = self.scope(body);
        self.stmt(Stmt::Repeat { body, until })
    }

    pub fn ret(&mut self, values: Vec<ExprId>) -> StmtId {
        self.stmt(Stmt::Return { values })
    }

    pub fn brk(&mut self) -> StmtId {
        self.stmt(Stmt::Break)
    }

    pub fn cont(&mut self) -> StmtId {
        self.stmt(Stmt::Continue)
    }

    pub fn jump(&mut self, target: &str) -> StmtId {
        let target = self.ident(target);
        self.stmt(Stmt::Jump(JumpTarget::Identifier(target)))
    }

    pub fn jump_address(&mut self, address: u16) -> StmtId {
        self.stmt(Stmt::Jump(JumpTarget::Address(address)))
    }

    pub fn nop(&mut self) -> StmtId {
        self.stmt(Stmt::Nop)
    }

    pub fn asm(&mut self, assembly: &str) -> StmtId {
        self.stmt(Stmt::InlineAssembly {
            assembly: assembly.to_string(),
        })
    }

    pub fn directive(&mut self, name: &str, args: Vec<DirectiveArg>) -> StmtId {
        self.stmt(Stmt::Directive(Directive {
            name: name.to_string(),
            args,
        }))
    }

    // ========================================================================
    // Scopes
    // ========================================================================

    pub fn subroutine(
        &mut self,
        name: &str,
        parameters: Vec<(&str, DataType)>,
        return_types: Vec<DataType>,
        statements: Vec<StmtId>,
    ) -> StmtId {
        self.stmt(Stmt::Subroutine(Subroutine {
            name: name.to_string(),
            parameters: parameters
                .into_iter()
                .map(|(name, datatype)| SubroutineParameter {
                    name: name.to_string(),
                    datatype,
                })
                .collect(),
            return_types,
            asm_address: None,
            asm_parameter_registers: Vec::new(),
            asm_return_registers: Vec::new(),
            asm_clobbers: RegisterSet::empty(),
            statements,
        }))
    }

    /// A subroutine whose parameters and results live in registers or
    /// status flags. With an `address` it names an external routine and
    /// must have no body.
    pub fn asm_subroutine(
        &mut self,
        name: &str,
        address: Option<u16>,
        parameters: Vec<(&str, DataType, RegisterOrFlag)>,
        returns: Vec<(DataType, RegisterOrFlag)>,
        clobbers: RegisterSet,
        statements: Vec<StmtId>,
    ) -> StmtId {
        let mut params = Vec::new();
        let mut param_registers = Vec::new();
        for (name, datatype, register) in parameters {
            params.push(SubroutineParameter {
                name: name.to_string(),
                datatype,
            });
            param_registers.push(register);
        }
        let (return_types, return_registers) = returns.into_iter().unzip();
        self.stmt(Stmt::Subroutine(Subroutine {
            name: name.to_string(),
            parameters: params,
            return_types,
            asm_address: address,
            asm_parameter_registers: param_registers,
            asm_return_registers: return_registers,
            asm_clobbers: clobbers,
            statements,
        }))
    }

    pub fn block(&mut self, name: &str, statements: Vec<StmtId>) -> StmtId {
        self.stmt(Stmt::Block(Block {
            name: name.to_string(),
            address: None,
            statements,
        }))
    }

    pub fn block_at(&mut self, name: &str, address: u16, statements: Vec<StmtId>) -> StmtId {
        self.stmt(Stmt::Block(Block {
            name: name.to_string(),
            address: Some(address),
            statements,
        }))
    }

    // ========================================================================
    // Modules
    // ========================================================================

    pub fn add_module(&mut self, name: &str, statements: Vec<StmtId>) -> ModuleId {
        let position = Position::new(self.file.clone(), 1, 0, 0);
        let module = self.ast.add_module(name, position);
        self.ast.module_mut(module).statements = statements;
        module
    }

    /// Links and returns the tree.
    pub fn finish(mut self) -> Ast {
        self.ast.relink();
        self.ast
    }

    /// Shorthand for a single-module program.
    pub fn module(mut self, name: &str, statements: Vec<StmtId>) -> Ast {
        self.add_module(name, statements);
        self.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{NodeRef, ScopeId};

    #[test]
    fn statements_get_distinct_lines() {
        let mut b = AstBuilder::new("lines.oct");
        let first = b.var(DataType::UByte, "a", None);
        let second = b.var(DataType::UByte, "b", None);
        let main = b.block("main", vec![first, second]);
        let ast = b.module("prog", vec![main]);
        assert_eq!(ast.stmt_position(first).line, 1);
        assert_eq!(ast.stmt_position(second).line, 2);
    }

    #[test]
    fn if_parts_are_anonymous_scopes() {
        let mut b = AstBuilder::new("t.oct");
        let cond = b.boolean(true);
        let call = b.call_stmt("a", vec![]);
        let stmt = b.if_else(cond, vec![call], vec![]);
        let main = b.block("main", vec![stmt]);
        let ast = b.module("prog", vec![main]);

        let Stmt::If { true_part, .. } = ast.stmt(stmt) else {
            panic!("expected if");
        };
        assert!(matches!(ast.stmt(*true_part), Stmt::AnonymousScope(_)));
        assert_eq!(
            ast.defining_scope(NodeRef::Stmt(call)),
            Ok(ScopeId::Stmt(*true_part))
        );
    }

    #[test]
    fn asm_subroutine_splits_registers() {
        let mut b = AstBuilder::new("t.oct");
        let a = RegisterOrFlag::Register(Register::A);
        let sub = b.asm_subroutine(
            "chrout",
            Some(0xffd2),
            vec![("char", DataType::UByte, a)],
            vec![],
            RegisterSet::A,
            vec![],
        );
        let ast = b.module("prog", vec![sub]);
        let sub = ast.stmt(sub).as_subroutine().unwrap();
        assert!(sub.is_asm());
        assert_eq!(sub.parameters[0].name, "char");
        assert_eq!(
            sub.asm_parameter_registers,
            vec![RegisterOrFlag::Register(Register::A)]
        );
    }
}

//! Statement nodes.

use bitflags::bitflags;
use octet_core::{BranchCondition, DataType, Register, StatusFlag};

use super::expr::FunctionCall;
use super::{ExprId, StmtId};

/// A statement. Child statements and expressions are referenced by id.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Directive(Directive),
    Block(Block),
    VarDecl(VarDecl),
    Label(Label),
    Assignment(Assignment),
    PostIncrDecr {
        target: AssignTarget,
        op: IncrDecr,
    },
    Jump(JumpTarget),
    FunctionCall(FunctionCall),
    /// `if condition {..} else {..}`; both parts are anonymous scopes.
    If {
        condition: ExprId,
        true_part: StmtId,
        else_part: StmtId,
    },
    /// `if_cs {..} else {..}` and friends; both parts are anonymous scopes.
    Branch {
        condition: BranchCondition,
        true_part: StmtId,
        else_part: StmtId,
    },
    For(ForLoop),
    While {
        condition: ExprId,
        body: StmtId,
    },
    Repeat {
        body: StmtId,
        until: ExprId,
    },
    Return {
        values: Vec<ExprId>,
    },
    Break,
    Continue,
    Subroutine(Subroutine),
    InlineAssembly {
        assembly: String,
    },
    AnonymousScope(AnonymousScope),
    /// Zero or more statements spliced in place of one; carries no scope.
    StatementList(Vec<StmtId>),
    Nop,
}

impl Stmt {
    /// Whether this statement opens a name scope.
    pub fn is_scope(&self) -> bool {
        matches!(
            self,
            Stmt::Block(_) | Stmt::Subroutine(_) | Stmt::AnonymousScope(_)
        )
    }

    /// The name this statement declares, if any.
    pub fn declared_name(&self) -> Option<&str> {
        match self {
            Stmt::Block(b) => Some(&b.name),
            Stmt::VarDecl(v) => Some(&v.name),
            Stmt::Label(l) => Some(&l.name),
            Stmt::Subroutine(s) => Some(&s.name),
            Stmt::AnonymousScope(a) => Some(&a.name),
            _ => None,
        }
    }

    /// The owned statement list of a scope or splice.
    pub fn statements(&self) -> Option<&Vec<StmtId>> {
        match self {
            Stmt::Block(b) => Some(&b.statements),
            Stmt::Subroutine(s) => Some(&s.statements),
            Stmt::AnonymousScope(a) => Some(&a.statements),
            Stmt::StatementList(list) => Some(list),
            _ => None,
        }
    }

    pub fn statements_mut(&mut self) -> Option<&mut Vec<StmtId>> {
        match self {
            Stmt::Block(b) => Some(&mut b.statements),
            Stmt::Subroutine(s) => Some(&mut s.statements),
            Stmt::AnonymousScope(a) => Some(&mut a.statements),
            Stmt::StatementList(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_var_decl(&self) -> Option<&VarDecl> {
        match self {
            Stmt::VarDecl(decl) => Some(decl),
            _ => None,
        }
    }

    pub fn as_subroutine(&self) -> Option<&Subroutine> {
        match self {
            Stmt::Subroutine(sub) => Some(sub),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    /// Directive name including the `%`, e.g. `%breakpoint`.
    pub name: String,
    pub args: Vec<DirectiveArg>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DirectiveArg {
    Str(String),
    Name(String),
    Int(i64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub name: String,
    /// Fixed load address, if the block is pinned.
    pub address: Option<u16>,
    pub statements: Vec<StmtId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarDeclKind {
    Var,
    Const,
    /// Memory-mapped at the address given by the value.
    Memory,
}

/// Size specification of an array or matrix declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct ArraySize {
    pub x: ExprId,
    /// Second dimension, for matrices.
    pub y: Option<ExprId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub kind: VarDeclKind,
    pub datatype: DataType,
    pub array_size: Option<ArraySize>,
    pub name: String,
    pub value: Option<ExprId>,
    /// Declared by the compiler rather than by the program.
    pub auto_generated: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub name: String,
}

/// Where an assignment or increment stores its value.
#[derive(Debug, Clone, PartialEq)]
pub enum AssignTarget {
    Register(Register),
    /// Identifier expression naming a variable.
    Identifier(ExprId),
    /// Array-indexed expression.
    ArrayIndexed(ExprId),
    /// `@(address)`; the id is the address expression.
    Memory(ExprId),
}

impl AssignTarget {
    pub fn expr(&self) -> Option<ExprId> {
        match self {
            AssignTarget::Register(_) => None,
            AssignTarget::Identifier(id)
            | AssignTarget::ArrayIndexed(id)
            | AssignTarget::Memory(id) => Some(*id),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub targets: Vec<AssignTarget>,
    /// The operator of an augmented assignment (`x += v`).
    pub aug_op: Option<super::BinaryOp>,
    pub value: ExprId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IncrDecr {
    Incr,
    Decr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JumpTarget {
    Address(u16),
    /// Identifier expression naming a label or subroutine.
    Identifier(ExprId),
    /// A label synthesized by the compiler itself.
    Generated(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForLoop {
    pub loop_register: Option<Register>,
    /// Datatype of a loop variable declared by the loop itself.
    pub decl_type: Option<DataType>,
    /// Identifier expression naming the loop variable.
    pub loop_var: Option<ExprId>,
    pub iterable: ExprId,
    /// Anonymous scope.
    pub body: StmtId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubroutineParameter {
    pub name: String,
    pub datatype: DataType,
}

/// Where an asm subroutine takes a parameter or leaves a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegisterOrFlag {
    Register(Register),
    Flag(StatusFlag),
}

bitflags! {
    /// A set of CPU registers, such as the ones a subroutine clobbers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RegisterSet: u8 {
        const A = 0b001;
        const X = 0b010;
        const Y = 0b100;
    }
}

impl RegisterSet {
    pub fn of(register: Register) -> RegisterSet {
        match register {
            Register::A => RegisterSet::A,
            Register::X => RegisterSet::X,
            Register::Y => RegisterSet::Y,
            Register::AX => RegisterSet::A | RegisterSet::X,
            Register::AY => RegisterSet::A | RegisterSet::Y,
            Register::XY => RegisterSet::X | RegisterSet::Y,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Subroutine {
    pub name: String,
    pub parameters: Vec<SubroutineParameter>,
    pub return_types: Vec<DataType>,
    /// Address of an external ("kernel") routine; such subroutines have no body.
    pub asm_address: Option<u16>,
    pub asm_parameter_registers: Vec<RegisterOrFlag>,
    pub asm_return_registers: Vec<RegisterOrFlag>,
    pub asm_clobbers: RegisterSet,
    pub statements: Vec<StmtId>,
}

impl Subroutine {
    /// Whether parameters are passed in registers or flags rather than memory.
    pub fn is_asm(&self) -> bool {
        self.asm_address.is_some() || !self.asm_parameter_registers.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnonymousScope {
    /// Generated, unique per tree.
    pub name: String,
    pub statements: Vec<StmtId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_set_of_pairs() {
        assert_eq!(
            RegisterSet::of(Register::AX),
            RegisterSet::A | RegisterSet::X
        );
        assert!(RegisterSet::of(Register::XY).contains(RegisterSet::X));
        assert!(!RegisterSet::of(Register::AY).contains(RegisterSet::X));
    }

    #[test]
    fn scopes_and_names() {
        let label = Stmt::Label(Label {
            name: "loop".into(),
        });
        assert!(!label.is_scope());
        assert_eq!(label.declared_name(), Some("loop"));

        let block = Stmt::Block(Block {
            name: "main".into(),
            address: None,
            statements: vec![],
        });
        assert!(block.is_scope());
        assert!(block.statements().is_some());
        assert!(Stmt::Nop.statements().is_none());
    }
}

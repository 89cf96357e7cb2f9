//! Instructions and labels of the lowered instruction stream.

use std::fmt;

use octet_core::Value;

use super::Opcode;

/// A jump target in the instruction stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub name: String,
    /// Starts a subroutine rather than marking a point inside one.
    pub is_procedure: bool,
}

/// One operation with its optional immediate arguments and label operands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub opcode: Opcode,
    pub arg: Option<Value>,
    pub arg2: Option<Value>,
    /// Variable, register, jump target or verbatim text the operation
    /// refers to.
    pub call_label: Option<String>,
    pub call_label2: Option<String>,
}

impl Operation {
    pub fn new(opcode: Opcode) -> Self {
        Self {
            opcode,
            arg: None,
            arg2: None,
            call_label: None,
            call_label2: None,
        }
    }

    pub fn with_arg(mut self, arg: Value) -> Self {
        self.arg = Some(arg);
        self
    }

    pub fn with_arg2(mut self, arg: Value) -> Self {
        self.arg2 = Some(arg);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.call_label = Some(label.into());
        self
    }

    pub fn with_label2(mut self, label: impl Into<String>) -> Self {
        self.call_label2 = Some(label.into());
        self
    }
}

/// An element of the instruction stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    Label(Label),
    Op(Operation),
}

impl Instruction {
    pub fn opcode(&self) -> Option<Opcode> {
        match self {
            Instruction::Op(op) => Some(op.opcode),
            Instruction::Label(_) => None,
        }
    }

    pub fn as_operation(&self) -> Option<&Operation> {
        match self {
            Instruction::Op(op) => Some(op),
            Instruction::Label(_) => None,
        }
    }

    pub fn label_name(&self) -> Option<&str> {
        match self {
            Instruction::Label(label) => Some(&label.name),
            Instruction::Op(_) => None,
        }
    }
}

impl From<Operation> for Instruction {
    fn from(op: Operation) -> Self {
        Instruction::Op(op)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.opcode == Opcode::Line {
            return write!(f, "_line {}", self.call_label.as_deref().unwrap_or(""));
        }
        write!(f, "    {}", self.opcode.name().to_lowercase())?;
        if let Some(arg) = &self.arg {
            write!(f, "  {arg}")?;
        }
        if let Some(arg) = &self.arg2 {
            write!(f, "  {arg}")?;
        }
        if let Some(label) = &self.call_label {
            write!(f, "  {label}")?;
        }
        if let Some(label) = &self.call_label2 {
            write!(f, "  {label}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Label(label) if label.is_procedure => write!(f, "\n{}:", label.name),
            Instruction::Label(label) => write!(f, "{}:", label.name),
            Instruction::Op(op) => op.fmt(f),
        }
    }
}

//! The lowered program: one block of instructions and variables per
//! top-level block of the source.

use std::fmt;

use octet_core::{DataType, Value};

use super::{Instruction, Opcode};

/// Where a variable lives at run time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageClass {
    /// Declared inside a subroutine.
    StackLocal,
    /// Declared at block level; lives for the whole program.
    BlockStatic,
    /// Mapped onto a fixed machine address.
    MemoryMapped(u16),
}

/// An entry of the variables table.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    /// Fully scoped name, as used by the instructions.
    pub name: String,
    pub datatype: DataType,
    pub storage: StorageClass,
    /// Bytes of storage.
    pub size: usize,
    pub initial: Option<Value>,
}

/// A named machine address, such as the entry of an external routine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryPointer {
    pub name: String,
    pub address: u16,
    pub datatype: DataType,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgramBlock {
    pub scoped_name: String,
    pub name: String,
    /// Load address requested for the block.
    pub address: Option<u16>,
    pub instructions: Vec<Instruction>,
    pub variables: Vec<Variable>,
    pub memory_pointers: Vec<MemoryPointer>,
}

impl ProgramBlock {
    pub fn new(
        scoped_name: impl Into<String>,
        name: impl Into<String>,
        address: Option<u16>,
    ) -> Self {
        Self {
            scoped_name: scoped_name.into(),
            name: name.into(),
            address,
            ..Self::default()
        }
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name == name)
    }

    pub fn opcodes(&self) -> impl Iterator<Item = Opcode> + '_ {
        self.instructions.iter().filter_map(Instruction::opcode)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> + '_ {
        self.instructions.iter().filter_map(Instruction::label_name)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    pub name: String,
    pub blocks: Vec<ProgramBlock>,
}

impl Program {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            blocks: Vec::new(),
        }
    }

    pub fn block(&self, scoped_name: &str) -> Option<&ProgramBlock> {
        self.blocks.iter().find(|b| b.scoped_name == scoped_name)
    }

    /// Every variable of every block.
    pub fn variables(&self) -> impl Iterator<Item = &Variable> + '_ {
        self.blocks.iter().flat_map(|b| b.variables.iter())
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables().find(|v| v.name == name)
    }

    /// The whole instruction stream, block after block.
    pub fn instructions(&self) -> impl Iterator<Item = &Instruction> + '_ {
        self.blocks.iter().flat_map(|b| b.instructions.iter())
    }

    pub fn opcodes(&self) -> impl Iterator<Item = Opcode> + '_ {
        self.instructions().filter_map(Instruction::opcode)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> + '_ {
        self.instructions().filter_map(Instruction::label_name)
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.datatype)?;
        match self.storage {
            StorageClass::StackLocal => f.write_str(" local")?,
            StorageClass::BlockStatic => f.write_str(" static")?,
            StorageClass::MemoryMapped(address) => write!(f, " @ ${address:04x}")?,
        }
        write!(f, " [{}]", self.size)?;
        if let Some(value) = &self.initial {
            write!(f, " = {value}")?;
        }
        Ok(())
    }
}

impl fmt::Display for ProgramBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%block {}", self.scoped_name)?;
        if let Some(address) = self.address {
            write!(f, " ${address:04x}")?;
        }
        writeln!(f)?;
        if !self.variables.is_empty() {
            writeln!(f, "%variables")?;
            for var in &self.variables {
                writeln!(f, "    {var}")?;
            }
            writeln!(f, "%end_variables")?;
        }
        if !self.memory_pointers.is_empty() {
            writeln!(f, "%memorypointers")?;
            for ptr in &self.memory_pointers {
                writeln!(f, "    {} {} ${:04x}", ptr.name, ptr.datatype, ptr.address)?;
            }
            writeln!(f, "%end_memorypointers")?;
        }
        writeln!(f, "%instructions")?;
        for instruction in &self.instructions {
            writeln!(f, "{instruction}")?;
        }
        writeln!(f, "%end_instructions")?;
        writeln!(f, "%end_block")
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "; program {}", self.name)?;
        for block in &self.blocks {
            writeln!(f)?;
            block.fmt(f)?;
        }
        Ok(())
    }
}

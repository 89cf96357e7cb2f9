//! Stack machine operation codes.
//!
//! The target is a stack machine: operations pop their operands and push
//! their result. Most opcodes come in one flavour per datatype; the
//! `*_for` constructors below pick the flavour for a [`DataType`] and
//! return `None` when the datatype has no such operation.

use std::fmt;

use num_enum::{IntoPrimitive, TryFromPrimitive};
use octet_core::DataType;

macro_rules! opcodes {
    ($( $(#[$meta:meta])* $variant:ident => $name:literal, )*) => {
        /// Stack machine operation codes.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
        #[repr(u8)]
        pub enum Opcode {
            $( $(#[$meta])* $variant, )*
        }

        impl Opcode {
            /// Every opcode, in encoding order.
            pub const ALL: &'static [Opcode] = &[$(Opcode::$variant),*];

            /// Mnemonic used in listings.
            pub fn name(self) -> &'static str {
                match self {
                    $( Opcode::$variant => $name, )*
                }
            }
        }
    };
}

opcodes! {
    // =========================================================================
    // Push
    // =========================================================================
    /// Push the immediate argument.
    PushByte => "PUSH_BYTE",
    PushWord => "PUSH_WORD",
    PushFloat => "PUSH_FLOAT",
    /// Push the value stored at the address in the argument.
    PushMemUb => "PUSH_MEM_UB",
    PushMemB => "PUSH_MEM_B",
    PushMemUw => "PUSH_MEM_UW",
    PushMemW => "PUSH_MEM_W",
    PushMemFloat => "PUSH_MEM_FLOAT",
    /// Pop an address, push the byte stored there.
    PushMemRead => "PUSH_MEMREAD",
    /// Push the variable (or register) named by the label.
    PushVarByte => "PUSH_VAR_BYTE",
    PushVarWord => "PUSH_VAR_WORD",
    PushVarFloat => "PUSH_VAR_FLOAT",
    /// Push the address of the string or array variable named by the label.
    PushAddrHeapVar => "PUSH_ADDR_HEAPVAR",
    PushRegAxWord => "PUSH_REGAX_WORD",
    PushRegAyWord => "PUSH_REGAY_WORD",
    PushRegXyWord => "PUSH_REGXY_WORD",

    // =========================================================================
    // Discard
    // =========================================================================
    DiscardByte => "DISCARD_BYTE",
    DiscardWord => "DISCARD_WORD",
    DiscardFloat => "DISCARD_FLOAT",

    // =========================================================================
    // Pop
    // =========================================================================
    /// Pop into the address in the argument.
    PopMemByte => "POP_MEM_BYTE",
    PopMemWord => "POP_MEM_WORD",
    PopMemFloat => "POP_MEM_FLOAT",
    /// Pop an address, then pop a byte and store it there.
    PopMemWrite => "POP_MEMWRITE",
    /// Pop into the variable (or register) named by the label.
    PopVarByte => "POP_VAR_BYTE",
    PopVarWord => "POP_VAR_WORD",
    PopVarFloat => "POP_VAR_FLOAT",
    PopRegAxWord => "POP_REGAX_WORD",
    PopRegAyWord => "POP_REGAY_WORD",
    PopRegXyWord => "POP_REGXY_WORD",

    // =========================================================================
    // Indexed access
    // =========================================================================
    /// Pop an index, push that element of the array named by the label.
    ReadIndexedVarByte => "READ_INDEXED_VAR_BYTE",
    ReadIndexedVarWord => "READ_INDEXED_VAR_WORD",
    ReadIndexedVarFloat => "READ_INDEXED_VAR_FLOAT",
    /// Pop an index, then pop a value into that element.
    WriteIndexedVarByte => "WRITE_INDEXED_VAR_BYTE",
    WriteIndexedVarWord => "WRITE_INDEXED_VAR_WORD",
    WriteIndexedVarFloat => "WRITE_INDEXED_VAR_FLOAT",

    // =========================================================================
    // Arithmetic
    // =========================================================================
    AddUb => "ADD_UB",
    AddB => "ADD_B",
    AddUw => "ADD_UW",
    AddW => "ADD_W",
    AddF => "ADD_F",
    SubUb => "SUB_UB",
    SubB => "SUB_B",
    SubUw => "SUB_UW",
    SubW => "SUB_W",
    SubF => "SUB_F",
    MulUb => "MUL_UB",
    MulB => "MUL_B",
    MulUw => "MUL_UW",
    MulW => "MUL_W",
    MulF => "MUL_F",
    IdivUb => "IDIV_UB",
    IdivB => "IDIV_B",
    IdivUw => "IDIV_UW",
    IdivW => "IDIV_W",
    DivF => "DIV_F",
    RemainderUb => "REMAINDER_UB",
    RemainderUw => "REMAINDER_UW",
    PowUb => "POW_UB",
    PowB => "POW_B",
    PowUw => "POW_UW",
    PowW => "POW_W",
    PowF => "POW_F",
    NegB => "NEG_B",
    NegW => "NEG_W",
    NegF => "NEG_F",
    AbsB => "ABS_B",
    AbsW => "ABS_W",
    AbsF => "ABS_F",

    // =========================================================================
    // Shifts on the stack top
    // =========================================================================
    ShiftedlByte => "SHIFTEDL_BYTE",
    ShiftedlWord => "SHIFTEDL_WORD",
    ShiftedrUbyte => "SHIFTEDR_UBYTE",
    ShiftedrSbyte => "SHIFTEDR_SBYTE",
    ShiftedrUword => "SHIFTEDR_UWORD",
    ShiftedrSword => "SHIFTEDR_SWORD",

    // =========================================================================
    // Bitwise
    // =========================================================================
    BitandByte => "BITAND_BYTE",
    BitandWord => "BITAND_WORD",
    BitorByte => "BITOR_BYTE",
    BitorWord => "BITOR_WORD",
    BitxorByte => "BITXOR_BYTE",
    BitxorWord => "BITXOR_WORD",
    InvByte => "INV_BYTE",
    InvWord => "INV_WORD",

    // =========================================================================
    // Shifts and rotates in place
    // =========================================================================
    ShlByte => "SHL_BYTE",
    ShlWord => "SHL_WORD",
    ShrUbyte => "SHR_UBYTE",
    ShrSbyte => "SHR_SBYTE",
    ShrUword => "SHR_UWORD",
    ShrSword => "SHR_SWORD",
    RolByte => "ROL_BYTE",
    RolWord => "ROL_WORD",
    RorByte => "ROR_BYTE",
    RorWord => "ROR_WORD",
    Rol2Byte => "ROL2_BYTE",
    Rol2Word => "ROL2_WORD",
    Ror2Byte => "ROR2_BYTE",
    Ror2Word => "ROR2_WORD",

    // =========================================================================
    // Logical
    // =========================================================================
    AndByte => "AND_BYTE",
    AndWord => "AND_WORD",
    OrByte => "OR_BYTE",
    OrWord => "OR_WORD",
    XorByte => "XOR_BYTE",
    XorWord => "XOR_WORD",
    NotByte => "NOT_BYTE",
    NotWord => "NOT_WORD",

    // =========================================================================
    // Increment and decrement
    // =========================================================================
    IncVarUb => "INC_VAR_UB",
    IncVarB => "INC_VAR_B",
    IncVarUw => "INC_VAR_UW",
    IncVarW => "INC_VAR_W",
    IncVarF => "INC_VAR_F",
    DecVarUb => "DEC_VAR_UB",
    DecVarB => "DEC_VAR_B",
    DecVarUw => "DEC_VAR_UW",
    DecVarW => "DEC_VAR_W",
    DecVarF => "DEC_VAR_F",
    /// Pop an index, increment that element of the array named by the label.
    IncIndexedVarUb => "INC_INDEXED_VAR_UB",
    IncIndexedVarB => "INC_INDEXED_VAR_B",
    IncIndexedVarUw => "INC_INDEXED_VAR_UW",
    IncIndexedVarW => "INC_INDEXED_VAR_W",
    IncIndexedVarFloat => "INC_INDEXED_VAR_FLOAT",
    DecIndexedVarUb => "DEC_INDEXED_VAR_UB",
    DecIndexedVarB => "DEC_INDEXED_VAR_B",
    DecIndexedVarUw => "DEC_INDEXED_VAR_UW",
    DecIndexedVarW => "DEC_INDEXED_VAR_W",
    DecIndexedVarFloat => "DEC_INDEXED_VAR_FLOAT",
    /// Increment the byte at the address in the argument.
    IncMemory => "INC_MEMORY",
    DecMemory => "DEC_MEMORY",
    /// Pop an address, increment the byte stored there.
    PopIncMemory => "POP_INC_MEMORY",
    PopDecMemory => "POP_DEC_MEMORY",

    // =========================================================================
    // Bytes and words
    // =========================================================================
    /// Pop a word, push its high byte.
    Msb => "MSB",
    /// Pop a low and a high byte, push the word made of them.
    Mkword => "MKWORD",

    // =========================================================================
    // Casts
    // =========================================================================
    CastUbToB => "CAST_UB_TO_B",
    CastUbToUw => "CAST_UB_TO_UW",
    CastUbToW => "CAST_UB_TO_W",
    CastUbToF => "CAST_UB_TO_F",
    CastBToUb => "CAST_B_TO_UB",
    CastBToUw => "CAST_B_TO_UW",
    CastBToW => "CAST_B_TO_W",
    CastBToF => "CAST_B_TO_F",
    CastUwToUb => "CAST_UW_TO_UB",
    CastUwToB => "CAST_UW_TO_B",
    CastUwToW => "CAST_UW_TO_W",
    CastUwToF => "CAST_UW_TO_F",
    CastWToUb => "CAST_W_TO_UB",
    CastWToB => "CAST_W_TO_B",
    CastWToUw => "CAST_W_TO_UW",
    CastWToF => "CAST_W_TO_F",
    CastFToUb => "CAST_F_TO_UB",
    CastFToB => "CAST_F_TO_B",
    CastFToUw => "CAST_F_TO_UW",
    CastFToW => "CAST_F_TO_W",

    // =========================================================================
    // Comparisons
    // =========================================================================
    /// Pop two values, push 1 if the relation holds, else 0.
    LessUb => "LESS_UB",
    LessB => "LESS_B",
    LessUw => "LESS_UW",
    LessW => "LESS_W",
    LessF => "LESS_F",
    GreaterUb => "GREATER_UB",
    GreaterB => "GREATER_B",
    GreaterUw => "GREATER_UW",
    GreaterW => "GREATER_W",
    GreaterF => "GREATER_F",
    LesseqUb => "LESSEQ_UB",
    LesseqB => "LESSEQ_B",
    LesseqUw => "LESSEQ_UW",
    LesseqW => "LESSEQ_W",
    LesseqF => "LESSEQ_F",
    GreatereqUb => "GREATEREQ_UB",
    GreatereqB => "GREATEREQ_B",
    GreatereqUw => "GREATEREQ_UW",
    GreatereqW => "GREATEREQ_W",
    GreatereqF => "GREATEREQ_F",
    EqualByte => "EQUAL_BYTE",
    EqualWord => "EQUAL_WORD",
    EqualF => "EQUAL_F",
    NotequalByte => "NOTEQUAL_BYTE",
    NotequalWord => "NOTEQUAL_WORD",
    NotequalF => "NOTEQUAL_F",
    /// Pop a value and compare it with the argument, setting the status flags.
    CmpUb => "CMP_UB",
    CmpB => "CMP_B",
    CmpUw => "CMP_UW",
    CmpW => "CMP_W",

    // =========================================================================
    // Control flow
    // =========================================================================
    /// Jump to the label, or to the address in the argument.
    Jump => "JUMP",
    Bcs => "BCS",
    Bcc => "BCC",
    Bz => "BZ",
    Bnz => "BNZ",
    Bneg => "BNEG",
    Bpos => "BPOS",
    Bvs => "BVS",
    Bvc => "BVC",
    /// Pop a byte, jump if it is zero.
    Jz => "JZ",
    Jnz => "JNZ",
    /// Pop a word, jump if it is zero.
    Jzw => "JZW",
    Jnzw => "JNZW",
    Call => "CALL",
    Return => "RETURN",
    /// Call the runtime routine numbered by the argument.
    Syscall => "SYSCALL",
    StartProcdef => "START_PROCDEF",
    EndProcdef => "END_PROCDEF",

    // =========================================================================
    // Miscellaneous
    // =========================================================================
    Nop => "NOP",
    Breakpoint => "BREAKPOINT",
    /// Source position marker; the label holds the position text.
    Line => "LINE",
    Sec => "SEC",
    Clc => "CLC",
    Sei => "SEI",
    Cli => "CLI",
    Rsave => "RSAVE",
    Rrestore => "RRESTORE",
    /// Save and restore just the X register around a call.
    Rsavex => "RSAVEX",
    Rrestorex => "RRESTOREX",
    /// Verbatim assembly text, carried in the label.
    InlineAssembly => "INLINE_ASSEMBLY",
}

impl Opcode {
    /// Conditional branches on the CPU status flags.
    pub fn is_branch(self) -> bool {
        matches!(
            self,
            Opcode::Bcs
                | Opcode::Bcc
                | Opcode::Bz
                | Opcode::Bnz
                | Opcode::Bneg
                | Opcode::Bpos
                | Opcode::Bvs
                | Opcode::Bvc
        )
    }

    /// Any instruction that can transfer control to a label.
    pub fn is_jump(self) -> bool {
        self.is_branch()
            || matches!(
                self,
                Opcode::Jump | Opcode::Jz | Opcode::Jnz | Opcode::Jzw | Opcode::Jnzw
            )
    }

    // =========================================================================
    // Per-datatype selection
    // =========================================================================

    pub fn push_for(dt: DataType) -> Option<Opcode> {
        by_width(dt, Opcode::PushByte, Opcode::PushWord, Opcode::PushFloat)
    }

    pub fn push_var_for(dt: DataType) -> Option<Opcode> {
        by_width(
            dt,
            Opcode::PushVarByte,
            Opcode::PushVarWord,
            Opcode::PushVarFloat,
        )
    }

    pub fn pop_var_for(dt: DataType) -> Option<Opcode> {
        by_width(
            dt,
            Opcode::PopVarByte,
            Opcode::PopVarWord,
            Opcode::PopVarFloat,
        )
    }

    pub fn pop_mem_for(dt: DataType) -> Option<Opcode> {
        by_width(
            dt,
            Opcode::PopMemByte,
            Opcode::PopMemWord,
            Opcode::PopMemFloat,
        )
    }

    pub fn discard_for(dt: DataType) -> Option<Opcode> {
        by_width(
            dt,
            Opcode::DiscardByte,
            Opcode::DiscardWord,
            Opcode::DiscardFloat,
        )
    }

    pub fn read_indexed_for(element: DataType) -> Option<Opcode> {
        by_width(
            element,
            Opcode::ReadIndexedVarByte,
            Opcode::ReadIndexedVarWord,
            Opcode::ReadIndexedVarFloat,
        )
    }

    pub fn write_indexed_for(element: DataType) -> Option<Opcode> {
        by_width(
            element,
            Opcode::WriteIndexedVarByte,
            Opcode::WriteIndexedVarWord,
            Opcode::WriteIndexedVarFloat,
        )
    }

    pub fn push_mem_for(dt: DataType) -> Option<Opcode> {
        by_type(
            dt,
            [
                Opcode::PushMemUb,
                Opcode::PushMemB,
                Opcode::PushMemUw,
                Opcode::PushMemW,
                Opcode::PushMemFloat,
            ],
        )
    }

    pub fn inc_var_for(dt: DataType) -> Option<Opcode> {
        by_type(
            dt,
            [
                Opcode::IncVarUb,
                Opcode::IncVarB,
                Opcode::IncVarUw,
                Opcode::IncVarW,
                Opcode::IncVarF,
            ],
        )
    }

    pub fn dec_var_for(dt: DataType) -> Option<Opcode> {
        by_type(
            dt,
            [
                Opcode::DecVarUb,
                Opcode::DecVarB,
                Opcode::DecVarUw,
                Opcode::DecVarW,
                Opcode::DecVarF,
            ],
        )
    }

    pub fn inc_indexed_for(element: DataType) -> Option<Opcode> {
        by_type(
            element,
            [
                Opcode::IncIndexedVarUb,
                Opcode::IncIndexedVarB,
                Opcode::IncIndexedVarUw,
                Opcode::IncIndexedVarW,
                Opcode::IncIndexedVarFloat,
            ],
        )
    }

    pub fn dec_indexed_for(element: DataType) -> Option<Opcode> {
        by_type(
            element,
            [
                Opcode::DecIndexedVarUb,
                Opcode::DecIndexedVarB,
                Opcode::DecIndexedVarUw,
                Opcode::DecIndexedVarW,
                Opcode::DecIndexedVarFloat,
            ],
        )
    }

    pub fn cmp_for(dt: DataType) -> Option<Opcode> {
        match dt {
            DataType::UByte => Some(Opcode::CmpUb),
            DataType::Byte => Some(Opcode::CmpB),
            DataType::UWord => Some(Opcode::CmpUw),
            DataType::Word => Some(Opcode::CmpW),
            _ => None,
        }
    }

    /// Jump taken when the popped condition is non-zero (`when_true`) or
    /// zero.
    pub fn conditional_jump_for(dt: DataType, when_true: bool) -> Option<Opcode> {
        match (dt.width(), when_true) {
            (1, true) => Some(Opcode::Jnz),
            (1, false) => Some(Opcode::Jz),
            (2, true) if dt.is_integer() => Some(Opcode::Jnzw),
            (2, false) if dt.is_integer() => Some(Opcode::Jzw),
            _ => None,
        }
    }
}

fn by_width(dt: DataType, byte: Opcode, word: Opcode, float: Opcode) -> Option<Opcode> {
    match dt {
        dt if dt.is_byte() => Some(byte),
        dt if dt.is_word() => Some(word),
        DataType::Float => Some(float),
        _ => None,
    }
}

/// `ops` in the order UBYTE, BYTE, UWORD, WORD, FLOAT.
fn by_type(dt: DataType, ops: [Opcode; 5]) -> Option<Opcode> {
    match dt {
        DataType::UByte => Some(ops[0]),
        DataType::Byte => Some(ops[1]),
        DataType::UWord => Some(ops[2]),
        DataType::Word => Some(ops[3]),
        DataType::Float => Some(ops[4]),
        _ => None,
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_repr() {
        assert_eq!(u8::from(Opcode::PushByte), 0);
        let last = usize::from(u8::from(Opcode::InlineAssembly));
        assert_eq!(Opcode::ALL.len(), last + 1);
    }

    #[test]
    fn opcode_from_u8() {
        for (index, &op) in Opcode::ALL.iter().enumerate() {
            assert_eq!(Opcode::try_from(index as u8).unwrap(), op);
        }
        assert!(Opcode::try_from(u8::MAX).is_err());
    }

    #[test]
    fn opcode_name() {
        assert_eq!(Opcode::PushVarWord.name(), "PUSH_VAR_WORD");
        assert_eq!(Opcode::CastUbToF.to_string(), "CAST_UB_TO_F");
        assert_eq!(Opcode::Jnzw.name(), "JNZW");
    }

    #[test]
    fn names_are_unique() {
        let mut names: Vec<_> = Opcode::ALL.iter().map(|op| op.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), Opcode::ALL.len());
    }

    #[test]
    fn branches_are_jumps() {
        assert!(Opcode::Bcs.is_branch());
        assert!(!Opcode::Jz.is_branch());
        assert!(Opcode::Jz.is_jump());
        assert!(!Opcode::Call.is_jump());
    }

    #[test]
    fn datatype_selection() {
        assert_eq!(Opcode::push_for(DataType::Byte), Some(Opcode::PushByte));
        assert_eq!(
            Opcode::pop_var_for(DataType::UWord),
            Some(Opcode::PopVarWord)
        );
        assert_eq!(Opcode::inc_var_for(DataType::Float), Some(Opcode::IncVarF));
        assert_eq!(Opcode::push_mem_for(DataType::Word), Some(Opcode::PushMemW));
        assert_eq!(Opcode::push_var_for(DataType::Str), None);
        assert_eq!(Opcode::cmp_for(DataType::Float), None);
        assert_eq!(
            Opcode::conditional_jump_for(DataType::UWord, false),
            Some(Opcode::Jzw)
        );
        assert_eq!(Opcode::conditional_jump_for(DataType::Float, true), None);
    }
}

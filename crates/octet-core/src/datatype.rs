//! Datatypes of the target language and the machine registers they live in.
//!
//! The numeric model is the one of an 8/16-bit CPU with a software float
//! format: bytes and words come in signed and unsigned flavors, floats take
//! five bytes, and every aggregate (strings, arrays, matrices) lives in the
//! heap store and is addressed by a word.

use std::fmt;

// ============================================================================
// Datatypes
// ============================================================================

/// Static datatype of a value, variable or expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DataType {
    UByte,
    Byte,
    UWord,
    Word,
    Float,
    /// Plain zero-terminated string.
    Str,
    /// Pascal (length-prefixed) string.
    StrP,
    /// Screencode string.
    StrS,
    /// Pascal screencode string.
    StrPs,
    ArrayUb,
    ArrayB,
    ArrayUw,
    ArrayW,
    ArrayF,
    MatrixUb,
}

/// Every datatype that participates in arithmetic.
pub const NUMERIC_TYPES: [DataType; 5] = [
    DataType::UByte,
    DataType::Byte,
    DataType::UWord,
    DataType::Word,
    DataType::Float,
];

/// Every integer datatype.
pub const INTEGER_TYPES: [DataType; 4] = [
    DataType::UByte,
    DataType::Byte,
    DataType::UWord,
    DataType::Word,
];

impl DataType {
    pub fn is_byte(self) -> bool {
        matches!(self, DataType::UByte | DataType::Byte)
    }

    pub fn is_word(self) -> bool {
        matches!(self, DataType::UWord | DataType::Word)
    }

    pub fn is_integer(self) -> bool {
        self.is_byte() || self.is_word()
    }

    pub fn is_numeric(self) -> bool {
        self.is_integer() || self == DataType::Float
    }

    pub fn is_signed(self) -> bool {
        matches!(self, DataType::Byte | DataType::Word | DataType::Float)
    }

    pub fn is_string(self) -> bool {
        matches!(
            self,
            DataType::Str | DataType::StrP | DataType::StrS | DataType::StrPs
        )
    }

    /// Arrays and matrices.
    pub fn is_array(self) -> bool {
        matches!(
            self,
            DataType::ArrayUb
                | DataType::ArrayB
                | DataType::ArrayUw
                | DataType::ArrayW
                | DataType::ArrayF
                | DataType::MatrixUb
        )
    }

    /// Whether a value of this type can be iterated over by a `for` loop.
    pub fn is_iterable(self) -> bool {
        self.is_string() || self.is_array()
    }

    /// Whether the value lives in the heap store instead of inline.
    pub fn is_heap_type(self) -> bool {
        self.is_iterable()
    }

    /// The type of a single element when indexing into this type.
    ///
    /// Returns `None` for scalars, which cannot be indexed.
    pub fn element_type(self) -> Option<DataType> {
        match self {
            DataType::Str
            | DataType::StrP
            | DataType::StrS
            | DataType::StrPs
            | DataType::ArrayUb
            | DataType::MatrixUb => Some(DataType::UByte),
            DataType::ArrayB => Some(DataType::Byte),
            DataType::ArrayUw => Some(DataType::UWord),
            DataType::ArrayW => Some(DataType::Word),
            DataType::ArrayF => Some(DataType::Float),
            _ => None,
        }
    }

    /// The array type holding elements of `element`.
    pub fn array_of(element: DataType) -> Option<DataType> {
        match element {
            DataType::UByte => Some(DataType::ArrayUb),
            DataType::Byte => Some(DataType::ArrayB),
            DataType::UWord => Some(DataType::ArrayUw),
            DataType::Word => Some(DataType::ArrayW),
            DataType::Float => Some(DataType::ArrayF),
            _ => None,
        }
    }

    /// Size in bytes of a scalar of this type.
    pub fn scalar_size(self) -> Option<usize> {
        match self {
            DataType::UByte | DataType::Byte => Some(1),
            DataType::UWord | DataType::Word => Some(2),
            DataType::Float => Some(5),
            _ => None,
        }
    }

    /// Inclusive value range of an integer type.
    pub fn integer_range(self) -> Option<(i64, i64)> {
        match self {
            DataType::UByte => Some((0, 255)),
            DataType::Byte => Some((-128, 127)),
            DataType::UWord => Some((0, 65535)),
            DataType::Word => Some((-32768, 32767)),
            _ => None,
        }
    }

    /// Whether `value` is representable in this integer type.
    pub fn holds(self, value: i64) -> bool {
        self.integer_range()
            .is_some_and(|(lo, hi)| value >= lo && value <= hi)
    }

    /// Width rank used to order numeric types: bytes, then words, then floats.
    pub fn width(self) -> u8 {
        match self {
            DataType::UByte | DataType::Byte => 1,
            DataType::UWord | DataType::Word => 2,
            DataType::Float => 5,
            _ => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DataType::UByte => "UBYTE",
            DataType::Byte => "BYTE",
            DataType::UWord => "UWORD",
            DataType::Word => "WORD",
            DataType::Float => "FLOAT",
            DataType::Str => "STR",
            DataType::StrP => "STR_P",
            DataType::StrS => "STR_S",
            DataType::StrPs => "STR_PS",
            DataType::ArrayUb => "ARRAY_UB",
            DataType::ArrayB => "ARRAY_B",
            DataType::ArrayUw => "ARRAY_UW",
            DataType::ArrayW => "ARRAY_W",
            DataType::ArrayF => "ARRAY_F",
            DataType::MatrixUb => "MATRIX_UB",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Arithmetic promotion
// ============================================================================

/// Result of promoting two numeric operands to a shared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommonType {
    pub datatype: DataType,
    /// An integer operand was widened into a float.
    pub converted_to_float: bool,
}

/// Message attached to the advisory raised when integer values are widened
/// into floats implicitly.
pub const IMPLICIT_FLOAT_WARNING: &str = "byte or word value implicitly converted to float. \
     Suggestion: use explicit cast as float, a float number, or revert to integer arithmetic";

/// The arithmetic-common type of two numeric operands.
///
/// Symmetric and never narrower than either input. Returns `None` when
/// either side is not numeric.
pub fn common_datatype(left: DataType, right: DataType) -> Option<CommonType> {
    use DataType::*;

    if !left.is_numeric() || !right.is_numeric() {
        return None;
    }
    let datatype = match (left, right) {
        (Float, _) | (_, Float) => Float,
        (Word, _) | (_, Word) => Word,
        (UWord, Byte) | (Byte, UWord) => Word,
        (UWord, _) | (_, UWord) => UWord,
        (Byte, _) | (_, Byte) => Byte,
        _ => UByte,
    };
    Some(CommonType {
        datatype,
        converted_to_float: datatype == Float && (left != Float || right != Float),
    })
}

// ============================================================================
// Registers and flags
// ============================================================================

/// CPU registers and register pairs addressable from source code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    A,
    X,
    Y,
    AX,
    AY,
    XY,
}

impl Register {
    pub fn is_pair(self) -> bool {
        matches!(self, Register::AX | Register::AY | Register::XY)
    }

    /// Whether this register (or pair) includes the X register.
    pub fn uses_x(self) -> bool {
        matches!(self, Register::X | Register::AX | Register::XY)
    }

    pub fn datatype(self) -> DataType {
        if self.is_pair() {
            DataType::UWord
        } else {
            DataType::UByte
        }
    }

    /// The low and high byte registers of a pair.
    pub fn halves(self) -> Option<(Register, Register)> {
        match self {
            Register::AX => Some((Register::A, Register::X)),
            Register::AY => Some((Register::A, Register::Y)),
            Register::XY => Some((Register::X, Register::Y)),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Register::A => "A",
            Register::X => "X",
            Register::Y => "Y",
            Register::AX => "AX",
            Register::AY => "AY",
            Register::XY => "XY",
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Processor status flags that can carry a boolean subroutine argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusFlag {
    Pc,
    Pz,
    Pv,
    Pn,
}

/// Condition tested by a branch statement (`if_cs`, `if_z`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BranchCondition {
    Cs,
    Cc,
    Eq,
    Z,
    Ne,
    Nz,
    Vs,
    Vc,
    Mi,
    Neg,
    Pl,
    Pos,
}

impl BranchCondition {
    /// The condition that holds exactly when `self` does not.
    pub fn complement(self) -> BranchCondition {
        use BranchCondition::*;
        match self {
            Cs => Cc,
            Cc => Cs,
            Eq | Z => Nz,
            Ne | Nz => Z,
            Vs => Vc,
            Vc => Vs,
            Mi | Neg => Pos,
            Pl | Pos => Neg,
        }
    }
}

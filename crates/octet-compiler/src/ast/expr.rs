//! Expression nodes.

use std::fmt;

use octet_core::{DataType, HeapId, Register, Value};
use ordered_float::OrderedFloat;

use super::ExprId;

/// An expression. Child expressions are referenced by id.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    Identifier(IdentifierRef),
    Register(Register),
    Prefix {
        op: PrefixOp,
        operand: ExprId,
    },
    Binary {
        left: ExprId,
        op: BinaryOp,
        right: ExprId,
    },
    /// `array[index]`; `array` is an identifier expression.
    ArrayIndexed {
        array: ExprId,
        index: ExprId,
    },
    FunctionCall(FunctionCall),
    /// `from to to [step step]`; a missing step means 1.
    Range {
        from: ExprId,
        to: ExprId,
        step: Option<ExprId>,
    },
    TypeCast {
        expression: ExprId,
        datatype: DataType,
    },
    /// `@(address)`
    DirectMemoryRead {
        address: ExprId,
    },
}

impl Expr {
    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Expr::Literal(lit) => Some(lit),
            _ => None,
        }
    }

    pub fn as_identifier(&self) -> Option<&IdentifierRef> {
        match self {
            Expr::Identifier(ident) => Some(ident),
            _ => None,
        }
    }
}

/// A call of a subroutine, label, or builtin function. Used both as an
/// expression and as a statement.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    /// Identifier expression naming the callee.
    pub target: ExprId,
    pub args: Vec<ExprId>,
}

/// A possibly dotted reference to a declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentifierRef {
    pub name: Vec<String>,
}

impl IdentifierRef {
    /// Split a dotted name (`main.start`) into its segments.
    pub fn new(dotted: &str) -> Self {
        Self {
            name: dotted.split('.').map(str::to_string).collect(),
        }
    }

    pub fn is_qualified(&self) -> bool {
        self.name.len() > 1
    }

    pub fn last(&self) -> &str {
        self.name.last().map(String::as_str).unwrap_or("")
    }

    pub fn joined(&self) -> String {
        self.name.join(".")
    }
}

impl fmt::Display for IdentifierRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.joined())
    }
}

// ============================================================================
// Operators
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrefixOp {
    Plus,
    Minus,
    Invert,
    Not,
}

impl PrefixOp {
    pub fn symbol(self) -> &'static str {
        match self {
            PrefixOp::Plus => "+",
            PrefixOp::Minus => "-",
            PrefixOp::Invert => "~",
            PrefixOp::Not => "not",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Rem,
    Pow,
    BitAnd,
    BitOr,
    BitXor,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Less,
    Greater,
    LessEq,
    GreaterEq,
    Equal,
    NotEqual,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::FloorDiv => "//",
            BinaryOp::Rem => "%",
            BinaryOp::Pow => "**",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Xor => "xor",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::Less => "<",
            BinaryOp::Greater => ">",
            BinaryOp::LessEq => "<=",
            BinaryOp::GreaterEq => ">=",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
        }
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Less
                | BinaryOp::Greater
                | BinaryOp::LessEq
                | BinaryOp::GreaterEq
                | BinaryOp::Equal
                | BinaryOp::NotEqual
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or | BinaryOp::Xor)
    }

    pub fn is_bitwise(self) -> bool {
        matches!(self, BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor)
    }

    pub fn is_shift(self) -> bool {
        matches!(self, BinaryOp::Shl | BinaryOp::Shr)
    }

    /// Arithmetic operators whose result type is the arithmetic-common type.
    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Pow | BinaryOp::Rem
        )
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

// ============================================================================
// Literals
// ============================================================================

/// The payload of a literal. Exactly one representation is present.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LiteralValue {
    Integer(i64),
    Float(OrderedFloat<f64>),
    Str(String),
    /// Array literal before it has been moved into the heap store.
    Array(Vec<ExprId>),
    Heap(HeapId),
}

/// A literal value with its datatype.
///
/// The datatype and payload are checked against each other on construction,
/// so a `Literal` can never hold, say, a float payload tagged `UBYTE`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Literal {
    datatype: DataType,
    value: LiteralValue,
}

impl Literal {
    /// Build a literal, returning `None` if the payload does not match the
    /// datatype.
    pub fn new(datatype: DataType, value: LiteralValue) -> Option<Literal> {
        let valid = match &value {
            LiteralValue::Integer(v) => datatype.holds(*v),
            LiteralValue::Float(_) => datatype == DataType::Float,
            LiteralValue::Str(_) => datatype.is_string(),
            LiteralValue::Array(_) => datatype.is_array(),
            LiteralValue::Heap(_) => datatype.is_heap_type(),
        };
        valid.then_some(Literal { datatype, value })
    }

    pub fn integer(datatype: DataType, value: i64) -> Option<Literal> {
        Literal::new(datatype, LiteralValue::Integer(value))
    }

    pub fn float(value: f64) -> Literal {
        Literal {
            datatype: DataType::Float,
            value: LiteralValue::Float(OrderedFloat(value)),
        }
    }

    /// The narrowest integer literal holding `value`.
    ///
    /// -128..255 is a byte, -32768..65535 a word; anything else overflows.
    pub fn optimal_integer(value: i64) -> Option<Literal> {
        let datatype = match value {
            0..=255 => DataType::UByte,
            -128..=-1 => DataType::Byte,
            256..=65535 => DataType::UWord,
            -32768..=-129 => DataType::Word,
            _ => return None,
        };
        Literal::integer(datatype, value)
    }

    /// Like [`Literal::optimal_integer`], but also accepts floats: whole
    /// numbers in word range become integers, everything else stays a float.
    pub fn optimal_numeric(value: f64) -> Literal {
        if value.fract() == 0.0 && (-32768.0..=65535.0).contains(&value) {
            if let Some(lit) = Literal::optimal_integer(value as i64) {
                return lit;
            }
        }
        Literal::float(value)
    }

    /// Booleans are encoded as UBYTE 1 and 0.
    pub fn boolean(value: bool) -> Literal {
        Literal {
            datatype: DataType::UByte,
            value: LiteralValue::Integer(value as i64),
        }
    }

    pub fn string(datatype: DataType, text: impl Into<String>) -> Option<Literal> {
        Literal::new(datatype, LiteralValue::Str(text.into()))
    }

    /// A plain `STR` literal.
    pub fn str(text: impl Into<String>) -> Literal {
        Literal {
            datatype: DataType::Str,
            value: LiteralValue::Str(text.into()),
        }
    }

    /// An array literal of `element` values.
    pub fn array(element: DataType, elements: Vec<ExprId>) -> Option<Literal> {
        Literal::new(DataType::array_of(element)?, LiteralValue::Array(elements))
    }

    pub fn heap(datatype: DataType, id: HeapId) -> Option<Literal> {
        Literal::new(datatype, LiteralValue::Heap(id))
    }

    /// A numeric literal of `datatype` holding `value`, if representable.
    pub fn numeric(datatype: DataType, value: f64) -> Option<Literal> {
        match datatype {
            DataType::Float => Some(Literal::float(value)),
            dt if dt.is_integer() && value.fract() == 0.0 => Literal::integer(dt, value as i64),
            _ => None,
        }
    }

    /// The same value as a literal of `target`, when that loses nothing.
    ///
    /// Integers move between integer types whose range holds the value and
    /// widen into FLOAT; nothing ever narrows.
    pub fn into_datatype(&self, target: DataType) -> Option<Literal> {
        if target == self.datatype {
            return Some(self.clone());
        }
        match (&self.value, target) {
            (LiteralValue::Integer(v), DataType::Float) => Some(Literal::float(*v as f64)),
            (LiteralValue::Integer(v), dt) if dt.is_integer() => Literal::integer(dt, *v),
            (LiteralValue::Str(_) | LiteralValue::Heap(_), dt)
                if self.datatype.is_string() && dt.is_string() =>
            {
                Literal::new(dt, self.value.clone())
            }
            _ => None,
        }
    }

    pub fn datatype(&self) -> DataType {
        self.datatype
    }

    pub fn value(&self) -> &LiteralValue {
        &self.value
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self.value {
            LiteralValue::Integer(v) => Some(v),
            _ => None,
        }
    }

    /// The numeric payload as a float, for integers and floats alike.
    pub fn as_f64(&self) -> Option<f64> {
        match self.value {
            LiteralValue::Integer(v) => Some(v as f64),
            LiteralValue::Float(v) => Some(v.0),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.datatype.is_numeric()
    }

    pub fn heap_id(&self) -> Option<HeapId> {
        match self.value {
            LiteralValue::Heap(id) => Some(id),
            _ => None,
        }
    }

    /// Truthiness of a numeric literal: anything non-zero is true.
    ///
    /// Strings and arrays are truthy when non-empty; callers holding a heap
    /// id must consult the heap store themselves, so this returns `None`
    /// for them.
    pub fn as_boolean(&self) -> Option<bool> {
        match &self.value {
            LiteralValue::Integer(v) => Some(*v != 0),
            LiteralValue::Float(v) => Some(v.0 != 0.0),
            LiteralValue::Str(s) => Some(!s.is_empty()),
            LiteralValue::Array(elements) => Some(!elements.is_empty()),
            LiteralValue::Heap(_) => None,
        }
    }

    /// Whether this is a numeric literal equal to `number`.
    pub fn is_number(&self, number: f64) -> bool {
        self.as_f64() == Some(number)
    }

    /// The immediate value for an instruction operand.
    pub fn to_value(&self) -> Option<Value> {
        match self.value {
            LiteralValue::Integer(v) => Value::integer(self.datatype, v).ok(),
            LiteralValue::Float(v) => Some(Value::Float(v)),
            LiteralValue::Heap(id) => Some(Value::Heap {
                datatype: self.datatype,
                id,
            }),
            LiteralValue::Str(_) | LiteralValue::Array(_) => None,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            LiteralValue::Integer(v) => write!(f, "{v}"),
            LiteralValue::Float(v) => write!(f, "{}", v.0),
            LiteralValue::Str(s) => write!(f, "{s:?}"),
            LiteralValue::Array(elements) => write!(f, "[{} elements]", elements.len()),
            LiteralValue::Heap(id) => write!(f, "heap#{id}"),
        }
    }
}

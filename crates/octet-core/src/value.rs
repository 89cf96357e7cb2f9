//! Typed immediate values carried by instructions and variable initializers.

use std::fmt;

use ordered_float::OrderedFloat;

use crate::datatype::DataType;
use crate::error::{CompilerError, Result};
use crate::heap::HeapId;

/// A value with its exact machine representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Value {
    UByte(u8),
    Byte(i8),
    UWord(u16),
    Word(i16),
    Float(OrderedFloat<f64>),
    /// Reference to a string or array in the heap store.
    Heap { datatype: DataType, id: HeapId },
}

impl Value {
    /// Build an integer value of the given datatype, rejecting values that do
    /// not fit.
    pub fn integer(datatype: DataType, value: i64) -> Result<Value> {
        let out_of_range = || CompilerError::ValueOutOfRange {
            value: value.to_string(),
            datatype,
        };
        if !datatype.holds(value) {
            return Err(out_of_range());
        }
        match datatype {
            DataType::UByte => Ok(Value::UByte(value as u8)),
            DataType::Byte => Ok(Value::Byte(value as i8)),
            DataType::UWord => Ok(Value::UWord(value as u16)),
            DataType::Word => Ok(Value::Word(value as i16)),
            _ => Err(out_of_range()),
        }
    }

    pub fn float(value: f64) -> Value {
        Value::Float(OrderedFloat(value))
    }

    /// Build a value of `datatype` from a number, converting floats to
    /// integers when the datatype asks for it.
    pub fn numeric(datatype: DataType, value: f64) -> Result<Value> {
        if datatype == DataType::Float {
            return Ok(Value::float(value));
        }
        if value.fract() != 0.0 {
            return Err(CompilerError::ValueOutOfRange {
                value: value.to_string(),
                datatype,
            });
        }
        Value::integer(datatype, value as i64)
    }

    pub fn datatype(&self) -> DataType {
        match self {
            Value::UByte(_) => DataType::UByte,
            Value::Byte(_) => DataType::Byte,
            Value::UWord(_) => DataType::UWord,
            Value::Word(_) => DataType::Word,
            Value::Float(_) => DataType::Float,
            Value::Heap { datatype, .. } => *datatype,
        }
    }

    /// The integer payload, if this is an integer value.
    pub fn as_integer(&self) -> Option<i64> {
        match *self {
            Value::UByte(v) => Some(v as i64),
            Value::Byte(v) => Some(v as i64),
            Value::UWord(v) => Some(v as i64),
            Value::Word(v) => Some(v as i64),
            _ => None,
        }
    }

    /// The numeric payload, if this is a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(v.0),
            other => other.as_integer().map(|v| v as f64),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::UByte(v) => write!(f, "ub:{v:02x}"),
            Value::Byte(v) => write!(f, "b:{v}"),
            Value::UWord(v) => write!(f, "uw:{v:04x}"),
            Value::Word(v) => write!(f, "w:{v}"),
            Value::Float(v) => write!(f, "f:{}", v.0),
            Value::Heap { datatype, id } => write!(f, "heap:{datatype}:{id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_respects_range() {
        assert_eq!(
            Value::integer(DataType::UByte, 255).unwrap(),
            Value::UByte(255)
        );
        assert_eq!(Value::integer(DataType::Word, -1).unwrap(), Value::Word(-1));
        assert!(Value::integer(DataType::UByte, 256).is_err());
        assert!(Value::integer(DataType::Byte, -129).is_err());
        assert!(Value::integer(DataType::Float, 1).is_err());
    }

    #[test]
    fn numeric_converts_whole_floats() {
        assert_eq!(
            Value::numeric(DataType::UWord, 1000.0).unwrap(),
            Value::UWord(1000)
        );
        assert!(Value::numeric(DataType::UWord, 1.5).is_err());
        assert_eq!(
            Value::numeric(DataType::Float, 1.5).unwrap(),
            Value::float(1.5)
        );
    }

    #[test]
    fn payload_accessors() {
        assert_eq!(Value::Byte(-5).as_integer(), Some(-5));
        assert_eq!(Value::float(2.5).as_integer(), None);
        assert_eq!(Value::UWord(7).as_f64(), Some(7.0));
        assert_eq!(Value::Word(3).datatype(), DataType::Word);
    }

    #[test]
    fn display() {
        assert_eq!(Value::UByte(10).to_string(), "ub:0a");
        assert_eq!(Value::UWord(0xc000).to_string(), "uw:c000");
        assert_eq!(Value::float(1.5).to_string(), "f:1.5");
    }
}

//! Content store for strings and arrays.
//!
//! Aggregate literals do not live in the AST; they are stored here and
//! referenced by [`HeapId`]. Strings are interned (adding an equal string
//! twice yields the same id), arrays never are, since every array variable
//! needs its own storage.

use std::fmt;

use ordered_float::OrderedFloat;
use rustc_hash::FxHashMap;

use crate::datatype::DataType;
use crate::error::{CompilerError, Result};

/// Longest string the target can address with a byte index.
pub const MAX_STRING_LENGTH: usize = 255;

/// Identifier of a heap value. Ids start at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HeapId(u32);

impl HeapId {
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for HeapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A stored aggregate value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HeapValue {
    Str { datatype: DataType, text: String },
    IntArray {
        datatype: DataType,
        values: Vec<i32>,
    },
    FloatArray { values: Vec<OrderedFloat<f64>> },
}

impl HeapValue {
    pub fn datatype(&self) -> DataType {
        match self {
            HeapValue::Str { datatype, .. } | HeapValue::IntArray { datatype, .. } => *datatype,
            HeapValue::FloatArray { .. } => DataType::ArrayF,
        }
    }

    /// Number of characters or elements.
    pub fn len(&self) -> usize {
        match self {
            HeapValue::Str { text, .. } => text.chars().count(),
            HeapValue::IntArray { values, .. } => values.len(),
            HeapValue::FloatArray { values } => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The heap store of one compilation.
#[derive(Debug, Default)]
pub struct HeapValues {
    values: Vec<HeapValue>,
    interned: FxHashMap<(DataType, String), HeapId>,
}

impl HeapValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a string, reusing the id of an equal string of the same kind.
    pub fn add_string(&mut self, datatype: DataType, text: &str) -> Result<HeapId> {
        if !datatype.is_string() {
            return Err(CompilerError::HeapTypeMismatch {
                expected: DataType::Str,
                found: datatype,
            });
        }
        let length = text.chars().count();
        if length > MAX_STRING_LENGTH {
            return Err(CompilerError::StringTooLong { length });
        }
        if let Some(&id) = self.interned.get(&(datatype, text.to_string())) {
            return Ok(id);
        }
        let id = self.push(HeapValue::Str {
            datatype,
            text: text.to_string(),
        });
        self.interned.insert((datatype, text.to_string()), id);
        Ok(id)
    }

    /// Add an integer array. Never deduplicated.
    pub fn add_int_array(&mut self, datatype: DataType, values: Vec<i32>) -> Result<HeapId> {
        if !datatype.is_array() || datatype == DataType::ArrayF {
            return Err(CompilerError::HeapTypeMismatch {
                expected: DataType::ArrayUb,
                found: datatype,
            });
        }
        Ok(self.push(HeapValue::IntArray { datatype, values }))
    }

    /// Add a float array. Never deduplicated.
    pub fn add_float_array(&mut self, values: Vec<f64>) -> HeapId {
        self.push(HeapValue::FloatArray {
            values: values.into_iter().map(OrderedFloat).collect(),
        })
    }

    pub fn get(&self, id: HeapId) -> Result<&HeapValue> {
        (id.0 as usize)
            .checked_sub(1)
            .and_then(|index| self.values.get(index))
            .ok_or(CompilerError::UnknownHeapId { id })
    }

    /// Replace a stored value. The datatype must stay the same, and strings
    /// must keep their length.
    pub fn update(&mut self, id: HeapId, value: HeapValue) -> Result<()> {
        let current = self.get(id)?.clone();
        if current.datatype() != value.datatype() {
            return Err(CompilerError::HeapTypeMismatch {
                expected: current.datatype(),
                found: value.datatype(),
            });
        }
        if let (HeapValue::Str { .. }, HeapValue::Str { .. }) = (&current, &value) {
            if current.len() != value.len() {
                return Err(CompilerError::HeapLengthMismatch {
                    expected: current.len(),
                    found: value.len(),
                });
            }
        }
        if let HeapValue::Str { datatype, text } = current {
            self.interned.remove(&(datatype, text));
        }
        if let HeapValue::Str { datatype, text } = &value {
            self.interned.entry((*datatype, text.clone())).or_insert(id);
        }
        self.values[id.0 as usize - 1] = value;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// All stored values with their ids, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (HeapId, &HeapValue)> {
        self.values
            .iter()
            .enumerate()
            .map(|(index, value)| (HeapId(index as u32 + 1), value))
    }

    fn push(&mut self, value: HeapValue) -> HeapId {
        self.values.push(value);
        HeapId(self.values.len() as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_start_at_one() {
        let mut heap = HeapValues::new();
        let id = heap.add_string(DataType::Str, "hello").unwrap();
        assert_eq!(id.as_u32(), 1);
    }

    #[test]
    fn strings_are_interned() {
        let mut heap = HeapValues::new();
        let a = heap.add_string(DataType::Str, "hello").unwrap();
        let b = heap.add_string(DataType::Str, "hello").unwrap();
        let c = heap.add_string(DataType::StrS, "hello").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(heap.len(), 2);
    }

    #[test]
    fn arrays_are_never_interned() {
        let mut heap = HeapValues::new();
        let a = heap
            .add_int_array(DataType::ArrayUb, vec![1, 2, 3])
            .unwrap();
        let b = heap
            .add_int_array(DataType::ArrayUb, vec![1, 2, 3])
            .unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn long_strings_are_rejected() {
        let mut heap = HeapValues::new();
        let text = "x".repeat(256);
        assert!(matches!(
            heap.add_string(DataType::Str, &text),
            Err(CompilerError::StringTooLong { length: 256 })
        ));
        assert!(heap.add_string(DataType::Str, &"x".repeat(255)).is_ok());
    }

    #[test]
    fn unknown_id() {
        let heap = HeapValues::new();
        assert!(heap.get(HeapId(1)).is_err());
        assert!(heap.get(HeapId(0)).is_err());
    }

    #[test]
    fn update_keeps_type_and_length() {
        let mut heap = HeapValues::new();
        let id = heap.add_string(DataType::Str, "abc").unwrap();

        let same_length = HeapValue::Str {
            datatype: DataType::Str,
            text: "xyz".into(),
        };
        heap.update(id, same_length).unwrap();
        assert_eq!(heap.get(id).unwrap().len(), 3);

        let longer = HeapValue::Str {
            datatype: DataType::Str,
            text: "wxyz".into(),
        };
        assert!(heap.update(id, longer).is_err());

        let other_type = HeapValue::FloatArray { values: vec![] };
        assert!(heap.update(id, other_type).is_err());
    }

    #[test]
    fn updated_strings_are_interned_under_new_text() {
        let mut heap = HeapValues::new();
        let id = heap.add_string(DataType::Str, "abc").unwrap();
        heap.update(
            id,
            HeapValue::Str {
                datatype: DataType::Str,
                text: "xyz".into(),
            },
        )
        .unwrap();
        assert_eq!(heap.add_string(DataType::Str, "xyz").unwrap(), id);
        assert_ne!(heap.add_string(DataType::Str, "abc").unwrap(), id);
    }
}

//! Datatype conversions on the stack top.
//!
//! Three kinds of conversion appear in lowered code:
//!
//! - **widening**: operand promotion and argument passing; never loses
//!   information, so narrowing is an error
//! - **cast**: an explicit `as` in the source; any numeric pair
//! - **store**: the value of an assignment meeting its target; widening,
//!   plus taking the address of a string or array for a `uword` target

use octet_core::{CompilerError, DataType, Position, Result};

use crate::bytecode::Opcode;

/// How an assignment's value is brought to the target's datatype.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreConversion {
    /// The value already has the right representation.
    Direct,
    /// Convert the pushed value with this opcode.
    Convert(Opcode),
    /// Push the address of the string or array instead of its value.
    AddressOf,
}

/// The conversion opcode between two distinct numeric types.
///
/// `None` when the types are equal or either is not numeric.
pub fn cast_opcode(from: DataType, to: DataType) -> Option<Opcode> {
    use DataType::*;
    use Opcode::*;

    Some(match (from, to) {
        (UByte, Byte) => CastUbToB,
        (UByte, UWord) => CastUbToUw,
        (UByte, Word) => CastUbToW,
        (UByte, Float) => CastUbToF,
        (Byte, UByte) => CastBToUb,
        (Byte, UWord) => CastBToUw,
        (Byte, Word) => CastBToW,
        (Byte, Float) => CastBToF,
        (UWord, UByte) => CastUwToUb,
        (UWord, Byte) => CastUwToB,
        (UWord, Word) => CastUwToW,
        (UWord, Float) => CastUwToF,
        (Word, UByte) => CastWToUb,
        (Word, Byte) => CastWToB,
        (Word, UWord) => CastWToUw,
        (Word, Float) => CastWToF,
        (Float, UByte) => CastFToUb,
        (Float, Byte) => CastFToB,
        (Float, UWord) => CastFToUw,
        (Float, Word) => CastFToW,
        _ => return None,
    })
}

/// Implicit promotion of a `from` value to `to`.
///
/// A change of signedness at the same width reinterprets the bits and
/// needs no instruction.
pub fn widening(from: DataType, to: DataType, position: &Position) -> Result<Option<Opcode>> {
    if from == to {
        return Ok(None);
    }
    for dt in [from, to] {
        if !dt.is_numeric() {
            return Err(CompilerError::InvalidDatatype {
                datatype: dt,
                detail: format!("invalid conversion from {from} to {to}"),
                position: position.clone(),
            });
        }
    }
    if from.width() > to.width() {
        return Err(CompilerError::NarrowingConversion {
            from,
            to,
            position: position.clone(),
        });
    }
    if from.width() == to.width() {
        return Ok(None);
    }
    Ok(cast_opcode(from, to))
}

/// Explicit `value as datatype`.
pub fn cast(from: DataType, to: DataType, position: &Position) -> Result<Option<Opcode>> {
    if from == to {
        return Ok(None);
    }
    if !from.is_numeric() || !to.is_numeric() {
        return Err(CompilerError::InvalidDatatype {
            datatype: from,
            detail: format!("cannot cast {from} to {to}"),
            position: position.clone(),
        });
    }
    Ok(cast_opcode(from, to))
}

/// Bring an assigned value of type `value` to the target type `target`.
pub fn store(value: DataType, target: DataType, position: &Position) -> Result<StoreConversion> {
    if value.is_heap_type() && target == DataType::UWord {
        return Ok(StoreConversion::AddressOf);
    }
    if value == target && value.is_numeric() {
        return Ok(StoreConversion::Direct);
    }
    if !value.is_numeric() || !target.is_numeric() {
        return Err(CompilerError::lowering(
            format!("incompatible data types: cannot assign {value} to {target}"),
            position,
        ));
    }
    Ok(match widening(value, target, position)? {
        Some(opcode) => StoreConversion::Convert(opcode),
        None => StoreConversion::Direct,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos() -> Position {
        Position::synthetic()
    }

    #[test]
    fn widening_table() {
        use DataType::*;
        let widen = |from, to| widening(from, to, &pos()).unwrap();
        assert_eq!(widen(UByte, UWord), Some(Opcode::CastUbToUw));
        assert_eq!(widen(Byte, Word), Some(Opcode::CastBToW));
        assert_eq!(widen(Word, Float), Some(Opcode::CastWToF));
        assert_eq!(widen(UByte, Byte), None);
        assert_eq!(widen(Float, Float), None);
    }

    #[test]
    fn narrowing_is_an_error() {
        let error = widening(DataType::UWord, DataType::UByte, &pos()).unwrap_err();
        assert!(matches!(error, CompilerError::NarrowingConversion { .. }));
        assert!(widening(DataType::Float, DataType::Word, &pos()).is_err());
    }

    #[test]
    fn non_numeric_widening_is_an_error() {
        let error = widening(DataType::Str, DataType::UWord, &pos()).unwrap_err();
        assert!(matches!(error, CompilerError::InvalidDatatype { .. }));
    }

    #[test]
    fn casts_cover_every_numeric_pair() {
        let numeric = [
            DataType::UByte,
            DataType::Byte,
            DataType::UWord,
            DataType::Word,
            DataType::Float,
        ];
        for from in numeric {
            for to in numeric {
                let opcode = cast(from, to, &pos()).unwrap();
                assert_eq!(opcode.is_some(), from != to, "{from} -> {to}");
            }
        }
        assert!(cast(DataType::ArrayUb, DataType::UByte, &pos()).is_err());
    }

    #[test]
    fn store_conversions() {
        use DataType::*;
        let stored = |from, to| store(from, to, &pos()).unwrap();
        assert_eq!(stored(UByte, UByte), StoreConversion::Direct);
        assert_eq!(
            stored(Byte, UWord),
            StoreConversion::Convert(Opcode::CastBToUw)
        );
        assert_eq!(stored(Str, UWord), StoreConversion::AddressOf);
        assert_eq!(stored(ArrayF, UWord), StoreConversion::AddressOf);
        assert!(store(UWord, UByte, &pos()).is_err());
        assert!(store(Str, Str, &pos()).is_err());
        assert!(store(Float, Word, &pos()).is_err());
    }
}

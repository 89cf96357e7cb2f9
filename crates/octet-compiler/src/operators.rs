//! Opcode selection for operators.
//!
//! Binary operators are lowered on operands already promoted to a shared
//! operation datatype; these functions pick the opcode for that datatype.
//! Shifts by a constant amount and floor division have their own lowering
//! and are not handled here.

use octet_core::{CompilerError, DataType, Position, Result};

use crate::ast::{BinaryOp, PrefixOp};
use crate::bytecode::Opcode;

/// Message for `%` on signed operands, which the target cannot compute.
pub const SIGNED_REMAINDER: &str =
    "remainder of signed integers is not properly defined/implemented, use unsigned instead";

fn invalid(dt: DataType, op: &str, position: &Position) -> CompilerError {
    CompilerError::InvalidDatatype {
        datatype: dt,
        detail: format!("operator {op} not available for this datatype"),
        position: position.clone(),
    }
}

/// Pick from `[ubyte, byte, uword, word, float]` flavours.
fn typed(dt: DataType, ops: [Opcode; 5]) -> Option<Opcode> {
    let index = match dt {
        DataType::UByte => 0,
        DataType::Byte => 1,
        DataType::UWord => 2,
        DataType::Word => 3,
        DataType::Float => 4,
        _ => return None,
    };
    Some(ops[index])
}

/// Pick from `[byte, word, float]` flavours by width.
fn sized(dt: DataType, ops: [Option<Opcode>; 3]) -> Option<Opcode> {
    match dt {
        dt if dt.is_byte() => ops[0],
        dt if dt.is_word() => ops[1],
        DataType::Float => ops[2],
        _ => None,
    }
}

/// The opcode computing `left op right` with both operands of type `dt`.
pub fn binary_opcode(op: BinaryOp, dt: DataType, position: &Position) -> Result<Opcode> {
    use Opcode::*;

    let opcode = match op {
        BinaryOp::Add => typed(dt, [AddUb, AddB, AddUw, AddW, AddF]),
        BinaryOp::Sub => typed(dt, [SubUb, SubB, SubUw, SubW, SubF]),
        BinaryOp::Mul => typed(dt, [MulUb, MulB, MulUw, MulW, MulF]),
        BinaryOp::Pow => typed(dt, [PowUb, PowB, PowUw, PowW, PowF]),
        BinaryOp::Div | BinaryOp::FloorDiv => typed(dt, [IdivUb, IdivB, IdivUw, IdivW, DivF]),
        BinaryOp::Rem if matches!(dt, DataType::Byte | DataType::Word) => {
            return Err(CompilerError::unsupported(SIGNED_REMAINDER, position));
        }
        BinaryOp::Rem => match dt {
            DataType::UByte => Some(RemainderUb),
            DataType::UWord => Some(RemainderUw),
            _ => None,
        },
        BinaryOp::BitAnd => sized(dt, [Some(BitandByte), Some(BitandWord), None]),
        BinaryOp::BitOr => sized(dt, [Some(BitorByte), Some(BitorWord), None]),
        BinaryOp::BitXor => sized(dt, [Some(BitxorByte), Some(BitxorWord), None]),
        BinaryOp::And => sized(dt, [Some(AndByte), Some(AndWord), None]),
        BinaryOp::Or => sized(dt, [Some(OrByte), Some(OrWord), None]),
        BinaryOp::Xor => sized(dt, [Some(XorByte), Some(XorWord), None]),
        BinaryOp::Less => typed(dt, [LessUb, LessB, LessUw, LessW, LessF]),
        BinaryOp::Greater => typed(dt, [GreaterUb, GreaterB, GreaterUw, GreaterW, GreaterF]),
        BinaryOp::LessEq => typed(dt, [LesseqUb, LesseqB, LesseqUw, LesseqW, LesseqF]),
        BinaryOp::GreaterEq => {
            let flavours = [
                GreatereqUb,
                GreatereqB,
                GreatereqUw,
                GreatereqW,
                GreatereqF,
            ];
            typed(dt, flavours)
        }
        BinaryOp::Equal => sized(dt, [Some(EqualByte), Some(EqualWord), Some(EqualF)]),
        BinaryOp::NotEqual => {
            let flavours = [Some(NotequalByte), Some(NotequalWord), Some(NotequalF)];
            sized(dt, flavours)
        }
        BinaryOp::Shl | BinaryOp::Shr => return shift_opcode(op, dt, position),
    };
    opcode.ok_or_else(|| invalid(dt, op.symbol(), position))
}

/// One single-bit shift of the stack top.
pub fn shift_opcode(op: BinaryOp, dt: DataType, position: &Position) -> Result<Opcode> {
    let opcode = match (op, dt) {
        (BinaryOp::Shl, dt) if dt.is_byte() => Opcode::ShiftedlByte,
        (BinaryOp::Shl, dt) if dt.is_word() => Opcode::ShiftedlWord,
        (BinaryOp::Shr, DataType::UByte) => Opcode::ShiftedrUbyte,
        (BinaryOp::Shr, DataType::Byte) => Opcode::ShiftedrSbyte,
        (BinaryOp::Shr, DataType::UWord) => Opcode::ShiftedrUword,
        (BinaryOp::Shr, DataType::Word) => Opcode::ShiftedrSword,
        _ => return Err(invalid(dt, op.symbol(), position)),
    };
    Ok(opcode)
}

/// The opcode for a prefix operator, or `None` for unary plus.
///
/// Negating an unsigned value is the two's complement of its bits.
pub fn prefix_opcode(op: PrefixOp, dt: DataType, position: &Position) -> Result<Option<Opcode>> {
    let invalid = || invalid(dt, op.symbol(), position);
    let opcode = match op {
        PrefixOp::Plus if dt.is_numeric() => return Ok(None),
        PrefixOp::Plus => return Err(invalid()),
        PrefixOp::Minus => match dt {
            dt if dt.is_byte() => Opcode::NegB,
            dt if dt.is_word() => Opcode::NegW,
            DataType::Float => Opcode::NegF,
            _ => return Err(invalid()),
        },
        PrefixOp::Invert => match dt {
            dt if dt.is_byte() => Opcode::InvByte,
            dt if dt.is_word() => Opcode::InvWord,
            _ => return Err(invalid()),
        },
        PrefixOp::Not => match dt {
            dt if dt.is_byte() => Opcode::NotByte,
            dt if dt.is_word() => Opcode::NotWord,
            _ => return Err(invalid()),
        },
    };
    Ok(Some(opcode))
}

#[cfg(test)]
mod tests {
    use super::*;
    use DataType::*;

    fn pos() -> Position {
        Position::synthetic()
    }

    fn binary(op: BinaryOp, dt: DataType) -> Opcode {
        binary_opcode(op, dt, &pos()).unwrap()
    }

    fn shift(op: BinaryOp, dt: DataType) -> Opcode {
        shift_opcode(op, dt, &pos()).unwrap()
    }

    fn prefix(op: PrefixOp, dt: DataType) -> Option<Opcode> {
        prefix_opcode(op, dt, &pos()).unwrap()
    }

    #[test]
    fn arithmetic_by_datatype() {
        assert_eq!(binary(BinaryOp::Add, UByte), Opcode::AddUb);
        assert_eq!(binary(BinaryOp::Mul, Word), Opcode::MulW);
        assert_eq!(binary(BinaryOp::Div, UWord), Opcode::IdivUw);
        assert_eq!(binary(BinaryOp::Div, Float), Opcode::DivF);
        assert_eq!(binary(BinaryOp::Pow, Float), Opcode::PowF);
    }

    #[test]
    fn signed_remainder_is_rejected() {
        assert_eq!(binary(BinaryOp::Rem, UWord), Opcode::RemainderUw);
        for dt in [Byte, Word] {
            match binary_opcode(BinaryOp::Rem, dt, &pos()) {
                Err(CompilerError::Unsupported { what, .. }) => assert_eq!(what, SIGNED_REMAINDER),
                other => panic!("expected unsupported, got {other:?}"),
            }
        }
        assert!(binary_opcode(BinaryOp::Rem, Float, &pos()).is_err());
    }

    #[test]
    fn bitwise_and_logical_by_width() {
        assert_eq!(binary(BinaryOp::BitAnd, Byte), Opcode::BitandByte);
        assert_eq!(binary(BinaryOp::Xor, UWord), Opcode::XorWord);
        assert!(binary_opcode(BinaryOp::BitOr, Float, &pos()).is_err());
    }

    #[test]
    fn comparisons() {
        assert_eq!(binary(BinaryOp::Less, Byte), Opcode::LessB);
        assert_eq!(binary(BinaryOp::GreaterEq, Word), Opcode::GreatereqW);
        assert_eq!(binary(BinaryOp::Equal, UByte), Opcode::EqualByte);
        assert_eq!(binary(BinaryOp::NotEqual, Float), Opcode::NotequalF);
        assert!(binary_opcode(BinaryOp::Less, Str, &pos()).is_err());
    }

    #[test]
    fn shifts_keep_signedness() {
        assert_eq!(shift(BinaryOp::Shr, Byte), Opcode::ShiftedrSbyte);
        assert_eq!(shift(BinaryOp::Shl, UWord), Opcode::ShiftedlWord);
        assert!(shift_opcode(BinaryOp::Shl, Float, &pos()).is_err());
    }

    #[test]
    fn prefix_operators() {
        assert_eq!(prefix(PrefixOp::Plus, Word), None);
        assert_eq!(prefix(PrefixOp::Minus, UByte), Some(Opcode::NegB));
        assert_eq!(prefix(PrefixOp::Minus, Float), Some(Opcode::NegF));
        assert_eq!(prefix(PrefixOp::Not, UWord), Some(Opcode::NotWord));
        assert!(prefix_opcode(PrefixOp::Invert, Float, &pos()).is_err());
    }
}

//! Runtime routines reached through the `SYSCALL` opcode.
//!
//! Builtin functions without a dedicated opcode become a `SYSCALL` whose
//! argument is the routine number. Reductions over arrays (`min`, `sum`,
//! `any`, ...) have one routine per element type and expect the element
//! count pushed after the array address.

use std::fmt;

use num_enum::{IntoPrimitive, TryFromPrimitive};
use octet_core::DataType;

macro_rules! syscalls {
    (
        $first:ident = $start:literal => $first_name:literal,
        $( $variant:ident => $name:literal, )*
    ) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
        #[repr(u8)]
        pub enum Syscall {
            $first = $start,
            $( $variant, )*
        }

        impl Syscall {
            pub fn name(self) -> &'static str {
                match self {
                    Syscall::$first => $first_name,
                    $( Syscall::$variant => $name, )*
                }
            }

            fn by_name(name: &str) -> Option<Syscall> {
                match name {
                    $first_name => Some(Syscall::$first),
                    $( $name => Some(Syscall::$variant), )*
                    _ => None,
                }
            }
        }
    };
}

syscalls! {
    FuncSin = 64 => "FUNC_SIN",
    FuncSin8 => "FUNC_SIN8",
    FuncSin8u => "FUNC_SIN8U",
    FuncSin16 => "FUNC_SIN16",
    FuncSin16u => "FUNC_SIN16U",
    FuncCos => "FUNC_COS",
    FuncCos8 => "FUNC_COS8",
    FuncCos8u => "FUNC_COS8U",
    FuncCos16 => "FUNC_COS16",
    FuncCos16u => "FUNC_COS16U",
    FuncTan => "FUNC_TAN",
    FuncAtan => "FUNC_ATAN",
    FuncLn => "FUNC_LN",
    FuncLog2 => "FUNC_LOG2",
    FuncSqrt => "FUNC_SQRT",
    FuncRad => "FUNC_RAD",
    FuncDeg => "FUNC_DEG",
    FuncRound => "FUNC_ROUND",
    FuncFloor => "FUNC_FLOOR",
    FuncCeil => "FUNC_CEIL",
    FuncRnd => "FUNC_RND",
    FuncRndw => "FUNC_RNDW",
    FuncRndf => "FUNC_RNDF",
    FuncMemcopy => "FUNC_MEMCOPY",
    FuncMemset => "FUNC_MEMSET",
    FuncMemsetw => "FUNC_MEMSETW",
    LenStr => "FUNC_LEN_STR",
    LenStrp => "FUNC_LEN_STRP",
    AnyB => "FUNC_ANY_B",
    AnyW => "FUNC_ANY_W",
    AnyF => "FUNC_ANY_F",
    AllB => "FUNC_ALL_B",
    AllW => "FUNC_ALL_W",
    AllF => "FUNC_ALL_F",
    MinUb => "FUNC_MIN_UB",
    MinB => "FUNC_MIN_B",
    MinUw => "FUNC_MIN_UW",
    MinW => "FUNC_MIN_W",
    MinF => "FUNC_MIN_F",
    MaxUb => "FUNC_MAX_UB",
    MaxB => "FUNC_MAX_B",
    MaxUw => "FUNC_MAX_UW",
    MaxW => "FUNC_MAX_W",
    MaxF => "FUNC_MAX_F",
    SumUb => "FUNC_SUM_UB",
    SumB => "FUNC_SUM_B",
    SumUw => "FUNC_SUM_UW",
    SumW => "FUNC_SUM_W",
    SumF => "FUNC_SUM_F",
}

impl Syscall {
    /// The routine for a plain builtin function.
    pub fn for_function(function: &str) -> Option<Syscall> {
        Syscall::by_name(&format!("FUNC_{}", function.to_uppercase()))
    }

    /// The reduction routine of `function` (`min`, `max`, `sum`, `any`,
    /// `all`) for arrays of `element`. `any` and `all` only care about the
    /// element width.
    pub fn reduction(function: &str, element: DataType) -> Option<Syscall> {
        let suffix = match function {
            "any" | "all" => match element {
                dt if dt.is_byte() => "B",
                dt if dt.is_word() => "W",
                DataType::Float => "F",
                _ => return None,
            },
            _ => match element {
                DataType::UByte => "UB",
                DataType::Byte => "B",
                DataType::UWord => "UW",
                DataType::Word => "W",
                DataType::Float => "F",
                _ => return None,
            },
        };
        Syscall::by_name(&format!("FUNC_{}_{suffix}", function.to_uppercase()))
    }
}

impl fmt::Display for Syscall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbering_starts_after_vm_routines() {
        assert_eq!(u8::from(Syscall::FuncSin), 64);
        assert_eq!(Syscall::try_from(65).unwrap(), Syscall::FuncSin8);
    }

    #[test]
    fn function_lookup() {
        assert_eq!(Syscall::for_function("sqrt"), Some(Syscall::FuncSqrt));
        assert_eq!(Syscall::for_function("memsetw"), Some(Syscall::FuncMemsetw));
        assert_eq!(Syscall::for_function("swap"), None);
    }

    #[test]
    fn reductions_by_element_type() {
        assert_eq!(
            Syscall::reduction("sum", DataType::UWord),
            Some(Syscall::SumUw)
        );
        assert_eq!(
            Syscall::reduction("any", DataType::UByte),
            Some(Syscall::AnyB)
        );
        assert_eq!(
            Syscall::reduction("all", DataType::Float),
            Some(Syscall::AllF)
        );
        assert_eq!(Syscall::reduction("max", DataType::Str), None);
    }
}

//! The builtin function table.
//!
//! Builtin names resolve before any user declaration and can never be
//! redeclared. Each entry records whether a call has side effects, the
//! datatypes each parameter accepts, how the result type is derived, and,
//! for functions that can run at compile time, a constant evaluator.

use std::f64::consts::PI;

use octet_core::{CompilerError, DataType, INTEGER_TYPES, NUMERIC_TYPES, Position, Result};

use crate::ast::Literal;

const BYTES: &[DataType] = &[DataType::UByte, DataType::Byte];
const WORDS: &[DataType] = &[DataType::UWord, DataType::Word];
const UNSIGNED: &[DataType] = &[DataType::UByte, DataType::UWord];
const FLOAT: &[DataType] = &[DataType::Float];
const UBYTE: &[DataType] = &[DataType::UByte];
const UWORD: &[DataType] = &[DataType::UWord];
const ARRAYS: &[DataType] = &[
    DataType::ArrayUb,
    DataType::ArrayB,
    DataType::ArrayUw,
    DataType::ArrayW,
    DataType::ArrayF,
    DataType::MatrixUb,
];
const ITERABLES: &[DataType] = &[
    DataType::Str,
    DataType::StrP,
    DataType::StrS,
    DataType::StrPs,
    DataType::ArrayUb,
    DataType::ArrayB,
    DataType::ArrayUw,
    DataType::ArrayW,
    DataType::ArrayF,
    DataType::MatrixUb,
];
const ADDRESSES: &[DataType] = &[
    DataType::UWord,
    DataType::Str,
    DataType::StrP,
    DataType::StrS,
    DataType::StrPs,
    DataType::ArrayUb,
    DataType::ArrayB,
    DataType::ArrayUw,
    DataType::ArrayW,
    DataType::ArrayF,
    DataType::MatrixUb,
];

#[derive(Debug)]
pub struct BuiltinParam {
    pub name: &'static str,
    pub datatypes: &'static [DataType],
}

/// How the result datatype of a builtin call is determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnRule {
    /// The function produces no value.
    Nothing,
    Fixed(DataType),
    /// Derived from the datatype of the (single) argument.
    FromArgument,
}

/// A compile-time argument handed to a constant evaluator.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstArg {
    Number { datatype: DataType, value: f64 },
    Str(String),
    Array {
        datatype: DataType,
        values: Vec<f64>,
    },
}

impl ConstArg {
    fn number(&self) -> Option<f64> {
        match self {
            ConstArg::Number { value, .. } => Some(*value),
            _ => None,
        }
    }

    fn values(&self) -> Option<Vec<f64>> {
        match self {
            ConstArg::Array { values, .. } => Some(values.clone()),
            ConstArg::Str(text) => Some(text.chars().map(|c| c as u32 as f64).collect()),
            ConstArg::Number { .. } => None,
        }
    }
}

/// Evaluates a call with constant arguments; `Ok(None)` when the arguments
/// do not have the shape the function needs.
pub type ConstEvaluator = fn(&[ConstArg], &Position) -> Result<Option<Literal>>;

pub struct BuiltinFunction {
    pub name: &'static str,
    /// Has no side effects; a discarded call can be removed.
    pub pure: bool,
    pub params: &'static [BuiltinParam],
    pub returns: ReturnRule,
    pub const_eval: Option<ConstEvaluator>,
}

impl std::fmt::Debug for BuiltinFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuiltinFunction")
            .field("name", &self.name)
            .field("pure", &self.pure)
            .field("returns", &self.returns)
            .finish()
    }
}

impl BuiltinFunction {
    /// Result datatype for a call whose argument datatypes are known.
    pub fn return_type(&self, args: &[DataType]) -> Option<DataType> {
        match self.returns {
            ReturnRule::Nothing => None,
            ReturnRule::Fixed(dt) => Some(dt),
            ReturnRule::FromArgument => {
                let arg = *args.first()?;
                let element = if arg.is_numeric() { Some(arg) } else { arg.element_type() };
                match self.name {
                    "abs" if arg.is_byte() => Some(DataType::UByte),
                    "abs" if arg.is_word() => Some(DataType::UWord),
                    "abs" => (arg == DataType::Float).then_some(DataType::Float),
                    "sum" => match element? {
                        DataType::UByte | DataType::UWord => Some(DataType::UWord),
                        DataType::Byte | DataType::Word => Some(DataType::Word),
                        other => Some(other),
                    },
                    _ => element,
                }
            }
        }
    }

    /// Whether the call produces a value at all.
    pub fn has_result(&self) -> bool {
        self.returns != ReturnRule::Nothing
    }
}

macro_rules! param {
    ($name:literal, $types:expr) => {
        BuiltinParam {
            name: $name,
            datatypes: $types,
        }
    };
}

macro_rules! builtin_table {
    ($(
        $name:literal: pure $pure:literal, [$($param:expr),*] -> $returns:expr $(, $eval:expr)?;
    )*) => {
        &[$(BuiltinFunction {
            name: $name,
            pure: $pure,
            params: &[$($param),*],
            returns: $returns,
            const_eval: builtin_table!(@eval $($eval)?),
        }),*]
    };
    (@eval) => {
        None
    };
    (@eval $eval:expr) => {
        Some($eval)
    };
}

use ReturnRule::{FromArgument, Nothing};

const fn fixed(dt: DataType) -> ReturnRule {
    ReturnRule::Fixed(dt)
}

static BUILTINS: &[BuiltinFunction] = builtin_table! {
    // in-place, no result
    "rol": pure false, [param!("item", UNSIGNED)] -> Nothing;
    "ror": pure false, [param!("item", UNSIGNED)] -> Nothing;
    "rol2": pure false, [param!("item", UNSIGNED)] -> Nothing;
    "ror2": pure false, [param!("item", UNSIGNED)] -> Nothing;
    "lsl": pure false, [param!("item", &INTEGER_TYPES)] -> Nothing;
    "lsr": pure false, [param!("item", &INTEGER_TYPES)] -> Nothing;
    // result type depends on the argument
    "max": pure true, [param!("values", ARRAYS)] -> FromArgument, eval_max;
    "min": pure true, [param!("values", ARRAYS)] -> FromArgument, eval_min;
    "sum": pure true, [param!("values", ARRAYS)] -> FromArgument, eval_sum;
    "abs": pure true, [param!("value", &NUMERIC_TYPES)] -> FromArgument, eval_abs;
    "len": pure true, [param!("values", ITERABLES)] -> fixed(DataType::UWord), eval_len;
    // plain functions
    "sin": pure true, [param!("rads", FLOAT)] -> fixed(DataType::Float), eval_sin;
    "sin8": pure true, [param!("angle8", UBYTE)] -> fixed(DataType::Byte), eval_sin8;
    "sin8u": pure true, [param!("angle8", UBYTE)] -> fixed(DataType::UByte), eval_sin8u;
    "sin16": pure true, [param!("angle8", UBYTE)] -> fixed(DataType::Word), eval_sin16;
    "sin16u": pure true, [param!("angle8", UBYTE)] -> fixed(DataType::UWord), eval_sin16u;
    "cos": pure true, [param!("rads", FLOAT)] -> fixed(DataType::Float), eval_cos;
    "cos8": pure true, [param!("angle8", UBYTE)] -> fixed(DataType::Byte), eval_cos8;
    "cos8u": pure true, [param!("angle8", UBYTE)] -> fixed(DataType::UByte), eval_cos8u;
    "cos16": pure true, [param!("angle8", UBYTE)] -> fixed(DataType::Word), eval_cos16;
    "cos16u": pure true, [param!("angle8", UBYTE)] -> fixed(DataType::UWord), eval_cos16u;
    "tan": pure true, [param!("rads", FLOAT)] -> fixed(DataType::Float), eval_tan;
    "atan": pure true, [param!("rads", FLOAT)] -> fixed(DataType::Float), eval_atan;
    "ln": pure true, [param!("value", FLOAT)] -> fixed(DataType::Float), eval_ln;
    "log2": pure true, [param!("value", FLOAT)] -> fixed(DataType::Float), eval_log2;
    "sqrt": pure true, [param!("value", FLOAT)] -> fixed(DataType::Float), eval_sqrt;
    "rad": pure true, [param!("value", FLOAT)] -> fixed(DataType::Float), eval_rad;
    "deg": pure true, [param!("value", FLOAT)] -> fixed(DataType::Float), eval_deg;
    "avg": pure true, [param!("values", ARRAYS)] -> fixed(DataType::Float), eval_avg;
    "round": pure true, [param!("value", FLOAT)] -> fixed(DataType::Float), eval_round;
    "floor": pure true, [param!("value", FLOAT)] -> fixed(DataType::Float), eval_floor;
    "ceil": pure true, [param!("value", FLOAT)] -> fixed(DataType::Float), eval_ceil;
    "any": pure true, [param!("values", ARRAYS)] -> fixed(DataType::UByte), eval_any;
    "all": pure true, [param!("values", ARRAYS)] -> fixed(DataType::UByte), eval_all;
    "lsb": pure true, [param!("value", WORDS)] -> fixed(DataType::UByte), eval_lsb;
    "msb": pure true, [param!("value", WORDS)] -> fixed(DataType::UByte), eval_msb;
    "mkword": pure true, [param!("lsb", UBYTE), param!("msb", UBYTE)]
        -> fixed(DataType::UWord), eval_mkword;
    "rnd": pure false, [] -> fixed(DataType::UByte);
    "rndw": pure false, [] -> fixed(DataType::UWord);
    "rndf": pure false, [] -> fixed(DataType::Float);
    "rsave": pure false, [] -> Nothing;
    "rrestore": pure false, [] -> Nothing;
    "set_carry": pure false, [] -> Nothing;
    "clear_carry": pure false, [] -> Nothing;
    "set_irqd": pure false, [] -> Nothing;
    "clear_irqd": pure false, [] -> Nothing;
    "swap": pure false, [param!("first", &NUMERIC_TYPES), param!("second", &NUMERIC_TYPES)]
        -> Nothing;
    "memcopy": pure false,
        [param!("from", ADDRESSES), param!("to", ADDRESSES), param!("numbytes", UBYTE)]
        -> Nothing;
    "memset": pure false,
        [param!("address", ADDRESSES), param!("numbytes", UWORD), param!("bytevalue", BYTES)]
        -> Nothing;
    "memsetw": pure false,
        [param!("address", ADDRESSES), param!("numwords", UWORD), param!("wordvalue", WORDS)]
        -> Nothing;
};

/// Looks up a builtin function by name.
pub fn builtin(name: &str) -> Option<&'static BuiltinFunction> {
    BUILTINS.iter().find(|f| f.name == name)
}

pub fn is_builtin(name: &str) -> bool {
    builtin(name).is_some()
}

pub fn all() -> impl Iterator<Item = &'static BuiltinFunction> {
    BUILTINS.iter()
}

// ============================================================================
// Constant evaluators
// ============================================================================

type Eval = Result<Option<Literal>>;

fn single(args: &[ConstArg]) -> Option<&ConstArg> {
    match args {
        [arg] => Some(arg),
        _ => None,
    }
}

fn float_fn(args: &[ConstArg], f: fn(f64) -> f64) -> Eval {
    Ok(match single(args) {
        Some(ConstArg::Number {
            datatype: DataType::Float,
            value,
        }) => Some(Literal::optimal_numeric(f(*value))),
        _ => None,
    })
}

fn float_to_word(args: &[ConstArg], f: fn(f64) -> f64) -> Eval {
    Ok(match single(args) {
        Some(ConstArg::Number {
            datatype: DataType::Float,
            value,
        }) => Literal::integer(DataType::Word, f(*value) as i64),
        _ => None,
    })
}

fn int_fn(args: &[ConstArg], f: fn(i64) -> i64) -> Eval {
    Ok(match single(args) {
        Some(ConstArg::Number { datatype, value }) if datatype.is_integer() => {
            Literal::optimal_integer(f(*value as i64))
        }
        _ => None,
    })
}

/// The sin8/cos16 family: a 0..255 angle mapped onto a full circle.
fn angle(args: &[ConstArg], datatype: DataType, f: fn(f64) -> f64) -> Eval {
    Ok(single(args)
        .and_then(ConstArg::number)
        .and_then(|v| Literal::integer(datatype, f(v / 256.0 * 2.0 * PI) as i64)))
}

fn collection(args: &[ConstArg], f: impl Fn(&[f64]) -> Option<f64>) -> Eval {
    Ok(single(args)
        .and_then(ConstArg::values)
        .and_then(|values| f(&values))
        .map(Literal::optimal_numeric))
}

fn eval_max(args: &[ConstArg], _: &Position) -> Eval {
    collection(args, |v| v.iter().copied().reduce(f64::max))
}

fn eval_min(args: &[ConstArg], _: &Position) -> Eval {
    collection(args, |v| v.iter().copied().reduce(f64::min))
}

fn eval_sum(args: &[ConstArg], _: &Position) -> Eval {
    collection(args, |v| Some(v.iter().sum()))
}

fn eval_avg(args: &[ConstArg], _: &Position) -> Eval {
    collection(args, |v| {
        (!v.is_empty()).then(|| v.iter().sum::<f64>() / v.len() as f64)
    })
}

fn eval_any(args: &[ConstArg], _: &Position) -> Eval {
    Ok(single(args)
        .and_then(ConstArg::values)
        .map(|v| Literal::boolean(v.iter().any(|x| *x != 0.0))))
}

fn eval_all(args: &[ConstArg], _: &Position) -> Eval {
    Ok(single(args)
        .and_then(ConstArg::values)
        .map(|v| Literal::boolean(v.iter().all(|x| *x != 0.0))))
}

fn eval_abs(args: &[ConstArg], _: &Position) -> Eval {
    Ok(single(args)
        .and_then(ConstArg::number)
        .map(|v| Literal::optimal_numeric(v.abs())))
}

fn eval_sin(args: &[ConstArg], _: &Position) -> Eval {
    float_fn(args, f64::sin)
}

fn eval_cos(args: &[ConstArg], _: &Position) -> Eval {
    float_fn(args, f64::cos)
}

fn eval_tan(args: &[ConstArg], _: &Position) -> Eval {
    float_fn(args, f64::tan)
}

fn eval_atan(args: &[ConstArg], _: &Position) -> Eval {
    float_fn(args, f64::atan)
}

fn eval_ln(args: &[ConstArg], _: &Position) -> Eval {
    float_fn(args, f64::ln)
}

fn eval_log2(args: &[ConstArg], _: &Position) -> Eval {
    float_fn(args, f64::log2)
}

fn eval_sqrt(args: &[ConstArg], _: &Position) -> Eval {
    float_fn(args, f64::sqrt)
}

fn eval_rad(args: &[ConstArg], _: &Position) -> Eval {
    float_fn(args, f64::to_radians)
}

fn eval_deg(args: &[ConstArg], _: &Position) -> Eval {
    float_fn(args, f64::to_degrees)
}

fn eval_round(args: &[ConstArg], _: &Position) -> Eval {
    float_to_word(args, f64::round)
}

fn eval_floor(args: &[ConstArg], _: &Position) -> Eval {
    float_to_word(args, f64::floor)
}

fn eval_ceil(args: &[ConstArg], _: &Position) -> Eval {
    float_to_word(args, f64::ceil)
}

fn eval_sin8(args: &[ConstArg], _: &Position) -> Eval {
    angle(args, DataType::Byte, |r| 127.0 * r.sin())
}

fn eval_sin8u(args: &[ConstArg], _: &Position) -> Eval {
    angle(args, DataType::UByte, |r| 128.0 + 127.5 * r.sin())
}

fn eval_sin16(args: &[ConstArg], _: &Position) -> Eval {
    angle(args, DataType::Word, |r| 32767.0 * r.sin())
}

fn eval_sin16u(args: &[ConstArg], _: &Position) -> Eval {
    angle(args, DataType::UWord, |r| 32768.0 + 32767.5 * r.sin())
}

fn eval_cos8(args: &[ConstArg], _: &Position) -> Eval {
    angle(args, DataType::Byte, |r| 127.0 * r.cos())
}

fn eval_cos8u(args: &[ConstArg], _: &Position) -> Eval {
    angle(args, DataType::UByte, |r| 128.0 + 127.5 * r.cos())
}

fn eval_cos16(args: &[ConstArg], _: &Position) -> Eval {
    angle(args, DataType::Word, |r| 32767.0 * r.cos())
}

fn eval_cos16u(args: &[ConstArg], _: &Position) -> Eval {
    angle(args, DataType::UWord, |r| 32768.0 + 32767.5 * r.cos())
}

fn eval_lsb(args: &[ConstArg], _: &Position) -> Eval {
    int_fn(args, |x| x & 255)
}

fn eval_msb(args: &[ConstArg], _: &Position) -> Eval {
    int_fn(args, |x| (x >> 8) & 255)
}

fn eval_len(args: &[ConstArg], position: &Position) -> Eval {
    let length = match single(args) {
        Some(ConstArg::Array { values, .. }) => {
            if values.len() > 256 {
                return Err(CompilerError::lowering(
                    "array length exceeds byte limit",
                    position,
                ));
            }
            values.len()
        }
        Some(ConstArg::Str(text)) => {
            let length = text.chars().count();
            if length > 255 {
                return Err(CompilerError::lowering(
                    "string length exceeds byte limit",
                    position,
                ));
            }
            length
        }
        _ => return Ok(None),
    };
    Ok(Literal::optimal_integer(length as i64))
}

fn eval_mkword(args: &[ConstArg], _: &Position) -> Eval {
    Ok(match args {
        [lsb, msb] => match (lsb.number(), msb.number()) {
            (Some(lsb), Some(msb)) => {
                Literal::integer(DataType::UWord, ((msb as i64) << 8) | lsb as i64)
            }
            _ => None,
        },
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(datatype: DataType, value: f64) -> ConstArg {
        ConstArg::Number { datatype, value }
    }

    fn eval(name: &str, args: &[ConstArg]) -> Option<Literal> {
        let f = builtin(name).unwrap().const_eval.unwrap();
        f(args, &Position::synthetic()).unwrap()
    }

    #[test]
    fn table_has_no_duplicates() {
        let mut names: Vec<_> = all().map(|f| f.name).collect();
        let count = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), count);
    }

    #[test]
    fn random_functions_are_impure() {
        for name in ["rnd", "rndw", "rndf", "rol", "swap"] {
            assert!(!builtin(name).unwrap().pure, "{name}");
        }
        assert!(builtin("sin").unwrap().pure);
    }

    #[test]
    fn argument_dependent_return_types() {
        let abs = builtin("abs").unwrap();
        assert_eq!(abs.return_type(&[DataType::Byte]), Some(DataType::UByte));
        assert_eq!(abs.return_type(&[DataType::Word]), Some(DataType::UWord));
        assert_eq!(abs.return_type(&[DataType::Float]), Some(DataType::Float));

        let sum = builtin("sum").unwrap();
        assert_eq!(sum.return_type(&[DataType::ArrayUb]), Some(DataType::UWord));
        assert_eq!(sum.return_type(&[DataType::ArrayB]), Some(DataType::Word));
        assert_eq!(sum.return_type(&[DataType::ArrayF]), Some(DataType::Float));

        let max = builtin("max").unwrap();
        assert_eq!(max.return_type(&[DataType::ArrayW]), Some(DataType::Word));
        let rol = builtin("rol").unwrap();
        assert_eq!(rol.return_type(&[DataType::UByte]), None);
    }

    #[test]
    fn float_functions_fold() {
        let sqrt = eval("sqrt", &[num(DataType::Float, 16.0)]).unwrap();
        assert!(sqrt.is_number(4.0));
        assert_eq!(eval("sqrt", &[num(DataType::UByte, 16.0)]), None);
        let floor = eval("floor", &[num(DataType::Float, 2.7)]).unwrap();
        assert_eq!(floor.datatype(), DataType::Word);
        assert_eq!(floor.as_integer(), Some(2));
    }

    #[test]
    fn angle_functions() {
        let sin = eval("sin8u", &[num(DataType::UByte, 0.0)]).unwrap();
        assert_eq!(sin.as_integer(), Some(128));
        let cos = eval("cos8", &[num(DataType::UByte, 0.0)]).unwrap();
        assert_eq!(cos.as_integer(), Some(127));
    }

    #[test]
    fn collections_fold() {
        let array = ConstArg::Array {
            datatype: DataType::ArrayUb,
            values: vec![1.0, 5.0, 3.0],
        };
        assert!(eval("max", &[array.clone()]).unwrap().is_number(5.0));
        assert!(eval("sum", &[array.clone()]).unwrap().is_number(9.0));
        assert!(eval("avg", &[array.clone()]).unwrap().is_number(3.0));
        assert_eq!(eval("all", &[array.clone()]), Some(Literal::boolean(true)));
        assert!(eval("len", &[array]).unwrap().is_number(3.0));
        let hello = ConstArg::Str("hello".into());
        assert!(eval("len", &[hello]).unwrap().is_number(5.0));
    }

    #[test]
    fn len_rejects_oversized_arrays() {
        let array = ConstArg::Array {
            datatype: DataType::ArrayUb,
            values: vec![0.0; 300],
        };
        let f = builtin("len").unwrap().const_eval.unwrap();
        let err = f(&[array], &Position::synthetic()).unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("array length exceeds byte limit"));
    }

    #[test]
    fn mkword_and_bytes() {
        let lsb = num(DataType::UByte, 0x34 as f64);
        let msb = num(DataType::UByte, 0x12 as f64);
        let word = eval("mkword", &[lsb, msb]);
        assert_eq!(word.unwrap().as_integer(), Some(0x1234));
        let high = eval("msb", &[num(DataType::UWord, 0x1234 as f64)]).unwrap();
        assert_eq!(high.as_integer(), Some(0x12));
    }
}

//! Arithmetic evaluation for `is/2` and the comparison builtins.
//!
//! Integers are 64-bit and checked: overflow raises
//! `evaluation_error(int_overflow)` instead of wrapping. Integer division by
//! zero raises `evaluation_error(zero_divisor)`.

use crate::error::{PrologException, Result};

use ::{
    num_integer::Integer,
    serde::{Serialize, Serializer},
    std::{cmp::Ordering, f64::consts, fmt},
    yieldlog_term::{atom, Atom, Term},
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn to_term(self) -> Term {
        match self {
            Number::Int(i) => Term::int(i),
            Number::Float(f) => Term::float(f),
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }

    /// Numeric comparison across integers and floats.
    pub fn compare(self, other: Number) -> Ordering {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => a.cmp(&b),
            (a, b) => a
                .as_f64()
                .partial_cmp(&b.as_f64())
                .unwrap_or(Ordering::Equal),
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_term())
    }
}

macro_rules! arith_ops {
    ($($variant:ident => ($name:expr, $arity:expr, $function:expr),)*) => {
        /// An evaluable functor.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum ArithOp {
            $($variant,)*
        }

        impl ArithOp {
            pub fn from_functor(name: &str, arity: usize) -> Option<Self> {
                match (name, arity) {
                    $(($name, $arity) => Some(ArithOp::$variant),)*
                    _ => None,
                }
            }

            pub fn name(self) -> &'static str {
                match self {
                    $(ArithOp::$variant => $name,)*
                }
            }

            pub fn arity(self) -> usize {
                match self {
                    $(ArithOp::$variant => $arity,)*
                }
            }

            /// The runtime helper a compiled expression calls for this
            /// functor.
            pub fn function_name(self) -> &'static str {
                match self {
                    $(ArithOp::$variant => $function,)*
                }
            }
        }
    };
}

arith_ops! {
    Pi => ("pi", 0, "Math.PI"),
    E => ("e", 0, "Math.E"),
    Negate => ("-", 1, "YP.negate"),
    Identity => ("+", 1, "YP.convertNumber"),
    Abs => ("abs", 1, "YP.abs"),
    Sign => ("sign", 1, "YP.sign"),
    ToFloat => ("float", 1, "YP.toFloat"),
    ToInteger => ("integer", 1, "YP.toInteger"),
    FloatIntegerPart => ("float_integer_part", 1, "YP.floatIntegerPart"),
    FloatFractionalPart => ("float_fractional_part", 1, "YP.floatFractionalPart"),
    Floor => ("floor", 1, "YP.floor"),
    Truncate => ("truncate", 1, "YP.truncate"),
    Round => ("round", 1, "YP.round"),
    Ceiling => ("ceiling", 1, "YP.ceiling"),
    Sin => ("sin", 1, "YP.sin"),
    Cos => ("cos", 1, "YP.cos"),
    Atan => ("atan", 1, "YP.atan"),
    Exp => ("exp", 1, "YP.exp"),
    Log => ("log", 1, "YP.log"),
    Sqrt => ("sqrt", 1, "YP.sqrt"),
    BitwiseComplement => ("\\", 1, "YP.bitwiseComplement"),
    Add => ("+", 2, "YP.add"),
    Subtract => ("-", 2, "YP.subtract"),
    Multiply => ("*", 2, "YP.multiply"),
    Divide => ("/", 2, "YP.divide"),
    IntDivide => ("//", 2, "YP.intDivide"),
    Mod => ("mod", 2, "YP.mod"),
    Rem => ("rem", 2, "YP.rem"),
    Pow => ("**", 2, "YP.pow"),
    IntPow => ("^", 2, "YP.intPow"),
    ShiftRight => (">>", 2, "YP.bitwiseShiftRight"),
    ShiftLeft => ("<<", 2, "YP.bitwiseShiftLeft"),
    BitwiseAnd => ("/\\", 2, "YP.bitwiseAnd"),
    BitwiseOr => ("\\/", 2, "YP.bitwiseOr"),
    Min => ("min", 2, "YP.min"),
    Max => ("max", 2, "YP.max"),
    Atan2 => ("atan2", 2, "YP.atan2"),
}

impl Serialize for ArithOp {
    fn serialize<S: Serializer>(&self, serializer: S) -> ::std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.function_name())
    }
}

fn overflow() -> PrologException {
    PrologException::evaluation_error("int_overflow", "Integer overflow")
}

fn zero_divisor() -> PrologException {
    PrologException::evaluation_error("zero_divisor", "Division by zero")
}

fn undefined(what: &str) -> PrologException {
    PrologException::evaluation_error("undefined", what)
}

fn integer(n: Number) -> Result<i64> {
    match n {
        Number::Int(i) => Ok(i),
        Number::Float(f) => Err(PrologException::type_error(
            "integer",
            &Term::float(f),
            "Expected an integer",
        )
        .into()),
    }
}

fn float_to_int(f: f64) -> Result<Number> {
    if f.is_nan() || f < i64::min_value() as f64 || f >= i64::max_value() as f64 {
        Err(overflow().into())
    } else {
        Ok(Number::Int(f as i64))
    }
}

fn checked(result: Option<i64>) -> Result<Number> {
    result.map(Number::Int).ok_or_else(|| overflow().into())
}

fn float(f: f64) -> Result<Number> {
    if f.is_infinite() {
        Err(PrologException::evaluation_error("float_overflow", "Float overflow").into())
    } else if f.is_nan() {
        Err(undefined("Result is not a number").into())
    } else {
        Ok(Number::Float(f))
    }
}

/// `x << by` for `left`, `x >> by` otherwise. A negative amount shifts the
/// other way. Bits shifted out of a left shift raise `int_overflow`.
fn shift(x: i64, by: i64, left: bool) -> Result<Number> {
    let left = if by < 0 { !left } else { left };
    let by = by.checked_abs().unwrap_or(i64::max_value());
    if !left {
        return Ok(Number::Int(x >> by.min(63)));
    }
    if x == 0 {
        return Ok(Number::Int(0));
    }
    if by > 63 {
        return Err(overflow().into());
    }
    let shifted = x << by;
    checked(if shifted >> by == x { Some(shifted) } else { None })
}

impl ArithOp {
    /// Apply this functor to already-evaluated arguments.
    pub fn apply(self, args: &[Number]) -> Result<Number> {
        use self::Number::{Float as F, Int as I};

        debug_assert_eq!(args.len(), self.arity());
        let x = args.get(0).copied().unwrap_or(I(0));
        let y = args.get(1).copied().unwrap_or(I(0));

        match self {
            ArithOp::Pi => Ok(F(consts::PI)),
            ArithOp::E => Ok(F(consts::E)),
            ArithOp::Negate => match x {
                I(i) => checked(i.checked_neg()),
                F(f) => Ok(F(-f)),
            },
            ArithOp::Identity => Ok(x),
            ArithOp::Abs => match x {
                I(i) => checked(i.checked_abs()),
                F(f) => Ok(F(f.abs())),
            },
            ArithOp::Sign => match x {
                I(i) => Ok(I(i.signum())),
                F(f) if f == 0.0 => Ok(F(0.0)),
                F(f) => Ok(F(f.signum())),
            },
            ArithOp::ToFloat => Ok(F(x.as_f64())),
            ArithOp::ToInteger => match x {
                I(_) => Ok(x),
                F(f) => float_to_int(f.round()),
            },
            ArithOp::FloatIntegerPart => float(x.as_f64().trunc()),
            ArithOp::FloatFractionalPart => float(x.as_f64().fract()),
            ArithOp::Floor => match x {
                I(_) => Ok(x),
                F(f) => float_to_int(f.floor()),
            },
            ArithOp::Truncate => match x {
                I(_) => Ok(x),
                F(f) => float_to_int(f.trunc()),
            },
            ArithOp::Round => match x {
                I(_) => Ok(x),
                F(f) => float_to_int(f.round()),
            },
            ArithOp::Ceiling => match x {
                I(_) => Ok(x),
                F(f) => float_to_int(f.ceil()),
            },
            ArithOp::Sin => float(x.as_f64().sin()),
            ArithOp::Cos => float(x.as_f64().cos()),
            ArithOp::Atan => float(x.as_f64().atan()),
            ArithOp::Exp => float(x.as_f64().exp()),
            ArithOp::Log => {
                if x.as_f64() <= 0.0 {
                    Err(undefined("Logarithm of a non-positive number").into())
                } else {
                    float(x.as_f64().ln())
                }
            }
            ArithOp::Sqrt => {
                if x.as_f64() < 0.0 {
                    Err(undefined("Square root of a negative number").into())
                } else {
                    float(x.as_f64().sqrt())
                }
            }
            ArithOp::BitwiseComplement => Ok(I(!integer(x)?)),
            ArithOp::Add => match (x, y) {
                (I(a), I(b)) => checked(a.checked_add(b)),
                _ => float(x.as_f64() + y.as_f64()),
            },
            ArithOp::Subtract => match (x, y) {
                (I(a), I(b)) => checked(a.checked_sub(b)),
                _ => float(x.as_f64() - y.as_f64()),
            },
            ArithOp::Multiply => match (x, y) {
                (I(a), I(b)) => checked(a.checked_mul(b)),
                _ => float(x.as_f64() * y.as_f64()),
            },
            ArithOp::Divide => match (x, y) {
                (I(_), I(0)) => Err(zero_divisor().into()),
                (I(a), I(b)) if a.checked_rem(b) == Some(0) => checked(a.checked_div(b)),
                _ if y.as_f64() == 0.0 => Err(zero_divisor().into()),
                _ => float(x.as_f64() / y.as_f64()),
            },
            ArithOp::IntDivide => {
                let (a, b) = (integer(x)?, integer(y)?);
                if b == 0 {
                    return Err(zero_divisor().into());
                }
                checked(a.checked_div(b))
            }
            ArithOp::Mod => {
                let (a, b) = (integer(x)?, integer(y)?);
                if b == 0 {
                    return Err(zero_divisor().into());
                }
                if b == -1 {
                    return Ok(I(0));
                }
                Ok(I(a.mod_floor(&b)))
            }
            ArithOp::Rem => {
                let (a, b) = (integer(x)?, integer(y)?);
                if b == 0 {
                    return Err(zero_divisor().into());
                }
                checked(a.checked_rem(b))
            }
            ArithOp::Pow => match (x, y) {
                (I(a), I(b)) if b >= 0 => checked(checked_pow(a, b)),
                _ => float(x.as_f64().powf(y.as_f64())),
            },
            ArithOp::IntPow => match (x, y) {
                (I(a), I(b)) if b >= 0 => checked(checked_pow(a, b)),
                (I(1), I(_)) => Ok(I(1)),
                (I(-1), I(b)) => Ok(I(if b.is_even() { 1 } else { -1 })),
                (I(0), I(_)) => Err(zero_divisor().into()),
                (I(a), I(_)) => Err(PrologException::type_error(
                    "float",
                    &Term::int(a),
                    "Negative integer exponent",
                )
                .into()),
                _ => float(x.as_f64().powf(y.as_f64())),
            },
            ArithOp::ShiftRight => shift(integer(x)?, integer(y)?, false),
            ArithOp::ShiftLeft => shift(integer(x)?, integer(y)?, true),
            ArithOp::BitwiseAnd => Ok(I(integer(x)? & integer(y)?)),
            ArithOp::BitwiseOr => Ok(I(integer(x)? | integer(y)?)),
            ArithOp::Min => Ok(if y.compare(x) == Ordering::Less { y } else { x }),
            ArithOp::Max => Ok(if y.compare(x) == Ordering::Greater { y } else { x }),
            ArithOp::Atan2 => float(x.as_f64().atan2(y.as_f64())),
        }
    }
}

fn checked_pow(base: i64, exp: i64) -> Option<i64> {
    if exp > u32::max_value() as i64 {
        return match base {
            0 | 1 => Some(base),
            -1 => Some(if exp.is_even() { 1 } else { -1 }),
            _ => None,
        };
    }
    base.checked_pow(exp as u32)
}

/// Evaluate an arithmetic expression. A one-element list evaluates as its
/// element, so `"a"` read as codes evaluates to the code of `a`.
pub fn eval(term: &Term) -> Result<Number> {
    let term = term.value();
    match &term {
        Term::Var(_) => Err(PrologException::instantiation_error(
            "Expected a number but the argument is an unbound variable",
        )
        .into()),
        Term::Int(i) => Ok(Number::Int(*i)),
        Term::Float(f) => Ok(Number::Float(f.0)),
        Term::Compound(c) if c.is_list_pair() && c.args()[1].is_functor(&atom::NIL, 0) => {
            eval(&c.args()[0])
        }
        _ => {
            let (name, arity) = match term.name_arity() {
                Some(name_arity) => name_arity,
                None => return Err(not_evaluable(&term, &Atom::a(""), 0).into()),
            };
            let op = ArithOp::from_functor(name.name(), arity)
                .ok_or_else(|| not_evaluable(&term, &name, arity))?;
            let args = term
                .functor_args()
                .iter()
                .map(eval)
                .collect::<Result<Vec<_>>>()?;
            op.apply(&args)
        }
    }
}

fn not_evaluable(term: &Term, name: &Atom, arity: usize) -> PrologException {
    match term {
        Term::Str(_) => PrologException::type_error("evaluable", term, "Term must be a number"),
        _ => PrologException::type_error(
            "evaluable",
            &Term::indicator(name, arity),
            "Term must be a number",
        ),
    }
}

/// Evaluate both sides and compare them numerically.
pub fn compare(left: &Term, right: &Term) -> Result<Ordering> {
    Ok(eval(left)?.compare(eval(right)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expr(name: &str, args: Vec<Term>) -> Term {
        Term::functor(name, args)
    }

    fn error_kind(term: &Term) -> Term {
        eval(term).unwrap_err().exception().unwrap().term().functor_args()[0].clone()
    }

    #[test]
    fn integer_arithmetic() {
        let t = expr(
            "+",
            vec![Term::int(1), expr("*", vec![Term::int(2), Term::int(3)])],
        );
        assert_eq!(eval(&t).unwrap(), Number::Int(7));
        assert_eq!(
            eval(&expr("//", vec![Term::int(-7), Term::int(2)])).unwrap(),
            Number::Int(-3)
        );
        assert_eq!(
            eval(&expr("mod", vec![Term::int(-7), Term::int(2)])).unwrap(),
            Number::Int(1)
        );
        assert_eq!(
            eval(&expr("rem", vec![Term::int(-7), Term::int(2)])).unwrap(),
            Number::Int(-1)
        );
        assert_eq!(
            eval(&expr("/", vec![Term::int(6), Term::int(3)])).unwrap(),
            Number::Int(2)
        );
        assert_eq!(
            eval(&expr("/", vec![Term::int(7), Term::int(2)])).unwrap(),
            Number::Float(3.5)
        );
    }

    #[test]
    fn errors() {
        assert_eq!(
            error_kind(&expr("//", vec![Term::int(1), Term::int(0)])),
            Term::functor1("evaluation_error", Term::atom("zero_divisor"))
        );
        assert_eq!(
            error_kind(&expr("foo", vec![Term::int(1)])),
            Term::functor2(
                "type_error",
                Term::atom("evaluable"),
                Term::indicator(&Atom::a("foo"), 1)
            )
        );
        assert_eq!(
            error_kind(&expr("+", vec![Term::var(), Term::int(1)])),
            Term::atom("instantiation_error")
        );
        assert_eq!(
            error_kind(&expr("+", vec![Term::int(i64::max_value()), Term::int(1)])),
            Term::functor1("evaluation_error", Term::atom("int_overflow"))
        );
    }

    #[test]
    fn mixed_comparison() {
        assert_eq!(
            compare(&Term::int(1), &Term::float(1.0)).unwrap(),
            Ordering::Equal
        );
        assert_eq!(
            compare(&Term::float(0.5), &Term::int(1)).unwrap(),
            Ordering::Less
        );
        assert_eq!(
            eval(&Term::list(vec![Term::int(97)])).unwrap(),
            Number::Int(97)
        );
    }

    #[test]
    fn rounding_functions_return_integers() {
        assert_eq!(
            eval(&expr("floor", vec![Term::float(-1.5)])).unwrap(),
            Number::Int(-2)
        );
        assert_eq!(
            eval(&expr("truncate", vec![Term::float(-1.5)])).unwrap(),
            Number::Int(-1)
        );
        assert_eq!(eval(&Term::atom("pi")).unwrap(), Number::Float(consts::PI));
        assert_eq!(ArithOp::from_functor("-", 1), Some(ArithOp::Negate));
        assert_eq!(ArithOp::Negate.function_name(), "YP.negate");
    }

    #[test]
    fn shifts_follow_the_sign_of_the_amount() {
        use super::Number::{Float as F, Int as I};
        assert_eq!(ArithOp::ShiftLeft.apply(&[I(1), I(4)]).unwrap(), I(16));
        assert_eq!(ArithOp::ShiftLeft.apply(&[I(16), I(-2)]).unwrap(), I(4));
        assert_eq!(ArithOp::ShiftRight.apply(&[I(-16), I(2)]).unwrap(), I(-4));
        assert_eq!(ArithOp::ShiftRight.apply(&[I(1), I(-3)]).unwrap(), I(8));
        assert_eq!(ArithOp::ShiftRight.apply(&[I(-5), I(1000)]).unwrap(), I(-1));
        assert_eq!(ArithOp::ShiftRight.apply(&[I(5), I(1000)]).unwrap(), I(0));
        assert_eq!(
            ArithOp::ShiftLeft.apply(&[I(-1), I(63)]).unwrap(),
            I(i64::min_value())
        );
        assert_eq!(ArithOp::ShiftLeft.apply(&[I(0), I(i64::max_value())]).unwrap(), I(0));
        assert!(ArithOp::ShiftRight.apply(&[I(7), I(i64::min_value())]).is_err());
        assert!(ArithOp::ShiftLeft.apply(&[F(1.0), I(1)]).is_err());
    }

    #[test]
    fn left_shifts_that_lose_bits_overflow() {
        let overflow = Term::functor1("evaluation_error", Term::atom("int_overflow"));
        assert_eq!(
            error_kind(&expr("<<", vec![Term::int(3), Term::int(63)])),
            overflow
        );
        assert_eq!(
            error_kind(&expr("<<", vec![Term::int(1), Term::int(i64::min_value())])),
            overflow
        );
        assert_eq!(
            error_kind(&expr("<<", vec![Term::int(1), Term::int(64)])),
            overflow
        );
        assert_eq!(
            error_kind(&expr(">>", vec![Term::int(1), Term::int(-64)])),
            overflow
        );
    }

    #[test]
    fn bitwise_operators_need_integers() {
        assert_eq!(
            eval(&expr("/\\", vec![Term::int(12), Term::int(10)])).unwrap(),
            Number::Int(8)
        );
        assert_eq!(
            eval(&expr("\\/", vec![Term::int(12), Term::int(10)])).unwrap(),
            Number::Int(14)
        );
        assert_eq!(
            eval(&expr("\\", vec![Term::int(5)])).unwrap(),
            Number::Int(-6)
        );
        for op in &["/\\", "\\/", ">>", "<<"] {
            assert_eq!(
                error_kind(&expr(op, vec![Term::float(1.0), Term::int(1)])),
                Term::functor2("type_error", Term::atom("integer"), Term::float(1.0))
            );
        }
        assert_eq!(
            error_kind(&expr("\\", vec![Term::float(2.5)])),
            Term::functor2("type_error", Term::atom("integer"), Term::float(2.5))
        );
    }

    #[test]
    fn infinite_inputs_do_not_produce_nan() {
        use super::Number::Float as F;
        assert!(ArithOp::FloatFractionalPart.apply(&[F(std::f64::INFINITY)]).is_err());
        assert!(ArithOp::FloatIntegerPart.apply(&[F(std::f64::NEG_INFINITY)]).is_err());
        assert_eq!(
            ArithOp::FloatFractionalPart.apply(&[F(2.5)]).unwrap(),
            F(0.5)
        );
    }
}

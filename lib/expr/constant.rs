//! A `Constant` holds a single concrete value of one of the primitive sorts,
//! and knows how to compute every operator over concrete operands with the
//! instrumented language's native semantics.

use crate::expr::{check_cast, BinaryOp, OverflowPolicy, Sort, UnaryOp};
use crate::{Error, Fault};
use num_traits::{
    CheckedNeg, Float, PrimInt, Signed, WrappingAdd, WrappingMul, WrappingNeg, WrappingSub,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A concrete value.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub enum Constant {
    Int(i32),
    Long(i64),
    Double(f64),
    Float(f32),
    Short(i16),
    Byte(i8),
    Bool(bool),
    Char(u16),
}

impl Constant {
    pub fn sort(&self) -> Sort {
        match self {
            Constant::Int(_) => Sort::Int,
            Constant::Long(_) => Sort::Long,
            Constant::Double(_) => Sort::Double,
            Constant::Float(_) => Sort::Float,
            Constant::Short(_) => Sort::Short,
            Constant::Byte(_) => Sort::Byte,
            Constant::Bool(_) => Sort::Bool,
            Constant::Char(_) => Sort::Char,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Constant::Bool(b) => Some(b),
            _ => None,
        }
    }

    /// The value of an integral constant, widened to 64 bits.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Constant::Int(v) => Some(v as i64),
            Constant::Long(v) => Some(v),
            Constant::Short(v) => Some(v as i64),
            Constant::Byte(v) => Some(v as i64),
            Constant::Char(v) => Some(v as i64),
            Constant::Double(_) | Constant::Float(_) | Constant::Bool(_) => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Constant::Double(v) => Some(v),
            Constant::Float(v) => Some(v as f64),
            _ => self.as_i64().map(|v| v as f64),
        }
    }

    /// Bitwise identity. Unlike `==`, two NaNs of the same sort are identical.
    /// This is the comparison concolic shadows are checked with.
    pub fn identical(&self, other: &Constant) -> bool {
        match (self, other) {
            (Constant::Double(a), Constant::Double(b)) => {
                a.to_bits() == b.to_bits() || (a.is_nan() && b.is_nan())
            }
            (Constant::Float(a), Constant::Float(b)) => {
                a.to_bits() == b.to_bits() || (a.is_nan() && b.is_nan())
            }
            _ => self == other,
        }
    }

    /// Compute `lhs op rhs`.
    ///
    /// Division by zero raises `Fault::DivisionByZero`, and under
    /// `OverflowPolicy::Strict` any integer result which does not fit raises
    /// `Fault::Overflow`.
    pub fn binary(
        op: BinaryOp,
        lhs: &Constant,
        rhs: &Constant,
        policy: OverflowPolicy,
    ) -> Result<Constant, Error> {
        op.result_sort(lhs.sort(), rhs.sort())?;

        if op.is_shift() {
            return shift(op, lhs, rhs);
        }

        match (*lhs, *rhs) {
            (Constant::Int(a), Constant::Int(b)) => integral(op, a, b, policy),
            (Constant::Long(a), Constant::Long(b)) => integral(op, a, b, policy),
            (Constant::Float(a), Constant::Float(b)) => floating(op, a, b),
            (Constant::Double(a), Constant::Double(b)) => floating(op, a, b),
            (Constant::Bool(a), Constant::Bool(b)) => boolean(op, a, b),
            (Constant::Short(a), Constant::Short(b)) => compare(op, a, b),
            (Constant::Byte(a), Constant::Byte(b)) => compare(op, a, b),
            (Constant::Char(a), Constant::Char(b)) => compare(op, a, b),
            _ => Err(Error::Sort(format!(
                "{} is not defined over {} and {}",
                op,
                lhs.sort(),
                rhs.sort()
            ))),
        }
    }

    pub fn unary(op: UnaryOp, operand: &Constant, policy: OverflowPolicy) -> Result<Constant, Error> {
        op.result_sort(operand.sort())?;
        Ok(match (op, *operand) {
            (UnaryOp::Neg, Constant::Int(v)) => Constant::Int(negate(v, policy)?),
            (UnaryOp::Neg, Constant::Long(v)) => Constant::Long(negate(v, policy)?),
            (UnaryOp::Neg, Constant::Float(v)) => Constant::Float(-v),
            (UnaryOp::Neg, Constant::Double(v)) => Constant::Double(-v),
            (UnaryOp::Not, Constant::Bool(v)) => Constant::Bool(!v),
            _ => {
                return Err(Error::Sort(format!(
                    "{} is not defined over {}",
                    op,
                    operand.sort()
                )))
            }
        })
    }

    /// Convert this constant to another sort. Narrowing integral conversions
    /// truncate, and floating to integral conversions saturate with NaN
    /// becoming zero.
    pub fn cast(&self, sort: Sort) -> Result<Constant, Error> {
        check_cast(self.sort(), sort)?;
        if self.sort() == sort {
            return Ok(*self);
        }
        Ok(match *self {
            Constant::Float(v) => from_floating(v as f64, sort, v as i32, v as i64),
            Constant::Double(v) => from_floating(v, sort, v as i32, v as i64),
            _ => {
                let v = self.as_i64().ok_or_else(|| {
                    Error::Sort(format!("cannot cast {} to {}", self.sort(), sort))
                })?;
                match sort {
                    Sort::Int => Constant::Int(v as i32),
                    Sort::Long => Constant::Long(v),
                    Sort::Short => Constant::Short(v as i16),
                    Sort::Byte => Constant::Byte(v as i8),
                    Sort::Char => Constant::Char(v as u16),
                    // Conversions from long round to nearest, as `as` does.
                    Sort::Float => Constant::Float(v as f32),
                    Sort::Double => Constant::Double(v as f64),
                    Sort::Bool => unreachable!("rejected by check_cast"),
                }
            }
        })
    }
}

fn from_floating(v: f64, sort: Sort, as_int: i32, as_long: i64) -> Constant {
    match sort {
        Sort::Int => Constant::Int(as_int),
        Sort::Long => Constant::Long(as_long),
        Sort::Short => Constant::Short(as_int as i16),
        Sort::Byte => Constant::Byte(as_int as i8),
        Sort::Char => Constant::Char(as_int as u16),
        Sort::Float => Constant::Float(v as f32),
        Sort::Double => Constant::Double(v),
        Sort::Bool => unreachable!("rejected by check_cast"),
    }
}

fn negate<T>(v: T, policy: OverflowPolicy) -> Result<T, Error>
where
    T: CheckedNeg + WrappingNeg,
{
    match policy {
        OverflowPolicy::Wrapping => Ok(v.wrapping_neg()),
        OverflowPolicy::Strict => v.checked_neg().ok_or(Error::Fault(Fault::Overflow)),
    }
}

fn integral<T>(op: BinaryOp, a: T, b: T, policy: OverflowPolicy) -> Result<Constant, Error>
where
    T: PrimInt + Signed + WrappingAdd + WrappingSub + WrappingMul + Into<Constant>,
{
    let strict = policy == OverflowPolicy::Strict;
    let overflow = || Error::Fault(Fault::Overflow);
    let minus_one = T::zero() - T::one();

    let divide = |a: T, b: T| -> Result<T, Error> {
        if b.is_zero() {
            Err(Error::Fault(Fault::DivisionByZero))
        } else if b == minus_one && a == T::min_value() {
            if strict {
                Err(overflow())
            } else {
                Ok(a)
            }
        } else {
            Ok(a / b)
        }
    };
    let remainder = |a: T, b: T| -> Result<T, Error> {
        if b.is_zero() {
            Err(Error::Fault(Fault::DivisionByZero))
        } else if b == minus_one {
            Ok(T::zero())
        } else {
            Ok(a % b)
        }
    };

    let value = match op {
        BinaryOp::Add => {
            if strict {
                a.checked_add(&b).ok_or_else(overflow)?
            } else {
                a.wrapping_add(&b)
            }
        }
        BinaryOp::Sub => {
            if strict {
                a.checked_sub(&b).ok_or_else(overflow)?
            } else {
                a.wrapping_sub(&b)
            }
        }
        BinaryOp::Mul => {
            if strict {
                a.checked_mul(&b).ok_or_else(overflow)?
            } else {
                a.wrapping_mul(&b)
            }
        }
        BinaryOp::Div => divide(a, b)?,
        BinaryOp::Rem => remainder(a, b)?,
        BinaryOp::FloorDiv => {
            let q = divide(a, b)?;
            if (a ^ b) < T::zero() && q.wrapping_mul(&b) != a {
                q - T::one()
            } else {
                q
            }
        }
        BinaryOp::FloorMod => {
            let r = remainder(a, b)?;
            if !r.is_zero() && (r ^ b) < T::zero() {
                r + b
            } else {
                r
            }
        }
        BinaryOp::And => a & b,
        BinaryOp::Or => a | b,
        BinaryOp::Xor => a ^ b,
        _ => return compare(op, a, b),
    };
    Ok(value.into())
}

fn floating<T>(op: BinaryOp, a: T, b: T) -> Result<Constant, Error>
where
    T: Float + Into<Constant>,
{
    let value = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        BinaryOp::Rem => a % b,
        _ => return compare(op, a, b),
    };
    Ok(value.into())
}

fn boolean(op: BinaryOp, a: bool, b: bool) -> Result<Constant, Error> {
    Ok(Constant::Bool(match op {
        BinaryOp::And => a & b,
        BinaryOp::Or => a | b,
        BinaryOp::Xor | BinaryOp::Ne => a ^ b,
        BinaryOp::Eq => a == b,
        _ => return Err(Error::Sort(format!("{} is not defined over bool", op))),
    }))
}

fn compare<T: PartialOrd>(op: BinaryOp, a: T, b: T) -> Result<Constant, Error> {
    Ok(Constant::Bool(match op {
        BinaryOp::Eq => a == b,
        BinaryOp::Ne => a != b,
        BinaryOp::Lt => a < b,
        BinaryOp::Le => a <= b,
        BinaryOp::Gt => a > b,
        BinaryOp::Ge => a >= b,
        _ => return Err(Error::Sort(format!("{} is not a comparison", op))),
    }))
}

fn shift(op: BinaryOp, lhs: &Constant, rhs: &Constant) -> Result<Constant, Error> {
    let distance = rhs
        .as_i64()
        .ok_or_else(|| Error::Sort(format!("shift distance of sort {}", rhs.sort())))?;
    match *lhs {
        Constant::Int(a) => {
            let d = (distance & 31) as u32;
            Ok(Constant::Int(match op {
                BinaryOp::Shl => a.wrapping_shl(d),
                BinaryOp::Shr => a.wrapping_shr(d),
                _ => ((a as u32) >> d) as i32,
            }))
        }
        Constant::Long(a) => {
            let d = (distance & 63) as u32;
            Ok(Constant::Long(match op {
                BinaryOp::Shl => a.wrapping_shl(d),
                BinaryOp::Shr => a.wrapping_shr(d),
                _ => ((a as u64) >> d) as i64,
            }))
        }
        _ => Err(Error::Sort(format!("cannot shift {}", lhs.sort()))),
    }
}

impl From<i32> for Constant {
    fn from(v: i32) -> Constant {
        Constant::Int(v)
    }
}

impl From<i64> for Constant {
    fn from(v: i64) -> Constant {
        Constant::Long(v)
    }
}

impl From<f64> for Constant {
    fn from(v: f64) -> Constant {
        Constant::Double(v)
    }
}

impl From<f32> for Constant {
    fn from(v: f32) -> Constant {
        Constant::Float(v)
    }
}

impl From<i16> for Constant {
    fn from(v: i16) -> Constant {
        Constant::Short(v)
    }
}

impl From<i8> for Constant {
    fn from(v: i8) -> Constant {
        Constant::Byte(v)
    }
}

impl From<bool> for Constant {
    fn from(v: bool) -> Constant {
        Constant::Bool(v)
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Constant::Int(v) => write!(f, "{}", v),
            Constant::Long(v) => write!(f, "{}L", v),
            Constant::Double(v) => write!(f, "{:?}", v),
            Constant::Float(v) => write!(f, "{:?}f", v),
            Constant::Short(v) => write!(f, "{}s", v),
            Constant::Byte(v) => write!(f, "{}b", v),
            Constant::Bool(v) => write!(f, "{}", v),
            Constant::Char(v) => write!(f, "'\\u{{{:04x}}}'", v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrapping(op: BinaryOp, lhs: Constant, rhs: Constant) -> Constant {
        Constant::binary(op, &lhs, &rhs, OverflowPolicy::Wrapping).unwrap()
    }

    fn strict(op: BinaryOp, lhs: Constant, rhs: Constant) -> Result<Constant, Error> {
        Constant::binary(op, &lhs, &rhs, OverflowPolicy::Strict)
    }

    #[test]
    fn int_wraps() {
        assert_eq!(
            wrapping(BinaryOp::Add, Constant::Int(i32::MAX), Constant::Int(1)),
            Constant::Int(i32::MIN)
        );
        assert_eq!(
            wrapping(BinaryOp::Mul, Constant::Long(i64::MAX), Constant::Long(2)),
            Constant::Long(-2)
        );
        assert_eq!(
            wrapping(BinaryOp::Div, Constant::Int(i32::MIN), Constant::Int(-1)),
            Constant::Int(i32::MIN)
        );
        assert_eq!(
            wrapping(BinaryOp::Rem, Constant::Int(i32::MIN), Constant::Int(-1)),
            Constant::Int(0)
        );
    }

    #[test]
    fn strict_overflow_faults() {
        assert!(matches!(
            strict(BinaryOp::Add, Constant::Int(i32::MAX), Constant::Int(1)),
            Err(Error::Fault(Fault::Overflow))
        ));
        assert!(matches!(
            strict(BinaryOp::Div, Constant::Long(i64::MIN), Constant::Long(-1)),
            Err(Error::Fault(Fault::Overflow))
        ));
        assert!(matches!(
            Constant::unary(UnaryOp::Neg, &Constant::Int(i32::MIN), OverflowPolicy::Strict),
            Err(Error::Fault(Fault::Overflow))
        ));
        assert_eq!(
            strict(BinaryOp::Sub, Constant::Int(5), Constant::Int(7)).unwrap(),
            Constant::Int(-2)
        );
    }

    #[test]
    fn division_by_zero_faults() {
        assert!(matches!(
            strict(BinaryOp::Div, Constant::Int(1), Constant::Int(0)),
            Err(Error::Fault(Fault::DivisionByZero))
        ));
        assert!(matches!(
            Constant::binary(
                BinaryOp::FloorMod,
                &Constant::Long(1),
                &Constant::Long(0),
                OverflowPolicy::Wrapping
            ),
            Err(Error::Fault(Fault::DivisionByZero))
        ));
        // IEEE-754 division does not fault.
        assert_eq!(
            wrapping(BinaryOp::Div, Constant::Double(1.0), Constant::Double(0.0)),
            Constant::Double(f64::INFINITY)
        );
    }

    #[test]
    fn truncating_and_floor_division() {
        assert_eq!(
            wrapping(BinaryOp::Div, Constant::Int(-7), Constant::Int(2)),
            Constant::Int(-3)
        );
        assert_eq!(
            wrapping(BinaryOp::Rem, Constant::Int(-7), Constant::Int(2)),
            Constant::Int(-1)
        );
        assert_eq!(
            wrapping(BinaryOp::FloorDiv, Constant::Int(-7), Constant::Int(2)),
            Constant::Int(-4)
        );
        assert_eq!(
            wrapping(BinaryOp::FloorMod, Constant::Int(-7), Constant::Int(2)),
            Constant::Int(1)
        );
        assert_eq!(
            wrapping(BinaryOp::FloorMod, Constant::Int(7), Constant::Int(-2)),
            Constant::Int(-1)
        );
        assert_eq!(
            wrapping(BinaryOp::FloorDiv, Constant::Int(6), Constant::Int(3)),
            Constant::Int(2)
        );
    }

    #[test]
    fn shifts_mask_their_distance() {
        assert_eq!(
            wrapping(BinaryOp::Shl, Constant::Int(1), Constant::Int(33)),
            Constant::Int(2)
        );
        assert_eq!(
            wrapping(BinaryOp::Shr, Constant::Int(-8), Constant::Int(1)),
            Constant::Int(-4)
        );
        assert_eq!(
            wrapping(BinaryOp::Ushr, Constant::Int(-1), Constant::Int(28)),
            Constant::Int(15)
        );
        assert_eq!(
            wrapping(BinaryOp::Ushr, Constant::Long(-1), Constant::Int(60)),
            Constant::Long(15)
        );
    }

    #[test]
    fn nan_is_not_equal_to_itself() {
        let nan = Constant::Double(f64::NAN);
        assert_eq!(wrapping(BinaryOp::Eq, nan, nan), Constant::Bool(false));
        assert_eq!(wrapping(BinaryOp::Ne, nan, nan), Constant::Bool(true));
        assert_eq!(wrapping(BinaryOp::Lt, nan, nan), Constant::Bool(false));
        assert!(nan.identical(&nan));
    }

    #[test]
    fn casts_follow_native_semantics() {
        assert_eq!(
            Constant::Double(f64::NAN).cast(Sort::Int).unwrap(),
            Constant::Int(0)
        );
        assert_eq!(
            Constant::Double(1e20).cast(Sort::Int).unwrap(),
            Constant::Int(i32::MAX)
        );
        assert_eq!(
            Constant::Int(65536 + 65).cast(Sort::Char).unwrap(),
            Constant::Char(65)
        );
        assert_eq!(
            Constant::Int(200).cast(Sort::Byte).unwrap(),
            Constant::Byte(-56)
        );
        assert_eq!(
            Constant::Char(0xffff).cast(Sort::Int).unwrap(),
            Constant::Int(0xffff)
        );
        assert!(Constant::Bool(true).cast(Sort::Int).is_err());
    }

    #[test]
    fn mismatched_sorts_are_rejected() {
        assert!(matches!(
            Constant::binary(
                BinaryOp::Add,
                &Constant::Int(1),
                &Constant::Long(1),
                OverflowPolicy::Wrapping
            ),
            Err(Error::Sort(_))
        ));
    }
}

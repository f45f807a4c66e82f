//! Operators, and the sort rules which govern them.

use crate::expr::Sort;
use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    /// Truncating division.
    Div,
    /// Remainder of truncating division.
    Rem,
    /// Division rounding toward negative infinity.
    FloorDiv,
    /// Modulus whose sign follows the divisor.
    FloorMod,
    And,
    Or,
    Xor,
    Shl,
    /// Arithmetic shift right.
    Shr,
    /// Logical shift right.
    Ushr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum UnaryOp {
    Neg,
    Not,
}

/// How integer arithmetic treats results that do not fit their sort.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum OverflowPolicy {
    /// Two's-complement wraparound.
    #[default]
    Wrapping,
    /// Overflow raises `Fault::Overflow`.
    Strict,
}

impl BinaryOp {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }

    pub fn is_shift(&self) -> bool {
        matches!(self, BinaryOp::Shl | BinaryOp::Shr | BinaryOp::Ushr)
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::FloorDiv => "//",
            BinaryOp::FloorMod => "%%",
            BinaryOp::And => "&",
            BinaryOp::Or => "|",
            BinaryOp::Xor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::Ushr => ">>>",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
        }
    }

    /// The sort of `lhs op rhs`, or a `Sort` error if the operands are not
    /// valid for this operator.
    pub fn result_sort(&self, lhs: Sort, rhs: Sort) -> Result<Sort, Error> {
        let mismatch = || {
            Err(Error::Sort(format!(
                "{} is not defined over {} and {}",
                self.symbol(),
                lhs,
                rhs
            )))
        };
        match self {
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
                if lhs == rhs && lhs.is_arithmetic() {
                    Ok(lhs)
                } else {
                    mismatch()
                }
            }
            BinaryOp::FloorDiv | BinaryOp::FloorMod => {
                if lhs == rhs && matches!(lhs, Sort::Int | Sort::Long) {
                    Ok(lhs)
                } else {
                    mismatch()
                }
            }
            BinaryOp::And | BinaryOp::Or | BinaryOp::Xor => {
                if lhs == rhs && matches!(lhs, Sort::Int | Sort::Long | Sort::Bool) {
                    Ok(lhs)
                } else {
                    mismatch()
                }
            }
            BinaryOp::Shl | BinaryOp::Shr | BinaryOp::Ushr => {
                if matches!(lhs, Sort::Int | Sort::Long) && matches!(rhs, Sort::Int | Sort::Long) {
                    Ok(lhs)
                } else {
                    mismatch()
                }
            }
            BinaryOp::Eq | BinaryOp::Ne => {
                if lhs == rhs {
                    Ok(Sort::Bool)
                } else {
                    mismatch()
                }
            }
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                if lhs == rhs && lhs.is_numeric() {
                    Ok(Sort::Bool)
                } else {
                    mismatch()
                }
            }
        }
    }
}

impl UnaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
        }
    }

    pub fn result_sort(&self, operand: Sort) -> Result<Sort, Error> {
        match self {
            UnaryOp::Neg if operand.is_arithmetic() => Ok(operand),
            UnaryOp::Not if operand == Sort::Bool => Ok(operand),
            _ => Err(Error::Sort(format!(
                "{} is not defined over {}",
                self.symbol(),
                operand
            ))),
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Casts between `Bool` and numeric sorts are not part of the language.
pub fn check_cast(from: Sort, to: Sort) -> Result<(), Error> {
    if from == to || (from.is_numeric() && to.is_numeric()) {
        Ok(())
    } else {
        Err(Error::Sort(format!("cannot cast {} to {}", from, to)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arithmetic_requires_matching_sorts() {
        assert_eq!(
            BinaryOp::Add.result_sort(Sort::Int, Sort::Int).unwrap(),
            Sort::Int
        );
        assert!(BinaryOp::Add.result_sort(Sort::Int, Sort::Long).is_err());
        assert!(BinaryOp::Add.result_sort(Sort::Short, Sort::Short).is_err());
        assert!(BinaryOp::FloorDiv
            .result_sort(Sort::Double, Sort::Double)
            .is_err());
    }

    #[test]
    fn comparisons_yield_bool() {
        assert_eq!(
            BinaryOp::Lt.result_sort(Sort::Char, Sort::Char).unwrap(),
            Sort::Bool
        );
        assert!(BinaryOp::Lt.result_sort(Sort::Bool, Sort::Bool).is_err());
        assert_eq!(
            BinaryOp::Eq.result_sort(Sort::Bool, Sort::Bool).unwrap(),
            Sort::Bool
        );
    }

    #[test]
    fn shifts_take_any_integral_distance() {
        assert_eq!(
            BinaryOp::Shl.result_sort(Sort::Long, Sort::Int).unwrap(),
            Sort::Long
        );
        assert!(BinaryOp::Shl.result_sort(Sort::Float, Sort::Int).is_err());
    }

    #[test]
    fn bool_casts_only_to_bool() {
        assert!(check_cast(Sort::Bool, Sort::Bool).is_ok());
        assert!(check_cast(Sort::Bool, Sort::Int).is_err());
        assert!(check_cast(Sort::Double, Sort::Char).is_ok());
    }
}

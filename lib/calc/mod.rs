//! Arithmetic over runtime values.
//!
//! Every operation the search region performs goes through a `Calculation`,
//! which decides whether the result can be computed concretely or needs a
//! symbolic expression.

mod array;
mod concolic;
mod symbolic;

pub use self::concolic::ConcolicCalculation;
pub use self::symbolic::SymbolicCalculation;

use crate::config::Mode;
use crate::expr::{BinaryOp, OverflowPolicy, Sort, UnaryOp, Value};
use crate::Error;

pub trait Calculation: Send + Sync {
    fn binary(&self, op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, Error>;

    fn unary(&self, op: UnaryOp, operand: &Value) -> Result<Value, Error>;

    fn cast(&self, sort: Sort, operand: &Value) -> Result<Value, Error>;
}

/// The calculation for values of the given mode.
pub fn for_mode(mode: Mode, policy: OverflowPolicy) -> Box<dyn Calculation> {
    match mode {
        Mode::Symbolic => Box::new(SymbolicCalculation::new(policy)),
        Mode::Concolic => Box::new(ConcolicCalculation::new(policy)),
    }
}

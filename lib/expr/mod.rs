//! The expression language of the engine.
//!
//! Values in the search region are one of eight primitive sorts, and are
//! either concrete, symbolic, or a concolic pair of both. Symbolic values are
//! expression trees over free variables and, for primitive arrays addressed
//! by symbolic indices, array terms.

mod constant;
mod expression;
mod op;
mod sort;
mod value;
mod variable;

pub use self::constant::Constant;
pub use self::expression::{ArrayTerm, Assignment, Expression, Symbols};
pub use self::op::{check_cast, BinaryOp, OverflowPolicy, UnaryOp};
pub use self::sort::Sort;
pub use self::value::{Concolic, Value};
pub use self::variable::Variable;

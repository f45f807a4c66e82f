use crate::expr::Constant;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The primitive sorts of the instrumented language.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Sort {
    Int,
    Long,
    Double,
    Float,
    Short,
    Byte,
    Bool,
    Char,
}

impl Sort {
    pub const ALL: [Sort; 8] = [
        Sort::Int,
        Sort::Long,
        Sort::Double,
        Sort::Float,
        Sort::Short,
        Sort::Byte,
        Sort::Bool,
        Sort::Char,
    ];

    /// A dense index for this sort, used to address per-sort counters.
    pub fn index(&self) -> usize {
        match self {
            Sort::Int => 0,
            Sort::Long => 1,
            Sort::Double => 2,
            Sort::Float => 3,
            Sort::Short => 4,
            Sort::Byte => 5,
            Sort::Bool => 6,
            Sort::Char => 7,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Sort::Int => "int",
            Sort::Long => "long",
            Sort::Double => "double",
            Sort::Float => "float",
            Sort::Short => "short",
            Sort::Byte => "byte",
            Sort::Bool => "bool",
            Sort::Char => "char",
        }
    }

    /// The width of this sort in bits.
    pub fn bits(&self) -> usize {
        match self {
            Sort::Long | Sort::Double => 64,
            Sort::Int | Sort::Float => 32,
            Sort::Short | Sort::Char => 16,
            Sort::Byte => 8,
            Sort::Bool => 1,
        }
    }

    /// Sorts the instrumented language performs arithmetic on directly.
    /// Narrower sorts are widened to `Int` by the instrumentation first.
    pub fn is_arithmetic(&self) -> bool {
        matches!(self, Sort::Int | Sort::Long | Sort::Float | Sort::Double)
    }

    pub fn is_integral(&self) -> bool {
        matches!(
            self,
            Sort::Int | Sort::Long | Sort::Short | Sort::Byte | Sort::Char
        )
    }

    pub fn is_floating(&self) -> bool {
        matches!(self, Sort::Float | Sort::Double)
    }

    pub fn is_numeric(&self) -> bool {
        *self != Sort::Bool
    }

    /// The value a fresh array cell of this sort holds.
    pub fn default_value(&self) -> Constant {
        match self {
            Sort::Int => Constant::Int(0),
            Sort::Long => Constant::Long(0),
            Sort::Double => Constant::Double(0.0),
            Sort::Float => Constant::Float(0.0),
            Sort::Short => Constant::Short(0),
            Sort::Byte => Constant::Byte(0),
            Sort::Bool => Constant::Bool(false),
            Sort::Char => Constant::Char(0),
        }
    }
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

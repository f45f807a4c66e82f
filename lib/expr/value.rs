use crate::expr::{Constant, Expression, Sort};
use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A primitive value flowing through the search region.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub enum Value {
    Concrete(Constant),
    Symbolic(Expression),
    Concolic(Concolic),
}

/// A symbolic expression paired with the concrete value concrete execution
/// would have produced.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Concolic {
    symbolic: Expression,
    shadow: Constant,
}

impl Concolic {
    pub fn new(symbolic: Expression, shadow: Constant) -> Result<Concolic, Error> {
        if symbolic.sort() != shadow.sort() {
            return Err(Error::Sort(format!(
                "concolic pair of {} and {}",
                symbolic.sort(),
                shadow.sort()
            )));
        }
        Ok(Concolic { symbolic, shadow })
    }

    pub fn symbolic(&self) -> &Expression {
        &self.symbolic
    }

    pub fn shadow(&self) -> &Constant {
        &self.shadow
    }
}

impl Value {
    /// A symbolic value, which collapses to a concrete one when the expression
    /// is a constant.
    pub fn symbolic(expression: Expression) -> Value {
        match expression {
            Expression::Constant(constant) => Value::Concrete(constant),
            expression => Value::Symbolic(expression),
        }
    }

    pub fn sort(&self) -> Sort {
        match self {
            Value::Concrete(constant) => constant.sort(),
            Value::Symbolic(expression) => expression.sort(),
            Value::Concolic(concolic) => concolic.shadow.sort(),
        }
    }

    pub fn is_concrete(&self) -> bool {
        matches!(self, Value::Concrete(_))
    }

    pub fn as_constant(&self) -> Option<&Constant> {
        match self {
            Value::Concrete(constant) => Some(constant),
            _ => None,
        }
    }

    /// The concrete value, for concrete values and concolic shadows.
    pub fn shadow(&self) -> Option<&Constant> {
        match self {
            Value::Concrete(constant) => Some(constant),
            Value::Concolic(concolic) => Some(&concolic.shadow),
            Value::Symbolic(_) => None,
        }
    }

    /// The symbolic side of this value. Concrete values become constant
    /// expressions.
    pub fn to_expression(&self) -> Expression {
        match self {
            Value::Concrete(constant) => Expression::Constant(*constant),
            Value::Symbolic(expression) => expression.clone(),
            Value::Concolic(concolic) => concolic.symbolic.clone(),
        }
    }
}

impl From<Constant> for Value {
    fn from(constant: Constant) -> Value {
        Value::Concrete(constant)
    }
}

impl From<Expression> for Value {
    fn from(expression: Expression) -> Value {
        Value::symbolic(expression)
    }
}

impl From<Concolic> for Value {
    fn from(concolic: Concolic) -> Value {
        Value::Concolic(concolic)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Value {
        Value::Concrete(Constant::Int(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Value {
        Value::Concrete(Constant::Long(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Value {
        Value::Concrete(Constant::Double(v))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Value {
        Value::Concrete(Constant::Bool(v))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Concrete(constant) => write!(f, "{}", constant),
            Value::Symbolic(expression) => write!(f, "{}", expression),
            Value::Concolic(concolic) => write!(f, "{} [{}]", concolic.symbolic, concolic.shadow),
        }
    }
}

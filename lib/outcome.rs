//! The terminal outcomes of explored paths.

use crate::expr::{Constant, Expression};
use crate::Fault;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A budget which cut a path short.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum BudgetKind {
    /// The path wanted to open a choice deeper than the local depth budget.
    ChoiceDepth,
    /// A budget the search region enforces itself, such as a loop bound.
    Region(String),
}

impl fmt::Display for BudgetKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BudgetKind::ChoiceDepth => write!(f, "choice depth"),
            BudgetKind::Region(name) => write!(f, "{}", name),
        }
    }
}

/// A concrete rendering of a value produced by the search region.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub enum Label {
    Unit,
    Constant(Constant),
    Null,
    /// An array, identified so that later occurrences can refer back to it.
    Array { id: usize, elements: Vec<Label> },
    /// A reference to an array labeled earlier in the same result.
    Backref(usize),
    Tuple(Vec<Label>),
}

impl Label {
    pub fn as_constant(&self) -> Option<&Constant> {
        match self {
            Label::Constant(constant) => Some(constant),
            _ => None,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Label::Unit => write!(f, "()"),
            Label::Constant(constant) => write!(f, "{}", constant),
            Label::Null => write!(f, "null"),
            Label::Array { id, elements } => {
                let elements = elements
                    .iter()
                    .map(|element| element.to_string())
                    .collect::<Vec<String>>();
                write!(f, "#{}[{}]", id, elements.join(", "))
            }
            Label::Backref(id) => write!(f, "#{}", id),
            Label::Tuple(labels) => {
                let labels = labels
                    .iter()
                    .map(|label| label.to_string())
                    .collect::<Vec<String>>();
                write!(f, "({})", labels.join(", "))
            }
        }
    }
}

/// A path which returned normally.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Solution {
    pub value: Label,
    /// Values the search region named, labeled under the same model.
    pub labels: BTreeMap<String, Label>,
    /// The path constraints, outermost first.
    pub constraints: Vec<Expression>,
}

/// A path which ended in a fault of the explored program.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ExceptionSolution {
    pub fault: Fault,
    pub labels: BTreeMap<String, Label>,
    pub constraints: Vec<Expression>,
}

/// The terminal outcome of one explored path.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub enum Outcome {
    Solution(Solution),
    ExceptionSolution(ExceptionSolution),
    Fail,
    ExceededBudget(BudgetKind),
}

impl Outcome {
    /// Solutions and exception solutions both count as solutions.
    pub fn is_solution(&self) -> bool {
        matches!(self, Outcome::Solution(_) | Outcome::ExceptionSolution(_))
    }

    pub fn solution(&self) -> Option<&Solution> {
        match self {
            Outcome::Solution(solution) => Some(solution),
            _ => None,
        }
    }

    /// A short name for this kind of outcome.
    pub fn kind(&self) -> &'static str {
        match self {
            Outcome::Solution(_) => "solution",
            Outcome::ExceptionSolution(_) => "exception",
            Outcome::Fail => "fail",
            Outcome::ExceededBudget(_) => "exceeded-budget",
        }
    }
}

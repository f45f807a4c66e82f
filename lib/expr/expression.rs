use crate::expr::{check_cast, BinaryOp, Constant, OverflowPolicy, Sort, UnaryOp, Variable};
use crate::Error;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A symbolic expression over primitive sorts.
///
/// Expressions are only built through the sort-checked constructors, so every
/// `Expression` in the engine is well-sorted.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub enum Expression {
    Constant(Constant),
    Variable(Variable),
    Binary(BinaryOp, Box<Expression>, Box<Expression>),
    Unary(UnaryOp, Box<Expression>),
    Cast(Sort, Box<Expression>),
    Ite(Box<Expression>, Box<Expression>, Box<Expression>),
    Select(Box<ArrayTerm>, Box<Expression>),
}

/// The content of a primitive array whose cells are addressed by symbolic
/// indices.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub enum ArrayTerm {
    /// Unconstrained content.
    Variable { name: String, element: Sort },
    /// Every cell holds the same value.
    Constant { element: Constant },
    Store {
        base: Box<ArrayTerm>,
        index: Expression,
        value: Expression,
    },
}

/// Gives values to the free symbols of an expression.
pub trait Assignment {
    fn variable(&self, variable: &Variable) -> Option<Constant>;

    /// The value of cell `index` of the array variable `array`. Cells without
    /// a value hold the default value of their sort.
    fn element(&self, _array: &str, _index: i64) -> Option<Constant> {
        None
    }
}

impl Assignment for FxHashMap<Variable, Constant> {
    fn variable(&self, variable: &Variable) -> Option<Constant> {
        self.get(variable).copied()
    }
}

/// The free symbols an expression mentions.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Symbols {
    pub variables: BTreeSet<Variable>,
    /// Array variables, and their element sorts.
    pub arrays: BTreeMap<String, Sort>,
    /// Cells of array variables read at a constant index.
    pub cells: BTreeSet<(String, i64)>,
}

impl Symbols {
    pub fn new() -> Symbols {
        Symbols::default()
    }

    pub fn collect(&mut self, expression: &Expression) {
        match expression {
            Expression::Constant(_) => {}
            Expression::Variable(variable) => {
                self.variables.insert(variable.clone());
            }
            Expression::Binary(_, lhs, rhs) => {
                self.collect(lhs);
                self.collect(rhs);
            }
            Expression::Unary(_, operand) | Expression::Cast(_, operand) => self.collect(operand),
            Expression::Ite(condition, then, otherwise) => {
                self.collect(condition);
                self.collect(then);
                self.collect(otherwise);
            }
            Expression::Select(array, index) => {
                self.collect(index);
                self.collect_array(array);
                if let Some(k) = index.as_constant().and_then(|c| c.as_i64()) {
                    self.cells.insert((array.root_name().to_string(), k));
                }
            }
        }
    }

    fn collect_array(&mut self, array: &ArrayTerm) {
        match array {
            ArrayTerm::Variable { name, element } => {
                self.arrays.insert(name.clone(), *element);
            }
            ArrayTerm::Constant { .. } => {}
            ArrayTerm::Store { base, index, value } => {
                self.collect_array(base);
                self.collect(index);
                self.collect(value);
            }
        }
    }
}

impl Expression {
    pub fn constant(constant: Constant) -> Expression {
        Expression::Constant(constant)
    }

    pub fn variable(variable: Variable) -> Expression {
        Expression::Variable(variable)
    }

    pub fn bool(value: bool) -> Expression {
        Expression::Constant(Constant::Bool(value))
    }

    pub fn int(value: i32) -> Expression {
        Expression::Constant(Constant::Int(value))
    }

    /// Create `lhs op rhs`.
    /// # Error
    /// The operands are not valid for `op`.
    pub fn binary(op: BinaryOp, lhs: Expression, rhs: Expression) -> Result<Expression, Error> {
        op.result_sort(lhs.sort(), rhs.sort())?;
        Ok(Expression::Binary(op, Box::new(lhs), Box::new(rhs)))
    }

    pub fn unary(op: UnaryOp, operand: Expression) -> Result<Expression, Error> {
        op.result_sort(operand.sort())?;
        Ok(Expression::Unary(op, Box::new(operand)))
    }

    /// Cast `operand` to `sort`. Casting to the operand's own sort returns the
    /// operand unchanged.
    pub fn cast(sort: Sort, operand: Expression) -> Result<Expression, Error> {
        check_cast(operand.sort(), sort)?;
        if operand.sort() == sort {
            Ok(operand)
        } else {
            Ok(Expression::Cast(sort, Box::new(operand)))
        }
    }

    pub fn ite(
        condition: Expression,
        then: Expression,
        otherwise: Expression,
    ) -> Result<Expression, Error> {
        if condition.sort() != Sort::Bool || then.sort() != otherwise.sort() {
            return Err(Error::Sort(format!(
                "ite over {}, {} and {}",
                condition.sort(),
                then.sort(),
                otherwise.sort()
            )));
        }
        Ok(Expression::Ite(
            Box::new(condition),
            Box::new(then),
            Box::new(otherwise),
        ))
    }

    pub fn select(array: ArrayTerm, index: Expression) -> Result<Expression, Error> {
        if index.sort() != Sort::Int {
            return Err(Error::Sort(format!("array index of sort {}", index.sort())));
        }
        Ok(Expression::Select(Box::new(array), Box::new(index)))
    }

    pub fn and(lhs: Expression, rhs: Expression) -> Result<Expression, Error> {
        Expression::binary(BinaryOp::And, lhs, rhs)
    }

    pub fn or(lhs: Expression, rhs: Expression) -> Result<Expression, Error> {
        Expression::binary(BinaryOp::Or, lhs, rhs)
    }

    pub fn not(operand: Expression) -> Result<Expression, Error> {
        Expression::unary(UnaryOp::Not, operand)
    }

    pub fn eq(lhs: Expression, rhs: Expression) -> Result<Expression, Error> {
        Expression::binary(BinaryOp::Eq, lhs, rhs)
    }

    pub fn lt(lhs: Expression, rhs: Expression) -> Result<Expression, Error> {
        Expression::binary(BinaryOp::Lt, lhs, rhs)
    }

    pub fn le(lhs: Expression, rhs: Expression) -> Result<Expression, Error> {
        Expression::binary(BinaryOp::Le, lhs, rhs)
    }

    pub fn ge(lhs: Expression, rhs: Expression) -> Result<Expression, Error> {
        Expression::binary(BinaryOp::Ge, lhs, rhs)
    }

    /// `0 <= index < length`, over `Int` operands.
    pub fn in_bounds(index: Expression, length: Expression) -> Result<Expression, Error> {
        Expression::and(
            Expression::le(Expression::int(0), index.clone())?,
            Expression::lt(index, length)?,
        )
    }

    /// The conjunction of `expressions`, which is `true` when there are none.
    pub fn conjunction<'e, I>(expressions: I) -> Result<Expression, Error>
    where
        I: IntoIterator<Item = &'e Expression>,
    {
        let mut result: Option<Expression> = None;
        for expression in expressions {
            result = Some(match result {
                Some(conjunction) => Expression::and(conjunction, expression.clone())?,
                None => expression.clone(),
            });
        }
        Ok(result.unwrap_or_else(|| Expression::bool(true)))
    }

    pub fn sort(&self) -> Sort {
        match self {
            Expression::Constant(constant) => constant.sort(),
            Expression::Variable(variable) => variable.sort(),
            Expression::Binary(op, lhs, _) => {
                if op.is_comparison() {
                    Sort::Bool
                } else {
                    lhs.sort()
                }
            }
            Expression::Unary(_, operand) => operand.sort(),
            Expression::Cast(sort, _) => *sort,
            Expression::Ite(_, then, _) => then.sort(),
            Expression::Select(array, _) => array.element_sort(),
        }
    }

    pub fn as_constant(&self) -> Option<&Constant> {
        match self {
            Expression::Constant(constant) => Some(constant),
            _ => None,
        }
    }

    pub fn symbols(&self) -> Symbols {
        let mut symbols = Symbols::new();
        symbols.collect(self);
        symbols
    }

    pub fn variables(&self) -> BTreeSet<Variable> {
        self.symbols().variables
    }

    /// Evaluate this expression under `assignment`.
    ///
    /// Symbolic arithmetic always wraps, as the solver's bit-vector theory
    /// does. Division by zero is an `Error::Fault`.
    pub fn evaluate(&self, assignment: &dyn Assignment) -> Result<Constant, Error> {
        match self {
            Expression::Constant(constant) => Ok(*constant),
            Expression::Variable(variable) => assignment
                .variable(variable)
                .ok_or_else(|| Error::Solver(format!("no value for {}", variable))),
            Expression::Binary(op, lhs, rhs) => Constant::binary(
                *op,
                &lhs.evaluate(assignment)?,
                &rhs.evaluate(assignment)?,
                OverflowPolicy::Wrapping,
            ),
            Expression::Unary(op, operand) => {
                Constant::unary(*op, &operand.evaluate(assignment)?, OverflowPolicy::Wrapping)
            }
            Expression::Cast(sort, operand) => operand.evaluate(assignment)?.cast(*sort),
            Expression::Ite(condition, then, otherwise) => {
                let condition = condition
                    .evaluate(assignment)?
                    .as_bool()
                    .ok_or_else(|| Error::Sort("ite condition is not bool".to_string()))?;
                if condition {
                    then.evaluate(assignment)
                } else {
                    otherwise.evaluate(assignment)
                }
            }
            Expression::Select(array, index) => {
                let index = index
                    .evaluate(assignment)?
                    .as_i64()
                    .ok_or_else(|| Error::Sort("array index is not integral".to_string()))?;
                array.evaluate_at(index, assignment)
            }
        }
    }
}

impl ArrayTerm {
    pub fn variable<S: Into<String>>(name: S, element: Sort) -> ArrayTerm {
        ArrayTerm::Variable {
            name: name.into(),
            element,
        }
    }

    /// An array whose every cell holds the default value of `element`.
    pub fn defaults(element: Sort) -> ArrayTerm {
        ArrayTerm::Constant {
            element: element.default_value(),
        }
    }

    pub fn store(base: ArrayTerm, index: Expression, value: Expression) -> Result<ArrayTerm, Error> {
        if index.sort() != Sort::Int || value.sort() != base.element_sort() {
            return Err(Error::Sort(format!(
                "store of {} at index of sort {} into array of {}",
                value.sort(),
                index.sort(),
                base.element_sort()
            )));
        }
        Ok(ArrayTerm::Store {
            base: Box::new(base),
            index,
            value,
        })
    }

    pub fn element_sort(&self) -> Sort {
        match self {
            ArrayTerm::Variable { element, .. } => *element,
            ArrayTerm::Constant { element } => element.sort(),
            ArrayTerm::Store { base, .. } => base.element_sort(),
        }
    }

    /// The name of the array variable at the bottom of a chain of stores, or
    /// an empty name for constant arrays.
    pub fn root_name(&self) -> &str {
        match self {
            ArrayTerm::Variable { name, .. } => name,
            ArrayTerm::Constant { .. } => "",
            ArrayTerm::Store { base, .. } => base.root_name(),
        }
    }

    pub fn evaluate_at(&self, index: i64, assignment: &dyn Assignment) -> Result<Constant, Error> {
        match self {
            ArrayTerm::Variable { name, element } => Ok(assignment
                .element(name, index)
                .unwrap_or_else(|| element.default_value())),
            ArrayTerm::Constant { element } => Ok(*element),
            ArrayTerm::Store {
                base,
                index: stored_at,
                value,
            } => {
                if stored_at.evaluate(assignment)?.as_i64() == Some(index) {
                    value.evaluate(assignment)
                } else {
                    base.evaluate_at(index, assignment)
                }
            }
        }
    }
}

impl From<Constant> for Expression {
    fn from(constant: Constant) -> Expression {
        Expression::Constant(constant)
    }
}

impl From<Variable> for Expression {
    fn from(variable: Variable) -> Expression {
        Expression::Variable(variable)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Expression::Constant(constant) => write!(f, "{}", constant),
            Expression::Variable(variable) => write!(f, "{}", variable.name()),
            Expression::Binary(op, lhs, rhs) => write!(f, "({} {} {})", lhs, op, rhs),
            Expression::Unary(op, operand) => write!(f, "{}{}", op, operand),
            Expression::Cast(sort, operand) => write!(f, "(({}) {})", sort, operand),
            Expression::Ite(condition, then, otherwise) => {
                write!(f, "({} ? {} : {})", condition, then, otherwise)
            }
            Expression::Select(array, index) => write!(f, "{}[{}]", array, index),
        }
    }
}

impl fmt::Display for ArrayTerm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ArrayTerm::Variable { name, .. } => write!(f, "{}", name),
            ArrayTerm::Constant { element } => write!(f, "[{}..]", element),
            ArrayTerm::Store { base, index, value } => {
                write!(f, "{}{{{} <- {}}}", base, index, value)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn x() -> Expression {
        Expression::variable(Variable::new("x", Sort::Int))
    }

    #[test]
    fn constructors_check_sorts() {
        assert!(Expression::binary(
            BinaryOp::Add,
            x(),
            Expression::constant(Constant::Long(1))
        )
        .is_err());
        assert!(Expression::ite(x(), x(), x()).is_err());
        assert!(Expression::select(
            ArrayTerm::defaults(Sort::Int),
            Expression::constant(Constant::Long(0))
        )
        .is_err());
        let lt = Expression::lt(x(), Expression::int(0)).unwrap();
        assert_eq!(lt.sort(), Sort::Bool);
        assert_eq!(lt.to_string(), "(x < 0)");
    }

    #[test]
    fn evaluate_under_assignment() {
        let mut assignment = FxHashMap::default();
        assignment.insert(Variable::new("x", Sort::Int), Constant::Int(i32::MAX));

        let sum = Expression::binary(BinaryOp::Add, x(), Expression::int(1)).unwrap();
        assert_eq!(sum.evaluate(&assignment).unwrap(), Constant::Int(i32::MIN));

        let unknown = Expression::variable(Variable::new("y", Sort::Int));
        assert!(unknown.evaluate(&assignment).is_err());
    }

    #[test]
    fn select_reads_through_stores() {
        let mut assignment = FxHashMap::default();
        assignment.insert(Variable::new("x", Sort::Int), Constant::Int(2));

        let array = ArrayTerm::store(ArrayTerm::defaults(Sort::Int), x(), Expression::int(7)).unwrap();
        let hit = Expression::select(array.clone(), Expression::int(2)).unwrap();
        let miss = Expression::select(array, Expression::int(1)).unwrap();
        assert_eq!(hit.evaluate(&assignment).unwrap(), Constant::Int(7));
        assert_eq!(miss.evaluate(&assignment).unwrap(), Constant::Int(0));
    }

    #[test]
    fn symbols_are_collected() {
        let array = ArrayTerm::variable("a", Sort::Long);
        let select = Expression::select(array, Expression::int(3)).unwrap();
        let condition = Expression::eq(select, Expression::constant(Constant::Long(4))).unwrap();
        let condition = Expression::and(condition, Expression::lt(x(), Expression::int(2)).unwrap()).unwrap();

        let symbols = condition.symbols();
        assert_eq!(symbols.variables.len(), 1);
        assert_eq!(symbols.arrays.get("a"), Some(&Sort::Long));
        assert!(symbols.cells.contains(&("a".to_string(), 3)));
    }

    #[test]
    fn empty_conjunction_is_true() {
        assert_eq!(
            Expression::conjunction(&[]).unwrap(),
            Expression::bool(true)
        );
        let single = [Expression::lt(x(), Expression::int(0)).unwrap()];
        assert_eq!(Expression::conjunction(&single).unwrap(), single[0]);
    }
}

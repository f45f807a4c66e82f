//! Turn what the search region returned into concrete labels.
//!
//! Symbolic values are labeled under one model of the path constraints, so
//! every label of a single solution agrees with the others. Arrays are copied
//! at most once per result; a second occurrence of the same array, including
//! an array reachable from itself, becomes a back-reference.

use crate::context::{ArrayHeap, ArrayRef, Content, Element, ElementSort, Nullness};
use crate::expr::{Constant, Expression, Value};
use crate::outcome::Label;
use crate::region::Output;
use crate::solver::SolverSession;
use crate::Error;
use rustc_hash::FxHashMap;

pub struct Labeler<'l> {
    solver: &'l mut dyn SolverSession,
    heap: &'l ArrayHeap,
    max_free_array_length: i32,
    copies: FxHashMap<ArrayRef, usize>,
}

impl<'l> Labeler<'l> {
    pub fn new(
        solver: &'l mut dyn SolverSession,
        heap: &'l ArrayHeap,
        max_free_array_length: i32,
    ) -> Labeler<'l> {
        Labeler {
            solver,
            heap,
            max_free_array_length,
            copies: FxHashMap::default(),
        }
    }

    /// Label `output`.
    pub fn transform(&mut self, output: &Output) -> Result<Label, Error> {
        match output {
            Output::Unit => Ok(Label::Unit),
            Output::Value(value) => Ok(Label::Constant(self.value(value)?)),
            Output::Array(array) => self.array(*array),
            Output::Tuple(outputs) => Ok(Label::Tuple(
                outputs
                    .iter()
                    .map(|output| self.transform(output))
                    .collect::<Result<Vec<Label>, Error>>()?,
            )),
        }
    }

    /// Remember that `array` was copied as label `id`.
    pub fn register_copy(&mut self, array: ArrayRef) -> usize {
        let id = self.copies.len();
        self.copies.insert(array, id);
        id
    }

    pub fn already_copied(&self, array: ArrayRef) -> Option<usize> {
        self.copies.get(&array).copied()
    }

    pub fn value(&mut self, value: &Value) -> Result<Constant, Error> {
        match value {
            Value::Concrete(constant) => Ok(*constant),
            Value::Concolic(concolic) => Ok(*concolic.shadow()),
            Value::Symbolic(expression) => self.solver.label(expression),
        }
    }

    fn length(&mut self, length: &Value) -> Result<i64, Error> {
        let labeled = self
            .value(length)?
            .as_i64()
            .ok_or_else(|| Error::Sort(format!("array length {} is not integral", length)))?;
        if length.is_concrete() {
            Ok(labeled)
        } else {
            Ok(labeled.clamp(0, self.max_free_array_length as i64))
        }
    }

    fn array(&mut self, array: ArrayRef) -> Result<Label, Error> {
        if let Some(id) = self.already_copied(array) {
            return Ok(Label::Backref(id));
        }
        let heap = self.heap;
        let object = heap.get(array)?;
        let is_null = match object.nullness() {
            Nullness::Null => true,
            Nullness::NonNull => false,
            Nullness::MaybeNull(value) => self.value(value)?.as_bool().unwrap_or(false),
        };
        if is_null {
            return Ok(Label::Null);
        }

        let id = self.register_copy(array);
        let length = self.length(object.length())?;
        let mut elements = Vec::with_capacity(length.max(0) as usize);
        for index in 0..length {
            let label = match (object.content(), object.cell(index)) {
                (_, Some(Element::Value(value))) => Label::Constant(self.value(value)?),
                (_, Some(Element::Array(inner))) => self.array(*inner)?,
                (Content::Term(term), None) => {
                    let select = Expression::select(term.clone(), Expression::int(index as i32))?;
                    Label::Constant(self.solver.label(&select)?)
                }
                (Content::Cells(_), None) => match object.element() {
                    ElementSort::Primitive(sort) => Label::Constant(sort.default_value()),
                    ElementSort::Array(_) => Label::Null,
                },
            };
            elements.push(label);
        }
        Ok(Label::Array { id, elements })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ArrayObject, Content};
    use crate::expr::{ArrayTerm, Sort, Variable};
    use crate::solver::EnumeratingSolver;
    use std::collections::BTreeMap;

    fn x() -> Expression {
        Expression::variable(Variable::new("int_0", Sort::Int))
    }

    #[test]
    fn values_share_one_model() {
        let mut solver = EnumeratingSolver::new();
        solver
            .add_constraint(&Expression::eq(x(), Expression::int(2)).unwrap())
            .unwrap();
        let heap = ArrayHeap::new();
        let mut labeler = Labeler::new(&mut solver, &heap, 4);
        let output = Output::Tuple(vec![
            Output::Value(Value::Symbolic(x())),
            Output::Value(Value::from(5)),
            Output::Unit,
        ]);
        assert_eq!(
            labeler.transform(&output).unwrap(),
            Label::Tuple(vec![
                Label::Constant(Constant::Int(2)),
                Label::Constant(Constant::Int(5)),
                Label::Unit,
            ])
        );
    }

    #[test]
    fn cycles_become_backrefs() {
        let mut solver = EnumeratingSolver::new();
        let mut heap = ArrayHeap::new();
        let element = ElementSort::array_of(ElementSort::Primitive(Sort::Int));
        let outer = heap.allocate(ArrayObject::new(
            element,
            Value::from(2),
            Content::Cells(BTreeMap::new()),
            false,
        ));
        heap.get_mut(outer)
            .unwrap()
            .set_cell(0, Element::Array(outer))
            .unwrap();

        let mut labeler = Labeler::new(&mut solver, &heap, 4);
        let label = labeler
            .transform(&Output::Tuple(vec![Output::Array(outer), Output::Array(outer)]))
            .unwrap();
        assert_eq!(
            label,
            Label::Tuple(vec![
                Label::Array {
                    id: 0,
                    elements: vec![Label::Backref(0), Label::Null],
                },
                Label::Backref(0),
            ])
        );
    }

    #[test]
    fn symbolic_lengths_and_terms() {
        let mut solver = EnumeratingSolver::new();
        let length = Expression::variable(Variable::new("int_1", Sort::Int));
        solver
            .add_constraint(&Expression::eq(length.clone(), Expression::int(2)).unwrap())
            .unwrap();
        let mut heap = ArrayHeap::new();
        let term = ArrayTerm::store(
            ArrayTerm::defaults(Sort::Int),
            Expression::int(1),
            Expression::int(9),
        )
        .unwrap();
        let array = heap.allocate(ArrayObject::new(
            ElementSort::Primitive(Sort::Int),
            Value::Symbolic(length),
            Content::Term(term),
            true,
        ));

        let mut labeler = Labeler::new(&mut solver, &heap, 4);
        assert_eq!(
            labeler.transform(&Output::Array(array)).unwrap(),
            Label::Array {
                id: 0,
                elements: vec![
                    Label::Constant(Constant::Int(0)),
                    Label::Constant(Constant::Int(9)),
                ],
            }
        );
    }
}

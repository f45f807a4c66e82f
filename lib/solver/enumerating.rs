//! A solver which decides satisfiability by enumerating assignments over a
//! small domain.
//!
//! The domain of each variable is a handful of values around zero, plus the
//! neighbours of every constant mentioned by the constraints. This makes the
//! solver complete for the small, hand-written regions the engine is tested
//! with, and useless for anything else.

use crate::expr::{ArrayTerm, Assignment, Constant, Expression, Sort, Symbols, Variable};
use crate::solver::{SolverFactory, SolverSession};
use crate::Error;
use log::trace;
use rustc_hash::FxHashMap;

const DEFAULT_MAX_ASSIGNMENTS: usize = 1 << 20;

/// A satisfying assignment. Variables without a value take the default value
/// of their sort.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Model {
    variables: FxHashMap<Variable, Constant>,
    cells: FxHashMap<(String, i64), Constant>,
}

impl Model {
    pub fn new() -> Model {
        Model::default()
    }

    pub fn set_variable(&mut self, variable: Variable, value: Constant) {
        self.variables.insert(variable, value);
    }

    pub fn set_cell<S: Into<String>>(&mut self, array: S, index: i64, value: Constant) {
        self.cells.insert((array.into(), index), value);
    }
}

impl Assignment for Model {
    fn variable(&self, variable: &Variable) -> Option<Constant> {
        Some(
            self.variables
                .get(variable)
                .copied()
                .unwrap_or_else(|| variable.sort().default_value()),
        )
    }

    fn element(&self, array: &str, index: i64) -> Option<Constant> {
        self.cells.get(&(array.to_string(), index)).copied()
    }
}

#[derive(Clone, Debug)]
enum Atom {
    Variable(Variable),
    Cell(String, i64, Sort),
}

#[derive(Clone, Debug)]
pub struct EnumeratingSolver {
    frames: Vec<Vec<Expression>>,
    max_assignments: usize,
    // None when stale, Some(None) when the constraints are unsatisfiable
    model: Option<Option<Model>>,
}

impl Default for EnumeratingSolver {
    fn default() -> EnumeratingSolver {
        EnumeratingSolver::new()
    }
}

impl EnumeratingSolver {
    pub fn new() -> EnumeratingSolver {
        EnumeratingSolver {
            frames: vec![Vec::new()],
            max_assignments: DEFAULT_MAX_ASSIGNMENTS,
            model: None,
        }
    }

    /// Give up with an error rather than enumerate more than
    /// `max_assignments` assignments.
    pub fn with_max_assignments(mut self, max_assignments: usize) -> EnumeratingSolver {
        self.max_assignments = max_assignments;
        self
    }

    fn all_constraints(&self) -> impl Iterator<Item = &Expression> {
        self.frames.iter().flat_map(|frame| frame.iter())
    }

    fn model(&mut self) -> Result<Option<&Model>, Error> {
        if self.model.is_none() {
            self.model = Some(self.search()?);
        }
        Ok(self.model.as_ref().and_then(|model| model.as_ref()))
    }

    fn search(&self) -> Result<Option<Model>, Error> {
        let mut symbols = Symbols::new();
        let mut hints = Vec::new();
        for constraint in self.all_constraints() {
            symbols.collect(constraint);
            collect_constants(constraint, &mut hints);
        }

        let mut atoms: Vec<Atom> = symbols
            .variables
            .into_iter()
            .map(Atom::Variable)
            .collect();
        for (array, index) in symbols.cells {
            if let Some(sort) = symbols.arrays.get(&array) {
                atoms.push(Atom::Cell(array, index, *sort));
            }
        }

        let domains = atoms
            .iter()
            .map(|atom| match atom {
                Atom::Variable(variable) => domain(variable.sort(), &hints),
                Atom::Cell(_, _, sort) => domain(*sort, &hints),
            })
            .collect::<Vec<Vec<Constant>>>();

        let total = domains
            .iter()
            .try_fold(1usize, |total, domain| total.checked_mul(domain.len()));
        match total {
            Some(total) if total <= self.max_assignments => {}
            _ => {
                return Err(Error::Solver(format!(
                    "{} atoms exceed the enumeration limit of {} assignments",
                    atoms.len(),
                    self.max_assignments
                )))
            }
        }

        let mut cursor = vec![0usize; atoms.len()];
        loop {
            let mut model = Model::new();
            for (i, atom) in atoms.iter().enumerate() {
                let value = domains[i][cursor[i]];
                match atom {
                    Atom::Variable(variable) => model.set_variable(variable.clone(), value),
                    Atom::Cell(array, index, _) => model.set_cell(array.clone(), *index, value),
                }
            }

            if self.all_constraints().all(|constraint| satisfies(constraint, &model)) {
                return Ok(Some(model));
            }

            // odometer step
            let mut position = 0;
            loop {
                if position == cursor.len() {
                    return Ok(None);
                }
                cursor[position] += 1;
                if cursor[position] < domains[position].len() {
                    break;
                }
                cursor[position] = 0;
                position += 1;
            }
        }
    }
}

/// Evaluation errors, such as a division by zero, make an assignment
/// non-satisfying.
fn satisfies(constraint: &Expression, model: &Model) -> bool {
    matches!(constraint.evaluate(model), Ok(Constant::Bool(true)))
}

fn collect_constants(expression: &Expression, constants: &mut Vec<Constant>) {
    match expression {
        Expression::Constant(constant) => constants.push(*constant),
        Expression::Variable(_) => {}
        Expression::Binary(_, lhs, rhs) => {
            collect_constants(lhs, constants);
            collect_constants(rhs, constants);
        }
        Expression::Unary(_, operand) | Expression::Cast(_, operand) => {
            collect_constants(operand, constants)
        }
        Expression::Ite(condition, then, otherwise) => {
            collect_constants(condition, constants);
            collect_constants(then, constants);
            collect_constants(otherwise, constants);
        }
        Expression::Select(array, index) => {
            collect_array_constants(array, constants);
            collect_constants(index, constants);
        }
    }
}

fn collect_array_constants(array: &ArrayTerm, constants: &mut Vec<Constant>) {
    match array {
        ArrayTerm::Variable { .. } => {}
        ArrayTerm::Constant { element } => constants.push(*element),
        ArrayTerm::Store { base, index, value } => {
            collect_array_constants(base, constants);
            collect_constants(index, constants);
            collect_constants(value, constants);
        }
    }
}

/// Candidate values of `sort`: small values first, then the neighbours of
/// every hinted constant.
fn domain(sort: Sort, hints: &[Constant]) -> Vec<Constant> {
    let mut values: Vec<Constant> = Vec::new();
    let push = |constant: Constant, values: &mut Vec<Constant>| {
        if !values.iter().any(|value| value.identical(&constant)) {
            values.push(constant);
        }
    };

    if sort == Sort::Bool {
        return vec![Constant::Bool(false), Constant::Bool(true)];
    }

    if sort.is_floating() {
        let mut candidates = vec![0.0, 1.0, -1.0, 2.0, -2.0];
        for hint in hints {
            if let Some(v) = hint.as_f64() {
                candidates.extend_from_slice(&[v, v - 1.0, v + 1.0, v / 2.0]);
            }
        }
        for candidate in candidates {
            if let Ok(constant) = Constant::Double(candidate).cast(sort) {
                push(constant, &mut values);
            }
        }
        return values;
    }

    let mut candidates: Vec<i64> = vec![0, 1, -1, 2, -2];
    for hint in hints {
        if let Some(v) = hint.as_i64() {
            candidates.extend_from_slice(&[v, v.wrapping_sub(1), v.wrapping_add(1)]);
        }
    }
    for candidate in candidates {
        if let Ok(constant) = Constant::Long(candidate).cast(sort) {
            push(constant, &mut values);
        }
    }
    values
}

impl SolverSession for EnumeratingSolver {
    fn add_constraint(&mut self, constraint: &Expression) -> Result<(), Error> {
        trace!("assert {}", constraint);
        if let Some(frame) = self.frames.last_mut() {
            frame.push(constraint.clone());
        }
        self.model = None;
        Ok(())
    }

    fn add_constraint_after_new_backtracking_point(
        &mut self,
        constraint: &Expression,
    ) -> Result<(), Error> {
        trace!("push; assert {}", constraint);
        self.frames.push(vec![constraint.clone()]);
        self.model = None;
        Ok(())
    }

    fn backtrack_once(&mut self) -> Result<(), Error> {
        if self.frames.len() <= 1 {
            return Err(Error::invariant("backtracked below the base level"));
        }
        trace!("pop");
        self.frames.pop();
        self.model = None;
        Ok(())
    }

    fn level(&self) -> usize {
        self.frames.len() - 1
    }

    fn is_satisfiable(&mut self) -> Result<bool, Error> {
        Ok(self.model()?.is_some())
    }

    fn label(&mut self, expression: &Expression) -> Result<Constant, Error> {
        let model = self
            .model()?
            .ok_or_else(|| Error::Solver("cannot label under unsatisfiable constraints".into()))?;
        expression.evaluate(model)
    }

    fn constraints(&self) -> Vec<Expression> {
        self.all_constraints().cloned().collect()
    }
}

/// Creates `EnumeratingSolver`s.
#[derive(Clone, Debug)]
pub struct EnumeratingFactory {
    max_assignments: usize,
}

impl Default for EnumeratingFactory {
    fn default() -> EnumeratingFactory {
        EnumeratingFactory {
            max_assignments: DEFAULT_MAX_ASSIGNMENTS,
        }
    }
}

impl EnumeratingFactory {
    pub fn new(max_assignments: usize) -> EnumeratingFactory {
        EnumeratingFactory { max_assignments }
    }
}

impl SolverFactory for EnumeratingFactory {
    fn create(&self) -> Result<Box<dyn SolverSession>, Error> {
        Ok(Box::new(
            EnumeratingSolver::new().with_max_assignments(self.max_assignments),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::BinaryOp;

    fn var(name: &str) -> Expression {
        Expression::variable(Variable::new(name, Sort::Int))
    }

    #[test]
    fn push_and_pop() {
        let mut solver = EnumeratingSolver::new();
        let x_lt_0 = Expression::lt(var("x"), Expression::int(0)).unwrap();
        let x_ge_0 = Expression::ge(var("x"), Expression::int(0)).unwrap();

        solver.add_constraint(&x_lt_0).unwrap();
        assert!(solver.is_satisfiable().unwrap());
        assert_eq!(solver.level(), 0);

        solver
            .add_constraint_after_new_backtracking_point(&x_ge_0)
            .unwrap();
        assert_eq!(solver.level(), 1);
        assert!(!solver.is_satisfiable().unwrap());
        assert!(solver.label(&var("x")).is_err());

        solver.backtrack_once().unwrap();
        assert!(solver.is_satisfiable().unwrap());
        assert!(solver.backtrack_once().is_err());
        assert_eq!(solver.constraints(), vec![x_lt_0]);
    }

    #[test]
    fn labels_use_one_model() {
        let mut solver = EnumeratingSolver::new();
        let sum = Expression::binary(BinaryOp::Add, var("x"), var("y")).unwrap();
        solver
            .add_constraint(&Expression::eq(sum.clone(), Expression::int(3)).unwrap())
            .unwrap();

        let x = solver.label(&var("x")).unwrap().as_i64().unwrap();
        let y = solver.label(&var("y")).unwrap().as_i64().unwrap();
        assert_eq!(x + y, 3);
        assert_eq!(solver.label(&sum).unwrap(), Constant::Int(3));
        // unconstrained variables take their default value
        assert_eq!(solver.label(&var("z")).unwrap(), Constant::Int(0));
    }

    #[test]
    fn check_with_leaves_the_session_unchanged() {
        let mut solver = EnumeratingSolver::new();
        solver
            .add_constraint(&Expression::lt(var("x"), Expression::int(10)).unwrap())
            .unwrap();
        assert!(solver
            .check_with(&Expression::eq(var("x"), Expression::int(9)).unwrap())
            .unwrap());
        assert!(!solver
            .check_with(&Expression::eq(var("x"), Expression::int(10)).unwrap())
            .unwrap());
        assert_eq!(solver.level(), 0);
        assert_eq!(solver.constraints().len(), 1);
    }

    #[test]
    fn division_by_zero_does_not_satisfy() {
        let mut solver = EnumeratingSolver::new();
        let quotient = Expression::binary(BinaryOp::Div, Expression::int(1), var("x")).unwrap();
        solver
            .add_constraint(&Expression::eq(quotient, Expression::int(1)).unwrap())
            .unwrap();
        assert_eq!(solver.label(&var("x")).unwrap(), Constant::Int(1));
    }

    #[test]
    fn constant_array_cells_are_enumerated() {
        let mut solver = EnumeratingSolver::new();
        let cell = Expression::select(ArrayTerm::variable("a", Sort::Int), Expression::int(2)).unwrap();
        solver
            .add_constraint(&Expression::eq(cell.clone(), Expression::int(5)).unwrap())
            .unwrap();
        assert_eq!(solver.label(&cell).unwrap(), Constant::Int(5));
    }

    #[test]
    fn oversized_search_is_an_error() {
        let mut solver = EnumeratingSolver::new().with_max_assignments(4);
        let sum = Expression::binary(BinaryOp::Add, var("x"), var("y")).unwrap();
        solver
            .add_constraint(&Expression::eq(sum, Expression::int(3)).unwrap())
            .unwrap();
        assert!(matches!(solver.is_satisfiable(), Err(Error::Solver(_))));
    }
}

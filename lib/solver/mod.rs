//! Incremental constraint solver sessions.
//!
//! A session holds a stack of backtracking points. Every executor owns one
//! session, and keeps the session's level equal to the depth of the option it
//! is positioned at: level 0 holds the constraints of the root option, and
//! each option below adds one level.

mod enumerating;
pub mod smtlib;
mod z3;

pub use self::enumerating::{EnumeratingFactory, EnumeratingSolver, Model};
pub use self::z3::{Z3Factory, Z3Session};

use crate::expr::{Constant, Expression};
use crate::Error;

pub trait SolverSession: Send {
    /// Add `constraint` at the current level.
    fn add_constraint(&mut self, constraint: &Expression) -> Result<(), Error>;

    /// Open a new level, and add `constraint` to it.
    fn add_constraint_after_new_backtracking_point(
        &mut self,
        constraint: &Expression,
    ) -> Result<(), Error>;

    /// Discard the current level and its constraints.
    fn backtrack_once(&mut self) -> Result<(), Error>;

    fn backtrack(&mut self, levels: usize) -> Result<(), Error> {
        for _ in 0..levels {
            self.backtrack_once()?;
        }
        Ok(())
    }

    /// The number of levels opened above the base level.
    fn level(&self) -> usize;

    fn is_satisfiable(&mut self) -> Result<bool, Error>;

    /// Check whether the constraints together with `constraint` are
    /// satisfiable, leaving the session unchanged.
    fn check_with(&mut self, constraint: &Expression) -> Result<bool, Error> {
        self.add_constraint_after_new_backtracking_point(constraint)?;
        let result = self.is_satisfiable();
        self.backtrack_once()?;
        result
    }

    /// A value of `expression` under a model of the current constraints.
    /// Consecutive calls with no change to the constraints use the same
    /// model.
    fn label(&mut self, expression: &Expression) -> Result<Constant, Error>;

    /// Every constraint in the session, base level first.
    fn constraints(&self) -> Vec<Expression>;
}

/// Creates a fresh session for every executor.
pub trait SolverFactory: Send + Sync {
    fn create(&self) -> Result<Box<dyn SolverSession>, Error>;
}

//! Managers drive one or more executors over a search region and hand out
//! the outcomes they find.

mod budget;
mod multi;
mod single;

pub use self::budget::GlobalBudget;
pub use self::multi::MultiThreadedManager;
pub use self::single::SingleThreadedManager;

use crate::config::Config;
use crate::executor::Diagnostics;
use crate::outcome::Outcome;
use crate::region::SearchRegion;
use crate::solver::SolverFactory;
use crate::Error;
use std::any::Any;
use std::sync::Arc;

pub trait ExecutorManager {
    /// The next outcome of any kind, or `None` once exploration is over.
    fn next_outcome(&mut self) -> Result<Option<Outcome>, Error>;

    /// Every remaining outcome.
    fn all_outcomes(&mut self) -> Result<Vec<Outcome>, Error> {
        let mut outcomes = Vec::new();
        while let Some(outcome) = self.next_outcome()? {
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    /// Up to `n` solutions and exception solutions. Other outcomes are
    /// skipped.
    fn up_to_n_solutions(&mut self, n: usize) -> Result<Vec<Outcome>, Error> {
        let mut solutions = Vec::new();
        while solutions.len() < n {
            match self.next_outcome()? {
                Some(outcome) if outcome.is_solution() => solutions.push(outcome),
                Some(_) => {}
                None => break,
            }
        }
        Ok(solutions)
    }

    /// The next solution or exception solution.
    fn solution(&mut self) -> Result<Option<Outcome>, Error> {
        Ok(self.up_to_n_solutions(1)?.pop())
    }

    /// Counters summed over every executor.
    fn diagnostics(&self) -> Diagnostics;
}

/// Create the manager `config` asks for: single-threaded when
/// `config.threads()` is 1, multi-threaded otherwise.
pub fn new<R, F>(
    config: Config,
    region: R,
    solver_factory: F,
) -> Result<Box<dyn ExecutorManager>, Error>
where
    R: SearchRegion + 'static,
    F: SolverFactory + 'static,
{
    config.validate()?;
    let region: Arc<dyn SearchRegion> = Arc::new(region);
    let solver_factory: Arc<dyn SolverFactory> = Arc::new(solver_factory);
    if config.threads() <= 1 {
        Ok(Box::new(SingleThreadedManager::new(
            config,
            region,
            solver_factory,
        )?))
    } else {
        Ok(Box::new(MultiThreadedManager::new(
            config,
            region,
            solver_factory,
        )?))
    }
}

/// The message carried by a caught panic.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with a non-string payload".to_string()
    }
}

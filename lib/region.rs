//! The boundary between the engine and the program fragment it explores.

use crate::context::ArrayRef;
use crate::expr::Value;
use crate::outcome::BudgetKind;
use crate::run::Run;
use crate::{Error, Fault};

/// How a run of the search region ended, other than by returning.
#[derive(Debug)]
pub enum Signal {
    /// Abandon this path without recording an outcome.
    Backtrack,
    /// The path reached an explicit failure.
    Fail,
    ExceededBudget(BudgetKind),
    /// The explored program raised a runtime error.
    Exception(Fault),
    /// The engine can no longer be trusted. Ends the whole exploration.
    Fatal(Error),
}

impl Signal {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Signal::Fatal(_))
    }
}

impl From<Error> for Signal {
    fn from(error: Error) -> Signal {
        match error {
            Error::Fault(fault) => Signal::Exception(fault),
            error => Signal::Fatal(error),
        }
    }
}

impl From<Fault> for Signal {
    fn from(fault: Fault) -> Signal {
        Signal::Exception(fault)
    }
}

/// What a run of the search region returned.
#[derive(Clone, Debug, PartialEq)]
pub enum Output {
    Unit,
    Value(Value),
    Array(ArrayRef),
    Tuple(Vec<Output>),
}

impl From<()> for Output {
    fn from(_: ()) -> Output {
        Output::Unit
    }
}

impl From<Value> for Output {
    fn from(value: Value) -> Output {
        Output::Value(value)
    }
}

impl From<ArrayRef> for Output {
    fn from(array: ArrayRef) -> Output {
        Output::Array(array)
    }
}

impl From<Vec<Output>> for Output {
    fn from(outputs: Vec<Output>) -> Output {
        Output::Tuple(outputs)
    }
}

/// A program fragment the engine invokes once per explored path.
///
/// The region must be deterministic given the answers the `Run` gives it:
/// replaying a path relies on the region reaching the same decisions, and
/// allocating the same fresh values, in the same order.
pub trait SearchRegion: Send + Sync {
    fn run(&self, run: &mut Run<'_>) -> Result<Output, Signal>;
}

impl<F> SearchRegion for F
where
    F: Fn(&mut Run<'_>) -> Result<Output, Signal> + Send + Sync,
{
    fn run(&self, run: &mut Run<'_>) -> Result<Output, Signal> {
        self(run)
    }
}

/// Fix the signature of a closure so it can serve as a `SearchRegion`.
pub fn region<F>(f: F) -> F
where
    F: Fn(&mut Run<'_>) -> Result<Output, Signal> + Send + Sync,
{
    f
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn faults_become_exceptions() {
        let signal: Signal = Error::Fault(Fault::DivisionByZero).into();
        assert!(matches!(signal, Signal::Exception(Fault::DivisionByZero)));

        let signal: Signal = Error::invariant("diverged").into();
        assert!(signal.is_fatal());
    }
}

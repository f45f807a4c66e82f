//! Errors raised by the engine, and faults raised by the program under
//! exploration.
//!
//! An `Error` means the engine itself can no longer be trusted: a sort
//! mismatch, a broken invariant between the tree and the solver, a worker that
//! died. A `Fault` is the instrumented program misbehaving (dividing by zero,
//! indexing out of bounds) and only ends the path it happened on.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Sort error: {0}")]
    Sort(String),
    #[error("Invariant violated: {0}")]
    Invariant(String),
    #[error("Program fault: {0}")]
    Fault(Fault),
    #[error("Solver error: {0}")]
    Solver(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Executor threads did not terminate within {0:?}")]
    ShutdownTimeout(Duration),
    #[error("Executor thread panicked: {0}")]
    WorkerPanicked(String),
    #[error("Lock poisoned: {0}")]
    Poisoned(&'static str),
    #[error("Unknown option {0}")]
    UnknownOption(usize),
    #[error("Unknown choice {0}")]
    UnknownChoice(usize),
    #[error("Unknown array {0}")]
    UnknownArray(usize),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Custom(String),
    #[error("Error: {0}, Caused by: {1}")]
    Chain(Box<Error>, Box<Error>),
}

impl Error {
    pub fn chain(self, other: Error) -> Error {
        Error::Chain(Box::new(self), Box::new(other))
    }

    pub(crate) fn invariant<S: Into<String>>(message: S) -> Error {
        Error::Invariant(message.into())
    }

    /// Returns true if this error is a fault in the program being explored,
    /// rather than a failure of the engine.
    pub fn is_fault(&self) -> bool {
        matches!(self, Error::Fault(_))
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Error {
        Error::Custom(s.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Error {
        Error::Custom(s)
    }
}

impl From<Fault> for Error {
    fn from(fault: Fault) -> Error {
        Error::Fault(fault)
    }
}

impl<T> From<std::sync::PoisonError<T>> for Error {
    fn from(_: std::sync::PoisonError<T>) -> Error {
        Error::Poisoned("engine state")
    }
}

/// A runtime error of the instrumented language.
///
/// Faults terminate the current path and are reported as an exception
/// solution. They never terminate the whole exploration.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum Fault {
    DivisionByZero,
    Overflow,
    /// Index and length are present when they were concrete at the access.
    IndexOutOfBounds {
        index: Option<i64>,
        length: Option<i64>,
    },
    NullPointer,
    NegativeArraySize(i64),
    /// Raised explicitly by the search region.
    Thrown(String),
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Fault::DivisionByZero => write!(f, "division by zero"),
            Fault::Overflow => write!(f, "integer overflow"),
            Fault::IndexOutOfBounds {
                index: Some(index),
                length: Some(length),
            } => write!(f, "index {} out of bounds for length {}", index, length),
            Fault::IndexOutOfBounds { .. } => write!(f, "array index out of bounds"),
            Fault::NullPointer => write!(f, "null array access"),
            Fault::NegativeArraySize(size) => write!(f, "negative array size {}", size),
            Fault::Thrown(message) => write!(f, "{}", message),
        }
    }
}

impl std::error::Error for Fault {}

//! Mulib: search-tree symbolic and concolic execution.
//!
//! A search region is a deterministic program fragment which asks a `Run`
//! for fresh values, computes with them, and branches on them. The engine
//! runs the region once per path, records each decision in a shared search
//! tree, and checks path constraints with an incremental solver. Every path
//! ends in an `Outcome`: a labeled solution, an exception solution, a
//! failure, or an exceeded budget.
//!
//! ```
//! use mulib::config::ConfigBuilder;
//! use mulib::expr::{Sort, Value};
//! use mulib::manager::{self, ExecutorManager};
//! use mulib::region;
//! use mulib::solver::EnumeratingFactory;
//!
//! # fn main() -> Result<(), mulib::Error> {
//! let abs = region(|run| {
//!     let x = run.named("x", Sort::Int)?;
//!     let negative = run.lt(&x, &Value::from(0))?;
//!     if run.branch(&negative)? {
//!         Ok(run.neg(&x)?.into())
//!     } else {
//!         Ok(x.into())
//!     }
//! });
//!
//! let config = ConfigBuilder::new().build()?;
//! let mut manager = manager::new(config, abs, EnumeratingFactory::default())?;
//! assert_eq!(manager.all_outcomes()?.len(), 2);
//! # Ok(())
//! # }
//! ```

pub mod calc;
pub mod config;
pub mod context;
mod error;
pub mod executor;
pub mod expr;
pub mod manager;
pub mod outcome;
pub mod region;
pub mod run;
pub mod solver;
pub mod tree;

#[cfg(test)]
mod tests;

pub use crate::config::{Config, ConfigBuilder};
pub use crate::error::{Error, Fault};
pub use crate::outcome::{Label, Outcome};
pub use crate::region::{region, Output, SearchRegion, Signal};
pub use crate::run::Run;

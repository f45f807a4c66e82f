//! The state of one run of the search region.
//!
//! A run starts by replaying the recorded path from the root to the option it
//! was scheduled for. Every decision the region reaches while replaying is
//! answered from the record. Once the record is exhausted, decisions are made
//! live, and constraints the region adds are recorded against the current
//! option.

mod heap;

pub use self::heap::{ArrayHeap, ArrayObject, ArrayRef, Content, Element, ElementSort, Nullness};

use crate::expr::{Constant, Sort};
use crate::region::Output;
use crate::tree::OptionId;
use crate::Error;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

/// Budgets which apply to a single path.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct LocalBudget {
    /// The deepest choice a path may open.
    pub max_depth: Option<usize>,
}

impl LocalBudget {
    pub fn allows_depth(&self, depth: usize) -> bool {
        self.max_depth.map(|max| depth <= max).unwrap_or(true)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Phase {
    Replaying,
    Live,
}

#[derive(Clone, Debug)]
pub struct ExecutionContext {
    recorded: VecDeque<OptionId>,
    phase: Phase,
    current: OptionId,
    budget: LocalBudget,
    counters: [u64; 8],
    array_counter: u64,
    named: BTreeMap<String, Output>,
    heap: ArrayHeap,
    shadows: FxHashMap<String, Constant>,
}

impl ExecutionContext {
    /// Create a context which replays `path` from `root`. `path` is the
    /// sequence of options chosen below the root, outermost first.
    pub fn new(root: OptionId, path: Vec<OptionId>, budget: LocalBudget) -> ExecutionContext {
        ExecutionContext {
            recorded: path.into(),
            phase: Phase::Replaying,
            current: root,
            budget,
            counters: [0; 8],
            array_counter: 0,
            named: BTreeMap::new(),
            heap: ArrayHeap::new(),
            shadows: FxHashMap::default(),
        }
    }

    /// Concrete values for fresh variables, by name. Used in concolic mode.
    pub fn with_shadows(mut self, shadows: FxHashMap<String, Constant>) -> ExecutionContext {
        self.shadows = shadows;
        self
    }

    /// Step to the next recorded option.
    ///
    /// Returns false exactly once, on the call which finds the record
    /// exhausted. The context is then live, and calling `advance` again is an
    /// error.
    pub fn advance(&mut self) -> Result<bool, Error> {
        if self.phase == Phase::Live {
            return Err(Error::invariant("advance called on a live context"));
        }
        match self.recorded.pop_front() {
            Some(option) => {
                self.current = option;
                Ok(true)
            }
            None => {
                self.phase = Phase::Live;
                Ok(false)
            }
        }
    }

    /// True once the recorded path has switched over to live decisions.
    pub fn has_switched(&self) -> bool {
        self.phase == Phase::Live
    }

    /// True once every recorded option has been replayed. From this point the
    /// region runs at or below the option it was scheduled for, and new
    /// constraints belong to the current option.
    pub fn is_live(&self) -> bool {
        self.recorded.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.recorded.len()
    }

    pub fn current(&self) -> OptionId {
        self.current
    }

    pub fn set_current(&mut self, option: OptionId) -> Result<(), Error> {
        if !self.has_switched() {
            return Err(Error::invariant(format!(
                "option {} made current while replaying",
                option
            )));
        }
        self.current = option;
        Ok(())
    }

    pub fn budget(&self) -> &LocalBudget {
        &self.budget
    }

    /// The next fresh variable name for `sort`. Every sort counts separately,
    /// so a replay allocates the same names in the same order.
    pub fn next_name(&mut self, sort: Sort) -> String {
        let counter = &mut self.counters[sort.index()];
        let name = format!("{}_{}", sort.name(), counter);
        *counter += 1;
        name
    }

    pub fn next_array_name(&mut self) -> String {
        let name = format!("array_{}", self.array_counter);
        self.array_counter += 1;
        name
    }

    pub fn shadow(&self, name: &str) -> Option<Constant> {
        self.shadows.get(name).copied()
    }

    /// Record `output` under `name`, to be labeled alongside the result.
    pub fn name<S: Into<String>>(&mut self, name: S, output: Output) {
        self.named.insert(name.into(), output);
    }

    pub fn named(&self) -> &BTreeMap<String, Output> {
        &self.named
    }

    pub fn heap(&self) -> &ArrayHeap {
        &self.heap
    }

    pub fn heap_mut(&mut self) -> &mut ArrayHeap {
        &mut self.heap
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_returns_false_once() {
        let root = OptionId::new(0);
        let path = vec![OptionId::new(1), OptionId::new(4)];
        let mut context = ExecutionContext::new(root, path, LocalBudget::default());

        assert!(!context.is_live());
        assert!(context.advance().unwrap());
        assert_eq!(context.current(), OptionId::new(1));
        assert!(context.advance().unwrap());
        assert_eq!(context.current(), OptionId::new(4));

        // At the target, but the switch happens on the next decision.
        assert!(context.is_live());
        assert!(!context.has_switched());
        assert!(context.set_current(OptionId::new(5)).is_err());

        assert!(!context.advance().unwrap());
        assert!(context.has_switched());
        assert!(context.advance().is_err());
        context.set_current(OptionId::new(5)).unwrap();
        assert_eq!(context.current(), OptionId::new(5));
    }

    #[test]
    fn names_are_deterministic() {
        fn allocate(context: &mut ExecutionContext) -> Vec<String> {
            vec![
                context.next_name(Sort::Int),
                context.next_name(Sort::Bool),
                context.next_name(Sort::Int),
                context.next_array_name(),
                context.next_name(Sort::Double),
            ]
        }

        let mut first = ExecutionContext::new(OptionId::new(0), vec![], LocalBudget::default());
        let mut second = ExecutionContext::new(OptionId::new(0), vec![], LocalBudget::default());
        let names = allocate(&mut first);
        assert_eq!(names, allocate(&mut second));
        assert_eq!(names, vec!["int_0", "bool_0", "int_1", "array_0", "double_0"]);
    }

    #[test]
    fn local_budget() {
        let budget = LocalBudget { max_depth: Some(2) };
        assert!(budget.allows_depth(2));
        assert!(!budget.allows_depth(3));
        assert!(LocalBudget::default().allows_depth(usize::MAX));
    }
}

//! Budgets over the whole exploration, shared by every executor.

use crate::config::BudgetConfig;
use crate::outcome::Outcome;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct Counters {
    fails: u64,
    exceeded_budgets: u64,
    solutions: u64,
    outcomes: u64,
}

#[derive(Debug)]
pub struct GlobalBudget {
    max_fails: Option<u64>,
    max_exceeded_budgets: Option<u64>,
    max_solutions: Option<u64>,
    max_outcomes: Option<u64>,
    time_limit: Option<Duration>,
    started: Instant,
    counters: Mutex<Counters>,
}

fn reached(count: u64, limit: Option<u64>) -> bool {
    limit.map(|limit| count >= limit).unwrap_or(false)
}

impl GlobalBudget {
    pub fn new(config: &BudgetConfig) -> GlobalBudget {
        GlobalBudget {
            max_fails: config.max_fails,
            max_exceeded_budgets: config.max_exceeded_budgets,
            max_solutions: config.max_solutions,
            max_outcomes: config.max_outcomes,
            time_limit: config.time_limit(),
            started: Instant::now(),
            counters: Mutex::new(Counters::default()),
        }
    }

    // Plain counters cannot be left inconsistent by a panicking holder.
    fn counters(&self) -> MutexGuard<Counters> {
        self.counters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Count `outcome` if the budget still has room for it. Returns false,
    /// counting nothing, when a count limit has already been reached, so
    /// that executors finishing paths at the same time never publish more
    /// outcomes than the limits allow.
    pub fn admit(&self, outcome: &Outcome) -> bool {
        let mut counters = self.counters();
        let (count, limit) = match outcome {
            Outcome::Solution(_) | Outcome::ExceptionSolution(_) => {
                (counters.solutions, self.max_solutions)
            }
            Outcome::Fail => (counters.fails, self.max_fails),
            Outcome::ExceededBudget(_) => (counters.exceeded_budgets, self.max_exceeded_budgets),
        };
        if reached(count, limit) || reached(counters.outcomes, self.max_outcomes) {
            return false;
        }
        counters.outcomes += 1;
        match outcome {
            Outcome::Solution(_) | Outcome::ExceptionSolution(_) => counters.solutions += 1,
            Outcome::Fail => counters.fails += 1,
            Outcome::ExceededBudget(_) => counters.exceeded_budgets += 1,
        }
        true
    }

    /// True once any limit has been reached.
    pub fn is_exhausted(&self) -> bool {
        let counters = self.counters();
        reached(counters.outcomes, self.max_outcomes)
            || reached(counters.solutions, self.max_solutions)
            || reached(counters.fails, self.max_fails)
            || reached(counters.exceeded_budgets, self.max_exceeded_budgets)
            || self
                .time_limit
                .map(|limit| self.started.elapsed() >= limit)
                .unwrap_or(false)
    }

    pub fn solutions(&self) -> u64 {
        self.counters().solutions
    }

    pub fn outcomes(&self) -> u64 {
        self.counters().outcomes
    }
}

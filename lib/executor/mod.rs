//! Executors explore the search region one path at a time.
//!
//! Every executor owns a solver session and a strategy, and shares the tree,
//! the frontier and the global budgets with every other executor working on
//! the same region.

mod coverage;
mod driver;
mod labeling;
mod strategy;

pub use self::driver::{Executor, Listener};
pub use self::labeling::Labeler;
pub use self::strategy::{for_kind, Bfs, Dfs, Dsas, Iddfs, Iddsas, Strategy};

use crate::config::Config;
use crate::manager::GlobalBudget;
use crate::region::SearchRegion;
use crate::tree::{CoverageEdge, Frontier, SearchTree};
use crate::Error;
use rustc_hash::FxHashSet;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Counters an executor keeps about its work, by name.
pub type Diagnostics = BTreeMap<String, u64>;

/// Add every counter of `from` into `into`.
pub fn merge_diagnostics(into: &mut Diagnostics, from: &Diagnostics) {
    for (name, count) in from {
        *into.entry(name.clone()).or_insert(0) += count;
    }
}

/// State shared by all executors exploring one region.
///
/// When both are needed, the tree is locked before the frontier.
pub struct Shared {
    config: Config,
    region: Arc<dyn SearchRegion>,
    tree: Mutex<SearchTree>,
    frontier: Mutex<Frontier>,
    covered: Mutex<FxHashSet<CoverageEdge>>,
    ceiling: Mutex<usize>,
    budget: GlobalBudget,
    terminated: AtomicBool,
}

impl Shared {
    /// A fresh tree whose root option waits on the frontier.
    pub fn new(config: Config, region: Arc<dyn SearchRegion>) -> Shared {
        let tree = SearchTree::new();
        let mut frontier = Frontier::new();
        frontier.insert(0, Some(tree.root()));
        let budget = GlobalBudget::new(config.budget());
        let ceiling = config.iddfs_increment();
        Shared {
            config,
            region,
            tree: Mutex::new(tree),
            frontier: Mutex::new(frontier),
            covered: Mutex::new(FxHashSet::default()),
            ceiling: Mutex::new(ceiling),
            budget,
            terminated: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn region(&self) -> Arc<dyn SearchRegion> {
        self.region.clone()
    }

    pub fn tree(&self) -> Result<MutexGuard<SearchTree>, Error> {
        self.tree.lock().map_err(|_| Error::Poisoned("search tree"))
    }

    pub fn frontier(&self) -> Result<MutexGuard<Frontier>, Error> {
        self.frontier.lock().map_err(|_| Error::Poisoned("frontier"))
    }

    pub fn covered(&self) -> Result<MutexGuard<FxHashSet<CoverageEdge>>, Error> {
        self.covered.lock().map_err(|_| Error::Poisoned("coverage"))
    }

    /// The depth ceiling shared by iterative deepening executors.
    pub fn ceiling(&self) -> Result<MutexGuard<usize>, Error> {
        self.ceiling.lock().map_err(|_| Error::Poisoned("depth ceiling"))
    }

    pub fn budget(&self) -> &GlobalBudget {
        &self.budget
    }

    pub fn terminate(&self) {
        self.terminated.store(true, Ordering::SeqCst);
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for Shared {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "Shared(terminated: {})", self.is_terminated())
    }
}

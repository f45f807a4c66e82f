//! The driver of a single executor.
//!
//! An executor repeatedly takes an option off the frontier, positions its
//! solver session on the path to that option, and runs the search region
//! from the root. The region replays the recorded decisions down to the
//! option, then continues live, opening new choices as it goes.

use crate::calc::{self, Calculation};
use crate::config::{Mode, SearchStrategy};
use crate::context::ExecutionContext;
use crate::executor::coverage::{cover, probe_uncovered};
use crate::executor::strategy::{for_kind, Strategy};
use crate::executor::{Diagnostics, Labeler, Shared};
use crate::expr::{Constant, Expression};
use crate::outcome::{BudgetKind, ExceptionSolution, Label, Outcome, Solution};
use crate::region::{Output, Signal};
use crate::run::Run;
use crate::solver::SolverSession;
use crate::tree::{Alternative, OptionId, OptionState};
use crate::Error;
use log::{debug, trace};
use rustc_hash::FxHashMap;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

/// Called after an executor has put the options of a new choice on the
/// frontier.
pub type Listener = Arc<dyn Fn() -> Result<(), Error> + Send + Sync>;

pub struct Executor {
    id: usize,
    shared: Arc<Shared>,
    solver: Box<dyn SolverSession>,
    strategy: Box<dyn Strategy>,
    calculation: Box<dyn Calculation>,
    // the option the solver is positioned at
    position: OptionId,
    diagnostics: Diagnostics,
    listener: Option<Listener>,
}

impl Executor {
    /// Create an executor with the given strategy.
    ///
    /// The constraints of the root option seed the base level of `solver`.
    pub fn new(
        id: usize,
        shared: Arc<Shared>,
        mut solver: Box<dyn SolverSession>,
        strategy: SearchStrategy,
    ) -> Result<Executor, Error> {
        if solver.level() != 0 {
            return Err(Error::invariant(format!(
                "executor {} given a solver at level {}",
                id,
                solver.level()
            )));
        }
        let (root, seed) = {
            let tree = shared.tree()?;
            let root = tree.root();
            (root, tree.constraints(root)?.to_vec())
        };
        for constraint in &seed {
            solver.add_constraint(constraint)?;
        }

        let config = shared.config();
        let calculation = calc::for_mode(config.mode(), config.overflow());
        let strategy = for_kind(strategy, config);

        Ok(Executor {
            id,
            shared,
            solver,
            strategy,
            calculation,
            position: root,
            diagnostics: Diagnostics::new(),
            listener: None,
        })
    }

    pub fn with_listener(mut self, listener: Listener) -> Executor {
        self.listener = Some(listener);
        self
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn shared(&self) -> &Arc<Shared> {
        &self.shared
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Hand over the diagnostics gathered so far, and start counting anew.
    pub fn take_diagnostics(&mut self) -> Diagnostics {
        std::mem::take(&mut self.diagnostics)
    }

    pub(crate) fn count(&mut self, name: &str) {
        *self.diagnostics.entry(name.to_string()).or_insert(0) += 1;
    }

    pub(crate) fn calculation(&self) -> &dyn Calculation {
        self.calculation.as_ref()
    }

    pub(crate) fn solver(&mut self) -> &mut dyn SolverSession {
        self.solver.as_mut()
    }

    /// Explore paths until one ends in an outcome, and return it. Returns
    /// `None` once the frontier is empty, the global budgets are exhausted,
    /// or the exploration was terminated.
    pub fn run_for_next_outcome(&mut self) -> Result<Option<Outcome>, Error> {
        loop {
            if self.shared.is_terminated() {
                return Ok(None);
            }
            if self.shared.budget().is_exhausted() {
                debug!("executor {}: global budget exhausted", self.id);
                self.shared.terminate();
                return Ok(None);
            }

            let target = match self.select()? {
                Some(target) => target,
                None => return Ok(None),
            };
            if !self.navigate(target)? {
                continue;
            }
            if let Some(outcome) = self.run_at(target)? {
                return Ok(Some(outcome));
            }
        }
    }

    /// Explore paths until one ends in a solution or an exception solution.
    pub fn run_for_single_solution(&mut self) -> Result<Option<Outcome>, Error> {
        while let Some(outcome) = self.run_for_next_outcome()? {
            if outcome.is_solution() {
                return Ok(Some(outcome));
            }
        }
        Ok(None)
    }

    fn select(&mut self) -> Result<Option<OptionId>, Error> {
        let limit = self.shared.config().coverage_probe_limit();
        if let Some(option) = probe_uncovered(&self.shared, self.position, limit)? {
            self.count("coverage-probes");
            return Ok(Some(option));
        }
        self.strategy.select_next(&self.shared, self.position)
    }

    /// Move the solver from the current position to `target`, one level per
    /// option. Returns false, and marks `target` unsatisfiable, if the path
    /// constraint of `target` has no model.
    fn navigate(&mut self, target: OptionId) -> Result<bool, Error> {
        self.check_alignment()?;
        let (up, down) = {
            let tree = self.shared.tree()?;
            let current_path = tree.path_to(self.position)?;
            let target_path = tree.path_to(target)?;
            let common = current_path
                .iter()
                .zip(target_path.iter())
                .take_while(|(a, b)| a == b)
                .count();
            let mut down = Vec::new();
            for option in &target_path[common..] {
                down.push(Expression::conjunction(tree.constraints(*option)?)?);
            }
            (current_path.len() - common, down)
        };

        self.solver.backtrack(up)?;
        for constraint in &down {
            self.solver
                .add_constraint_after_new_backtracking_point(constraint)?;
        }
        self.position = target;
        self.check_alignment()?;
        trace!(
            "executor {} navigated to {}, {} up, {} down",
            self.id,
            target,
            up,
            down.len()
        );

        if !self.solver.is_satisfiable()? {
            debug!("executor {}: {} is unsatisfiable", self.id, target);
            self.shared
                .tree()?
                .set_state(target, OptionState::Unsatisfiable)?;
            self.count("unsatisfiable");
            return Ok(false);
        }
        Ok(true)
    }

    /// The solver level must always equal the depth of the position.
    fn check_alignment(&self) -> Result<(), Error> {
        let depth = self.shared.tree()?.depth(self.position)?;
        if depth != self.solver.level() {
            return Err(Error::invariant(format!(
                "executor {} solver at level {} but {} is at depth {}",
                self.id,
                self.solver.level(),
                self.position,
                depth
            )));
        }
        Ok(())
    }

    /// Concrete values for every variable of the current path constraints.
    fn shadows(&mut self) -> Result<FxHashMap<String, Constant>, Error> {
        let mut shadows = FxHashMap::default();
        let mut variables = BTreeSet::new();
        for constraint in self.solver.constraints() {
            variables.extend(constraint.variables());
        }
        for variable in variables {
            let value = self.solver.label(&Expression::variable(variable.clone()))?;
            shadows.insert(variable.name().to_string(), value);
        }
        Ok(shadows)
    }

    fn run_at(&mut self, target: OptionId) -> Result<Option<Outcome>, Error> {
        let (root, recorded) = {
            let tree = self.shared.tree()?;
            let mut path = tree.path_to(target)?;
            let root = path.remove(0);
            (root, path)
        };
        let budget = self.shared.config().budget().local();
        let mut context = ExecutionContext::new(root, recorded, budget);
        if self.shared.config().mode() == Mode::Concolic {
            context = context.with_shadows(self.shadows()?);
        }
        cover(&self.shared, target)?;
        self.count("paths");
        debug!("executor {} running at {}", self.id, target);

        let region = self.shared.region();
        let (result, context) = {
            let mut run = Run::new(self, context);
            let result = region.run(&mut run);
            (result, run.into_context())
        };
        self.classify(result, context)
    }

    fn classify(
        &mut self,
        result: Result<Output, Signal>,
        context: ExecutionContext,
    ) -> Result<Option<Outcome>, Error> {
        let option = context.current();
        if !matches!(result, Err(Signal::Backtrack) | Err(Signal::Fatal(_))) {
            if !context.is_live() {
                return Err(Error::invariant(format!(
                    "path ended at {} with {} recorded decisions left",
                    option,
                    context.remaining()
                )));
            }
            if self.shared.tree()?.child(option)?.is_some() {
                return Err(Error::invariant(format!(
                    "path ended at {}, which already has a choice",
                    option
                )));
            }
        }

        let outcome = match result {
            Ok(output) => {
                let max = self.shared.config().max_free_array_length();
                let (value, labels) = {
                    let mut labeler = Labeler::new(self.solver.as_mut(), context.heap(), max);
                    let value = labeler.transform(&output)?;
                    (value, label_named(&mut labeler, &context)?)
                };
                Outcome::Solution(Solution {
                    value,
                    labels,
                    constraints: self.solver.constraints(),
                })
            }
            Err(Signal::Backtrack) => {
                trace!("executor {} backtracked at {}", self.id, option);
                self.count("backtracks");
                return Ok(None);
            }
            Err(Signal::Fail) => Outcome::Fail,
            Err(Signal::ExceededBudget(kind)) => Outcome::ExceededBudget(kind),
            Err(Signal::Exception(fault)) => {
                let max = self.shared.config().max_free_array_length();
                let labels = {
                    let mut labeler = Labeler::new(self.solver.as_mut(), context.heap(), max);
                    label_named(&mut labeler, &context)?
                };
                Outcome::ExceptionSolution(ExceptionSolution {
                    fault,
                    labels,
                    constraints: self.solver.constraints(),
                })
            }
            Err(Signal::Fatal(error)) => return Err(error),
        };

        if self.publish(option, outcome.clone())? {
            Ok(Some(outcome))
        } else {
            Ok(None)
        }
    }

    /// Record `outcome` as the terminal state of `option`. Returns false when
    /// the global budget had no room left for it, in which case it is not
    /// handed out and exploration stops.
    fn publish(&mut self, option: OptionId, outcome: Outcome) -> Result<bool, Error> {
        let admitted = self.shared.budget().admit(&outcome);
        if admitted {
            debug!("executor {}: {} at {}", self.id, outcome.kind(), option);
            self.count(outcome.kind());
        } else {
            debug!(
                "executor {}: dropped {} at {}, budget exhausted",
                self.id,
                outcome.kind(),
                option
            );
            self.count("dropped-outcomes");
            self.shared.terminate();
        }
        self.shared
            .tree()?
            .set_state(option, OptionState::Terminal(outcome))?;
        Ok(admitted)
    }

    /// Answer a decision of the search region among `alternatives`.
    ///
    /// While replaying, the answer is the recorded option. Once live, a new
    /// choice is opened below the current option and its options go on the
    /// frontier; the strategy decides whether this path continues into one
    /// of them. `preferred` is the alternative concrete execution takes, in
    /// concolic mode.
    pub(crate) fn decide(
        &mut self,
        context: &mut ExecutionContext,
        alternatives: Vec<Alternative>,
        preferred: Option<usize>,
    ) -> Result<usize, Signal> {
        let count = alternatives.len();
        if !context.has_switched() && context.advance()? {
            let option = context.current();
            let index = self.shared.tree()?.index(option)?;
            if index >= count {
                return Err(Error::invariant(format!(
                    "replayed option {} has index {} in a decision of {}",
                    option, index, count
                ))
                .into());
            }
            if preferred.map(|preferred| preferred != index).unwrap_or(false) {
                return Err(Error::invariant(format!(
                    "concolic shadow disagrees with replayed option {}",
                    option
                ))
                .into());
            }
            return Ok(index);
        }

        let parent = context.current();
        let (depth, options) = {
            let mut tree = self.shared.tree()?;
            let depth = tree.depth(parent)? + 1;
            if !context.budget().allows_depth(depth) {
                return Err(Signal::ExceededBudget(BudgetKind::ChoiceDepth));
            }
            let choice = tree.add_choice(parent, alternatives)?;
            (depth, tree.options_of(choice)?.to_vec())
        };
        self.shared
            .frontier()?
            .insert(depth, options.iter().copied());
        self.count("choices");
        trace!(
            "executor {} opened a choice of {} at depth {}",
            self.id,
            count,
            depth
        );
        if let Some(listener) = &self.listener {
            listener()?;
        }

        if !self.strategy.continue_live(&self.shared, depth)? {
            return Err(Signal::Backtrack);
        }

        let candidates: Vec<usize> = match preferred {
            Some(index) => vec![index],
            None => (0..options.len()).collect(),
        };
        for index in candidates {
            let option = options[index];
            if !self.shared.frontier()?.request(option) {
                continue;
            }
            let constraint = Expression::conjunction(self.shared.tree()?.constraints(option)?)?;
            self.solver
                .add_constraint_after_new_backtracking_point(&constraint)?;
            // concrete execution already satisfies the preferred alternative
            if preferred.is_none() && !self.solver.is_satisfiable()? {
                self.solver.backtrack_once()?;
                self.shared
                    .tree()?
                    .set_state(option, OptionState::Unsatisfiable)?;
                self.count("unsatisfiable");
                continue;
            }
            context.set_current(option)?;
            self.position = option;
            cover(&self.shared, option)?;
            return Ok(index);
        }
        Err(Signal::Backtrack)
    }

    /// Add `constraint` to the current option. Only legal while live.
    pub(crate) fn add_live_constraint(
        &mut self,
        context: &ExecutionContext,
        constraint: Expression,
    ) -> Result<(), Error> {
        if !context.is_live() || context.current() != self.position {
            return Err(Error::invariant(format!(
                "constraint added at {} while the solver is at {}",
                context.current(),
                self.position
            )));
        }
        self.solver.add_constraint(&constraint)?;
        self.shared
            .tree()?
            .append_constraint(self.position, constraint)
    }

    /// Mark the current option unsatisfiable.
    pub(crate) fn mark_unsatisfiable(&mut self, context: &ExecutionContext) -> Result<(), Error> {
        self.count("unsatisfiable");
        self.shared
            .tree()?
            .set_state(context.current(), OptionState::Unsatisfiable)
    }
}

fn label_named(
    labeler: &mut Labeler,
    context: &ExecutionContext,
) -> Result<BTreeMap<String, Label>, Error> {
    let mut labels = BTreeMap::new();
    for (name, output) in context.named() {
        labels.insert(name.clone(), labeler.transform(output)?);
    }
    Ok(labels)
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Executor({} at {})", self.id, self.position)
    }
}

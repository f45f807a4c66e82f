use crate::config::{ConfigBuilder, IndexMode, Mode, SearchStrategy};
use crate::expr::{Constant, Sort, Value};
use crate::manager::{self, ExecutorManager};
use crate::outcome::{BudgetKind, Label, Outcome, Solution};
use crate::region::{region, Output, SearchRegion};
use crate::solver::EnumeratingFactory;
use crate::{Config, Error, Fault};


fn init_logging() {
    let _ = simplelog::TestLogger::init(log::LevelFilter::Debug, simplelog::Config::default());
}

fn explore<R: SearchRegion + 'static>(config: Config, region: R) -> Vec<Outcome> {
    init_logging();
    let mut manager = manager::new(config, region, EnumeratingFactory::default()).unwrap();
    manager.all_outcomes().unwrap()
}

fn solutions(outcomes: &[Outcome]) -> Vec<&Solution> {
    outcomes.iter().filter_map(Outcome::solution).collect()
}

fn faults(outcomes: &[Outcome]) -> Vec<Fault> {
    outcomes
        .iter()
        .filter_map(|outcome| match outcome {
            Outcome::ExceptionSolution(exception) => Some(exception.fault.clone()),
            _ => None,
        })
        .collect()
}

fn labeled(solution: &Solution, name: &str) -> i64 {
    solution
        .labels
        .get(name)
        .and_then(Label::as_constant)
        .and_then(Constant::as_i64)
        .unwrap()
}

fn returned(solution: &Solution) -> i64 {
    solution
        .value
        .as_constant()
        .and_then(Constant::as_i64)
        .unwrap()
}

fn dfs() -> Config {
    ConfigBuilder::new()
        .strategy(SearchStrategy::Dfs)
        .build()
        .unwrap()
}

/// Two independent sign tests.
fn two_level() -> impl SearchRegion {
    region(|run| {
        let x = run.named("x", Sort::Int)?;
        let y = run.named("y", Sort::Int)?;
        let zero = Value::from(0);
        let x_negative = run.lt(&x, &zero)?;
        let y_negative = run.lt(&y, &zero)?;
        run.branch(&x_negative)?;
        run.branch(&y_negative)?;
        Ok(Output::Unit)
    })
}

/// The true side of the first decision holds a second decision.
fn lopsided() -> impl SearchRegion {
    region(|run| {
        let x = run.named("x", Sort::Int)?;
        let y = run.named("y", Sort::Int)?;
        let zero = Value::from(0);
        let x_negative = run.lt(&x, &zero)?;
        if run.branch_at(0, &x_negative)? {
            let y_negative = run.lt(&y, &zero)?;
            if run.branch_at(1, &y_negative)? {
                Ok(Value::from(0).into())
            } else {
                Ok(Value::from(1).into())
            }
        } else {
            Ok(Value::from(2).into())
        }
    })
}

/// Three nested decisions on fresh booleans.
fn three_bools() -> impl SearchRegion {
    region(|run| {
        let a = run.named("a", Sort::Bool)?;
        let b = run.named("b", Sort::Bool)?;
        let c = run.named("c", Sort::Bool)?;
        run.branch(&a)?;
        run.branch(&b)?;
        run.branch(&c)?;
        Ok(Output::Unit)
    })
}

#[test]
fn sign_split() {
    let region = region(|run| {
        let x = run.named("x", Sort::Int)?;
        let negative = run.lt(&x, &Value::from(0))?;
        if run.branch(&negative)? {
            Ok(run.neg(&x)?.into())
        } else {
            Ok(x.into())
        }
    });
    let outcomes = explore(dfs(), region);
    let solutions = solutions(&outcomes);
    assert_eq!(solutions.len(), 2);

    assert!(labeled(solutions[0], "x") < 0);
    assert!(returned(solutions[0]) > 0);
    assert!(labeled(solutions[1], "x") >= 0);
    assert_eq!(returned(solutions[1]), labeled(solutions[1], "x"));
}

#[test]
fn dfs_visits_paths_in_order() {
    let outcomes = explore(dfs(), two_level());
    let signs = solutions(&outcomes)
        .into_iter()
        .map(|solution| (labeled(solution, "x") < 0, labeled(solution, "y") < 0))
        .collect::<Vec<(bool, bool)>>();
    assert_eq!(
        signs,
        vec![(true, true), (true, false), (false, true), (false, false)]
    );
}

#[test]
fn solutions_carry_their_path_constraints() {
    let outcomes = explore(dfs(), two_level());
    for solution in solutions(&outcomes) {
        assert_eq!(solution.constraints.len(), 2);
    }
}

#[test]
fn bfs_finishes_shallow_paths_first() {
    let config = ConfigBuilder::new()
        .strategy(SearchStrategy::Bfs)
        .build()
        .unwrap();
    let outcomes = explore(config, lopsided());
    let values = solutions(&outcomes)
        .into_iter()
        .map(returned)
        .collect::<Vec<i64>>();
    assert_eq!(values, vec![2, 0, 1]);

    let outcomes = explore(dfs(), lopsided());
    let values = solutions(&outcomes)
        .into_iter()
        .map(returned)
        .collect::<Vec<i64>>();
    assert_eq!(values, vec![0, 1, 2]);
}

#[test]
fn every_strategy_finds_every_path() {
    for strategy in [
        SearchStrategy::Dfs,
        SearchStrategy::Bfs,
        SearchStrategy::Iddfs,
        SearchStrategy::Dsas,
        SearchStrategy::Iddsas,
    ] {
        let config = ConfigBuilder::new()
            .strategy(strategy)
            .iddfs_increment(1)
            .coverage_probe_limit(2)
            .build()
            .unwrap();
        let outcomes = explore(config, lopsided());
        let mut values = solutions(&outcomes)
            .into_iter()
            .map(returned)
            .collect::<Vec<i64>>();
        values.sort();
        assert_eq!(values, vec![0, 1, 2], "{:?}", strategy);
    }
}

#[test]
fn iddfs_widens_until_done() {
    let config = ConfigBuilder::new()
        .strategy(SearchStrategy::Iddfs)
        .iddfs_increment(1)
        .build()
        .unwrap();
    init_logging();
    let mut manager = manager::new(config, three_bools(), EnumeratingFactory::default()).unwrap();
    let outcomes = manager.all_outcomes().unwrap();
    assert_eq!(solutions(&outcomes).len(), 8);

    let diagnostics = manager.diagnostics();
    assert!(diagnostics.get("backtracks").copied().unwrap_or(0) > 0);
    assert_eq!(diagnostics.get("solution").copied(), Some(8));
}

#[test]
fn diagnostics_count_choices_and_paths() {
    init_logging();
    let mut manager = manager::new(dfs(), two_level(), EnumeratingFactory::default()).unwrap();
    manager.all_outcomes().unwrap();
    let diagnostics = manager.diagnostics();
    assert_eq!(diagnostics.get("choices").copied(), Some(3));
    assert_eq!(diagnostics.get("paths").copied(), Some(4));
    assert_eq!(diagnostics.get("solution").copied(), Some(4));
    assert_eq!(diagnostics.get("backtracks"), None);
}

#[test]
fn max_solutions_stops_exploration() {
    let config = ConfigBuilder::new().max_solutions(3).build().unwrap();
    let outcomes = explore(config, three_bools());
    assert_eq!(outcomes.len(), 3);
}

#[test]
fn max_depth_cuts_paths_short() {
    let config = ConfigBuilder::new().max_depth(1).build().unwrap();
    let outcomes = explore(config, two_level());
    assert_eq!(outcomes.len(), 2);
    for outcome in outcomes {
        assert_eq!(outcome, Outcome::ExceededBudget(BudgetKind::ChoiceDepth));
    }
}

#[test]
fn region_signals_become_outcomes() {
    let region = region(|run| {
        match run.choose(4)? {
            0 => run.fail(),
            1 => run.exceed_budget("loop"),
            2 => run.throw("boom"),
            _ => Ok(Output::Unit),
        }
    });
    let outcomes = explore(dfs(), region);
    assert_eq!(outcomes.len(), 4);
    assert!(outcomes.contains(&Outcome::Fail));
    assert!(outcomes.contains(&Outcome::ExceededBudget(BudgetKind::Region("loop".into()))));
    assert_eq!(faults(&outcomes), vec![Fault::Thrown("boom".into())]);
    assert_eq!(solutions(&outcomes).len(), 1);
}

#[test]
fn assume_prunes_unsatisfiable_paths() {
    let region = region(|run| {
        let x = run.named("x", Sort::Int)?;
        let positive = run.gt(&x, &Value::from(0))?;
        run.assume(&positive)?;
        let negative = run.lt(&x, &Value::from(0))?;
        if run.branch(&negative)? {
            run.fail()
        } else {
            Ok(Output::Unit)
        }
    });
    let outcomes = explore(dfs(), region);
    assert_eq!(outcomes.len(), 1);
    assert!(labeled(solutions(&outcomes)[0], "x") > 0);
}

#[test]
fn symbolic_division_checks_for_zero() {
    let region = region(|run| {
        let x = run.named("x", Sort::Int)?;
        Ok(run.div(&Value::from(10), &x)?.into())
    });
    let outcomes = explore(dfs(), region);
    assert_eq!(faults(&outcomes), vec![Fault::DivisionByZero]);
    let solutions = solutions(&outcomes);
    assert_eq!(solutions.len(), 1);
    assert_ne!(labeled(solutions[0], "x"), 0);
}

#[test]
fn concrete_out_of_bounds_accesses_fault() {
    for index in [4, -1] {
        let region = region(move |run| {
            let array = run.new_array(Sort::Int, &Value::from(4))?;
            Ok(run.select(array, &Value::from(index))?.into())
        });
        let outcomes = explore(dfs(), region);
        assert_eq!(
            faults(&outcomes),
            vec![Fault::IndexOutOfBounds {
                index: Some(index as i64),
                length: Some(4)
            }]
        );
    }
}

#[test]
fn negative_array_size_faults() {
    let region = region(|run| Ok(run.new_array(Sort::Int, &Value::from(-2))?.into()));
    let outcomes = explore(dfs(), region);
    assert_eq!(faults(&outcomes), vec![Fault::NegativeArraySize(-2)]);
}

#[test]
fn symbolic_index_is_constrained_in_bounds() {
    let region = region(|run| {
        let array = run.new_array(Sort::Int, &Value::from(4))?;
        let index = run.named("i", Sort::Int)?;
        Ok(run.select(array, &index)?.into())
    });
    let outcomes = explore(dfs(), region);
    let solutions = solutions(&outcomes);
    assert_eq!(solutions.len(), 1);
    let index = labeled(solutions[0], "i");
    assert!((0..4).contains(&index));
}

#[test]
fn symbolic_index_may_throw_out_of_bounds() {
    let config = ConfigBuilder::new()
        .throw_on_out_of_bounds(true)
        .build()
        .unwrap();
    let region = region(|run| {
        let array = run.new_array(Sort::Int, &Value::from(4))?;
        let index = run.named("i", Sort::Int)?;
        Ok(run.select(array, &index)?.into())
    });
    let outcomes = explore(config, region);
    assert_eq!(solutions(&outcomes).len(), 1);
    assert_eq!(
        faults(&outcomes),
        vec![Fault::IndexOutOfBounds {
            index: None,
            length: Some(4)
        }]
    );
}

#[test]
fn eager_indices_alias() {
    let region = region(|run| {
        let array = run.new_array(Sort::Int, &Value::from(4))?;
        let index = run.fresh_int()?;
        run.store(array, &index, &Value::from(7))?;
        Ok(run.select(array, &index)?.into())
    });
    let outcomes = explore(dfs(), region);
    let solutions = solutions(&outcomes);
    assert_eq!(solutions.len(), 1);
    assert_eq!(returned(solutions[0]), 7);
}

#[test]
fn symbolic_indices_read_back_stores() {
    let config = ConfigBuilder::new()
        .index_mode(IndexMode::Symbolic)
        .build()
        .unwrap();
    let region = region(|run| {
        let array = run.new_array(Sort::Int, &Value::from(4))?;
        let index = run.named("i", Sort::Int)?;
        run.store(array, &index, &Value::from(7))?;
        Ok(run.select(array, &index)?.into())
    });
    let outcomes = explore(config, region);
    let solutions = solutions(&outcomes);
    assert_eq!(solutions.len(), 1);
    assert_eq!(returned(solutions[0]), 7);
}

#[test]
fn free_arrays_may_be_null() {
    let config = ConfigBuilder::new()
        .arrays_can_be_null(true)
        .build()
        .unwrap();
    let region = region(|run| {
        let array = run.free_array(Sort::Int)?;
        Ok(run.length(array)?.into())
    });
    let outcomes = explore(config, region);
    assert_eq!(faults(&outcomes), vec![Fault::NullPointer]);
    let solutions = solutions(&outcomes);
    assert_eq!(solutions.len(), 1);
    assert!(returned(solutions[0]) >= 0);
}

#[test]
fn concolic_follows_shadows() {
    let config = ConfigBuilder::new().mode(Mode::Concolic).build().unwrap();
    let region = region(|run| {
        let x = run.named("x", Sort::Int)?;
        let negative = run.lt(&x, &Value::from(0))?;
        run.branch(&negative)?;
        Ok(Output::Unit)
    });
    let outcomes = explore(config, region);
    let xs = solutions(&outcomes)
        .into_iter()
        .map(|solution| labeled(solution, "x"))
        .collect::<Vec<i64>>();
    // the first run takes the default shadow, 0
    assert_eq!(xs.len(), 2);
    assert!(xs[0] >= 0);
    assert!(xs[1] < 0);
}

#[test]
fn invalid_configs_are_rejected() {
    let config = Config::from_json(r#"{"threads": 0}"#);
    assert!(matches!(config, Err(Error::Config(_))));
}

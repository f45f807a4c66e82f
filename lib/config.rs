//! Options which change how the engine explores a search region.

use crate::context::LocalBudget;
use crate::expr::OverflowPolicy;
use crate::Error;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum Mode {
    /// Free values are purely symbolic. Branches on symbolic conditions ask the
    /// solver which alternatives are feasible.
    #[default]
    Symbolic,
    /// Free values carry a concrete shadow, and branches follow the shadow.
    /// The solver is only asked for shadows when a new path is started.
    Concolic,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum SearchStrategy {
    Dfs,
    Bfs,
    Iddfs,
    Dsas,
    Iddsas,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum IndexMode {
    /// Concretize symbolic indices, so every cell is an independent value.
    #[default]
    Eager,
    /// Keep indices symbolic, modelling primitive arrays as array terms.
    Symbolic,
}

/// Limits over the whole exploration. `None` means unlimited.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct BudgetConfig {
    pub max_fails: Option<u64>,
    pub max_exceeded_budgets: Option<u64>,
    /// Counts both solutions and exception solutions.
    pub max_solutions: Option<u64>,
    pub max_outcomes: Option<u64>,
    pub time_limit_ms: Option<u64>,
    /// The deepest choice a single path may open.
    pub max_depth: Option<usize>,
}

impl BudgetConfig {
    pub fn time_limit(&self) -> Option<Duration> {
        self.time_limit_ms.map(Duration::from_millis)
    }

    pub fn local(&self) -> LocalBudget {
        LocalBudget {
            max_depth: self.max_depth,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct Config {
    mode: Mode,
    strategies: Vec<SearchStrategy>,
    index_mode: IndexMode,
    throw_on_out_of_bounds: bool,
    arrays_can_be_null: bool,
    overflow: OverflowPolicy,
    max_index_probes: usize,
    iddfs_increment: usize,
    coverage_probe_limit: usize,
    threads: usize,
    activation_threshold: usize,
    shutdown_timeout_ms: u64,
    budget: BudgetConfig,
    max_free_array_length: i32,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            mode: Mode::Symbolic,
            strategies: vec![SearchStrategy::Dfs],
            index_mode: IndexMode::Eager,
            throw_on_out_of_bounds: false,
            arrays_can_be_null: false,
            overflow: OverflowPolicy::Wrapping,
            max_index_probes: 64,
            iddfs_increment: 4,
            coverage_probe_limit: 0,
            threads: 1,
            activation_threshold: 2,
            shutdown_timeout_ms: 10_000,
            budget: BudgetConfig::default(),
            max_free_array_length: 16,
        }
    }
}

impl Config {
    pub fn new() -> Config {
        Config::default()
    }

    /// Read a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Config, Error> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.strategies.is_empty() {
            return Err(Error::Config("at least one strategy is required".into()));
        }
        if self.threads == 0 {
            return Err(Error::Config("threads must be at least 1".into()));
        }
        if self.iddfs_increment == 0 {
            return Err(Error::Config("iddfs_increment must be at least 1".into()));
        }
        if self.max_free_array_length < 0 {
            return Err(Error::Config(format!(
                "max_free_array_length {} is negative",
                self.max_free_array_length
            )));
        }
        Ok(())
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// The first strategy drives the first executor. The others seed
    /// executors started later, in order.
    pub fn strategies(&self) -> &[SearchStrategy] {
        &self.strategies
    }

    pub fn strategy(&self) -> SearchStrategy {
        self.strategies
            .first()
            .copied()
            .unwrap_or(SearchStrategy::Dfs)
    }

    pub fn index_mode(&self) -> IndexMode {
        self.index_mode
    }

    /// Whether a possibly out-of-bounds symbolic index opens a choice with a
    /// faulting alternative, instead of being constrained in bounds.
    pub fn throw_on_out_of_bounds(&self) -> bool {
        self.throw_on_out_of_bounds
    }

    /// Whether free arrays may be null.
    pub fn arrays_can_be_null(&self) -> bool {
        self.arrays_can_be_null
    }

    pub fn overflow(&self) -> OverflowPolicy {
        self.overflow
    }

    /// How many candidate indices eager concretization tries before asking
    /// the solver for a value.
    pub fn max_index_probes(&self) -> usize {
        self.max_index_probes
    }

    pub fn iddfs_increment(&self) -> usize {
        self.iddfs_increment
    }

    /// How many uncovered ancestor siblings are tried before the strategy
    /// selects. Zero disables the pass.
    pub fn coverage_probe_limit(&self) -> usize {
        self.coverage_probe_limit
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// The frontier size above which new executors are started.
    pub fn activation_threshold(&self) -> usize {
        self.activation_threshold
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    pub fn budget(&self) -> &BudgetConfig {
        &self.budget
    }

    /// The largest length a free array with a symbolic length may take.
    pub fn max_free_array_length(&self) -> i32 {
        self.max_free_array_length
    }
}

/// Create a `Config` with the builder pattern.
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> ConfigBuilder {
        ConfigBuilder {
            config: Config::default(),
        }
    }

    pub fn mode(mut self, mode: Mode) -> ConfigBuilder {
        self.config.mode = mode;
        self
    }

    pub fn strategy(mut self, strategy: SearchStrategy) -> ConfigBuilder {
        self.config.strategies = vec![strategy];
        self
    }

    pub fn strategies(mut self, strategies: Vec<SearchStrategy>) -> ConfigBuilder {
        self.config.strategies = strategies;
        self
    }

    pub fn index_mode(mut self, index_mode: IndexMode) -> ConfigBuilder {
        self.config.index_mode = index_mode;
        self
    }

    pub fn throw_on_out_of_bounds(mut self, throw_on_out_of_bounds: bool) -> ConfigBuilder {
        self.config.throw_on_out_of_bounds = throw_on_out_of_bounds;
        self
    }

    pub fn arrays_can_be_null(mut self, arrays_can_be_null: bool) -> ConfigBuilder {
        self.config.arrays_can_be_null = arrays_can_be_null;
        self
    }

    pub fn overflow(mut self, overflow: OverflowPolicy) -> ConfigBuilder {
        self.config.overflow = overflow;
        self
    }

    pub fn max_index_probes(mut self, max_index_probes: usize) -> ConfigBuilder {
        self.config.max_index_probes = max_index_probes;
        self
    }

    pub fn iddfs_increment(mut self, iddfs_increment: usize) -> ConfigBuilder {
        self.config.iddfs_increment = iddfs_increment;
        self
    }

    pub fn coverage_probe_limit(mut self, coverage_probe_limit: usize) -> ConfigBuilder {
        self.config.coverage_probe_limit = coverage_probe_limit;
        self
    }

    pub fn threads(mut self, threads: usize) -> ConfigBuilder {
        self.config.threads = threads;
        self
    }

    pub fn activation_threshold(mut self, activation_threshold: usize) -> ConfigBuilder {
        self.config.activation_threshold = activation_threshold;
        self
    }

    pub fn shutdown_timeout(mut self, shutdown_timeout: Duration) -> ConfigBuilder {
        self.config.shutdown_timeout_ms = shutdown_timeout.as_millis() as u64;
        self
    }

    pub fn budget(mut self, budget: BudgetConfig) -> ConfigBuilder {
        self.config.budget = budget;
        self
    }

    pub fn max_solutions(mut self, max_solutions: u64) -> ConfigBuilder {
        self.config.budget.max_solutions = Some(max_solutions);
        self
    }

    pub fn max_depth(mut self, max_depth: usize) -> ConfigBuilder {
        self.config.budget.max_depth = Some(max_depth);
        self
    }

    pub fn max_free_array_length(mut self, max_free_array_length: i32) -> ConfigBuilder {
        self.config.max_free_array_length = max_free_array_length;
        self
    }

    pub fn build(self) -> Result<Config, Error> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> ConfigBuilder {
        ConfigBuilder::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_fills_in_defaults() {
        let config = Config::from_json(
            r#"{
                "mode": "Concolic",
                "strategies": ["Iddsas", "Dfs"],
                "threads": 4,
                "budget": { "max_solutions": 10 }
            }"#,
        )
        .unwrap();
        assert_eq!(config.mode(), Mode::Concolic);
        assert_eq!(config.strategy(), SearchStrategy::Iddsas);
        assert_eq!(config.threads(), 4);
        assert_eq!(config.budget().max_solutions, Some(10));
        assert_eq!(config.budget().max_fails, None);
        assert_eq!(config.index_mode(), IndexMode::Eager);
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(10));

        let round_trip = Config::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(round_trip, config);
    }

    #[test]
    fn invalid_configs_are_rejected() {
        assert!(matches!(
            Config::from_json(r#"{ "strategies": [] }"#),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            ConfigBuilder::new().threads(0).build(),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Config::from_json(r#"{ "threads": "many" }"#),
            Err(Error::Json(_))
        ));
    }

    #[test]
    fn builder() {
        let config = ConfigBuilder::new()
            .strategy(SearchStrategy::Bfs)
            .index_mode(IndexMode::Symbolic)
            .max_depth(3)
            .build()
            .unwrap();
        assert_eq!(config.strategies(), &[SearchStrategy::Bfs]);
        assert_eq!(config.budget().local().max_depth, Some(3));
    }
}

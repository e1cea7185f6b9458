//! Solver configuration.
use std::time::Duration;

use thiserror::Error;

/// Error for rejected configurations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The option name is not known.
    #[error("unknown solver option `{0}`")]
    UnknownOption(String),
    /// The option exists but the value is rejected.
    #[error("invalid value for option `{name}`: {reason}")]
    InvalidValue { name: String, reason: String },
}

impl ConfigError {
    fn invalid(name: &str, reason: impl Into<String>) -> ConfigError {
        ConfigError::InvalidValue {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Side effects required after a configuration change.
#[derive(Default)]
pub struct SolverConfigUpdate {
    /// Re-seed the decision randomness from `random_seed`.
    pub reseed_rng: bool,
}

/// When to restart the search.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RestartStrategy {
    /// Restart when the recent average glue exceeds the long term average.
    Glue,
    /// Restart on a Luby sequence schedule.
    Luby,
    /// Restart on geometrically growing conflict intervals.
    Geometric,
    /// Never restart.
    Never,
}

/// Configurable parameters used during solving.
///
/// All fields can also be set by name using [`SolverConfig::set_option`]. Values are checked by
/// [`SolverConfig::validate`] before a solver will accept the configuration.
#[derive(Clone, Debug)]
pub struct SolverConfig {
    /// Restart strategy. (Default: Glue)
    pub restart: RestartStrategy,

    /// Number of conflicts in the short term glue average. (Default: 50)
    pub restart_short_window: usize,

    /// Number of conflicts before the long term averages are trusted. (Default: 5000)
    pub restart_long_window: usize,

    /// A glue restart fires when `short_avg * margin > long_avg`. (Default: 0.8)
    pub restart_margin: f64,

    /// Restarts are blocked while the trail is this much longer than its long term average.
    /// (Default: 1.4)
    pub restart_blocking_margin: f64,

    /// Scaling factor for Luby sequence based restarts (number of conflicts). (Default: 128)
    pub luby_restart_interval_scale: u64,

    /// Initial conflict interval for geometric restarts. (Default: 100)
    pub geometric_restart_base: u64,

    /// Growth factor for geometric restart intervals. (Default: 1.5)
    pub geometric_restart_factor: f64,

    /// Multiplicative decay for the variable activity heuristic. (Default: 0.95)
    pub var_decay: f32,

    /// Multiplicative decay for clause activities. (Default: 0.999)
    pub clause_decay: f32,

    /// Fraction of decisions made on a uniformly random eligible variable. (Default: 0.0)
    pub random_var_freq: f64,

    /// Seed for the decision randomness. (Default: 42)
    pub random_seed: u64,

    /// Run the full simplifier before the first search episode. (Default: true)
    pub simplify_at_startup: bool,

    /// Number of conflicts between full simplifier runs. (Default: 5000)
    pub simplify_interval: u64,

    /// Work budget (in bogo-props) for a single simplifier run. (Default: 1000000)
    pub simplify_budget: u64,

    /// Enable clause subsumption and self-subsuming resolution. (Default: true)
    pub enable_subsumption: bool,

    /// Enable equivalent literal replacement. (Default: true)
    pub enable_scc: bool,

    /// Redundant long clause count that triggers the first reduction. (Default: 2000)
    pub learnt_cleaning_first_threshold: u64,

    /// Growth factor for the reduction threshold. (Default: 1.1)
    pub learnt_cleaning_growth: f64,

    /// Give up after this many conflicts in one `solve` call. (Default: unlimited)
    pub max_conflicts: Option<u64>,

    /// Give up after this much time in one `solve` call. (Default: unlimited)
    pub max_time: Option<Duration>,
}

impl Default for SolverConfig {
    fn default() -> SolverConfig {
        SolverConfig {
            restart: RestartStrategy::Glue,
            restart_short_window: 50,
            restart_long_window: 5000,
            restart_margin: 0.8,
            restart_blocking_margin: 1.4,
            luby_restart_interval_scale: 128,
            geometric_restart_base: 100,
            geometric_restart_factor: 1.5,
            var_decay: 0.95,
            clause_decay: 0.999,
            random_var_freq: 0.0,
            random_seed: 42,
            simplify_at_startup: true,
            simplify_interval: 5000,
            simplify_budget: 1_000_000,
            enable_subsumption: true,
            enable_scc: true,
            learnt_cleaning_first_threshold: 2000,
            learnt_cleaning_growth: 1.1,
            max_conflicts: None,
            max_time: None,
        }
    }
}

impl SolverConfig {
    /// Check all values for consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.restart_short_window == 0 {
            return Err(ConfigError::invalid("restart_short_window", "must be >= 1"));
        }
        if self.restart_long_window == 0 {
            return Err(ConfigError::invalid("restart_long_window", "must be >= 1"));
        }
        if !(self.restart_margin > 0.0 && self.restart_margin.is_finite()) {
            return Err(ConfigError::invalid("restart_margin", "must be positive"));
        }
        if !(self.restart_blocking_margin >= 1.0 && self.restart_blocking_margin.is_finite()) {
            return Err(ConfigError::invalid(
                "restart_blocking_margin",
                "must be >= 1.0",
            ));
        }
        if self.luby_restart_interval_scale == 0 {
            return Err(ConfigError::invalid(
                "luby_restart_interval_scale",
                "must be >= 1",
            ));
        }
        if self.geometric_restart_base == 0 {
            return Err(ConfigError::invalid("geometric_restart_base", "must be >= 1"));
        }
        if !(self.geometric_restart_factor > 1.0 && self.geometric_restart_factor.is_finite()) {
            return Err(ConfigError::invalid(
                "geometric_restart_factor",
                "must be > 1.0",
            ));
        }
        // The activity heaps divide by the decay factor, very small values would overflow
        // immediately.
        for &(name, decay) in &[
            ("var_decay", self.var_decay),
            ("clause_decay", self.clause_decay),
        ] {
            if !(decay > 1.0 / 16.0 && decay < 1.0) {
                return Err(ConfigError::invalid(name, "must be in (1/16, 1)"));
            }
        }
        if !(self.random_var_freq >= 0.0 && self.random_var_freq <= 1.0) {
            return Err(ConfigError::invalid("random_var_freq", "must be in [0, 1]"));
        }
        if self.learnt_cleaning_first_threshold == 0 {
            return Err(ConfigError::invalid(
                "learnt_cleaning_first_threshold",
                "must be >= 1",
            ));
        }
        if !(self.learnt_cleaning_growth >= 1.0 && self.learnt_cleaning_growth.is_finite()) {
            return Err(ConfigError::invalid(
                "learnt_cleaning_growth",
                "must be >= 1.0",
            ));
        }
        Ok(())
    }

    /// Set an option by name.
    ///
    /// Unknown option names and unparsable values are configuration errors. The resulting
    /// configuration is validated as a whole.
    pub fn set_option(&mut self, name: &str, value: &str) -> Result<(), ConfigError> {
        fn parse<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
            value
                .parse()
                .map_err(|_| ConfigError::invalid(name, format!("cannot parse `{}`", value)))
        }

        match name {
            "restart" => {
                self.restart = match value {
                    "glue" => RestartStrategy::Glue,
                    "luby" => RestartStrategy::Luby,
                    "geometric" => RestartStrategy::Geometric,
                    "never" => RestartStrategy::Never,
                    _ => {
                        return Err(ConfigError::invalid(
                            name,
                            "expected one of glue, luby, geometric, never",
                        ))
                    }
                }
            }
            "restart_short_window" => self.restart_short_window = parse(name, value)?,
            "restart_long_window" => self.restart_long_window = parse(name, value)?,
            "restart_margin" => self.restart_margin = parse(name, value)?,
            "restart_blocking_margin" => self.restart_blocking_margin = parse(name, value)?,
            "luby_restart_interval_scale" => {
                self.luby_restart_interval_scale = parse(name, value)?
            }
            "geometric_restart_base" => self.geometric_restart_base = parse(name, value)?,
            "geometric_restart_factor" => self.geometric_restart_factor = parse(name, value)?,
            "var_decay" => self.var_decay = parse(name, value)?,
            "clause_decay" => self.clause_decay = parse(name, value)?,
            "random_var_freq" => self.random_var_freq = parse(name, value)?,
            "random_seed" => self.random_seed = parse(name, value)?,
            "simplify_at_startup" => self.simplify_at_startup = parse(name, value)?,
            "simplify_interval" => self.simplify_interval = parse(name, value)?,
            "simplify_budget" => self.simplify_budget = parse(name, value)?,
            "enable_subsumption" => self.enable_subsumption = parse(name, value)?,
            "enable_scc" => self.enable_scc = parse(name, value)?,
            "learnt_cleaning_first_threshold" => {
                self.learnt_cleaning_first_threshold = parse(name, value)?
            }
            "learnt_cleaning_growth" => self.learnt_cleaning_growth = parse(name, value)?,
            "max_conflicts" => self.max_conflicts = Some(parse(name, value)?),
            "max_time_secs" => {
                self.max_time = Some(Duration::from_secs_f64(parse(name, value)?))
            }
            _ => return Err(ConfigError::UnknownOption(name.into())),
        }

        self.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(SolverConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_values() {
        let mut config = SolverConfig::default();
        config.var_decay = 1.5;
        assert!(config.validate().is_err());

        let mut config = SolverConfig::default();
        config.random_var_freq = -0.1;
        assert!(config.validate().is_err());

        let mut config = SolverConfig::default();
        config.learnt_cleaning_growth = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn set_option_by_name() {
        let mut config = SolverConfig::default();
        config.set_option("restart", "luby").unwrap();
        assert_eq!(config.restart, RestartStrategy::Luby);

        config.set_option("random_var_freq", "0.02").unwrap();
        assert!((config.random_var_freq - 0.02).abs() < 1e-9);

        assert!(matches!(
            config.set_option("no_such_option", "1"),
            Err(ConfigError::UnknownOption(_))
        ));
        assert!(config.set_option("var_decay", "2.0").is_err());
        assert!(config.set_option("restart", "sometimes").is_err());
    }
}

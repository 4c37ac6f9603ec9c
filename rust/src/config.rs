//! Configuration types for duration calculation and schedule compression.

use std::fmt;
use std::str::FromStr;

use pyo3::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while parsing or validating configuration.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Unknown optimizer preset: {0} (expected balanced, min or max)")]
    UnknownPreset(String),
    #[error("Unknown work week: {0} (expected 5d, 6d or 7d)")]
    UnknownWorkWeek(String),
    #[error("Invalid optimizer configuration: {0}")]
    Invalid(String),
}

/// Work-week regime used to pick an operating rate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkWeek {
    #[default]
    #[serde(rename = "5d")]
    FiveDay,
    #[serde(rename = "6d")]
    SixDay,
    #[serde(rename = "7d")]
    SevenDay,
}

impl WorkWeek {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkWeek::FiveDay => "5d",
            WorkWeek::SixDay => "6d",
            WorkWeek::SevenDay => "7d",
        }
    }
}

impl FromStr for WorkWeek {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "5d" => Ok(WorkWeek::FiveDay),
            "6d" => Ok(WorkWeek::SixDay),
            "7d" => Ok(WorkWeek::SevenDay),
            other => Err(ConfigError::UnknownWorkWeek(other.to_string())),
        }
    }
}

impl fmt::Display for WorkWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Weight preset for the compression objective.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Preset {
    /// Trade saved days against added resources evenly.
    #[default]
    Balanced,
    /// Prefer the smallest resource additions.
    Min,
    /// Prefer the largest time savings.
    Max,
}

impl Preset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Preset::Balanced => "balanced",
            Preset::Min => "min",
            Preset::Max => "max",
        }
    }

    /// Objective weights `(saved, crew, prod, congestion)`.
    pub fn weights(&self) -> (f64, f64, f64, f64) {
        match self {
            Preset::Balanced => (1.0, 0.4, 0.2, 0.8),
            Preset::Min => (1.0, 0.8, 0.4, 1.2),
            Preset::Max => (1.0, 0.2, 0.1, 0.4),
        }
    }
}

impl FromStr for Preset {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "balanced" => Ok(Preset::Balanced),
            "min" => Ok(Preset::Min),
            "max" => Ok(Preset::Max),
            other => Err(ConfigError::UnknownPreset(other.to_string())),
        }
    }
}

/// Tunables for the compression optimizer.
#[pyclass]
#[derive(Clone, Debug)]
pub struct OptimizerConfig {
    /// Weight on days saved by a move
    #[pyo3(get, set)]
    pub w_saved: f64,
    /// Weight on persons added by a move
    #[pyo3(get, set)]
    pub w_crew: f64,
    /// Weight on productivity boost, per 5 percentage points
    #[pyo3(get, set)]
    pub w_prod: f64,
    /// Weight on crowding of the work front
    #[pyo3(get, set)]
    pub w_congestion: f64,
    /// Hard bound on iterations per run
    #[pyo3(get, set)]
    pub max_iterations: u32,
    /// Most persons that may be added above a task's original crew
    #[pyo3(get, set)]
    pub max_crew_delta: u32,
    /// Largest productivity boost above a task's original productivity (percent)
    #[pyo3(get, set)]
    pub max_productivity_pct: f64,
    /// Productivity boost tried first (percent); escalation uses its multiples
    #[pyo3(get, set)]
    pub productivity_step_pct: f64,
    /// Per-person efficiency loss beyond the original crew
    #[pyo3(get, set)]
    pub decay_per_crew: f64,
    /// Lowest efficiency the decay can reach
    #[pyo3(get, set)]
    pub efficiency_floor: f64,
    /// Consecutive low-saving iterations tolerated before giving up
    #[pyo3(get, set)]
    pub stall_limit: u32,
    /// Pause between iterations of a cancellable run, in milliseconds
    #[pyo3(get, set)]
    pub pause_ms: u64,
    /// Verbosity level: 0=silent, 1=changes, 2=checks, 3=debug.
    #[pyo3(get, set)]
    pub verbosity: u8,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self::from_preset(Preset::Balanced)
    }
}

impl OptimizerConfig {
    /// Build a configuration with the weights of `preset` and default limits.
    pub fn from_preset(preset: Preset) -> Self {
        let (w_saved, w_crew, w_prod, w_congestion) = preset.weights();
        Self {
            w_saved,
            w_crew,
            w_prod,
            w_congestion,
            max_iterations: 40,
            max_crew_delta: 3,
            max_productivity_pct: 15.0,
            productivity_step_pct: 5.0,
            decay_per_crew: 0.05,
            efficiency_floor: 0.6,
            stall_limit: 3,
            pause_ms: 250,
            verbosity: 0,
        }
    }

    /// Reject settings the optimizer cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let weights = [self.w_saved, self.w_crew, self.w_prod, self.w_congestion];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(ConfigError::Invalid(
                "weights must be finite and non-negative".to_string(),
            ));
        }
        if self.w_saved <= 0.0 {
            return Err(ConfigError::Invalid("w_saved must be positive".to_string()));
        }
        if !(self.productivity_step_pct > 0.0 && self.productivity_step_pct.is_finite()) {
            return Err(ConfigError::Invalid(
                "productivity_step_pct must be positive".to_string(),
            ));
        }
        if !(self.max_productivity_pct >= 0.0 && self.max_productivity_pct.is_finite()) {
            return Err(ConfigError::Invalid(
                "max_productivity_pct must be non-negative".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.efficiency_floor) {
            return Err(ConfigError::Invalid(
                "efficiency_floor must be within [0, 1]".to_string(),
            ));
        }
        if !(self.decay_per_crew >= 0.0 && self.decay_per_crew.is_finite()) {
            return Err(ConfigError::Invalid(
                "decay_per_crew must be non-negative".to_string(),
            ));
        }
        if self.stall_limit == 0 {
            return Err(ConfigError::Invalid("stall_limit must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[pymethods]
impl OptimizerConfig {
    #[new]
    #[pyo3(signature = (
        preset=None,
        max_iterations=None,
        max_crew_delta=None,
        max_productivity_pct=None,
        pause_ms=None,
        verbosity=None
    ))]
    fn new(
        preset: Option<String>,
        max_iterations: Option<u32>,
        max_crew_delta: Option<u32>,
        max_productivity_pct: Option<f64>,
        pause_ms: Option<u64>,
        verbosity: Option<u8>,
    ) -> PyResult<Self> {
        let preset = match preset {
            Some(name) => name
                .parse::<Preset>()
                .map_err(|e| pyo3::exceptions::PyValueError::new_err(e.to_string()))?,
            None => Preset::default(),
        };
        let defaults = Self::from_preset(preset);
        let config = Self {
            max_iterations: max_iterations.unwrap_or(defaults.max_iterations),
            max_crew_delta: max_crew_delta.unwrap_or(defaults.max_crew_delta),
            max_productivity_pct: max_productivity_pct.unwrap_or(defaults.max_productivity_pct),
            pause_ms: pause_ms.unwrap_or(defaults.pause_ms),
            verbosity: verbosity.unwrap_or(defaults.verbosity),
            ..defaults
        };
        config
            .validate()
            .map_err(|e| pyo3::exceptions::PyValueError::new_err(e.to_string()))?;
        Ok(config)
    }

    fn __repr__(&self) -> String {
        format!(
            "OptimizerConfig(w_saved={}, w_crew={}, w_prod={}, w_congestion={}, max_iterations={})",
            self.w_saved, self.w_crew, self.w_prod, self.w_congestion, self.max_iterations
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balanced_is_default() {
        let config = OptimizerConfig::default();
        assert!((config.w_saved - 1.0).abs() < 1e-9);
        assert!((config.w_crew - 0.4).abs() < 1e-9);
        assert!((config.w_prod - 0.2).abs() < 1e-9);
        assert!((config.w_congestion - 0.8).abs() < 1e-9);
        assert_eq!(config.max_iterations, 40);
        assert_eq!(config.max_crew_delta, 3);
        assert!((config.max_productivity_pct - 15.0).abs() < 1e-9);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_presets() {
        assert_eq!("balanced".parse::<Preset>().unwrap(), Preset::Balanced);
        assert_eq!("min".parse::<Preset>().unwrap(), Preset::Min);
        assert_eq!(" max ".parse::<Preset>().unwrap(), Preset::Max);
        assert_eq!(
            "fastest".parse::<Preset>(),
            Err(ConfigError::UnknownPreset("fastest".to_string()))
        );
    }

    #[test]
    fn test_min_preset_penalizes_resources_more() {
        let min = OptimizerConfig::from_preset(Preset::Min);
        let max = OptimizerConfig::from_preset(Preset::Max);
        assert!(min.w_crew > max.w_crew);
        assert!(min.w_prod > max.w_prod);
        assert!(min.w_congestion > max.w_congestion);
    }

    #[test]
    fn test_parse_work_week() {
        assert_eq!("5d".parse::<WorkWeek>().unwrap(), WorkWeek::FiveDay);
        assert_eq!("6d".parse::<WorkWeek>().unwrap(), WorkWeek::SixDay);
        assert_eq!("7d".parse::<WorkWeek>().unwrap(), WorkWeek::SevenDay);
        assert!("4d".parse::<WorkWeek>().is_err());
        assert_eq!(WorkWeek::SixDay.to_string(), "6d");
    }

    #[test]
    fn test_validate_rejects_bad_floor() {
        let config = OptimizerConfig {
            efficiency_floor: 1.5,
            ..OptimizerConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}

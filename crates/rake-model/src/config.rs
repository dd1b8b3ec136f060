//! Weighting run configuration loaded from TOML.
//!
//! ```toml
//! [targets]
//! variables = ["sex", "age:education"]
//! weight_column = "pop_weight"
//! scale = "percent"
//!
//! [rake]
//! base_weight_column = "design_weight"
//! tolerance = 1e-6
//! max_iterations = 500
//! on_non_convergence = "fail"
//!
//! [trim]
//! upper_quantile = 0.95
//! redistribute = true
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, WeightingError};
use crate::options::{
    ConvergenceCriterion, NonConvergencePolicy, RakeOptions, TargetScale, TrimOptions,
    WeightScaling,
};
use crate::spec::VariableSpec;

/// Target construction settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Raking variables in raking order.
    pub variables: Vec<VariableSpec>,
    /// Benchmark weight column (required to build targets).
    pub weight_column: Option<String>,
    #[serde(default)]
    pub scale: TargetScale,
}

/// Raking settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RakeConfig {
    /// Sample column holding base (design) weights; uniform weights if absent.
    pub base_weight_column: Option<String>,
    pub tolerance: f64,
    pub max_iterations: usize,
    pub criterion: ConvergenceCriterion,
    pub zero_guard: f64,
    pub on_non_convergence: NonConvergencePolicy,
    pub scaling: WeightScaling,
}

impl Default for RakeConfig {
    fn default() -> Self {
        let options = RakeOptions::default();
        Self {
            base_weight_column: None,
            tolerance: options.tolerance,
            max_iterations: options.max_iterations,
            criterion: options.criterion,
            zero_guard: options.zero_guard,
            on_non_convergence: NonConvergencePolicy::default(),
            scaling: WeightScaling::default(),
        }
    }
}

impl RakeConfig {
    /// Engine options carried by this section.
    pub fn options(&self) -> RakeOptions {
        RakeOptions {
            tolerance: self.tolerance,
            max_iterations: self.max_iterations,
            criterion: self.criterion,
            zero_guard: self.zero_guard,
        }
    }
}

/// A complete weighting run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightingConfig {
    pub targets: TargetConfig,
    #[serde(default)]
    pub rake: RakeConfig,
    #[serde(default)]
    pub trim: Option<TrimOptions>,
}

impl WeightingConfig {
    /// Minimal configuration for the given variables and benchmark weight column.
    pub fn new(variables: Vec<VariableSpec>, weight_column: impl Into<String>) -> Self {
        Self {
            targets: TargetConfig {
                variables,
                weight_column: Some(weight_column.into()),
                scale: TargetScale::default(),
            },
            rake: RakeConfig::default(),
            trim: None,
        }
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents).map_err(|e| WeightingError::ConfigParse {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| WeightingError::ConfigIo {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.targets.variables.is_empty() {
            return Err(WeightingError::InvalidOptions {
                message: "at least one raking variable is required".to_string(),
            });
        }
        self.rake.options().validate()?;
        if let WeightScaling::Total(total) = self.rake.scaling
            && (!total.is_finite() || total <= 0.0)
        {
            return Err(WeightingError::InvalidOptions {
                message: format!("scaling total must be positive, got {total}"),
            });
        }
        if let Some(trim) = &self.trim {
            trim.mode()?;
        }
        Ok(())
    }
}

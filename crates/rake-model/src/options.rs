//! Configuration options for target building, raking and trimming.

use serde::{Deserialize, Serialize};

use crate::error::{Result, WeightingError};

/// Scale that target proportions are normalized to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetScale {
    /// Proportions sum to 100.
    #[default]
    Percent,
    /// Proportions sum to 1.
    Fraction,
}

impl TargetScale {
    /// The total every target table sums to.
    pub fn total(self) -> f64 {
        match self {
            Self::Percent => 100.0,
            Self::Fraction => 1.0,
        }
    }
}

/// How deviation from a target is measured when checking convergence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConvergenceCriterion {
    /// `|share - target|` on the target's scale.
    #[default]
    Absolute,
    /// `|share - target| / target`, over categories with a positive target.
    Relative,
}

/// What a weighting run does when raking hits its iteration cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NonConvergencePolicy {
    /// Surface the non-convergence error.
    #[default]
    Fail,
    /// Continue with the last iterate and record the fact in the outcome.
    AcceptLastIterate,
}

/// Final rescaling applied to a weight vector.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightScaling {
    /// Leave weights as produced.
    #[default]
    Preserve,
    /// Scale so the weights sum to the number of respondents (mean 1).
    SampleSize,
    /// Scale so the weights sum to the given population total.
    Total(f64),
}

/// Options for the raking engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RakeOptions {
    /// Convergence tolerance on the max deviation across all margins.
    pub tolerance: f64,
    /// Maximum number of full cycles over the target tables.
    pub max_iterations: usize,
    /// Deviation measure used for the convergence check.
    pub criterion: ConvergenceCriterion,
    /// Shares at or below this value are treated as zero mass.
    pub zero_guard: f64,
}

impl Default for RakeOptions {
    fn default() -> Self {
        Self {
            tolerance: 1e-6,
            max_iterations: 1000,
            criterion: ConvergenceCriterion::Absolute,
            zero_guard: 1e-12,
        }
    }
}

impl RakeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    #[must_use]
    pub fn with_criterion(mut self, criterion: ConvergenceCriterion) -> Self {
        self.criterion = criterion;
        self
    }

    #[must_use]
    pub fn with_zero_guard(mut self, zero_guard: f64) -> Self {
        self.zero_guard = zero_guard;
        self
    }

    /// Check option ranges.
    pub fn validate(&self) -> Result<()> {
        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            return Err(WeightingError::InvalidOptions {
                message: format!("tolerance must be positive, got {}", self.tolerance),
            });
        }
        if self.max_iterations == 0 {
            return Err(WeightingError::InvalidOptions {
                message: "max_iterations must be at least 1".to_string(),
            });
        }
        if !self.zero_guard.is_finite() || self.zero_guard < 0.0 {
            return Err(WeightingError::InvalidOptions {
                message: format!("zero_guard must be non-negative, got {}", self.zero_guard),
            });
        }
        Ok(())
    }
}

/// Options for weight trimming.
///
/// Either the absolute bounds or the quantile bounds are set, never both.
/// A side left as `None` is open.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrimOptions {
    pub lower_bound: Option<f64>,
    pub upper_bound: Option<f64>,
    pub lower_quantile: Option<f64>,
    pub upper_quantile: Option<f64>,
    /// Redistribute the clamped mass over untrimmed respondents so the total
    /// weight is preserved.
    pub redistribute: bool,
}

impl TrimOptions {
    /// Absolute bounds.
    pub fn absolute(lower: Option<f64>, upper: Option<f64>) -> Self {
        Self {
            lower_bound: lower,
            upper_bound: upper,
            ..Self::default()
        }
    }

    /// Quantile bounds (each in `[0, 1]`).
    pub fn quantile(lower: Option<f64>, upper: Option<f64>) -> Self {
        Self {
            lower_quantile: lower,
            upper_quantile: upper,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_redistribution(mut self, enable: bool) -> Self {
        self.redistribute = enable;
        self
    }

    /// Resolve which bound mode is in effect.
    pub fn mode(&self) -> Result<TrimMode> {
        let has_absolute = self.lower_bound.is_some() || self.upper_bound.is_some();
        let has_quantile = self.lower_quantile.is_some() || self.upper_quantile.is_some();
        match (has_absolute, has_quantile) {
            (true, true) => Err(WeightingError::InvalidTrimBounds {
                message: "absolute and quantile bounds are mutually exclusive".to_string(),
            }),
            (false, false) => Err(WeightingError::InvalidTrimBounds {
                message: "either absolute or quantile bounds are required".to_string(),
            }),
            (true, false) => {
                for bound in [self.lower_bound, self.upper_bound].into_iter().flatten() {
                    if !bound.is_finite() || bound < 0.0 {
                        return Err(WeightingError::InvalidTrimBounds {
                            message: format!("bound {bound} must be finite and non-negative"),
                        });
                    }
                }
                check_order(self.lower_bound, self.upper_bound)?;
                Ok(TrimMode::Absolute {
                    lower: self.lower_bound,
                    upper: self.upper_bound,
                })
            }
            (false, true) => {
                for q in [self.lower_quantile, self.upper_quantile].into_iter().flatten() {
                    if !(0.0..=1.0).contains(&q) {
                        return Err(WeightingError::InvalidTrimBounds {
                            message: format!("quantile {q} must lie in [0, 1]"),
                        });
                    }
                }
                check_order(self.lower_quantile, self.upper_quantile)?;
                Ok(TrimMode::Quantile {
                    lower: self.lower_quantile,
                    upper: self.upper_quantile,
                })
            }
        }
    }
}

fn check_order(lower: Option<f64>, upper: Option<f64>) -> Result<()> {
    if let (Some(lower), Some(upper)) = (lower, upper)
        && lower > upper
    {
        return Err(WeightingError::InvalidTrimBounds {
            message: format!("lower {lower} exceeds upper {upper}"),
        });
    }
    Ok(())
}

/// Trim bound mode resolved from [`TrimOptions`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrimMode {
    Absolute {
        lower: Option<f64>,
        upper: Option<f64>,
    },
    Quantile {
        lower: Option<f64>,
        upper: Option<f64>,
    },
}

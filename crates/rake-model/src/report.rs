//! Diagnostics produced by weighting runs.

use serde::{Deserialize, Serialize};

/// Achieved weighted share for one target category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryFit {
    pub category: String,
    pub target: f64,
    pub achieved: f64,
}

impl CategoryFit {
    pub fn abs_deviation(&self) -> f64 {
        (self.achieved - self.target).abs()
    }
}

/// Achieved shares for one target table after raking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarginFit {
    pub target: String,
    pub categories: Vec<CategoryFit>,
}

impl MarginFit {
    /// Largest absolute deviation in this margin.
    pub fn max_abs_deviation(&self) -> f64 {
        self.categories
            .iter()
            .map(CategoryFit::abs_deviation)
            .fold(0.0, f64::max)
    }
}

/// Summary of a raking run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RakeReport {
    /// Full cycles performed.
    pub iterations: usize,
    /// Whether the tolerance was met.
    pub converged: bool,
    /// Max deviation after the final cycle.
    pub max_deviation: f64,
    /// Max deviation after each cycle, in order.
    pub history: Vec<f64>,
    /// Achieved shares per target, in target order.
    pub margins: Vec<MarginFit>,
}

/// Kish design effect and derived quantities for a weight vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DesignEffect {
    /// Number of weights.
    pub n: usize,
    /// `n * sum(w^2) / sum(w)^2`.
    pub deff: f64,
    /// Effective sample size, `n / deff`.
    pub ess: f64,
    /// Conservative 95% margin of error for a proportion.
    pub moe: f64,
}

/// Descriptive statistics of a weight vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightSummary {
    pub n: usize,
    pub total: f64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// `max / min`; infinite when some weight is zero.
    pub ratio: f64,
    /// Coefficient of variation (population standard deviation over mean).
    pub cv: f64,
}

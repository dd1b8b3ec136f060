//! Weight trimming.
//!
//! Clamps each weight to bounds given either directly or as quantiles of the
//! input distribution. Trimming shifts total weight unless redistribution is
//! requested, in which case the clamped excess is spread proportionally over
//! the respondents left strictly inside the bounds.

use rake_model::{Result, TrimMode, TrimOptions, WeightingError};
use tracing::{debug, info, warn};

/// Relative gap at which the redistributed total counts as restored.
const REDISTRIBUTION_EPSILON: f64 = 1e-12;

/// Trimmed weights with the bounds that were applied.
#[derive(Debug, Clone, PartialEq)]
pub struct TrimOutcome {
    pub weights: Vec<f64>,
    /// Resolved lower bound, if any.
    pub lower: Option<f64>,
    /// Resolved upper bound, if any.
    pub upper: Option<f64>,
    /// Weights raised to the lower bound.
    pub trimmed_low: usize,
    /// Weights cut to the upper bound.
    pub trimmed_high: usize,
    pub total_before: f64,
    pub total_after: f64,
}

/// Clamps extreme weights.
#[derive(Debug, Clone, Copy)]
pub struct WeightTrimmer {
    options: TrimOptions,
}

impl WeightTrimmer {
    pub fn new(options: TrimOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &TrimOptions {
        &self.options
    }

    /// Trim a weight vector.
    ///
    /// # Errors
    ///
    /// [`WeightingError::InvalidTrimBounds`] when both or neither bound kinds
    /// are set, and [`WeightingError::DegenerateWeights`] /
    /// [`WeightingError::InvalidWeight`] for empty or invalid input.
    pub fn trim(&self, weights: &[f64]) -> Result<TrimOutcome> {
        let mode = self.options.mode()?;
        if weights.is_empty() {
            return Err(WeightingError::DegenerateWeights {
                message: "cannot trim an empty weight vector".to_string(),
            });
        }
        if let Some((row, weight)) = weights
            .iter()
            .enumerate()
            .find(|(_, w)| !w.is_finite() || **w < 0.0)
        {
            return Err(WeightingError::InvalidWeight {
                column: "weights".to_string(),
                row,
                reason: format!("{weight} is not a non-negative number"),
            });
        }

        let (lower, upper) = match mode {
            TrimMode::Absolute { lower, upper } => (lower, upper),
            TrimMode::Quantile { lower, upper } => {
                let mut sorted = weights.to_vec();
                sorted.sort_by(f64::total_cmp);
                (
                    lower.map(|p| quantile(&sorted, p)),
                    upper.map(|p| quantile(&sorted, p)),
                )
            }
        };
        let lo = lower.unwrap_or(f64::NEG_INFINITY);
        let hi = upper.unwrap_or(f64::INFINITY);

        let total_before: f64 = weights.iter().sum();
        let trimmed_low = weights.iter().filter(|w| **w < lo).count();
        let trimmed_high = weights.iter().filter(|w| **w > hi).count();
        let mut trimmed: Vec<f64> = weights.iter().map(|w| w.max(lo).min(hi)).collect();

        if self.options.redistribute {
            redistribute(&mut trimmed, lo, hi, total_before);
        }
        let total_after: f64 = trimmed.iter().sum();

        info!(
            lower = ?lower,
            upper = ?upper,
            trimmed_low,
            trimmed_high,
            total_before,
            total_after,
            "weights trimmed"
        );
        if !self.options.redistribute && (trimmed_low > 0 || trimmed_high > 0) {
            debug!(
                shift = total_after - total_before,
                "trimming changed the total weight"
            );
        }

        Ok(TrimOutcome {
            weights: trimmed,
            lower,
            upper,
            trimmed_low,
            trimmed_high,
            total_before,
            total_after,
        })
    }
}

/// Spread the gap between `target_total` and the current total over weights
/// strictly inside `(lower, upper)`, re-clamping until the total is restored
/// or no free weight remains.
fn redistribute(weights: &mut [f64], lower: f64, upper: f64, target_total: f64) {
    // Each pass either restores the total or pins at least one more weight.
    for _ in 0..=weights.len() {
        let total: f64 = weights.iter().sum();
        let gap = target_total - total;
        if gap.abs() <= REDISTRIBUTION_EPSILON * target_total.max(1.0) {
            return;
        }
        let free: f64 = weights
            .iter()
            .filter(|w| **w > lower && **w < upper)
            .sum();
        if free <= 0.0 {
            break;
        }
        let factor = ((free + gap) / free).max(0.0);
        for weight in weights.iter_mut() {
            if *weight > lower && *weight < upper {
                *weight = (*weight * factor).max(lower).min(upper);
            }
        }
    }
    let total: f64 = weights.iter().sum();
    if (target_total - total).abs() > REDISTRIBUTION_EPSILON * target_total.max(1.0) {
        warn!(
            target_total,
            achieved_total = total,
            "bounds leave too little free weight to restore the total"
        );
    }
}

/// Quantile of sorted data by linear interpolation between order statistics
/// (Hyndman and Fan type 7).
pub fn quantile(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let h = (n - 1) as f64 * p.clamp(0.0, 1.0);
            let below = h.floor() as usize;
            let above = h.ceil() as usize;
            sorted[below] + (h - below as f64) * (sorted[above] - sorted[below])
        }
    }
}

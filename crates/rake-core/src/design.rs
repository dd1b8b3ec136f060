//! Kish design effect, effective sample size and margin of error.

use rake_model::{DesignEffect, Result, TargetScale, WeightScaling, WeightSummary, WeightingError};

/// Two-sided 95% normal critical value.
pub const Z_95: f64 = 1.96;

/// Computes weighting diagnostics from a weight vector alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct DesignEffectCalculator {
    scale: TargetScale,
}

impl DesignEffectCalculator {
    /// `scale` selects whether the margin of error is a fraction or in
    /// percentage points.
    pub fn new(scale: TargetScale) -> Self {
        Self { scale }
    }

    /// Kish approximation: `deff = n * sum(w^2) / sum(w)^2`, `ess = n / deff`,
    /// `moe = 1.96 * sqrt(0.25 / ess)`.
    ///
    /// `deff` is never below 1, so `ess` never exceeds `n`; a uniform vector
    /// reports exactly 1.
    ///
    /// # Errors
    ///
    /// [`WeightingError::DegenerateWeights`] for an empty vector, a single
    /// respondent, all-zero weights, or any negative or non-finite weight.
    pub fn compute(&self, weights: &[f64]) -> Result<DesignEffect> {
        check_weights(weights, 2)?;
        let n = weights.len();
        let deff = if weights.iter().all(|w| *w == weights[0]) {
            1.0
        } else {
            let sum: f64 = weights.iter().sum();
            let sum_sq: f64 = weights.iter().map(|w| w * w).sum();
            // Cauchy-Schwarz bound; rounding can land just under it.
            (n as f64 * sum_sq / (sum * sum)).max(1.0)
        };
        let ess = n as f64 / deff;
        let moe = Z_95 * (0.25 / ess).sqrt() * self.scale.total();
        Ok(DesignEffect { n, deff, ess, moe })
    }

    /// Descriptive statistics of the weights.
    pub fn summarize(&self, weights: &[f64]) -> Result<WeightSummary> {
        check_weights(weights, 1)?;
        let n = weights.len();
        let total: f64 = weights.iter().sum();
        let mean = total / n as f64;
        let min = weights.iter().copied().fold(f64::INFINITY, f64::min);
        let max = weights.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let variance = weights.iter().map(|w| (w - mean).powi(2)).sum::<f64>() / n as f64;
        Ok(WeightSummary {
            n,
            total,
            min,
            max,
            mean,
            ratio: if min > 0.0 { max / min } else { f64::INFINITY },
            cv: variance.sqrt() / mean,
        })
    }
}

fn check_weights(weights: &[f64], min_len: usize) -> Result<()> {
    let degenerate =
        |message: String| -> Result<()> { Err(WeightingError::DegenerateWeights { message }) };
    if weights.is_empty() {
        return degenerate("weight vector is empty".to_string());
    }
    if weights.len() < min_len {
        return degenerate(format!(
            "need at least {min_len} respondents, got {}",
            weights.len()
        ));
    }
    if let Some((row, weight)) = weights
        .iter()
        .enumerate()
        .find(|(_, w)| !w.is_finite() || **w < 0.0)
    {
        return degenerate(format!("weight {weight} at row {row} is not a non-negative number"));
    }
    if weights.iter().all(|w| *w == 0.0) {
        return degenerate("all weights are zero".to_string());
    }
    Ok(())
}

/// Rescale weights to a fixed total.
pub fn scale_weights(weights: &[f64], scaling: WeightScaling) -> Result<Vec<f64>> {
    let target = match scaling {
        WeightScaling::Preserve => return Ok(weights.to_vec()),
        WeightScaling::SampleSize => weights.len() as f64,
        WeightScaling::Total(total) if total.is_finite() && total > 0.0 => total,
        WeightScaling::Total(total) => {
            return Err(WeightingError::InvalidOptions {
                message: format!("scaling total must be positive, got {total}"),
            });
        }
    };
    check_weights(weights, 1)?;
    let sum: f64 = weights.iter().sum();
    Ok(weights.iter().map(|w| w / sum * target).collect())
}

//! Iterative proportional fitting (raking ratio estimation).
//!
//! Each cycle sweeps the target tables in caller order. For every table the
//! weighted share of each category is computed on the table's scale and the
//! weights of that category's members are multiplied by `target / share`.
//! Convergence is checked only after a full cycle, against the maximum
//! deviation over all categories of all tables.
//!
//! Before the first cycle the sample is validated: every spec column must
//! exist and be complete, and each table's labels must equal the sample's
//! level set for that spec exactly.

use std::collections::{BTreeMap, BTreeSet};

use rake_frame::CategoricalFrame;
use rake_model::{
    CategoryFit, ConvergenceCriterion, MarginFit, NonConvergence, RakeOptions, RakeReport,
    Result, TargetSet, TargetTable, WeightingError,
};
use tracing::{debug, info, info_span, warn};

/// Calibrated weights and the run report.
#[derive(Debug, Clone)]
pub struct RakeOutcome {
    pub weights: Vec<f64>,
    pub report: RakeReport,
}

/// One target table bound to the sample rows.
#[derive(Debug)]
pub(crate) struct Margin<'a> {
    pub(crate) table: &'a TargetTable,
    /// Target value per category, in table order.
    pub(crate) targets: Vec<f64>,
    /// Category index per sample row; `None` for labels outside the table.
    pub(crate) members: Vec<Option<usize>>,
}

impl<'a> Margin<'a> {
    /// Bind a table to row labels without checking label-set equality.
    pub(crate) fn bind(table: &'a TargetTable, labels: &[String]) -> Self {
        let index: BTreeMap<&str, usize> = table
            .categories()
            .enumerate()
            .map(|(idx, category)| (category, idx))
            .collect();
        Self {
            table,
            targets: table.rows().iter().map(|row| row.freq).collect(),
            members: labels
                .iter()
                .map(|label| index.get(label.as_str()).copied())
                .collect(),
        }
    }

    /// Weighted share of each category on the table's scale.
    pub(crate) fn shares(&self, weights: &[f64]) -> Vec<f64> {
        let mut masses = vec![0.0; self.targets.len()];
        let mut grand = 0.0;
        for (member, weight) in self.members.iter().zip(weights) {
            grand += weight;
            if let Some(idx) = member {
                masses[*idx] += weight;
            }
        }
        if grand <= 0.0 {
            return masses;
        }
        let total = self.table.total();
        masses.iter().map(|mass| mass / grand * total).collect()
    }

    fn fit(&self, weights: &[f64]) -> MarginFit {
        let shares = self.shares(weights);
        MarginFit {
            target: self.table.name(),
            categories: self
                .table
                .rows()
                .iter()
                .zip(shares)
                .map(|(row, achieved)| CategoryFit {
                    category: row.category.clone(),
                    target: row.freq,
                    achieved,
                })
                .collect(),
        }
    }
}

/// Raking solver over a list of target tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct RakingEngine {
    options: RakeOptions,
}

impl RakingEngine {
    pub fn new(options: RakeOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &RakeOptions {
        &self.options
    }

    /// Rake a sample to the targets.
    ///
    /// Weights start from `base_weight_column` when given, otherwise at 1 per
    /// respondent. The sample frame is not modified.
    ///
    /// # Errors
    ///
    /// - configuration errors for invalid options, unknown or incomplete
    ///   columns, invalid base weights and label mismatches, all raised before
    ///   the first cycle
    /// - [`WeightingError::ZeroMass`] when a category with a positive target
    ///   has no weighted mass
    /// - [`WeightingError::NonConvergence`] when `max_iterations` cycles pass
    ///   without meeting the tolerance; the last iterate is attached
    pub fn rake(
        &self,
        sample: &CategoricalFrame,
        base_weight_column: Option<&str>,
        targets: &TargetSet,
    ) -> Result<RakeOutcome> {
        let weights = match base_weight_column {
            Some(column) => sample.weights(column)?,
            None => vec![1.0; sample.height()],
        };
        self.rake_from(sample, weights, targets)
    }

    /// Rake starting from an explicit weight vector aligned with the sample rows.
    pub fn rake_with_weights(
        &self,
        sample: &CategoricalFrame,
        base_weights: &[f64],
        targets: &TargetSet,
    ) -> Result<RakeOutcome> {
        if base_weights.len() != sample.height() {
            return Err(WeightingError::InvalidOptions {
                message: format!(
                    "base weight vector has {} entries for {} rows",
                    base_weights.len(),
                    sample.height()
                ),
            });
        }
        if let Some((row, weight)) = base_weights
            .iter()
            .enumerate()
            .find(|(_, w)| !w.is_finite() || **w < 0.0)
        {
            return Err(WeightingError::InvalidWeight {
                column: "base weights".to_string(),
                row,
                reason: format!("{weight} is not a non-negative number"),
            });
        }
        self.rake_from(sample, base_weights.to_vec(), targets)
    }

    fn rake_from(
        &self,
        sample: &CategoricalFrame,
        mut weights: Vec<f64>,
        targets: &TargetSet,
    ) -> Result<RakeOutcome> {
        self.options.validate()?;
        targets.common_total()?;
        let margins = bind_margins(sample, targets)?;

        let span = info_span!(
            "rake",
            targets = margins.len(),
            respondents = weights.len(),
            tolerance = self.options.tolerance
        );
        let _guard = span.enter();

        let mut history = Vec::new();
        for iteration in 1..=self.options.max_iterations {
            for margin in &margins {
                self.adjust(margin, &mut weights)?;
            }
            let deviation = self.max_deviation(&margins, &weights);
            history.push(deviation);
            debug!(iteration, max_deviation = deviation, "raking cycle complete");

            if deviation < self.options.tolerance {
                info!(iterations = iteration, max_deviation = deviation, "raking converged");
                let report = build_report(&margins, &weights, history, true);
                return Ok(RakeOutcome { weights, report });
            }
        }

        let report = build_report(&margins, &weights, history, false);
        warn!(
            iterations = report.iterations,
            max_deviation = report.max_deviation,
            tolerance = self.options.tolerance,
            "raking did not converge"
        );
        Err(WeightingError::NonConvergence(Box::new(NonConvergence {
            iterations: report.iterations,
            achieved: report.max_deviation,
            tolerance: self.options.tolerance,
            report,
            last_iterate: weights,
        })))
    }

    /// Rescale member weights of each category toward the target share.
    fn adjust(&self, margin: &Margin<'_>, weights: &mut [f64]) -> Result<()> {
        let shares = margin.shares(weights);
        let mut factors = vec![1.0; shares.len()];
        for (idx, (share, target)) in shares.iter().zip(&margin.targets).enumerate() {
            if *share <= self.options.zero_guard {
                if *target > 0.0 {
                    return Err(WeightingError::ZeroMass {
                        target: margin.table.name(),
                        category: margin.table.rows()[idx].category.clone(),
                        target_freq: *target,
                    });
                }
                continue;
            }
            factors[idx] = target / share;
        }
        for (weight, member) in weights.iter_mut().zip(&margin.members) {
            if let Some(idx) = member {
                *weight *= factors[*idx];
            }
        }
        Ok(())
    }

    fn deviation(&self, share: f64, target: f64) -> f64 {
        match self.options.criterion {
            ConvergenceCriterion::Absolute => (share - target).abs(),
            ConvergenceCriterion::Relative if target > 0.0 => (share - target).abs() / target,
            ConvergenceCriterion::Relative => 0.0,
        }
    }

    fn max_deviation(&self, margins: &[Margin<'_>], weights: &[f64]) -> f64 {
        margins
            .iter()
            .flat_map(|margin| {
                margin
                    .shares(weights)
                    .into_iter()
                    .zip(margin.targets.iter().copied())
                    .map(|(share, target)| self.deviation(share, target))
                    .collect::<Vec<_>>()
            })
            .fold(0.0, f64::max)
    }
}

/// Validate the sample against every table and bind rows to categories.
fn bind_margins<'a>(sample: &CategoricalFrame, targets: &'a TargetSet) -> Result<Vec<Margin<'a>>> {
    let mut margins = Vec::with_capacity(targets.len());
    for table in targets {
        let spec = table.spec();
        let labels = sample.spec_labels(spec)?;
        let levels = sample.level_set_for(spec, &labels)?;

        let target_labels: BTreeSet<&str> = table.categories().collect();
        let sample_labels: BTreeSet<&str> = levels.iter().map(String::as_str).collect();
        let only_in_target: Vec<String> = target_labels
            .difference(&sample_labels)
            .map(|label| (*label).to_string())
            .collect();
        let only_in_sample: Vec<String> = sample_labels
            .difference(&target_labels)
            .map(|label| (*label).to_string())
            .collect();
        if !only_in_target.is_empty() || !only_in_sample.is_empty() {
            return Err(WeightingError::CategoryMismatch {
                target: table.name(),
                only_in_target,
                only_in_sample,
            });
        }
        margins.push(Margin::bind(table, &labels));
    }
    Ok(margins)
}

fn build_report(
    margins: &[Margin<'_>],
    weights: &[f64],
    history: Vec<f64>,
    converged: bool,
) -> RakeReport {
    RakeReport {
        iterations: history.len(),
        converged,
        max_deviation: history.last().copied().unwrap_or(0.0),
        history,
        margins: margins.iter().map(|margin| margin.fit(weights)).collect(),
    }
}

//! Margin comparisons between targets, the raw sample and weighted sample.

use rake_frame::CategoricalFrame;
use rake_model::{Result, TargetSet, WeightingError};

use crate::engine::Margin;

/// One category of a margin comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryComparison {
    pub category: String,
    pub target: f64,
    /// Share with every respondent weighted 1.
    pub unweighted: f64,
    pub weighted: f64,
}

/// Target versus sample shares for one target table.
#[derive(Debug, Clone, PartialEq)]
pub struct MarginComparison {
    pub target: String,
    pub categories: Vec<CategoryComparison>,
}

impl MarginComparison {
    /// Largest `|weighted - target|` in this margin.
    pub fn max_abs_deviation(&self) -> f64 {
        self.categories
            .iter()
            .map(|c| (c.weighted - c.target).abs())
            .fold(0.0, f64::max)
    }

    /// Largest `|unweighted - target|` in this margin.
    pub fn max_unweighted_deviation(&self) -> f64 {
        self.categories
            .iter()
            .map(|c| (c.unweighted - c.target).abs())
            .fold(0.0, f64::max)
    }
}

/// Compare every target table with the sample, unweighted and under `weights`.
///
/// Sample rows whose label is not in a table count toward the denominator
/// only, so trimmed or partially matching samples can still be inspected.
pub fn compare_margins(
    sample: &CategoricalFrame,
    weights: &[f64],
    targets: &TargetSet,
) -> Result<Vec<MarginComparison>> {
    if weights.len() != sample.height() {
        return Err(WeightingError::InvalidOptions {
            message: format!(
                "weight vector has {} entries for {} rows",
                weights.len(),
                sample.height()
            ),
        });
    }
    let unit = vec![1.0; sample.height()];
    let mut comparisons = Vec::with_capacity(targets.len());
    for table in targets {
        let labels = sample.spec_labels(table.spec())?;
        let margin = Margin::bind(table, &labels);
        let unweighted = margin.shares(&unit);
        let weighted = margin.shares(weights);
        comparisons.push(MarginComparison {
            target: table.name(),
            categories: table
                .rows()
                .iter()
                .zip(unweighted.into_iter().zip(weighted))
                .map(|(row, (unweighted, weighted))| CategoryComparison {
                    category: row.category.clone(),
                    target: row.freq,
                    unweighted,
                    weighted,
                })
                .collect(),
        });
    }
    Ok(comparisons)
}

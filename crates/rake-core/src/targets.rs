//! Raking target construction from benchmark data.
//!
//! The builder groups benchmark rows by the joint category label of each
//! spec, sums the benchmark weight per group and normalizes every table to
//! the scale total. A benchmark weight column is mandatory: unweighted
//! benchmark counts are never used as targets.

use std::collections::BTreeMap;

use polars::prelude::{AnyValue, Column, IntoLazy, col};
use rake_frame::CategoricalFrame;
use rake_model::{
    Result, TargetScale, TargetSet, TargetTable, VariableSpec, WeightingError, join_labels,
};
use tracing::{debug, info_span};

/// Temporary column holding validated benchmark weights during grouping.
const MASS_COLUMN: &str = "__rake_mass";

/// Builds normalized target tables from a weighted benchmark frame.
#[derive(Debug, Clone, Default)]
pub struct TargetBuilder {
    scale: TargetScale,
    weight_column: Option<String>,
}

impl TargetBuilder {
    pub fn new(scale: TargetScale) -> Self {
        Self {
            scale,
            weight_column: None,
        }
    }

    /// Name the benchmark weight column (required).
    #[must_use]
    pub fn weight_column(mut self, name: impl Into<String>) -> Self {
        self.weight_column = Some(name.into());
        self
    }

    pub fn scale(&self) -> TargetScale {
        self.scale
    }

    /// Build one table per spec, in spec order.
    pub fn build(&self, benchmark: &CategoricalFrame, specs: &[VariableSpec]) -> Result<TargetSet> {
        let Some(weight_column) = self.weight_column.as_deref() else {
            return Err(WeightingError::MissingWeightColumn);
        };
        let span = info_span!(
            "build_targets",
            specs = specs.len(),
            rows = benchmark.height(),
            weight_column = %weight_column
        );
        let _guard = span.enter();

        let weights = benchmark.weights(weight_column)?;
        let total: f64 = weights.iter().sum();
        if total <= 0.0 {
            return Err(WeightingError::DegenerateWeights {
                message: format!("benchmark weight column '{weight_column}' sums to zero"),
            });
        }

        let mut set = TargetSet::new();
        for spec in specs {
            let table = self.build_table(benchmark, spec, &weights)?;
            debug!(
                target_name = %table.name(),
                categories = table.rows().len(),
                "target table built"
            );
            set.push(table)?;
        }
        Ok(set)
    }

    /// Build the table for a single spec from pre-validated benchmark weights.
    fn build_table(
        &self,
        benchmark: &CategoricalFrame,
        spec: &VariableSpec,
        weights: &[f64],
    ) -> Result<TargetTable> {
        // Row-order validation of completeness and compound label parts.
        benchmark.spec_labels(spec)?;
        let mut masses = group_masses(benchmark, spec, weights)?;

        // Declared levels keep their order and survive with zero mass.
        let mut rows: Vec<(String, f64)> = Vec::with_capacity(masses.len());
        if let Some(declared) = benchmark.declared_product(spec)? {
            for label in declared {
                let mass = masses.remove(&label).unwrap_or(0.0);
                rows.push((label, mass));
            }
        }
        rows.extend(masses);
        TargetTable::from_counts(spec.clone(), rows, self.scale)
    }
}

/// Sum benchmark weight per joint category label.
fn group_masses(
    benchmark: &CategoricalFrame,
    spec: &VariableSpec,
    weights: &[f64],
) -> Result<BTreeMap<String, f64>> {
    let columns = spec.components();
    let mut keyed = benchmark
        .data()
        .select(columns.iter().map(String::as_str))
        .map_err(WeightingError::data_frame)?;
    keyed
        .with_column(Column::new(MASS_COLUMN.into(), weights.to_vec()))
        .map_err(WeightingError::data_frame)?;

    let keys: Vec<_> = columns.iter().map(|c| col(c.as_str())).collect();
    let grouped = keyed
        .lazy()
        .group_by(keys)
        .agg([col(MASS_COLUMN).sum()])
        .collect()
        .map_err(WeightingError::data_frame)?;

    let mass = grouped
        .column(MASS_COLUMN)
        .map_err(WeightingError::data_frame)?
        .as_materialized_series()
        .f64()
        .map_err(WeightingError::data_frame)?
        .clone();
    let key_columns = columns
        .iter()
        .map(|c| grouped.column(c.as_str()))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(WeightingError::data_frame)?;

    let mut masses = BTreeMap::new();
    for row in 0..grouped.height() {
        let mut parts = Vec::with_capacity(key_columns.len());
        for (name, column) in columns.iter().zip(&key_columns) {
            let value = column.get(row).unwrap_or(AnyValue::Null);
            let Some(label) = benchmark.label_of(value) else {
                return Err(WeightingError::MissingValues {
                    column: name.clone(),
                    count: 1,
                });
            };
            parts.push(label);
        }
        // Labels differing only in surrounding whitespace fold together here.
        *masses.entry(join_labels(&parts)).or_insert(0.0) += mass.get(row).unwrap_or(0.0);
    }
    Ok(masses)
}

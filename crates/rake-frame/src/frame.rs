//! Categorical respondent frames.
//!
//! [`CategoricalFrame`] wraps a Polars DataFrame holding one row per
//! respondent. It renders cells as category labels, tracks declared level
//! sets per column (so a category can exist with zero respondents), and
//! validates weight columns.

use std::collections::{BTreeMap, BTreeSet};

use polars::prelude::{AnyValue, Column, DataFrame};
use rake_model::{Result, SPEC_SEPARATOR, VariableSpec, WeightingError, join_labels};

use crate::polars::{any_to_f64, any_to_label};

/// Markers treated as missing in addition to nulls and blank strings.
pub const DEFAULT_MISSING_MARKERS: &[&str] = &["NA"];

/// A respondent-level frame of categorical variables and weight columns.
#[derive(Debug, Clone)]
pub struct CategoricalFrame {
    data: DataFrame,
    levels: BTreeMap<String, Vec<String>>,
    missing_markers: Vec<String>,
}

impl CategoricalFrame {
    /// Wrap a DataFrame with the default missing markers and no declared levels.
    pub fn new(data: DataFrame) -> Self {
        Self {
            data,
            levels: BTreeMap::new(),
            missing_markers: DEFAULT_MISSING_MARKERS
                .iter()
                .map(|m| (*m).to_string())
                .collect(),
        }
    }

    /// Declare the full level set of a column, in display order.
    ///
    /// Declared levels take part in label matching even when no row carries them.
    #[must_use]
    pub fn with_levels<I, S>(mut self, column: impl Into<String>, levels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = BTreeSet::new();
        let levels: Vec<String> = levels
            .into_iter()
            .map(Into::into)
            .filter(|level: &String| seen.insert(level.clone()))
            .collect();
        self.levels.insert(column.into(), levels);
        self
    }

    /// Replace the strings treated as missing (nulls and blanks always are).
    #[must_use]
    pub fn with_missing_markers<I, S>(mut self, markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.missing_markers = markers.into_iter().map(Into::into).collect();
        self
    }

    pub fn data(&self) -> &DataFrame {
        &self.data
    }

    pub fn into_inner(self) -> DataFrame {
        self.data
    }

    /// Number of respondents.
    pub fn height(&self) -> usize {
        self.data.height()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.data.column(name).is_ok()
    }

    /// Declared levels for a column, if any.
    pub fn declared_levels(&self, column: &str) -> Option<&[String]> {
        self.levels.get(column).map(Vec::as_slice)
    }

    fn column(&self, name: &str) -> Result<&Column> {
        self.data
            .column(name)
            .map_err(|_| WeightingError::UnknownColumn {
                column: name.to_string(),
            })
    }

    /// Render a cell value as a label, or `None` when it counts as missing.
    pub fn label_of(&self, value: AnyValue<'_>) -> Option<String> {
        if matches!(value, AnyValue::Null) {
            return None;
        }
        let label = any_to_label(value);
        let trimmed = label.trim();
        if trimmed.is_empty() || self.missing_markers.iter().any(|m| m == trimmed) {
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    /// Labels of a single column, `None` for missing cells.
    pub fn column_labels(&self, name: &str) -> Result<Vec<Option<String>>> {
        let column = self.column(name)?;
        Ok((0..self.data.height())
            .map(|idx| self.label_of(column.get(idx).unwrap_or(AnyValue::Null)))
            .collect())
    }

    /// Number of missing cells in a column.
    pub fn missing_count(&self, name: &str) -> Result<usize> {
        Ok(self
            .column_labels(name)?
            .iter()
            .filter(|label| label.is_none())
            .count())
    }

    /// Fail with [`WeightingError::MissingValues`] if any spec column has gaps.
    pub fn ensure_complete(&self, spec: &VariableSpec) -> Result<()> {
        for component in spec.components() {
            let count = self.missing_count(component)?;
            if count > 0 {
                return Err(WeightingError::MissingValues {
                    column: component.clone(),
                    count,
                });
            }
        }
        Ok(())
    }

    /// Category label per row for a (possibly compound) spec.
    ///
    /// Compound labels join the component labels with `:`. Any missing
    /// component is an error, as is a component label containing `:`.
    pub fn spec_labels(&self, spec: &VariableSpec) -> Result<Vec<String>> {
        let mut per_component = Vec::with_capacity(spec.components().len());
        for component in spec.components() {
            let labels = self.column_labels(component)?;
            let count = labels.iter().filter(|label| label.is_none()).count();
            if count > 0 {
                return Err(WeightingError::MissingValues {
                    column: component.clone(),
                    count,
                });
            }
            let labels: Vec<String> = labels.into_iter().flatten().collect();
            for label in &labels {
                check_component_label(spec, component, label)?;
            }
            per_component.push(labels);
        }
        Ok((0..self.data.height())
            .map(|row| {
                let parts: Vec<&str> = per_component
                    .iter()
                    .map(|labels| labels[row].as_str())
                    .collect();
                join_labels(&parts)
            })
            .collect())
    }

    /// The level set of a spec in this frame.
    ///
    /// When every component has declared levels, this is their Cartesian
    /// product in declaration order. Observed labels outside that product (or
    /// all observed labels, when some component is undeclared) follow in
    /// sorted order.
    pub fn level_set(&self, spec: &VariableSpec) -> Result<Vec<String>> {
        let labels = self.spec_labels(spec)?;
        self.level_set_for(spec, &labels)
    }

    /// Level set of a spec given its already extracted row labels.
    pub fn level_set_for(&self, spec: &VariableSpec, labels: &[String]) -> Result<Vec<String>> {
        let observed: BTreeSet<&str> = labels.iter().map(String::as_str).collect();
        let mut levels = self.declared_product(spec)?.unwrap_or_default();
        let declared: BTreeSet<String> = levels.iter().cloned().collect();
        levels.extend(
            observed
                .into_iter()
                .filter(|label| !declared.contains(*label))
                .map(str::to_string),
        );
        Ok(levels)
    }

    /// Cartesian product of declared levels, if every component is declared.
    pub fn declared_product(&self, spec: &VariableSpec) -> Result<Option<Vec<String>>> {
        let mut combos: Vec<Vec<&str>> = vec![Vec::new()];
        for component in spec.components() {
            let Some(levels) = self.declared_levels(component) else {
                return Ok(None);
            };
            for level in levels {
                check_component_label(spec, component, level)?;
            }
            combos = combos
                .iter()
                .flat_map(|prefix| {
                    levels.iter().map(move |level| {
                        let mut next = prefix.clone();
                        next.push(level.as_str());
                        next
                    })
                })
                .collect();
        }
        Ok(Some(combos.iter().map(|parts| join_labels(parts)).collect()))
    }

    /// Read a weight column as non-negative finite values.
    pub fn weights(&self, name: &str) -> Result<Vec<f64>> {
        let column = self.column(name)?;
        let invalid = |row: usize, reason: String| WeightingError::InvalidWeight {
            column: name.to_string(),
            row,
            reason,
        };
        let mut weights = Vec::with_capacity(self.data.height());
        for row in 0..self.data.height() {
            let value = column.get(row).unwrap_or(AnyValue::Null);
            let Some(weight) = any_to_f64(value) else {
                return Err(invalid(row, "missing or non-numeric".to_string()));
            };
            if !weight.is_finite() || weight < 0.0 {
                return Err(invalid(row, format!("{weight} is not a non-negative number")));
            }
            weights.push(weight);
        }
        Ok(weights)
    }

    /// A copy of the data with `weights` attached (or replaced) as column `name`.
    pub fn with_weight_column(&self, name: &str, weights: &[f64]) -> Result<DataFrame> {
        if weights.len() != self.data.height() {
            return Err(WeightingError::InvalidOptions {
                message: format!(
                    "weight vector has {} entries for {} rows",
                    weights.len(),
                    self.data.height()
                ),
            });
        }
        let mut data = self.data.clone();
        data.with_column(Column::new(name.into(), weights.to_vec()))
            .map_err(WeightingError::data_frame)?;
        Ok(data)
    }

    /// A copy of this frame with a column replaced by fully populated labels.
    ///
    /// Declared levels and missing markers carry over.
    pub fn with_labels(&self, name: &str, labels: Vec<String>) -> Result<Self> {
        if labels.len() != self.data.height() {
            return Err(WeightingError::InvalidOptions {
                message: format!(
                    "label vector has {} entries for {} rows",
                    labels.len(),
                    self.data.height()
                ),
            });
        }
        let mut data = self.data.clone();
        data.with_column(Column::new(name.into(), labels))
            .map_err(WeightingError::data_frame)?;
        Ok(Self {
            data,
            levels: self.levels.clone(),
            missing_markers: self.missing_markers.clone(),
        })
    }
}

/// Reject a component label that would make a compound label ambiguous.
///
/// Single-column specs accept any label.
pub fn check_component_label(spec: &VariableSpec, column: &str, label: &str) -> Result<()> {
    if spec.is_compound() && label.contains(SPEC_SEPARATOR) {
        return Err(WeightingError::AmbiguousLabel {
            spec: spec.name(),
            column: column.to_string(),
            label: label.to_string(),
        });
    }
    Ok(())
}

impl From<DataFrame> for CategoricalFrame {
    fn from(data: DataFrame) -> Self {
        Self::new(data)
    }
}

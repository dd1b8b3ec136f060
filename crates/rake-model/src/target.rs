//! Raking target tables.
//!
//! A [`TargetTable`] is the normalized benchmark distribution for one
//! (possibly compound) variable: a list of category labels with a `Freq`
//! value each, summing to the table's total (100 or 1). A [`TargetSet`] is the
//! ordered collection of tables used in one raking run.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{Result, WeightingError};
use crate::options::TargetScale;
use crate::spec::VariableSpec;

/// Tolerance for checking that a table sums to its total.
pub const SUM_EPSILON: f64 = 1e-9;

/// One category row of a target table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetRow {
    pub category: String,
    #[serde(rename = "Freq")]
    pub freq: f64,
}

/// Normalized target distribution for one raking variable.
///
/// Deserialized tables go through [`TargetTable::from_counts`], so they carry
/// the same guarantees as constructed ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTargetTable")]
pub struct TargetTable {
    spec: VariableSpec,
    scale: TargetScale,
    rows: Vec<TargetRow>,
}

/// Unchecked wire form of a [`TargetTable`].
#[derive(Deserialize)]
struct RawTargetTable {
    spec: VariableSpec,
    scale: TargetScale,
    rows: Vec<TargetRow>,
}

impl TryFrom<RawTargetTable> for TargetTable {
    type Error = WeightingError;

    fn try_from(raw: RawTargetTable) -> Result<Self> {
        let rows = raw.rows.into_iter().map(|row| (row.category, row.freq));
        Self::from_counts(raw.spec, rows, raw.scale)
    }
}

impl TargetTable {
    /// Build a table from raw non-negative masses, normalizing to the scale total.
    ///
    /// Row order is kept as given. Categories with zero mass stay in the table.
    pub fn from_counts<I, S>(spec: VariableSpec, rows: I, scale: TargetScale) -> Result<Self>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let name = spec.name();
        let mut seen = BTreeSet::new();
        let mut raw: Vec<(String, f64)> = Vec::new();
        for (category, mass) in rows {
            let category = category.into();
            if !mass.is_finite() || mass < 0.0 {
                return Err(WeightingError::invalid_target(
                    &name,
                    format!("category '{category}' has invalid mass {mass}"),
                ));
            }
            if !seen.insert(category.clone()) {
                return Err(WeightingError::invalid_target(
                    &name,
                    format!("category '{category}' listed more than once"),
                ));
            }
            raw.push((category, mass));
        }
        if raw.is_empty() {
            return Err(WeightingError::invalid_target(&name, "no categories"));
        }
        let sum: f64 = raw.iter().map(|(_, mass)| mass).sum();
        if sum <= 0.0 {
            return Err(WeightingError::invalid_target(&name, "total mass is zero"));
        }
        let total = scale.total();
        let rows = raw
            .into_iter()
            .map(|(category, mass)| TargetRow {
                category,
                freq: mass / sum * total,
            })
            .collect();
        Ok(Self { spec, scale, rows })
    }

    /// Build a table from proportions that may be on any scale.
    ///
    /// The proportions are renormalized so the table sums exactly to the
    /// scale total; published tables that round to 99.9 are accepted.
    pub fn from_proportions<I, S>(spec: VariableSpec, rows: I, scale: TargetScale) -> Result<Self>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Self::from_counts(spec, rows, scale)
    }

    pub fn spec(&self) -> &VariableSpec {
        &self.spec
    }

    /// Spec name, used as the table key.
    pub fn name(&self) -> String {
        self.spec.name()
    }

    pub fn scale(&self) -> TargetScale {
        self.scale
    }

    /// The value all rows sum to.
    pub fn total(&self) -> f64 {
        self.scale.total()
    }

    pub fn rows(&self) -> &[TargetRow] {
        &self.rows
    }

    /// Category labels in table order.
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().map(|row| row.category.as_str())
    }

    /// Look up the target value for a category.
    pub fn freq(&self, category: &str) -> Option<f64> {
        self.rows
            .iter()
            .find(|row| row.category == category)
            .map(|row| row.freq)
    }

    /// Sum of all `Freq` values.
    pub fn sum(&self) -> f64 {
        self.rows.iter().map(|row| row.freq).sum()
    }
}

/// Ordered collection of target tables keyed by spec name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTargetSet")]
pub struct TargetSet {
    tables: Vec<TargetTable>,
}

#[derive(Deserialize)]
struct RawTargetSet {
    tables: Vec<TargetTable>,
}

impl TryFrom<RawTargetSet> for TargetSet {
    type Error = WeightingError;

    fn try_from(raw: RawTargetSet) -> Result<Self> {
        Self::from_tables(raw.tables)
    }
}

impl TargetSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from tables in the given order.
    pub fn from_tables(tables: impl IntoIterator<Item = TargetTable>) -> Result<Self> {
        let mut set = Self::new();
        for table in tables {
            set.push(table)?;
        }
        Ok(set)
    }

    /// Append a table; its spec name must be new to the set.
    pub fn push(&mut self, table: TargetTable) -> Result<()> {
        let name = table.name();
        if self.get(&name).is_some() {
            return Err(WeightingError::DuplicateTarget { target: name });
        }
        self.tables.push(table);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&TargetTable> {
        self.tables.iter().find(|table| table.name() == name)
    }

    pub fn tables(&self) -> &[TargetTable] {
        &self.tables
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TargetTable> {
        self.tables.iter()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Spec names in set order.
    pub fn names(&self) -> Vec<String> {
        self.tables.iter().map(TargetTable::name).collect()
    }

    /// The same tables in a different order.
    ///
    /// `order` lists indices into the current set; it must be a permutation.
    pub fn reordered(&self, order: &[usize]) -> Result<Self> {
        let mut seen = BTreeSet::new();
        if order.len() != self.tables.len()
            || order
                .iter()
                .any(|&idx| idx >= self.tables.len() || !seen.insert(idx))
        {
            return Err(WeightingError::InvalidOptions {
                message: format!(
                    "target order {order:?} is not a permutation of {} tables",
                    self.tables.len()
                ),
            });
        }
        Ok(Self {
            tables: order.iter().map(|&idx| self.tables[idx].clone()).collect(),
        })
    }

    /// Verify every table uses one total and sums to it.
    ///
    /// Returns the shared total.
    pub fn common_total(&self) -> Result<f64> {
        let Some(first) = self.tables.first() else {
            return Err(WeightingError::InvalidOptions {
                message: "at least one target table is required".to_string(),
            });
        };
        let expected = first.total();
        for table in &self.tables {
            let found = table.sum();
            if table.total() != expected || (found - expected).abs() > SUM_EPSILON * expected {
                return Err(WeightingError::InconsistentScale {
                    target: table.name(),
                    expected,
                    found,
                });
            }
        }
        Ok(expected)
    }
}

impl<'a> IntoIterator for &'a TargetSet {
    type Item = &'a TargetTable;
    type IntoIter = std::slice::Iter<'a, TargetTable>;

    fn into_iter(self) -> Self::IntoIter {
        self.tables.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sex() -> VariableSpec {
        VariableSpec::parse("sex").unwrap()
    }

    #[test]
    fn test_from_counts_normalizes() {
        let table =
            TargetTable::from_counts(sex(), [("M", 30.0), ("F", 90.0)], TargetScale::Percent)
                .unwrap();
        assert_eq!(table.freq("M"), Some(25.0));
        assert_eq!(table.freq("F"), Some(75.0));
        assert!((table.sum() - 100.0).abs() < SUM_EPSILON);
    }

    #[test]
    fn test_from_counts_rejects_invalid() {
        assert!(TargetTable::from_counts(sex(), [("M", -1.0)], TargetScale::Percent).is_err());
        assert!(TargetTable::from_counts(sex(), [("M", 0.0)], TargetScale::Percent).is_err());
        assert!(
            TargetTable::from_counts(sex(), [("M", 1.0), ("M", 2.0)], TargetScale::Percent)
                .is_err()
        );
        let empty: Vec<(&str, f64)> = Vec::new();
        assert!(TargetTable::from_counts(sex(), empty, TargetScale::Percent).is_err());
    }

    #[test]
    fn test_set_rejects_duplicates_and_mixed_scales() {
        let percent =
            TargetTable::from_counts(sex(), [("M", 1.0), ("F", 1.0)], TargetScale::Percent)
                .unwrap();
        let mut set = TargetSet::from_tables([percent.clone()]).unwrap();
        assert!(matches!(
            set.push(percent),
            Err(WeightingError::DuplicateTarget { .. })
        ));

        let age = TargetTable::from_counts(
            VariableSpec::parse("age").unwrap(),
            [("young", 1.0), ("old", 1.0)],
            TargetScale::Fraction,
        )
        .unwrap();
        set.push(age).unwrap();
        assert!(matches!(
            set.common_total(),
            Err(WeightingError::InconsistentScale { .. })
        ));
    }

    #[test]
    fn test_reordered_requires_permutation() {
        let a = TargetTable::from_counts(sex(), [("M", 1.0)], TargetScale::Percent).unwrap();
        let b = TargetTable::from_counts(
            VariableSpec::parse("age").unwrap(),
            [("old", 1.0)],
            TargetScale::Percent,
        )
        .unwrap();
        let set = TargetSet::from_tables([a, b]).unwrap();
        assert_eq!(set.reordered(&[1, 0]).unwrap().names(), ["age", "sex"]);
        assert!(set.reordered(&[0, 0]).is_err());
    }
}

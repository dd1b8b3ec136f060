//! Raking variable specifications.
//!
//! A spec names either a single categorical column (`"sex"`) or a
//! cross-classification of several columns joined with `:`
//! (`"sex:education"`). Each combination of component labels forms one
//! category of the compound variable.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, WeightingError};

/// Separator between component names in a spec and between component labels
/// in a compound category label.
pub const SPEC_SEPARATOR: char = ':';

/// A single or compound raking variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VariableSpec {
    components: Vec<String>,
}

impl VariableSpec {
    /// Parse a spec string such as `"age"` or `"sex:education"`.
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = |message: &str| WeightingError::InvalidSpec {
            spec: raw.to_string(),
            message: message.to_string(),
        };
        let mut components: Vec<String> = Vec::new();
        for part in raw.split(SPEC_SEPARATOR) {
            let part = part.trim();
            if part.is_empty() {
                return Err(invalid("empty column name"));
            }
            if components.iter().any(|existing| existing == part) {
                return Err(invalid("column listed more than once"));
            }
            components.push(part.to_string());
        }
        Ok(Self { components })
    }

    /// Build a spec from component column names.
    pub fn from_columns<I, S>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = columns
            .into_iter()
            .map(|c| c.as_ref().to_string())
            .collect::<Vec<_>>()
            .join(&SPEC_SEPARATOR.to_string());
        Self::parse(&joined)
    }

    /// Canonical spec name (components joined with `:`).
    pub fn name(&self) -> String {
        self.components.join(&SPEC_SEPARATOR.to_string())
    }

    /// Component column names in spec order.
    pub fn components(&self) -> &[String] {
        &self.components
    }

    /// Returns true for a cross-classification of two or more columns.
    pub fn is_compound(&self) -> bool {
        self.components.len() > 1
    }
}

/// Join component labels into one compound category label.
pub fn join_labels<S: AsRef<str>>(labels: &[S]) -> String {
    let mut joined = String::new();
    for (idx, label) in labels.iter().enumerate() {
        if idx > 0 {
            joined.push(SPEC_SEPARATOR);
        }
        joined.push_str(label.as_ref());
    }
    joined
}

impl fmt::Display for VariableSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl FromStr for VariableSpec {
    type Err = WeightingError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for VariableSpec {
    type Error = WeightingError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<VariableSpec> for String {
    fn from(spec: VariableSpec) -> Self {
        spec.name()
    }
}

//! Error types for survey weighting operations.
//!
//! Every failure is one of three kinds (see [`ErrorKind`]):
//!
//! - **Configuration**: a caller mistake detected before or outside an
//!   iteration (bad columns, mismatched labels, invalid bounds).
//! - **Zero mass**: a target category has nonzero target mass but the sample
//!   carries no weight in it, so no multiplicative adjustment can reach it.
//! - **Non-convergence**: the iteration cap was reached first. The last
//!   iterate travels with the error so the caller can choose to accept it.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::report::RakeReport;

/// Broad classification of a [`WeightingError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller mistake; not retryable without changing inputs.
    Configuration,
    /// Fatal within a raking run.
    ZeroMass,
    /// Reported, non-fatal; the caller decides.
    NonConvergence,
}

/// Errors raised while building targets, raking, trimming or evaluating weights.
#[derive(Debug, Error)]
pub enum WeightingError {
    // === Configuration Errors ===
    /// Targets were requested without naming a benchmark weight column.
    #[error("benchmark weight column is required to build targets")]
    MissingWeightColumn,

    /// Column referenced by a spec or weight option does not exist.
    #[error("column '{column}' not found in frame")]
    UnknownColumn { column: String },

    /// A weight cell is null, non-numeric, negative or non-finite.
    #[error("invalid weight in column '{column}' at row {row}: {reason}")]
    InvalidWeight {
        column: String,
        row: usize,
        reason: String,
    },

    /// A raking variable still contains missing values.
    #[error("column '{column}' has {count} missing value(s); impute before raking")]
    MissingValues { column: String, count: usize },

    /// A component label contains the compound separator, so joint labels
    /// would be ambiguous.
    #[error(
        "label '{label}' in column '{column}' contains ':' and cannot be part of compound variable '{spec}'"
    )]
    AmbiguousLabel {
        spec: String,
        column: String,
        label: String,
    },

    /// Target labels and sample labels are not the same set.
    #[error(
        "category mismatch for target '{target}': only in target [{}], only in sample [{}]",
        only_in_target.join(", "),
        only_in_sample.join(", ")
    )]
    CategoryMismatch {
        target: String,
        only_in_target: Vec<String>,
        only_in_sample: Vec<String>,
    },

    /// A target table cannot be constructed from the given rows.
    #[error("invalid target '{target}': {message}")]
    InvalidTarget { target: String, message: String },

    /// Two target tables share the same spec name.
    #[error("duplicate target '{target}'")]
    DuplicateTarget { target: String },

    /// Target tables in one run are normalized to different totals.
    #[error("target '{target}' sums to {found} but the run uses total {expected}")]
    InconsistentScale {
        target: String,
        expected: f64,
        found: f64,
    },

    /// Variable spec string could not be parsed.
    #[error("invalid variable spec '{spec}': {message}")]
    InvalidSpec { spec: String, message: String },

    /// Engine or calculator options are out of range.
    #[error("invalid options: {message}")]
    InvalidOptions { message: String },

    /// Trim bounds are missing, doubled, or inconsistent.
    #[error("invalid trim bounds: {message}")]
    InvalidTrimBounds { message: String },

    /// Weight vector cannot produce defined diagnostics.
    #[error("degenerate weights: {message}")]
    DegenerateWeights { message: String },

    /// Configuration file could not be read.
    #[error("failed to read config {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration file is not valid TOML for a weighting run.
    #[error("failed to parse config: {message}")]
    ConfigParse { message: String },

    /// Underlying DataFrame operation failed.
    #[error("DataFrame operation failed: {message}")]
    DataFrame { message: String },

    // === Zero Mass ===
    /// Target category has target mass but no sample weight to scale.
    #[error(
        "target '{target}' category '{category}' has target {target_freq} but zero weighted mass in the sample"
    )]
    ZeroMass {
        target: String,
        category: String,
        target_freq: f64,
    },

    // === Non-convergence ===
    /// Iteration cap reached before the tolerance was met.
    #[error("{0}")]
    NonConvergence(Box<NonConvergence>),
}

impl WeightingError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ZeroMass { .. } => ErrorKind::ZeroMass,
            Self::NonConvergence(_) => ErrorKind::NonConvergence,
            _ => ErrorKind::Configuration,
        }
    }

    /// Returns true for caller configuration mistakes.
    pub fn is_configuration(&self) -> bool {
        self.kind() == ErrorKind::Configuration
    }

    /// Wrap any displayable DataFrame failure.
    pub fn data_frame(err: impl fmt::Display) -> Self {
        Self::DataFrame {
            message: err.to_string(),
        }
    }

    pub(crate) fn invalid_target(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidTarget {
            target: target.into(),
            message: message.into(),
        }
    }
}

/// Details of a raking run that hit its iteration cap.
#[derive(Debug, Clone)]
pub struct NonConvergence {
    /// Cycles completed.
    pub iterations: usize,
    /// Maximum deviation after the last cycle.
    pub achieved: f64,
    /// Requested tolerance.
    pub tolerance: f64,
    /// Full run report.
    pub report: RakeReport,
    /// Weights after the last cycle.
    pub last_iterate: Vec<f64>,
}

impl NonConvergence {
    /// Accept the best-effort weights explicitly.
    pub fn into_last_iterate(self) -> Vec<f64> {
        self.last_iterate
    }
}

impl fmt::Display for NonConvergence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "raking did not converge after {} iteration(s): max deviation {:e} exceeds tolerance {:e}",
            self.iterations, self.achieved, self.tolerance
        )
    }
}

/// Result type for weighting operations.
pub type Result<T> = std::result::Result<T, WeightingError>;

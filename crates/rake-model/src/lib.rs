//! Survey weighting data model.
//!
//! Shared types for the weighting workspace:
//!
//! - **spec**: raking variable specifications (`"sex"`, `"sex:education"`)
//! - **target**: normalized target tables and ordered target sets
//! - **options**: raking, trimming and scaling options
//! - **config**: TOML configuration for a complete weighting run
//! - **report**: raking reports and weight diagnostics
//! - **error**: the error taxonomy shared by every crate

pub mod config;
pub mod error;
pub mod options;
pub mod report;
pub mod spec;
pub mod target;

pub use config::{RakeConfig, TargetConfig, WeightingConfig};
pub use error::{ErrorKind, NonConvergence, Result, WeightingError};
pub use options::{
    ConvergenceCriterion, NonConvergencePolicy, RakeOptions, TargetScale, TrimMode, TrimOptions,
    WeightScaling,
};
pub use report::{CategoryFit, DesignEffect, MarginFit, RakeReport, WeightSummary};
pub use spec::{SPEC_SEPARATOR, VariableSpec, join_labels};
pub use target::{SUM_EPSILON, TargetRow, TargetSet, TargetTable};

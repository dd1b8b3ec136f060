//! Survey weight calibration.
//!
//! Given a respondent sample and population targets for categorical
//! variables, compute per-respondent weights whose weighted marginal
//! distributions match the targets.
//!
//! - **targets**: [`TargetBuilder`] derives normalized target tables from a weighted benchmark
//! - **engine**: [`RakingEngine`] runs iterative proportional fitting
//! - **trim**: [`WeightTrimmer`] clamps extreme weights
//! - **design**: [`DesignEffectCalculator`] reports Kish design effect and effective sample size
//! - **impute**: the [`Imputer`] contract for filling gaps before raking
//! - **diagnostics**: target versus sample margin comparisons
//! - **pipeline**: [`WeightingPipeline`] chains the stages from a TOML config
//! - **logging**: optional `tracing-subscriber` setup

pub mod design;
pub mod diagnostics;
pub mod engine;
pub mod impute;
pub mod logging;
pub mod pipeline;
pub mod targets;
pub mod trim;

pub use design::{DesignEffectCalculator, Z_95, scale_weights};
pub use diagnostics::{CategoryComparison, MarginComparison, compare_margins};
pub use engine::{RakeOutcome, RakingEngine};
pub use impute::{Imputer, ensure_complete, impute_raking_columns, raking_columns};
pub use logging::{LogConfig, LogFormat, init_logging, init_logging_with_writer};
pub use pipeline::{WeightingOutcome, WeightingPipeline};
pub use targets::TargetBuilder;
pub use trim::{TrimOutcome, WeightTrimmer, quantile};

pub use rake_frame::CategoricalFrame;
pub use rake_model::{
    ConvergenceCriterion, DesignEffect, ErrorKind, NonConvergencePolicy, RakeOptions, RakeReport,
    Result, TargetScale, TargetSet, TargetTable, TrimOptions, VariableSpec, WeightScaling,
    WeightSummary, WeightingConfig, WeightingError,
};

//! End-to-end weighting runs driven by a [`WeightingConfig`].
//!
//! Stages:
//!
//! 1. build targets from the benchmark (or take prepared targets)
//! 2. verify the sample's raking columns are complete
//! 3. rake, applying the configured non-convergence policy
//! 4. trim (optional)
//! 5. rescale (optional)
//! 6. design effects for raked and final weights, margin diagnostics

use rake_frame::CategoricalFrame;
use rake_model::{
    DesignEffect, NonConvergencePolicy, RakeReport, Result, TargetSet, TargetTable,
    WeightSummary, WeightingConfig, WeightingError,
};
use tracing::{info, info_span, warn};

use crate::design::{DesignEffectCalculator, scale_weights};
use crate::diagnostics::{MarginComparison, compare_margins};
use crate::engine::RakingEngine;
use crate::impute::ensure_complete;
use crate::targets::TargetBuilder;
use crate::trim::{TrimOutcome, WeightTrimmer};

/// Everything produced by one weighting run.
#[derive(Debug, Clone)]
pub struct WeightingOutcome {
    pub targets: TargetSet,
    /// Weights straight out of the raking engine.
    pub raked: Vec<f64>,
    pub rake_report: RakeReport,
    /// True when raking hit its cap and the last iterate was accepted by policy.
    pub accepted_non_convergence: bool,
    pub trim: Option<TrimOutcome>,
    /// Final weights after trimming and scaling.
    pub weights: Vec<f64>,
    pub raked_design: DesignEffect,
    pub design: DesignEffect,
    pub summary: WeightSummary,
    /// Targets versus final weighted shares.
    pub margins: Vec<MarginComparison>,
}

/// Runs target building, raking, trimming and diagnostics in sequence.
#[derive(Debug, Clone)]
pub struct WeightingPipeline {
    config: WeightingConfig,
}

impl WeightingPipeline {
    pub fn new(config: WeightingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Self::new(WeightingConfig::from_toml_str(contents)?)
    }

    pub fn config(&self) -> &WeightingConfig {
        &self.config
    }

    /// Build the configured targets from a benchmark frame.
    pub fn build_targets(&self, benchmark: &CategoricalFrame) -> Result<TargetSet> {
        let targets = &self.config.targets;
        let mut builder = TargetBuilder::new(targets.scale);
        if let Some(column) = &targets.weight_column {
            builder = builder.weight_column(column.clone());
        }
        builder.build(benchmark, &targets.variables)
    }

    /// Build targets from the benchmark and weight the sample.
    pub fn run(
        &self,
        benchmark: &CategoricalFrame,
        sample: &CategoricalFrame,
    ) -> Result<WeightingOutcome> {
        let targets = self.build_targets(benchmark)?;
        self.run_with_targets(sample, targets)
    }

    /// Weight the sample against prepared targets.
    pub fn run_with_targets(
        &self,
        sample: &CategoricalFrame,
        targets: TargetSet,
    ) -> Result<WeightingOutcome> {
        let span = info_span!(
            "weighting",
            respondents = sample.height(),
            targets = targets.len()
        );
        let _guard = span.enter();

        ensure_complete(sample, targets.iter().map(TargetTable::spec))?;

        let engine = RakingEngine::new(self.config.rake.options());
        let base = self.config.rake.base_weight_column.as_deref();
        let (raked, rake_report, accepted_non_convergence) =
            match engine.rake(sample, base, &targets) {
                Ok(outcome) => (outcome.weights, outcome.report, false),
                Err(WeightingError::NonConvergence(details))
                    if self.config.rake.on_non_convergence
                        == NonConvergencePolicy::AcceptLastIterate =>
                {
                    warn!(
                        iterations = details.iterations,
                        achieved = details.achieved,
                        "accepting last raking iterate"
                    );
                    let report = details.report.clone();
                    (details.into_last_iterate(), report, true)
                }
                Err(err) => return Err(err),
            };

        let trim = match &self.config.trim {
            Some(options) => Some(WeightTrimmer::new(*options).trim(&raked)?),
            None => None,
        };
        let trimmed = trim.as_ref().map_or(&raked, |outcome| &outcome.weights);
        let weights = scale_weights(trimmed, self.config.rake.scaling)?;

        let calculator = DesignEffectCalculator::new(self.config.targets.scale);
        let raked_design = calculator.compute(&raked)?;
        let design = calculator.compute(&weights)?;
        let summary = calculator.summarize(&weights)?;
        let margins = compare_margins(sample, &weights, &targets)?;

        info!(
            iterations = rake_report.iterations,
            deff = design.deff,
            ess = design.ess,
            "weighting complete"
        );

        Ok(WeightingOutcome {
            targets,
            raked,
            rake_report,
            accepted_non_convergence,
            trim,
            weights,
            raked_design,
            design,
            summary,
            margins,
        })
    }
}

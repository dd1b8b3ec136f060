//! Imputation contract.
//!
//! Imputation itself is provided by callers. An [`Imputer`] receives a frame
//! whose raking columns may contain missing markers and returns a frame with
//! those columns fully populated; for a given seed the result is
//! deterministic. The raking engine never fills gaps itself, so every path
//! into it goes through [`ensure_complete`].

use rake_frame::CategoricalFrame;
use rake_model::{Result, VariableSpec, WeightingError};
use tracing::debug;

/// Fills missing categorical values before raking.
pub trait Imputer {
    /// Return a copy of `frame` with every column in `columns` populated.
    fn impute(
        &self,
        frame: &CategoricalFrame,
        columns: &[String],
        seed: u64,
    ) -> Result<CategoricalFrame>;
}

/// Distinct raking columns referenced by the specs, in first-seen order.
pub fn raking_columns<'a>(specs: impl IntoIterator<Item = &'a VariableSpec>) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for spec in specs {
        for component in spec.components() {
            if !columns.contains(component) {
                columns.push(component.clone());
            }
        }
    }
    columns
}

/// Fail if any raking column of the specs still has missing values.
pub fn ensure_complete<'a>(
    frame: &CategoricalFrame,
    specs: impl IntoIterator<Item = &'a VariableSpec>,
) -> Result<()> {
    for spec in specs {
        frame.ensure_complete(spec)?;
    }
    Ok(())
}

/// Run an imputer over the raking columns and verify it kept its contract.
pub fn impute_raking_columns<I: Imputer + ?Sized>(
    imputer: &I,
    frame: &CategoricalFrame,
    specs: &[VariableSpec],
    seed: u64,
) -> Result<CategoricalFrame> {
    let columns = raking_columns(specs);
    let imputed = imputer.impute(frame, &columns, seed)?;
    if imputed.height() != frame.height() {
        return Err(WeightingError::InvalidOptions {
            message: format!(
                "imputer returned {} rows for {} input rows",
                imputed.height(),
                frame.height()
            ),
        });
    }
    ensure_complete(&imputed, specs)?;
    debug!(columns = columns.len(), seed, "raking columns imputed");
    Ok(imputed)
}

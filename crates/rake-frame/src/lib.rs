//! Categorical respondent frames for survey weighting.
//!
//! - **frame**: [`CategoricalFrame`], label extraction, level sets, weight columns
//! - **polars**: AnyValue conversions shared by label and weight handling

pub mod frame;
pub mod polars;

pub use frame::{CategoricalFrame, DEFAULT_MISSING_MARKERS, check_component_label};
pub use polars::{any_to_f64, any_to_label, parse_f64};

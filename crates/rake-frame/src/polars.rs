//! Polars AnyValue utility functions.
//!
//! Category labels are derived from cell values with [`any_to_label`], so the
//! same rendering is used for benchmark and sample frames.

use polars::prelude::AnyValue;

/// Converts a Polars `AnyValue` to a category label.
///
/// Returns an empty string for `Null`. Integers render without decimals,
/// floats in their shortest round-trip form (`1`, `1.5`), booleans as `Y`/`N`.
pub fn any_to_label(value: AnyValue<'_>) -> String {
    if let Some(s) = value.get_str() {
        return s.to_string();
    }
    match value {
        AnyValue::Null => String::new(),
        AnyValue::Int8(v) => v.to_string(),
        AnyValue::Int16(v) => v.to_string(),
        AnyValue::Int32(v) => v.to_string(),
        AnyValue::Int64(v) => v.to_string(),
        AnyValue::UInt8(v) => v.to_string(),
        AnyValue::UInt16(v) => v.to_string(),
        AnyValue::UInt32(v) => v.to_string(),
        AnyValue::UInt64(v) => v.to_string(),
        AnyValue::Float32(v) => v.to_string(),
        AnyValue::Float64(v) => v.to_string(),
        AnyValue::Boolean(b) => if b { "Y" } else { "N" }.to_string(),
        other => other.to_string(),
    }
}

/// Converts an `AnyValue` to `f64`, returning `None` for non-numeric or null values.
pub fn any_to_f64(value: AnyValue<'_>) -> Option<f64> {
    match value {
        AnyValue::Null => None,
        AnyValue::Int8(v) => Some(f64::from(v)),
        AnyValue::Int16(v) => Some(f64::from(v)),
        AnyValue::Int32(v) => Some(f64::from(v)),
        AnyValue::Int64(v) => Some(v as f64),
        AnyValue::UInt8(v) => Some(f64::from(v)),
        AnyValue::UInt16(v) => Some(f64::from(v)),
        AnyValue::UInt32(v) => Some(f64::from(v)),
        AnyValue::UInt64(v) => Some(v as f64),
        AnyValue::Float32(v) => Some(f64::from(v)),
        AnyValue::Float64(v) => Some(v),
        AnyValue::String(s) => parse_f64(s),
        AnyValue::StringOwned(s) => parse_f64(&s),
        _ => None,
    }
}

/// Parses a string as `f64`, returning `None` for invalid or empty strings.
pub fn parse_f64(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_any_to_label() {
        assert_eq!(any_to_label(AnyValue::Null), "");
        assert_eq!(any_to_label(AnyValue::Int32(42)), "42");
        assert_eq!(any_to_label(AnyValue::Float64(1.0)), "1");
        assert_eq!(any_to_label(AnyValue::Float64(10.0)), "10");
        assert_eq!(any_to_label(AnyValue::Float64(1.5)), "1.5");
        assert_eq!(any_to_label(AnyValue::Float32(0.1)), "0.1");
        assert_eq!(any_to_label(AnyValue::String("M")), "M");
        assert_eq!(any_to_label(AnyValue::Boolean(true)), "Y");
    }

    #[test]
    fn test_any_to_f64() {
        assert_eq!(any_to_f64(AnyValue::Null), None);
        assert_eq!(any_to_f64(AnyValue::Int32(42)), Some(42.0));
        assert_eq!(any_to_f64(AnyValue::String("2.5")), Some(2.5));
        assert_eq!(any_to_f64(AnyValue::String("invalid")), None);
    }
}

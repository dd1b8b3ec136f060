//! Weight trimming in absolute and quantile modes.

use proptest::prelude::*;
use rake_core::{TrimOptions, WeightTrimmer, WeightingError, quantile};

#[test]
fn absolute_bounds_clamp_weights() {
    let trimmer = WeightTrimmer::new(TrimOptions::absolute(Some(0.5), Some(3.0)));
    let outcome = trimmer.trim(&[0.1, 1.0, 2.0, 5.0]).unwrap();

    assert_eq!(outcome.weights, [0.5, 1.0, 2.0, 3.0]);
    assert_eq!(outcome.trimmed_low, 1);
    assert_eq!(outcome.trimmed_high, 1);
    assert_eq!(outcome.lower, Some(0.5));
    assert_eq!(outcome.upper, Some(3.0));
    assert!((outcome.total_before - 8.1).abs() < 1e-12);
    assert!((outcome.total_after - 6.5).abs() < 1e-12);
}

#[test]
fn one_sided_bound_leaves_other_side_open() {
    let trimmer = WeightTrimmer::new(TrimOptions::absolute(None, Some(2.0)));
    let outcome = trimmer.trim(&[0.01, 1.0, 4.0]).unwrap();
    assert_eq!(outcome.weights, [0.01, 1.0, 2.0]);
    assert_eq!(outcome.trimmed_low, 0);
    assert_eq!(outcome.lower, None);
}

#[test]
fn quantile_bounds_resolve_against_the_input() {
    let weights = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 100.0];
    let trimmer = WeightTrimmer::new(TrimOptions::quantile(Some(0.1), Some(0.9)));
    let outcome = trimmer.trim(&weights).unwrap();

    let lower = outcome.lower.unwrap();
    let upper = outcome.upper.unwrap();
    assert!((lower - 1.9).abs() < 1e-12);
    assert!((upper - 18.1).abs() < 1e-12);
    assert_eq!(outcome.weights[0], lower);
    assert_eq!(outcome.weights[9], upper);
    assert_eq!(outcome.weights[4], 5.0);
}

#[test]
fn both_or_neither_bound_kinds_are_rejected() {
    let both = TrimOptions {
        upper_bound: Some(3.0),
        upper_quantile: Some(0.95),
        ..TrimOptions::default()
    };
    let err = WeightTrimmer::new(both).trim(&[1.0, 2.0]).unwrap_err();
    assert!(matches!(err, WeightingError::InvalidTrimBounds { .. }));
    assert!(err.is_configuration());

    let err = WeightTrimmer::new(TrimOptions::default())
        .trim(&[1.0, 2.0])
        .unwrap_err();
    assert!(matches!(err, WeightingError::InvalidTrimBounds { .. }));
}

#[test]
fn inverted_bounds_are_rejected() {
    let err = WeightTrimmer::new(TrimOptions::absolute(Some(4.0), Some(2.0)))
        .trim(&[1.0])
        .unwrap_err();
    assert!(matches!(err, WeightingError::InvalidTrimBounds { .. }));

    let err = WeightTrimmer::new(TrimOptions::quantile(None, Some(1.5)))
        .trim(&[1.0])
        .unwrap_err();
    assert!(matches!(err, WeightingError::InvalidTrimBounds { .. }));
}

#[test]
fn invalid_input_weights_are_rejected() {
    let trimmer = WeightTrimmer::new(TrimOptions::absolute(None, Some(2.0)));
    assert!(matches!(
        trimmer.trim(&[]),
        Err(WeightingError::DegenerateWeights { .. })
    ));
    assert!(matches!(
        trimmer.trim(&[1.0, f64::NAN]),
        Err(WeightingError::InvalidWeight { row: 1, .. })
    ));
}

#[test]
fn redistribution_preserves_the_total() {
    let weights = [0.5, 1.0, 1.0, 1.5, 6.0];
    let trimmer =
        WeightTrimmer::new(TrimOptions::absolute(None, Some(3.0)).with_redistribution(true));
    let outcome = trimmer.trim(&weights).unwrap();

    assert!((outcome.total_after - outcome.total_before).abs() < 1e-9);
    assert!(outcome.weights.iter().all(|w| *w <= 3.0 + 1e-12));
    assert_eq!(outcome.weights[4], 3.0);
    // Untrimmed weights keep their relative order.
    assert!(outcome.weights[0] < outcome.weights[1]);
    assert!(outcome.weights[2] < outcome.weights[3]);
}

#[test]
fn quantile_helper_interpolates() {
    let sorted = [10.0, 20.0, 30.0, 40.0];
    assert!((quantile(&sorted, 0.5) - 25.0).abs() < 1e-12);
    assert!((quantile(&sorted, 0.25) - 17.5).abs() < 1e-12);
}

proptest! {
    #[test]
    fn absolute_trim_respects_bounds_and_order(
        weights in prop::collection::vec(0.0f64..50.0, 1..40),
        lower in 0.0f64..5.0,
        span in 0.0f64..20.0,
        redistribute in any::<bool>(),
    ) {
        let upper = lower + span;
        let options =
            TrimOptions::absolute(Some(lower), Some(upper)).with_redistribution(redistribute);
        let outcome = WeightTrimmer::new(options).trim(&weights).unwrap();

        prop_assert_eq!(outcome.weights.len(), weights.len());
        for (trimmed, original) in outcome.weights.iter().zip(&weights) {
            prop_assert!(*trimmed >= lower && *trimmed <= upper);
            // Redistribution rescales the weights left inside the bounds.
            if !redistribute && *original >= lower && *original <= upper {
                prop_assert_eq!(trimmed, original);
            }
        }
        for i in 0..weights.len() {
            for j in 0..weights.len() {
                if weights[i] <= weights[j] {
                    prop_assert!(outcome.weights[i] <= outcome.weights[j]);
                }
            }
        }
    }

    #[test]
    fn quantile_trim_stays_within_input_range(
        weights in prop::collection::vec(0.01f64..100.0, 2..40),
        upper in 0.5f64..1.0,
    ) {
        let outcome = WeightTrimmer::new(TrimOptions::quantile(Some(0.0), Some(upper)))
            .trim(&weights)
            .unwrap();
        let min = weights.iter().copied().fold(f64::INFINITY, f64::min);
        let max = weights.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        prop_assert_eq!(outcome.lower, Some(min));
        prop_assert_eq!(outcome.trimmed_low, 0);
        for w in &outcome.weights {
            prop_assert!(*w >= min && *w <= max);
            prop_assert!(*w <= outcome.upper.unwrap());
        }
    }
}

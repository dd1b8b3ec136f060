//! Raking engine behaviour on small hand-checked samples.

use polars::prelude::{DataFrame, NamedFrom, Series};
use proptest::prelude::*;
use rake_core::{
    CategoricalFrame, DesignEffectCalculator, ErrorKind, RakeOptions, RakingEngine, TargetScale,
    TargetSet, TargetTable, VariableSpec, WeightingError,
};

fn spec(name: &str) -> VariableSpec {
    VariableSpec::parse(name).unwrap()
}

fn table(name: &str, rows: &[(&str, f64)]) -> TargetTable {
    TargetTable::from_proportions(spec(name), rows.iter().copied(), TargetScale::Percent).unwrap()
}

fn targets(tables: Vec<TargetTable>) -> TargetSet {
    TargetSet::from_tables(tables).unwrap()
}

/// Two men and two women.
fn four_respondents() -> CategoricalFrame {
    let df = DataFrame::new(vec![
        Series::new("sex".into(), vec!["M", "M", "F", "F"]).into(),
        Series::new("base".into(), vec![1.0, 1.0, 1.0, 1.0]).into(),
    ])
    .unwrap();
    CategoricalFrame::new(df)
}

/// Five respondents crossed on sex and age, with every cell populated.
fn crossed_sample() -> CategoricalFrame {
    let df = DataFrame::new(vec![
        Series::new("sex".into(), vec!["M", "M", "M", "F", "F"]).into(),
        Series::new("age".into(), vec!["young", "young", "old", "young", "old"]).into(),
    ])
    .unwrap();
    CategoricalFrame::new(df)
}

fn crossed_targets() -> TargetSet {
    targets(vec![
        table("sex", &[("M", 50.0), ("F", 50.0)]),
        table("age", &[("young", 40.0), ("old", 60.0)]),
    ])
}

fn assert_close(actual: &[f64], expected: &[f64]) {
    assert_eq!(actual.len(), expected.len());
    for (a, e) in actual.iter().zip(expected) {
        assert!((a - e).abs() < 1e-9, "{actual:?} != {expected:?}");
    }
}

#[test]
fn matching_sample_is_left_unchanged() {
    let set = targets(vec![table("sex", &[("M", 50.0), ("F", 50.0)])]);
    let outcome = RakingEngine::default()
        .rake(&four_respondents(), Some("base"), &set)
        .unwrap();

    assert_eq!(outcome.weights, [1.0, 1.0, 1.0, 1.0]);
    assert!(outcome.report.converged);
    assert_eq!(outcome.report.iterations, 1);
    assert_eq!(outcome.report.max_deviation, 0.0);
}

#[test]
fn single_variable_raking_is_exact() {
    let set = targets(vec![table("sex", &[("M", 75.0), ("F", 25.0)])]);
    let outcome = RakingEngine::default()
        .rake(&four_respondents(), None, &set)
        .unwrap();

    assert_close(&outcome.weights, &[1.5, 1.5, 0.5, 0.5]);
    assert_eq!(outcome.report.iterations, 1);

    let design = DesignEffectCalculator::default()
        .compute(&outcome.weights)
        .unwrap();
    assert!((design.deff - 1.25).abs() < 1e-12);
    assert!((design.ess - 3.2).abs() < 1e-12);
}

#[test]
fn target_category_absent_from_sample_fails_before_raking() {
    let set = targets(vec![table(
        "sex",
        &[("M", 45.0), ("F", 45.0), ("Other", 10.0)],
    )]);
    let err = RakingEngine::default()
        .rake(&four_respondents(), None, &set)
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Configuration);
    match err {
        WeightingError::CategoryMismatch {
            target,
            only_in_target,
            only_in_sample,
        } => {
            assert_eq!(target, "sex");
            assert_eq!(only_in_target, ["Other"]);
            assert!(only_in_sample.is_empty());
        }
        other => panic!("expected category mismatch, got {other:?}"),
    }
}

#[test]
fn sample_category_absent_from_target_fails() {
    let set = targets(vec![table("sex", &[("M", 100.0)])]);
    let err = RakingEngine::default()
        .rake(&four_respondents(), None, &set)
        .unwrap_err();
    assert!(matches!(
        err,
        WeightingError::CategoryMismatch { ref only_in_sample, .. } if only_in_sample == &["F"]
    ));
}

#[test]
fn positive_target_on_empty_category_is_zero_mass() {
    let sample = four_respondents().with_levels("sex", ["M", "F", "X"]);
    let set = targets(vec![table("sex", &[("M", 35.0), ("F", 35.0), ("X", 30.0)])]);
    let err = RakingEngine::default()
        .rake(&sample, None, &set)
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ZeroMass);
    match err {
        WeightingError::ZeroMass {
            target,
            category,
            target_freq,
        } => {
            assert_eq!(target, "sex");
            assert_eq!(category, "X");
            assert!((target_freq - 30.0).abs() < 1e-9);
        }
        other => panic!("expected zero mass, got {other:?}"),
    }
}

#[test]
fn zero_target_on_empty_category_is_allowed() {
    let sample = four_respondents().with_levels("sex", ["M", "F", "X"]);
    let set = targets(vec![table("sex", &[("M", 60.0), ("F", 40.0), ("X", 0.0)])]);
    let outcome = RakingEngine::default().rake(&sample, None, &set).unwrap();
    assert_close(&outcome.weights, &[1.2, 1.2, 0.8, 0.8]);
}

#[test]
fn iteration_cap_reports_last_iterate() {
    let options = RakeOptions::default().with_max_iterations(1);
    let err = RakingEngine::new(options)
        .rake(&crossed_sample(), None, &crossed_targets())
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NonConvergence);
    let WeightingError::NonConvergence(details) = err else {
        panic!("expected non-convergence");
    };
    assert_eq!(details.iterations, 1);
    assert!(details.achieved >= details.tolerance);
    assert!(!details.report.converged);
    assert_eq!(details.report.history.len(), 1);

    let weights = details.into_last_iterate();
    assert_eq!(weights.len(), 5);
    assert!(weights.iter().all(|w| *w > 0.0));
}

#[test]
fn crossed_raking_matches_both_margins() {
    let set = crossed_targets();
    let outcome = RakingEngine::default()
        .rake(&crossed_sample(), None, &set)
        .unwrap();
    assert!(outcome.report.converged);
    assert!(outcome.report.iterations > 1);

    let w = &outcome.weights;
    let total: f64 = w.iter().sum();
    let men = (w[0] + w[1] + w[2]) / total * 100.0;
    let young = (w[0] + w[1] + w[3]) / total * 100.0;
    assert!((men - 50.0).abs() < 1e-5);
    assert!((young - 40.0).abs() < 1e-5);

    for margin in &outcome.report.margins {
        assert!(margin.max_abs_deviation() < 1e-6);
    }
    let history = &outcome.report.history;
    assert_eq!(history.len(), outcome.report.iterations);
    assert!(history.last().unwrap() < &1e-6);
}

#[test]
fn raking_converged_weights_is_idempotent() {
    let set = crossed_targets();
    let engine = RakingEngine::default();
    let first = engine.rake(&crossed_sample(), None, &set).unwrap();
    let second = engine
        .rake_with_weights(&crossed_sample(), &first.weights, &set)
        .unwrap();

    assert_eq!(second.report.iterations, 1);
    for (a, b) in first.weights.iter().zip(&second.weights) {
        assert!((a - b).abs() < 1e-5);
    }
}

#[test]
fn base_weights_seed_the_iteration() {
    let df = DataFrame::new(vec![
        Series::new("sex".into(), vec!["M", "M", "F", "F"]).into(),
        Series::new("base".into(), vec![1.0, 3.0, 2.0, 2.0]).into(),
    ])
    .unwrap();
    let sample = CategoricalFrame::new(df);
    let set = targets(vec![table("sex", &[("M", 50.0), ("F", 50.0)])]);
    let outcome = RakingEngine::default()
        .rake(&sample, Some("base"), &set)
        .unwrap();

    // Within-category ratios of the base weights survive raking.
    assert_close(&outcome.weights, &[1.0, 3.0, 2.0, 2.0]);
    assert_eq!(outcome.report.iterations, 1);
}

#[test]
fn sample_frame_is_not_modified() {
    let sample = four_respondents();
    let before = sample.data().clone();
    let set = targets(vec![table("sex", &[("M", 75.0), ("F", 25.0)])]);
    RakingEngine::default()
        .rake(&sample, Some("base"), &set)
        .unwrap();
    assert!(sample.data().equals(&before));
}

#[test]
fn missing_raking_values_are_rejected() {
    let df = DataFrame::new(vec![
        Series::new("sex".into(), vec!["M", "NA", "F", "F"]).into(),
    ])
    .unwrap();
    let set = targets(vec![table("sex", &[("M", 50.0), ("F", 50.0)])]);
    let err = RakingEngine::default()
        .rake(&CategoricalFrame::new(df), None, &set)
        .unwrap_err();
    assert!(matches!(err, WeightingError::MissingValues { count: 1, .. }));
}

#[test]
fn invalid_options_fail_fast() {
    let set = targets(vec![table("sex", &[("M", 50.0), ("F", 50.0)])]);
    let engine = RakingEngine::new(RakeOptions::default().with_max_iterations(0));
    let err = engine.rake(&four_respondents(), None, &set).unwrap_err();
    assert!(matches!(err, WeightingError::InvalidOptions { .. }));

    let err = RakingEngine::default()
        .rake(&four_respondents(), None, &TargetSet::new())
        .unwrap_err();
    assert!(err.is_configuration());
}

#[test]
fn mixed_scales_are_rejected() {
    let fraction = TargetTable::from_proportions(
        spec("age"),
        [("young", 0.4), ("old", 0.6)],
        TargetScale::Fraction,
    )
    .unwrap();
    let set = targets(vec![table("sex", &[("M", 50.0), ("F", 50.0)]), fraction]);
    let err = RakingEngine::default()
        .rake(&crossed_sample(), None, &set)
        .unwrap_err();
    assert!(matches!(err, WeightingError::InconsistentScale { .. }));
}

#[test]
fn base_weight_vector_length_must_match() {
    let set = targets(vec![table("sex", &[("M", 50.0), ("F", 50.0)])]);
    let err = RakingEngine::default()
        .rake_with_weights(&four_respondents(), &[1.0, 1.0], &set)
        .unwrap_err();
    assert!(matches!(err, WeightingError::InvalidOptions { .. }));
}

proptest! {
    #[test]
    fn table_order_does_not_change_the_solution(
        sex_share in 20.0f64..80.0,
        young_share in 20.0f64..80.0,
    ) {
        let set = targets(vec![
            table("sex", &[("M", sex_share), ("F", 100.0 - sex_share)]),
            table("age", &[("young", young_share), ("old", 100.0 - young_share)]),
        ]);
        let reversed = set.reordered(&[1, 0]).unwrap();
        let engine = RakingEngine::new(RakeOptions::default().with_tolerance(1e-10));

        let forward = engine.rake(&crossed_sample(), None, &set).unwrap();
        let backward = engine.rake(&crossed_sample(), None, &reversed).unwrap();
        for (a, b) in forward.weights.iter().zip(&backward.weights) {
            prop_assert!((a - b).abs() < 1e-6, "{:?} vs {:?}", forward.weights, backward.weights);
        }
    }

    #[test]
    fn converged_margins_sum_to_the_scale_total(
        sex_share in 10.0f64..90.0,
        young_share in 10.0f64..90.0,
    ) {
        let set = targets(vec![
            table("sex", &[("M", sex_share), ("F", 100.0 - sex_share)]),
            table("age", &[("young", young_share), ("old", 100.0 - young_share)]),
        ]);
        let outcome = RakingEngine::default().rake(&crossed_sample(), None, &set).unwrap();
        for margin in &outcome.report.margins {
            let total: f64 = margin.categories.iter().map(|c| c.achieved).sum();
            prop_assert!((total - 100.0).abs() < 1e-9);
            prop_assert!(margin.max_abs_deviation() < 1e-6);
        }
        prop_assert!(outcome.weights.iter().all(|w| *w > 0.0));
    }
}

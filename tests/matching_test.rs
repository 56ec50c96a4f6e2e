//! End-to-end matching scenarios

mod common;

use common::{all_partners, init_logging, partners_of, UnitBatch};
use covmatch::{MatchError, MatchOrder, Matcher, MatchingConfig};

/// Ten focal and ten non-focal units on a line, data order, identity
/// weights: every focal unit takes its own nearest control, no control is
/// reused, and ten subclasses of size two come out.
#[test]
fn test_ten_against_ten_identity_weights() {
    init_logging();
    let labels: Vec<String> = (0..10)
        .map(|i| format!("t{i}"))
        .chain((0..10).map(|i| format!("c{i}")))
        .collect();
    let label_refs: Vec<&str> = labels.iter().map(String::as_str).collect();
    let treated: Vec<i32> = (0..20).map(|i| i32::from(i < 10)).collect();
    let x: Vec<f64> = (0..10)
        .map(|i| f64::from(i))
        .chain((0..10).map(|i| f64::from(i) + 0.2))
        .collect();

    let (batch, columns) = UnitBatch::new(&label_refs, &treated).numeric("x", &x).build();
    let config = MatchingConfig::builder()
        .order(MatchOrder::Data)
        .weight_matrix(vec![vec![1.0]])
        .build();
    let result = Matcher::new(config).perform_matching(&batch, &columns).unwrap();

    assert_eq!(result.match_matrix.len(), 10);
    for i in 0..10 {
        assert_eq!(partners_of(&result, &format!("t{i}")), vec![format!("c{i}")]);
    }

    let partners = all_partners(&result);
    let mut deduped = partners.clone();
    deduped.sort();
    deduped.dedup();
    assert_eq!(deduped.len(), partners.len());

    let subclass = result.subclass.expect("no-replacement run must have subclasses");
    for i in 0..10 {
        let expected = Some(u32::try_from(i + 1).unwrap());
        assert_eq!(subclass[i], expected);
        assert_eq!(subclass[i + 10], expected);
    }
}

/// Exact variable with focal units only in one group and non-focal units
/// only in the other: structurally infeasible.
#[test]
fn test_exact_without_overlap_fails() {
    let (batch, columns) = UnitBatch::new(&["t1", "t2", "c1", "c2"], &[1, 1, 0, 0])
        .numeric("x", &[1.0, 2.0, 1.1, 2.1])
        .categorical("site", &["A", "A", "B", "B"])
        .build();
    let config = MatchingConfig::builder().exact("site").build();

    let err = Matcher::new(config)
        .perform_matching(&batch, &columns)
        .unwrap_err();
    assert!(matches!(err, MatchError::NoExactOverlap));
}

/// The otherwise-nearest candidate shares an anti-exact value with the
/// focal unit, so the next-nearest eligible unit wins.
#[test]
fn test_antiexact_forces_next_nearest() {
    let (batch, columns) = UnitBatch::new(&["t1", "c1", "c2"], &[1, 0, 0])
        .numeric("x", &[0.0, 0.1, 0.5])
        .categorical("household", &["h1", "h1", "h2"])
        .build();
    let config = MatchingConfig::builder().antiexact("household").build();

    let result = Matcher::new(config).perform_matching(&batch, &columns).unwrap();
    assert_eq!(partners_of(&result, "t1"), vec!["c2".to_string()]);
}

/// A width-zero caliper on a covariate that disagrees for every
/// focal/non-focal pair leaves nothing to match.
#[test]
fn test_zero_caliper_with_full_disagreement_fails() {
    let (batch, columns) = UnitBatch::new(&["t1", "t2", "c1", "c2"], &[1, 1, 0, 0])
        .numeric("b", &[1.0, 1.0, 0.0, 0.0])
        .build();
    let config = MatchingConfig::builder()
        .caliper(covmatch::Caliper::covariate("b", 0.0).raw())
        .build();

    let err = Matcher::new(config)
        .perform_matching(&batch, &columns)
        .unwrap_err();
    assert!(matches!(err, MatchError::NoMatchesFound));
}

/// Under ATC the controls become focal: the match matrix rows carry
/// control labels and treated units are the candidates.
#[test]
fn test_atc_swaps_roles() {
    let (batch, columns) = UnitBatch::new(&["t1", "t2", "c1"], &[1, 1, 0])
        .numeric("x", &[1.0, 5.0, 1.2])
        .build();
    let config = MatchingConfig::builder()
        .estimand(covmatch::Estimand::Atc)
        .build();

    let result = Matcher::new(config).perform_matching(&batch, &columns).unwrap();
    assert_eq!(result.match_matrix.len(), 1);
    assert_eq!(result.match_matrix[0].focal, "c1");
    assert_eq!(partners_of(&result, "c1"), vec!["t1".to_string()]);
}

/// Ratio-2 matching fills both slots nearest-first and builds one subclass
/// of size three.
#[test]
fn test_ratio_two_without_replacement() {
    let (batch, columns) = UnitBatch::new(&["t1", "c1", "c2", "c3"], &[1, 0, 0, 0])
        .numeric("x", &[0.0, 0.3, 0.1, 5.0])
        .build();
    let config = MatchingConfig::builder().ratio(2).build();

    let result = Matcher::new(config).perform_matching(&batch, &columns).unwrap();
    assert_eq!(
        partners_of(&result, "t1"),
        vec!["c2".to_string(), "c1".to_string()]
    );

    let subclass = result.subclass.unwrap();
    assert_eq!(subclass, vec![Some(1), Some(1), Some(1), None]);
}

/// Discarded units neither appear as match-matrix rows nor as candidates,
/// while their slots keep zero weight.
#[test]
fn test_discarded_units_are_invisible() {
    let (batch, columns) = UnitBatch::new(&["t1", "t2", "c1", "c2"], &[1, 1, 0, 0])
        .numeric("x", &[0.0, 1.0, 0.05, 1.05])
        .discard(&[false, true, true, false])
        .build();
    let result = Matcher::new(MatchingConfig::default())
        .perform_matching(&batch, &columns)
        .unwrap();

    assert_eq!(result.match_matrix.len(), 1);
    assert_eq!(result.match_matrix[0].focal, "t1");
    // c1 would be nearest but is discarded.
    assert_eq!(partners_of(&result, "t1"), vec!["c2".to_string()]);
    assert_eq!(result.weights[1], 0.0);
    assert_eq!(result.weights[2], 0.0);
}

/// Partial matching is not an error: a focal unit that exhausts its
/// candidates keeps an all-empty row and zero weight.
#[test]
fn test_partial_matching_reported_not_raised() {
    let (batch, columns) = UnitBatch::new(&["t1", "t2", "c1"], &[1, 1, 0])
        .numeric("x", &[0.0, 9.0, 0.1])
        .build();
    let result = Matcher::new(MatchingConfig::default())
        .perform_matching(&batch, &columns)
        .unwrap();

    assert_eq!(result.match_matrix.len(), 2);
    assert_eq!(partners_of(&result, "t1"), vec!["c1".to_string()]);
    assert!(partners_of(&result, "t2").is_empty());
    assert_eq!(result.matched_focal_count, 1);
    assert!(result.diagnostics.has_capacity_warning());
}

/// With a score and no explicit order, high-score focal units match first
/// and claim contested candidates.
#[test]
fn test_default_order_is_score_descending_for_att() {
    let (batch, columns) = UnitBatch::new(&["t1", "t2", "c1", "c2"], &[1, 1, 0, 0])
        .numeric("x", &[0.0, 0.1, 0.05, 4.0])
        .score(&[0.3, 0.9, 0.5, 0.6])
        .build();
    let result = Matcher::new(MatchingConfig::default())
        .perform_matching(&batch, &columns)
        .unwrap();

    assert_eq!(partners_of(&result, "t2"), vec!["c1".to_string()]);
    assert_eq!(partners_of(&result, "t1"), vec!["c2".to_string()]);
}

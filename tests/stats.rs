mod common;

use common::{dataset, load_fixture, numbers};
use csv_insight::anomalies::{AnomalyKind, Severity, detect_anomalies};
use csv_insight::config::EngineConfig;
use csv_insight::data::Value;
use csv_insight::dataset::{ColumnKind, Dataset, detect_column_types};
use csv_insight::quality::{Grade, IssueKind, calculate_quality_score};
use csv_insight::relationships::{RelationshipKind, detect_relationships};
use csv_insight::stats::{IqrBounds, get_statistics};
use proptest::prelude::*;

#[test]
fn numeric_statistics_use_unaveraged_median() {
    let stats = get_statistics(&load_fixture("people.csv"), 5);
    let age = &stats[1];
    assert_eq!(age.kind, ColumnKind::Number);
    assert_eq!(age.count, 5);
    assert_eq!(age.missing, 1);
    let summary = age.numeric.as_ref().expect("numeric summary");
    assert_eq!(summary.min, 29.0);
    assert_eq!(summary.max, 71.0);
    assert_eq!(summary.mean, 42.6);
    assert_eq!(summary.median, 34.0);

    let even = get_statistics(&numbers(&[4.0, 1.0, 3.0, 2.0]), 5);
    assert_eq!(even[0].numeric.as_ref().unwrap().median, 3.0);
}

#[test]
fn text_statistics_rank_top_values_by_count_then_first_seen() {
    let data = dataset(
        &["tag"],
        &[&["b"], &["a"], &["a"], &["c"], &["b"], &["d"]],
    );
    let stats = get_statistics(&data, 2);
    let top = stats[0].top_values.as_ref().expect("top values");
    assert_eq!(stats[0].unique_values, Some(4));
    assert_eq!(top.len(), 2);
    assert_eq!(top[0].value, "b");
    assert_eq!(top[1].value, "a");
}

#[test]
fn iqr_bounds_match_reference_example() {
    let sorted = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 100.0];
    let bounds = IqrBounds::from_sorted(&sorted, 1.5).expect("bounds");
    assert_eq!(bounds.q1, 3.0);
    assert_eq!(bounds.q3, 8.0);
    assert_eq!(bounds.upper, 15.5);
    assert!(!bounds.contains(100.0));
}

#[test]
fn quality_report_penalises_missing_and_duplicates() {
    let report = calculate_quality_score(&load_fixture("people.csv"), &EngineConfig::default());
    assert!(report.score < 100.0);
    assert!(
        report
            .issues
            .iter()
            .any(|issue| issue.kind == IssueKind::MissingValues)
    );
    assert!(
        report
            .issues
            .iter()
            .any(|issue| issue.kind == IssueKind::DuplicateRows)
    );
    assert_eq!(report.grade, Grade::from_score(report.score));
}

#[test]
fn anomalies_cover_outliers_missing_and_duplicates() {
    let anomalies = detect_anomalies(&load_fixture("people.csv"), &EngineConfig::default());
    let duplicate = anomalies
        .iter()
        .find(|a| a.kind == AnomalyKind::DuplicateRow)
        .expect("duplicate anomaly");
    assert_eq!(duplicate.row, Some(4));
    assert_eq!(duplicate.severity, Severity::Low);
    assert!(
        anomalies
            .iter()
            .any(|a| a.kind == AnomalyKind::MissingData && a.column.as_deref() == Some("age"))
    );
}

#[test]
fn sum_relationship_is_detected() {
    let rows = (1..=12)
        .map(|i| {
            let a = i as f64;
            let b = (i * 7 % 5) as f64 + 0.5;
            vec![Value::Number(a), Value::Number(b), Value::Number(a + b)]
        })
        .collect();
    let data = Dataset::new(
        vec!["base".to_string(), "tax".to_string(), "gross".to_string()],
        rows,
    )
    .unwrap();
    let found = detect_relationships(&data, &EngineConfig::default());
    let sum = found
        .iter()
        .find(|r| r.kind == RelationshipKind::Sum)
        .expect("sum relationship");
    assert_eq!(sum.target, "gross");
    assert_eq!(sum.formula, "gross = base + tax");
    assert!(found.iter().all(|r| r.kind != RelationshipKind::Product));
}

proptest! {
    #[test]
    fn type_inference_is_deterministic_and_aligned(
        cells in prop::collection::vec(prop::collection::vec("[a-c0-9]{0,3}", 3), 0..30)
    ) {
        let headers = vec!["x".to_string(), "y".to_string(), "z".to_string()];
        let rows = cells
            .iter()
            .map(|row| row.iter().map(|cell| Value::from_raw(cell)).collect::<Vec<_>>())
            .collect::<Vec<_>>();
        let first = detect_column_types(&rows, &headers);
        let second = detect_column_types(&rows, &headers);
        prop_assert_eq!(first.len(), headers.len());
        prop_assert_eq!(first, second);
    }

    #[test]
    fn quality_score_never_rises_with_more_missing_values(
        rows in 5usize..40,
        missing in 0usize..40,
    ) {
        let missing = missing.min(rows - 1);
        let build = |gaps: usize| {
            let data = (0..rows)
                .map(|i| {
                    let value = if i < gaps { Value::Null } else { Value::Number(i as f64) };
                    vec![Value::Number(i as f64), value]
                })
                .collect();
            Dataset::new(vec!["id".to_string(), "value".to_string()], data).unwrap()
        };
        let config = EngineConfig::default();
        let fewer = calculate_quality_score(&build(missing), &config).score;
        let more = calculate_quality_score(&build(missing + 1), &config).score;
        prop_assert!(more <= fewer);
    }
}

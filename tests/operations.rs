mod common;

use common::{dataset, load_fixture, numbers};
use csv_insight::changes::ChangeDetail;
use csv_insight::condition::{Condition, Logic, Operator};
use csv_insight::config::EngineConfig;
use csv_insight::data::Value;
use csv_insight::operations::{
    ColumnSelection, FillParams, FillStrategy, FilterParams, Operation,
};
use serde_json::json;

fn run(operation: Operation, data: csv_insight::dataset::Dataset) -> csv_insight::operations::Applied {
    operation.apply(data, &EngineConfig::default())
}

#[test]
fn filter_rows_deletes_matching_rows() {
    let params = FilterParams {
        conditions: vec![Condition::new("age", Operator::Gt, 65.0)],
        logic: Logic::And,
    };
    let applied = run(Operation::FilterRows(params), load_fixture("people.csv"));
    assert_eq!(applied.dataset.row_count(), 5);
    assert!(
        applied
            .dataset
            .rows()
            .iter()
            .all(|row| row[0] != Value::from("Bob"))
    );
    assert_eq!(applied.changes[0].rows_removed(), 1);
}

#[test]
fn filter_rows_with_or_logic_removes_either_match() {
    let operation = Operation::from_named(
        "filter",
        &json!({"conditions": ["city = Oslo", "age < 30"], "logic": "OR"}),
    )
    .unwrap();
    let applied = run(operation, load_fixture("people.csv"));
    let names = applied
        .dataset
        .rows()
        .iter()
        .map(|row| row[0].to_string())
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["Bob", "Dan"]);
}

#[test]
fn filter_rows_on_unknown_column_warns_and_keeps_rows() {
    let params = FilterParams {
        conditions: vec![Condition::new("zzz_not_a_column", Operator::Eq, "x")],
        logic: Logic::And,
    };
    let applied = run(Operation::FilterRows(params), load_fixture("people.csv"));
    assert_eq!(applied.dataset.row_count(), 6);
    assert_eq!(applied.changes[0].warnings.len(), 1);
}

#[test]
fn filter_rows_resolves_natural_language_columns() {
    let params = FilterParams {
        conditions: vec![Condition::new("employee salary", Operator::Gte, 52000.0)],
        logic: Logic::And,
    };
    let applied = run(Operation::FilterRows(params), load_fixture("people.csv"));
    assert_eq!(applied.dataset.row_count(), 3);
}

#[test]
fn remove_duplicates_is_idempotent() {
    let once = run(
        Operation::RemoveDuplicates(ColumnSelection::default()),
        load_fixture("people.csv"),
    );
    assert_eq!(once.dataset.row_count(), 5);
    let twice = run(
        Operation::RemoveDuplicates(ColumnSelection::default()),
        once.dataset.clone(),
    );
    assert_eq!(twice.dataset, once.dataset);
    assert_eq!(twice.changes[0].rows_removed(), 0);
}

#[test]
fn remove_duplicates_on_key_columns_keeps_first() {
    let selection = ColumnSelection {
        columns: Some(vec!["city".to_string()]),
    };
    let applied = run(Operation::RemoveDuplicates(selection), load_fixture("people.csv"));
    let names = applied
        .dataset
        .rows()
        .iter()
        .map(|row| row[0].to_string())
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["Ann", "Bob", "Dan", "Eve"]);
}

#[test]
fn fill_missing_defaults_to_removing_incomplete_rows() {
    let applied = run(
        Operation::FillMissing(FillParams::default()),
        load_fixture("people.csv"),
    );
    assert_eq!(applied.dataset.row_count(), 4);
    assert!(matches!(applied.changes[0].detail, ChangeDetail::DropIncomplete));
}

#[test]
fn fill_missing_uses_rounded_mean_for_numbers() {
    let params = FillParams {
        strategy: FillStrategy::Fill,
    };
    let applied = run(Operation::FillMissing(params), load_fixture("people.csv"));
    let rows = applied.dataset.rows();
    assert_eq!(rows[2][1], Value::Number(42.6));
    assert_eq!(rows[3][3], Value::Number(52000.0));
    assert_eq!(applied.changes[0].cells_modified, 2);
    assert_eq!(applied.dataset.row_count(), 6);
}

#[test]
fn fill_missing_uses_first_seen_mode_for_text() {
    let data = dataset(
        &["color"],
        &[&["red"], &["blue"], &[""], &["blue"], &["red"]],
    );
    let params = FillParams {
        strategy: FillStrategy::Fill,
    };
    let applied = run(Operation::FillMissing(params), data);
    assert_eq!(applied.dataset.rows()[2][0], Value::from("red"));
}

#[test]
fn remove_outliers_uses_iqr_bounds() {
    let data = numbers(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 100.0]);
    let applied = run(Operation::RemoveOutliers(ColumnSelection::default()), data);
    assert_eq!(applied.dataset.row_count(), 9);
    match &applied.changes[0].detail {
        ChangeDetail::RemoveOutliers { columns } => {
            assert_eq!(columns[0].lower, -4.5);
            assert_eq!(columns[0].upper, 15.5);
            assert_eq!(columns[0].removed, 1);
        }
        other => panic!("unexpected detail {other:?}"),
    }
}

#[test]
fn standardize_trims_and_lowercases_low_cardinality_columns() {
    let applied = run(
        Operation::Standardize(ColumnSelection::default()),
        load_fixture("people.csv"),
    );
    let rows = applied.dataset.rows();
    assert_eq!(rows[5][2], Value::from("bergen"));
    assert_eq!(rows[0][2], Value::from("oslo"));
    assert_eq!(rows[0][1], Value::Number(34.0));
}

#[test]
fn standardize_leaves_high_cardinality_columns_cased() {
    let rows = (0..25)
        .map(|i| vec![Value::from(format!(" Item{i} "))])
        .collect();
    let data = csv_insight::dataset::Dataset::new(vec!["item".to_string()], rows).unwrap();
    let applied = run(Operation::Standardize(ColumnSelection::default()), data);
    assert_eq!(applied.dataset.rows()[0][0], Value::from("Item0"));
}

#[test]
fn clean_runs_three_steps_in_order() {
    let applied = run(Operation::Clean, load_fixture("people.csv"));
    let operations = applied
        .changes
        .iter()
        .map(|c| c.operation.as_str())
        .collect::<Vec<_>>();
    assert_eq!(operations, vec!["remove_duplicates", "fill_missing", "standardize"]);
    assert_eq!(applied.dataset.row_count(), 3);
}

#[test]
fn analyze_never_mutates_rows() {
    let input = load_fixture("people.csv");
    let applied = run(Operation::Analyze, input.clone());
    assert_eq!(applied.dataset, input);
    match &applied.changes[0].detail {
        ChangeDetail::Analysis { profile } => {
            assert_eq!(profile.rows, 6);
            assert_eq!(profile.statistics.len(), 4);
        }
        other => panic!("unexpected detail {other:?}"),
    }
}

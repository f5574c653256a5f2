//! Built-in dataset operations.
//!
//! [`Operation`] is the closed set of transformations the engine knows. Plans
//! name operations with free-form strings; [`Operation::from_named`] is the
//! only place those strings are interpreted (canonical names plus a short
//! alias table) and it turns anything else into
//! [`EngineError::UnknownOperation`] with a suggestion.
//!
//! Every handler consumes the dataset, edits rows in place, preserves the
//! relative order of surviving rows, and returns the new dataset together with
//! its change log entries.

use std::collections::HashSet;

use log::{debug, info};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value as JsonValue;

use crate::{
    changes::{ChangeDetail, ChangeEntry, ColumnBounds, FillMethod, FilledColumn},
    columns::ColumnResolver,
    condition::{Condition, Logic, bind_conditions, deserialize_conditions, matches_row},
    config::EngineConfig,
    data::{Value, round2},
    dataset::{ColumnKind, Dataset},
    error::EngineError,
    profile::profile_dataset,
    stats::{IqrBounds, canonical_row_key, frequencies, mean, mode, sorted_numbers},
};

pub const OPERATION_NAMES: &[&str] = &[
    "filter_rows",
    "remove_duplicates",
    "fill_missing",
    "remove_outliers",
    "standardize",
    "clean",
    "analyze",
];

/// Accepted alternative spellings, resolved only when parsing plans.
pub const OPERATION_ALIASES: &[(&str, &str)] = &[
    ("filter", "filter_rows"),
    ("remove_rows", "filter_rows"),
    ("delete_rows", "filter_rows"),
    ("dedupe", "remove_duplicates"),
    ("deduplicate", "remove_duplicates"),
    ("drop_duplicates", "remove_duplicates"),
    ("fill", "fill_missing"),
    ("impute", "fill_missing"),
    ("handle_missing", "fill_missing"),
    ("outliers", "remove_outliers"),
    ("drop_outliers", "remove_outliers"),
    ("normalize", "standardize"),
    ("cleanup", "clean"),
    ("clean_data", "clean"),
    ("profile", "analyze"),
    ("stats", "analyze"),
    ("statistics", "analyze"),
    ("describe", "analyze"),
];

const SUGGESTION_SIMILARITY: f64 = 0.8;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterParams {
    #[serde(deserialize_with = "deserialize_conditions")]
    pub conditions: Vec<Condition>,
    pub logic: Logic,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnSelection {
    /// Restricts the operation to these columns (fuzzy-resolved). `None` means all.
    pub columns: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillStrategy {
    #[default]
    #[serde(alias = "drop", alias = "delete")]
    Remove,
    #[serde(alias = "impute", alias = "mean", alias = "mode")]
    Fill,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FillParams {
    pub strategy: FillStrategy,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    FilterRows(FilterParams),
    RemoveDuplicates(ColumnSelection),
    FillMissing(FillParams),
    RemoveOutliers(ColumnSelection),
    Standardize(ColumnSelection),
    Clean,
    Analyze,
}

/// Result of running one operation.
#[derive(Debug, Clone)]
pub struct Applied {
    pub dataset: Dataset,
    pub changes: Vec<ChangeEntry>,
}

impl Applied {
    fn single(dataset: Dataset, entry: ChangeEntry) -> Self {
        Self {
            dataset,
            changes: vec![entry],
        }
    }
}

/// Maps a canonical name or alias (case, spaces and dashes ignored) to the canonical name.
pub fn canonical_name(name: &str) -> Option<&'static str> {
    let key = name.trim().to_lowercase().replace([' ', '-'], "_");
    OPERATION_NAMES
        .iter()
        .copied()
        .find(|known| *known == key)
        .or_else(|| {
            OPERATION_ALIASES
                .iter()
                .find(|(alias, _)| *alias == key)
                .map(|(_, canonical)| *canonical)
        })
}

pub fn unknown_operation(name: &str) -> EngineError {
    let key = name.trim().to_lowercase();
    let closest = OPERATION_NAMES
        .iter()
        .map(|known| (*known, strsim::jaro_winkler(&key, known)))
        .chain(
            OPERATION_ALIASES
                .iter()
                .map(|(alias, canonical)| (*canonical, strsim::jaro_winkler(&key, alias))),
        )
        .filter(|(_, score)| *score >= SUGGESTION_SIMILARITY)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(known, _)| known);
    EngineError::UnknownOperation {
        name: name.to_string(),
        known: OPERATION_NAMES.to_vec(),
        closest,
    }
}

fn parse_params<T>(operation: &str, parameters: &JsonValue) -> Result<T, EngineError>
where
    T: DeserializeOwned + Default,
{
    if parameters.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(parameters.clone()).map_err(|err| EngineError::InvalidParameters {
        operation: operation.to_string(),
        message: err.to_string(),
    })
}

impl Operation {
    /// Interprets an externally supplied operation name and its JSON parameters.
    pub fn from_named(name: &str, parameters: &JsonValue) -> Result<Self, EngineError> {
        let canonical = canonical_name(name).ok_or_else(|| unknown_operation(name))?;
        let operation = match canonical {
            "filter_rows" => {
                let params: FilterParams = parse_params(canonical, parameters)?;
                if params.conditions.is_empty() {
                    return Err(EngineError::InvalidConditions);
                }
                Operation::FilterRows(params)
            }
            "remove_duplicates" => Operation::RemoveDuplicates(parse_params(canonical, parameters)?),
            "fill_missing" => Operation::FillMissing(parse_params(canonical, parameters)?),
            "remove_outliers" => Operation::RemoveOutliers(parse_params(canonical, parameters)?),
            "standardize" => Operation::Standardize(parse_params(canonical, parameters)?),
            "clean" => Operation::Clean,
            "analyze" => Operation::Analyze,
            _ => return Err(unknown_operation(name)),
        };
        Ok(operation)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Operation::FilterRows(_) => "filter_rows",
            Operation::RemoveDuplicates(_) => "remove_duplicates",
            Operation::FillMissing(_) => "fill_missing",
            Operation::RemoveOutliers(_) => "remove_outliers",
            Operation::Standardize(_) => "standardize",
            Operation::Clean => "clean",
            Operation::Analyze => "analyze",
        }
    }

    /// Single dispatch point for every built-in operation.
    pub fn apply(&self, dataset: Dataset, config: &EngineConfig) -> Applied {
        debug!("Applying '{}' to {} row(s)", self.name(), dataset.row_count());
        let applied = match self {
            Operation::FilterRows(params) => filter_rows(dataset, params),
            Operation::RemoveDuplicates(selection) => remove_duplicates(dataset, selection),
            Operation::FillMissing(params) => fill_missing(dataset, params),
            Operation::RemoveOutliers(selection) => remove_outliers(dataset, selection, config),
            Operation::Standardize(selection) => standardize(dataset, selection, config),
            Operation::Clean => clean(dataset, config),
            Operation::Analyze => analyze(dataset, config),
        };
        for entry in &applied.changes {
            info!(
                "{}: {} -> {} row(s), {} cell(s) modified",
                entry.operation, entry.rows_before, entry.rows_after, entry.cells_modified
            );
        }
        applied
    }
}

/// Removes rows matching the conditions (all of them for `AND`, any for `OR`).
pub fn filter_rows(mut dataset: Dataset, params: &FilterParams) -> Applied {
    let before = dataset.row_count();
    let rendered = params
        .conditions
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>();
    if params.conditions.is_empty() {
        let entry = ChangeEntry::new(
            "filter_rows",
            before,
            ChangeDetail::Filter {
                conditions: rendered,
                logic: params.logic,
                unresolved_columns: Vec::new(),
            },
        )
        .with_warnings(vec!["No conditions supplied; no rows were removed".to_string()]);
        return Applied::single(dataset, entry);
    }

    let headers = dataset.headers().to_vec();
    let (bound, unresolved) = bind_conditions(&params.conditions, &headers);
    dataset.update_rows(|rows| rows.retain(|row| !matches_row(&bound, params.logic, row)));
    let warnings = unresolved
        .iter()
        .map(|label| format!("Column '{label}' was not found; its condition matched no rows"))
        .collect();
    let entry = ChangeEntry::new(
        "filter_rows",
        before,
        ChangeDetail::Filter {
            conditions: rendered,
            logic: params.logic,
            unresolved_columns: unresolved,
        },
    )
    .with_rows_after(dataset.row_count())
    .with_warnings(warnings);
    Applied::single(dataset, entry)
}

/// Resolves a column selection to header indices; unmatched labels become warnings.
fn resolve_selection(
    headers: &[String],
    selection: &ColumnSelection,
) -> (Option<Vec<usize>>, Vec<String>) {
    let Some(labels) = &selection.columns else {
        return (None, Vec::new());
    };
    let resolver = ColumnResolver::new(headers);
    let mut warnings = Vec::new();
    let mut indices = Vec::new();
    for label in labels {
        match resolver.resolve(label) {
            Some(found) if !indices.contains(&found.index) => indices.push(found.index),
            Some(_) => {}
            None => warnings.push(format!("Column '{label}' was not found and was ignored")),
        }
    }
    (Some(indices), warnings)
}

/// Keeps the first occurrence of every row (or of every key when columns are selected).
pub fn remove_duplicates(mut dataset: Dataset, selection: &ColumnSelection) -> Applied {
    let before = dataset.row_count();
    let headers = dataset.headers().to_vec();
    let (key_columns, warnings) = resolve_selection(&headers, selection);
    let key_names = key_columns
        .as_ref()
        .map(|cols| cols.iter().map(|&idx| headers[idx].clone()).collect::<Vec<_>>());

    if key_columns.as_ref().is_none_or(|cols| !cols.is_empty()) {
        let mut seen = HashSet::with_capacity(before);
        dataset.update_rows(|rows| {
            rows.retain(|row| seen.insert(canonical_row_key(&headers, row, key_columns.as_deref())))
        });
    }

    let entry = ChangeEntry::new(
        "remove_duplicates",
        before,
        ChangeDetail::Deduplicate {
            key_columns: key_names,
        },
    )
    .with_rows_after(dataset.row_count())
    .with_warnings(warnings);
    Applied::single(dataset, entry)
}

pub fn fill_missing(dataset: Dataset, params: &FillParams) -> Applied {
    match params.strategy {
        FillStrategy::Remove => drop_incomplete_rows(dataset),
        FillStrategy::Fill => fill_missing_values(dataset),
    }
}

fn drop_incomplete_rows(mut dataset: Dataset) -> Applied {
    let before = dataset.row_count();
    dataset.update_rows(|rows| rows.retain(|row| !row.iter().any(Value::is_missing)));
    let entry = ChangeEntry::new("fill_missing", before, ChangeDetail::DropIncomplete)
        .with_rows_after(dataset.row_count());
    Applied::single(dataset, entry)
}

fn fill_missing_values(mut dataset: Dataset) -> Applied {
    let before = dataset.row_count();
    let mut plan: Vec<(usize, FillMethod, Value)> = Vec::new();
    for (idx, kind) in dataset.column_types().iter().enumerate() {
        if !dataset.column(idx).any(Value::is_missing) {
            continue;
        }
        let fill = if *kind == ColumnKind::Number {
            let numbers = sorted_numbers(dataset.column(idx));
            mean(&numbers).map(|m| (FillMethod::Mean, Value::Number(round2(m))))
        } else {
            mode(dataset.column(idx)).map(|value| (FillMethod::Mode, value))
        };
        if let Some((method, value)) = fill {
            plan.push((idx, method, value));
        }
    }

    let mut filled = Vec::with_capacity(plan.len());
    let headers = dataset.headers().to_vec();
    let total = dataset.update_rows(|rows| {
        let mut total = 0;
        for (idx, method, value) in &plan {
            let mut cells = 0;
            for cell in rows.iter_mut().filter_map(|row| row.get_mut(*idx)) {
                if cell.is_missing() {
                    *cell = value.clone();
                    cells += 1;
                }
            }
            total += cells;
            filled.push(FilledColumn {
                column: headers[*idx].clone(),
                method: *method,
                value: value.clone(),
                cells,
            });
        }
        total
    });

    let entry = ChangeEntry::new("fill_missing", before, ChangeDetail::FillMissing { filled })
        .with_cells_modified(total);
    Applied::single(dataset, entry)
}

/// Drops rows outside the IQR fences of each numeric column, one column after another.
pub fn remove_outliers(
    mut dataset: Dataset,
    selection: &ColumnSelection,
    config: &EngineConfig,
) -> Applied {
    let before = dataset.row_count();
    let headers = dataset.headers().to_vec();
    let (selected, warnings) = resolve_selection(&headers, selection);
    let numeric = dataset
        .columns_of_kind(ColumnKind::Number)
        .into_iter()
        .filter(|idx| selected.as_ref().is_none_or(|cols| cols.contains(idx)))
        .collect::<Vec<_>>();

    let mut columns = Vec::with_capacity(numeric.len());
    for idx in numeric {
        let sorted = sorted_numbers(dataset.column(idx));
        let Some(bounds) = IqrBounds::from_sorted(&sorted, config.outliers.iqr_multiplier) else {
            continue;
        };
        let removed = dataset.update_rows(|rows| {
            let start = rows.len();
            rows.retain(|row| {
                row.get(idx)
                    .and_then(Value::as_number)
                    .is_none_or(|n| bounds.contains(n))
            });
            start - rows.len()
        });
        columns.push(ColumnBounds {
            column: headers[idx].clone(),
            lower: bounds.lower,
            upper: bounds.upper,
            removed,
        });
    }

    let entry = ChangeEntry::new("remove_outliers", before, ChangeDetail::RemoveOutliers { columns })
        .with_rows_after(dataset.row_count())
        .with_warnings(warnings);
    Applied::single(dataset, entry)
}

/// Trims text cells and lower-cases low-cardinality columns.
pub fn standardize(
    mut dataset: Dataset,
    selection: &ColumnSelection,
    config: &EngineConfig,
) -> Applied {
    let before = dataset.row_count();
    let headers = dataset.headers().to_vec();
    let (selected, warnings) = resolve_selection(&headers, selection);
    let scope = selected.unwrap_or_else(|| (0..headers.len()).collect());

    let lowercase = scope
        .iter()
        .copied()
        .filter(|&idx| {
            let trimmed = dataset
                .column(idx)
                .map(|value| match value {
                    Value::String(s) => Value::String(s.trim().to_string()),
                    other => other.clone(),
                })
                .collect::<Vec<_>>();
            frequencies(trimmed.iter()).len() < config.standardize.lowercase_max_distinct
        })
        .collect::<HashSet<_>>();

    let (trimmed, modified) = dataset.update_rows(|rows| {
        let mut trimmed = 0;
        let mut modified = 0;
        for row in rows.iter_mut() {
            for &idx in &scope {
                let Some(Value::String(text)) = row.get_mut(idx) else {
                    continue;
                };
                let mut updated = text.trim().to_string();
                if updated.len() != text.len() {
                    trimmed += 1;
                }
                if lowercase.contains(&idx) {
                    updated = updated.to_lowercase();
                }
                if updated != *text {
                    *text = updated;
                    modified += 1;
                }
            }
        }
        (trimmed, modified)
    });

    let mut lowercased_columns = lowercase
        .iter()
        .map(|&idx| (idx, headers[idx].clone()))
        .collect::<Vec<_>>();
    lowercased_columns.sort();
    let entry = ChangeEntry::new(
        "standardize",
        before,
        ChangeDetail::Standardize {
            trimmed,
            lowercased_columns: lowercased_columns.into_iter().map(|(_, name)| name).collect(),
        },
    )
    .with_cells_modified(modified)
    .with_warnings(warnings);
    Applied::single(dataset, entry)
}

/// `remove_duplicates`, then `fill_missing(remove)`, then `standardize`.
pub fn clean(dataset: Dataset, config: &EngineConfig) -> Applied {
    let deduped = remove_duplicates(dataset, &ColumnSelection::default());
    let completed = fill_missing(deduped.dataset, &FillParams::default());
    let standardized = standardize(completed.dataset, &ColumnSelection::default(), config);
    let changes = deduped
        .changes
        .into_iter()
        .chain(completed.changes)
        .chain(standardized.changes)
        .collect();
    Applied {
        dataset: standardized.dataset,
        changes,
    }
}

/// Profiles the dataset; rows are returned untouched.
pub fn analyze(dataset: Dataset, config: &EngineConfig) -> Applied {
    let profile = profile_dataset(&dataset, config);
    let entry = ChangeEntry::new(
        "analyze",
        dataset.row_count(),
        ChangeDetail::Analysis {
            profile: Box::new(profile),
        },
    );
    Applied::single(dataset, entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_names_and_aliases_resolve() {
        assert_eq!(canonical_name("filter_rows"), Some("filter_rows"));
        assert_eq!(canonical_name("Remove Duplicates"), Some("remove_duplicates"));
        assert_eq!(canonical_name("dedupe"), Some("remove_duplicates"));
        assert_eq!(canonical_name("fill-missing"), Some("fill_missing"));
        assert_eq!(canonical_name("explode"), None);
    }

    #[test]
    fn near_miss_names_get_a_closest_suggestion() {
        match unknown_operation("remove_duplicate") {
            EngineError::UnknownOperation { closest, known, .. } => {
                assert_eq!(closest, Some("remove_duplicates"));
                assert_eq!(known.len(), OPERATION_NAMES.len());
            }
            other => panic!("unexpected error {other:?}"),
        }
        match unknown_operation("zzzzzz") {
            EngineError::UnknownOperation { closest, .. } => assert_eq!(closest, None),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn empty_filter_plans_are_rejected_at_the_boundary() {
        let err = Operation::from_named("filter_rows", &json!({"conditions": []})).unwrap_err();
        assert!(matches!(err, EngineError::InvalidConditions));
        let err = Operation::from_named("filter", &JsonValue::Null).unwrap_err();
        assert!(matches!(err, EngineError::InvalidConditions));
    }

    #[test]
    fn textual_conditions_are_accepted_in_parameters() {
        let op = Operation::from_named(
            "filter_rows",
            &json!({"conditions": ["age > 65", {"column": "name", "operator": "contains", "value": "bob"}], "logic": "OR"}),
        )
        .unwrap();
        match op {
            Operation::FilterRows(params) => {
                assert_eq!(params.conditions.len(), 2);
                assert_eq!(params.logic, Logic::Or);
            }
            other => panic!("unexpected operation {other:?}"),
        }
    }

    #[test]
    fn malformed_parameters_are_reported() {
        let err = Operation::from_named("fill_missing", &json!({"strategy": "guess"})).unwrap_err();
        assert!(matches!(err, EngineError::InvalidParameters { .. }));
    }

    #[test]
    fn parameters_default_when_absent() {
        let op = Operation::from_named("fill_missing", &JsonValue::Null).unwrap();
        assert_eq!(op, Operation::FillMissing(FillParams { strategy: FillStrategy::Remove }));
        let op = Operation::from_named("impute", &json!({"strategy": "fill"})).unwrap();
        assert_eq!(op, Operation::FillMissing(FillParams { strategy: FillStrategy::Fill }));
        let op = Operation::from_named("stats", &json!({})).unwrap();
        assert_eq!(op, Operation::Analyze);
    }
}

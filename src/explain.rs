//! Deterministic, template-based explanations of change logs and failures.

use itertools::Itertools;

use crate::{
    changes::{ChangeDetail, ChangeEntry, FillMethod},
    condition::Logic,
    data::format_number,
    engine::{Failure, OperationResult},
    error::ErrorKind,
};

/// One sentence per change entry, followed by any warnings it carried.
pub fn describe_changes(changes: &[ChangeEntry]) -> Vec<String> {
    let mut lines = Vec::with_capacity(changes.len());
    for entry in changes {
        lines.push(describe_entry(entry));
        lines.extend(entry.warnings.iter().map(|warning| format!("Note: {warning}")));
    }
    lines
}

pub fn describe_entry(entry: &ChangeEntry) -> String {
    let removed = entry.rows_removed();
    let span = format!("{} -> {} rows", entry.rows_before, entry.rows_after);
    match &entry.detail {
        ChangeDetail::Filter {
            conditions, logic, ..
        } => {
            if conditions.is_empty() {
                return "No filter conditions were given, so no rows were removed.".to_string();
            }
            let joiner = match logic {
                Logic::And => " and ",
                Logic::Or => " or ",
            };
            format!(
                "Removed {} where {} ({span}).",
                rows(removed),
                conditions.join(joiner)
            )
        }
        ChangeDetail::Deduplicate { key_columns } => match key_columns {
            Some(columns) if !columns.is_empty() => format!(
                "Removed {} with repeated values in {} ({span}).",
                rows(removed),
                columns.iter().map(|c| format!("'{c}'")).join(", ")
            ),
            _ => format!("Removed {} that exactly repeated an earlier row ({span}).", rows(removed)),
        },
        ChangeDetail::DropIncomplete => {
            format!("Removed {} containing missing values ({span}).", rows(removed))
        }
        ChangeDetail::FillMissing { filled } => {
            if filled.is_empty() {
                return "No missing values needed filling.".to_string();
            }
            let parts = filled
                .iter()
                .map(|column| match column.method {
                    FillMethod::Mean => format!(
                        "{} in '{}' with the mean {}",
                        column.cells, column.column, column.value
                    ),
                    FillMethod::Mode => format!(
                        "{} in '{}' with the most common value '{}'",
                        column.cells, column.column, column.value
                    ),
                })
                .join("; ");
            format!("Filled {} missing cell(s): {parts}.", entry.cells_modified)
        }
        ChangeDetail::RemoveOutliers { columns } => {
            if columns.is_empty() {
                return "No numeric columns to check for outliers.".to_string();
            }
            let parts = columns
                .iter()
                .map(|c| {
                    format!(
                        "'{}' outside [{}, {}]: {}",
                        c.column,
                        format_number(c.lower),
                        format_number(c.upper),
                        c.removed
                    )
                })
                .join("; ");
            format!("Removed {} with outlying values ({span}); {parts}.", rows(removed))
        }
        ChangeDetail::Standardize {
            trimmed,
            lowercased_columns,
        } => {
            let mut text = format!(
                "Standardized text: trimmed whitespace in {trimmed} cell(s), {} cell(s) changed in total",
                entry.cells_modified
            );
            if !lowercased_columns.is_empty() {
                text.push_str(&format!(
                    "; lower-cased {}",
                    lowercased_columns.iter().map(|c| format!("'{c}'")).join(", ")
                ));
            }
            text.push('.');
            text
        }
        ChangeDetail::Analysis { profile } => format!(
            "Analyzed {} row(s) and {} column(s): quality score {:.1} (grade {}), {} anomaly(ies), {} relationship(s).",
            profile.rows,
            profile.columns,
            profile.quality.score,
            profile.quality.grade,
            profile.anomalies.len(),
            profile.relationships.len()
        ),
        ChangeDetail::Code {
            statements,
            columns_added,
            columns_removed,
        } => {
            let mut text = format!(
                "Ran custom code ({statements} statement(s)): {span}, {} cell(s) changed",
                entry.cells_modified
            );
            if !columns_added.is_empty() {
                text.push_str(&format!("; added {}", columns_added.join(", ")));
            }
            if !columns_removed.is_empty() {
                text.push_str(&format!("; removed {}", columns_removed.join(", ")));
            }
            text.push('.');
            text
        }
    }
}

pub fn describe_failure(failure: &Failure) -> String {
    let lead = match failure.kind {
        ErrorKind::UnknownOperation => "That operation is not available.",
        ErrorKind::UnresolvableColumn => "A column in the request does not exist in this dataset.",
        ErrorKind::InvalidConditions => "The filter has no conditions, so nothing was removed.",
        ErrorKind::InvalidParameters => "The operation parameters could not be understood.",
        ErrorKind::InvalidPlan => "The command could not be understood.",
        ErrorKind::CodeValidationRejected => {
            "The custom code was rejected before running; the data was not changed."
        }
        ErrorKind::CodeExecutionError => "The custom code failed while running; the data was not changed.",
        ErrorKind::ChainStepFailure => "The sequence of steps stopped early.",
        ErrorKind::InvalidDataset => "The dataset is not valid.",
    };
    let mut text = format!("{lead} {}.", failure.message);
    if let Some(step) = failure.failed_step {
        let done = step.saturating_sub(1);
        text.push_str(&format!(
            " The first {done} step(s) succeeded; no changes were saved."
        ));
    }
    if let Some(suggestion) = &failure.suggestion {
        text.push(' ');
        text.push_str(suggestion);
        if !suggestion.ends_with('.') {
            text.push('.');
        }
    }
    text
}

/// Full explanation of a result: completed changes, then the failure if any.
pub fn describe_result(result: &OperationResult) -> Vec<String> {
    let mut lines = describe_changes(&result.changes);
    if let Some(failure) = &result.error {
        lines.push(describe_failure(failure));
    }
    lines
}

fn rows(count: usize) -> String {
    if count == 1 {
        "1 row".to_string()
    } else {
        format!("{count} rows")
    }
}

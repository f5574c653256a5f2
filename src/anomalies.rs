//! Row- and column-level anomaly detection.

use serde::Serialize;

use crate::{
    config::EngineConfig,
    data::Value,
    dataset::{ColumnKind, Dataset},
    stats::{IqrBounds, duplicate_rows, frequencies, sorted_numbers},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    Outlier,
    MissingData,
    DuplicateRow,
    ConstantValue,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Anomaly {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: AnomalyKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_range: Option<(f64, f64)>,
    pub severity: Severity,
    pub message: String,
}

/// Scans for IQR outliers, heavily missing columns, repeated rows and constant columns.
/// Row indices are zero-based positions in the dataset.
pub fn detect_anomalies(dataset: &Dataset, config: &EngineConfig) -> Vec<Anomaly> {
    let mut anomalies = Vec::new();
    let headers = dataset.headers();

    for idx in dataset.columns_of_kind(ColumnKind::Number) {
        let header = &headers[idx];
        let sorted = sorted_numbers(dataset.column(idx));
        let Some(bounds) = IqrBounds::from_sorted(&sorted, config.outliers.iqr_multiplier) else {
            continue;
        };
        for (row, cell) in dataset.column(idx).enumerate() {
            let Some(number) = cell.as_number() else {
                continue;
            };
            if bounds.contains(number) {
                continue;
            }
            anomalies.push(Anomaly {
                id: format!("outlier-{header}-{row}"),
                kind: AnomalyKind::Outlier,
                column: Some(header.clone()),
                row: Some(row),
                value: Some(cell.clone()),
                expected_range: Some((bounds.lower, bounds.upper)),
                severity: Severity::Medium,
                message: format!(
                    "Value {cell} in '{header}' is outside the expected range [{:.2}, {:.2}]",
                    bounds.lower, bounds.upper
                ),
            });
        }
    }

    let total_rows = dataset.row_count();
    if total_rows > 0 {
        for (idx, header) in headers.iter().enumerate() {
            let missing = dataset.column(idx).filter(|v| v.is_missing()).count();
            let ratio = missing as f64 / total_rows as f64;
            if ratio <= config.anomalies.missing_ratio {
                continue;
            }
            anomalies.push(Anomaly {
                id: format!("missing-{header}"),
                kind: AnomalyKind::MissingData,
                column: Some(header.clone()),
                row: None,
                value: None,
                expected_range: None,
                severity: if ratio > config.anomalies.high_missing_ratio {
                    Severity::High
                } else {
                    Severity::Medium
                },
                message: format!(
                    "{:.1}% of values in '{header}' are missing",
                    ratio * 100.0
                ),
            });
        }
    }

    for row in duplicate_rows(dataset) {
        anomalies.push(Anomaly {
            id: format!("duplicate-{row}"),
            kind: AnomalyKind::DuplicateRow,
            column: None,
            row: Some(row),
            value: None,
            expected_range: None,
            severity: Severity::Low,
            message: format!("Row {} duplicates an earlier row", row + 1),
        });
    }

    for (idx, header) in headers.iter().enumerate() {
        let present = dataset.column(idx).filter(|v| !v.is_missing()).count();
        if present <= config.anomalies.constant_min_values {
            continue;
        }
        let distinct = frequencies(dataset.column(idx));
        if let [only] = distinct.as_slice() {
            anomalies.push(Anomaly {
                id: format!("constant-{header}"),
                kind: AnomalyKind::ConstantValue,
                column: Some(header.clone()),
                row: None,
                value: Some(Value::String(only.value.clone())),
                expected_range: None,
                severity: Severity::Low,
                message: format!("'{header}' holds the single value '{}' in every row", only.value),
            });
        }
    }

    anomalies
}

//! Composite 0–100 data quality score.
//!
//! Starts from 100 and subtracts, using the weights in
//! [`crate::config::QualityConfig`]:
//!
//! - `missing_weight × missing%` for every column;
//! - `duplicate_weight × duplicate-row%` once for the dataset;
//! - `outlier_weight × outlier%` for every `number` column whose IQR outlier
//!   share exceeds `outlier_threshold_percent`;
//! - a flat `inconsistent_type_penalty` for every `number` column holding
//!   cells that are not stored as numbers.
//!
//! The result is clamped to `[0, 100]` and mapped to a letter grade.

use std::fmt;

use serde::Serialize;

use crate::{
    anomalies::Severity,
    config::EngineConfig,
    data::{Value, round2},
    dataset::{ColumnKind, Dataset},
    stats::{IqrBounds, duplicate_rows, sorted_numbers},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            Grade::A
        } else if score >= 75.0 {
            Grade::B
        } else if score >= 60.0 {
            Grade::C
        } else if score >= 40.0 {
            Grade::D
        } else {
            Grade::F
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    MissingValues,
    DuplicateRows,
    Outliers,
    InconsistentTypes,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityIssue {
    #[serde(rename = "type")]
    pub kind: IssueKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    pub severity: Severity,
    pub message: String,
    pub penalty: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityReport {
    pub score: f64,
    pub grade: Grade,
    pub issues: Vec<QualityIssue>,
}

pub fn calculate_quality_score(dataset: &Dataset, config: &EngineConfig) -> QualityReport {
    let weights = &config.quality;
    let total_rows = dataset.row_count();
    let mut issues = Vec::new();

    if total_rows > 0 {
        for (idx, header) in dataset.headers().iter().enumerate() {
            let missing = dataset.column(idx).filter(|v| v.is_missing()).count();
            if missing == 0 {
                continue;
            }
            let percent = percentage(missing, total_rows);
            let severity = if percent > 30.0 {
                Severity::High
            } else if percent > 10.0 {
                Severity::Medium
            } else {
                Severity::Low
            };
            issues.push(QualityIssue {
                kind: IssueKind::MissingValues,
                column: Some(header.clone()),
                severity,
                message: format!("{missing} missing value(s) ({percent:.1}%) in '{header}'"),
                penalty: weights.missing_weight * percent,
            });
        }

        let duplicates = duplicate_rows(dataset).len();
        if duplicates > 0 {
            let percent = percentage(duplicates, total_rows);
            issues.push(QualityIssue {
                kind: IssueKind::DuplicateRows,
                column: None,
                severity: if percent > 10.0 {
                    Severity::Medium
                } else {
                    Severity::Low
                },
                message: format!("{duplicates} duplicate row(s) ({percent:.1}%)"),
                penalty: weights.duplicate_weight * percent,
            });
        }
    }

    for idx in dataset.columns_of_kind(ColumnKind::Number) {
        let header = &dataset.headers()[idx];
        let sorted = sorted_numbers(dataset.column(idx));
        if let Some(bounds) = IqrBounds::from_sorted(&sorted, config.outliers.iqr_multiplier) {
            let outliers = sorted.iter().filter(|v| !bounds.contains(**v)).count();
            let percent = percentage(outliers, sorted.len());
            if percent > weights.outlier_threshold_percent {
                issues.push(QualityIssue {
                    kind: IssueKind::Outliers,
                    column: Some(header.clone()),
                    severity: Severity::Medium,
                    message: format!(
                        "{outliers} outlier(s) ({percent:.1}%) outside [{:.2}, {:.2}] in '{header}'",
                        bounds.lower, bounds.upper
                    ),
                    penalty: weights.outlier_weight * percent,
                });
            }
        }

        let mixed = dataset
            .column(idx)
            .filter(|v| !v.is_missing())
            .any(|v| !matches!(v, Value::Number(_)));
        if mixed {
            issues.push(QualityIssue {
                kind: IssueKind::InconsistentTypes,
                column: Some(header.clone()),
                severity: Severity::Medium,
                message: format!("'{header}' is numeric but some values are stored as text"),
                penalty: weights.inconsistent_type_penalty,
            });
        }
    }

    let penalty: f64 = issues.iter().map(|issue| issue.penalty).sum();
    let score = round2((100.0 - penalty).clamp(0.0, 100.0));
    QualityReport {
        score,
        grade: Grade::from_score(score),
        issues,
    }
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

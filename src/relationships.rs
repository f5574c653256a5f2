//! Detection of arithmetic relationships between numeric columns.
//!
//! Two shapes are checked: a product of two columns equal to a third
//! (`c = a × b`) and one column equal to the sum of every other numeric column.
//! A relationship is reported when it holds, within an absolute tolerance, for
//! more than `min_support` of all rows. The product scan is cubic in the number
//! of numeric columns, so only the first `max_columns` numeric columns are
//! considered.

use itertools::Itertools;
use log::warn;
use serde::Serialize;

use crate::{
    config::EngineConfig,
    dataset::{ColumnKind, Dataset},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    Product,
    Sum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Relationship {
    #[serde(rename = "type")]
    pub kind: RelationshipKind,
    pub target: String,
    pub inputs: Vec<String>,
    pub formula: String,
    /// Share of rows for which the formula holds.
    pub support: f64,
    pub confidence: Confidence,
}

const HIGH_CONFIDENCE_SUPPORT: f64 = 0.99;

/// Products are commutative, so each unordered input pair `{a, b}` is tested
/// once against every other column as target; `a × b` and `b × a` would only
/// produce the same finding twice. Sums use every non-target column as input.
pub fn detect_relationships(dataset: &Dataset, config: &EngineConfig) -> Vec<Relationship> {
    let settings = &config.relationships;
    let total_rows = dataset.row_count();
    if total_rows == 0 {
        return Vec::new();
    }
    let mut numeric = dataset.columns_of_kind(ColumnKind::Number);
    if numeric.len() > settings.max_columns {
        warn!(
            "Relationship scan limited to the first {} of {} numeric columns",
            settings.max_columns,
            numeric.len()
        );
        numeric.truncate(settings.max_columns);
    }
    if numeric.len() < 3 {
        return Vec::new();
    }

    let headers = dataset.headers();
    let columns = numeric
        .iter()
        .map(|&idx| {
            dataset
                .column(idx)
                .map(|value| value.as_number())
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();
    let name = |pos: usize| headers[numeric[pos]].clone();
    let mut found = Vec::new();

    for (a, b) in (0..columns.len()).tuple_combinations() {
        for c in (0..columns.len()).filter(|c| *c != a && *c != b) {
            let holds = (0..total_rows)
                .filter(|&row| {
                    match (columns[a][row], columns[b][row], columns[c][row]) {
                        (Some(x), Some(y), Some(z)) => (x * y - z).abs() < settings.tolerance,
                        _ => false,
                    }
                })
                .count();
            let support = holds as f64 / total_rows as f64;
            if support > settings.min_support {
                found.push(Relationship {
                    kind: RelationshipKind::Product,
                    target: name(c),
                    inputs: vec![name(a), name(b)],
                    formula: format!("{} = {} × {}", name(c), name(a), name(b)),
                    support,
                    confidence: confidence(support),
                });
            }
        }
    }

    for target in 0..columns.len() {
        let others = (0..columns.len()).filter(|&pos| pos != target).collect::<Vec<_>>();
        let holds = (0..total_rows)
            .filter(|&row| {
                let Some(expected) = columns[target][row] else {
                    return false;
                };
                let sum = others
                    .iter()
                    .map(|&pos| columns[pos][row])
                    .sum::<Option<f64>>();
                sum.is_some_and(|sum| (sum - expected).abs() < settings.tolerance)
            })
            .count();
        let support = holds as f64 / total_rows as f64;
        if support > settings.min_support {
            let inputs = others.iter().map(|&pos| name(pos)).collect::<Vec<_>>();
            found.push(Relationship {
                kind: RelationshipKind::Sum,
                target: name(target),
                formula: format!("{} = {}", name(target), inputs.iter().join(" + ")),
                inputs,
                support,
                confidence: confidence(support),
            });
        }
    }

    found
}

fn confidence(support: f64) -> Confidence {
    if support >= HIGH_CONFIDENCE_SUPPORT {
        Confidence::High
    } else {
        Confidence::Medium
    }
}

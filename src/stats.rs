//! Descriptive statistics and the shared numeric helpers behind outlier
//! detection, quality scoring and missing-value filling.
//!
//! Quartiles are taken at truncated indices of the sorted values
//! (`floor(n * 0.25)` and `floor(n * 0.75)`), not interpolated, and the median
//! is the element at `floor(n / 2)`. Frequency tables keep first-seen order so
//! that ties in `top_values` and in the mode resolve to the earliest value.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::{
    data::{Value, round2},
    dataset::{ColumnKind, Dataset, Row},
};

pub const DEFAULT_TOP_VALUES: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericSummary {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValueCount {
    pub value: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnStatistics {
    pub column: String,
    #[serde(rename = "type")]
    pub kind: ColumnKind,
    pub count: usize,
    pub missing: usize,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub numeric: Option<NumericSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unique_values: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_values: Option<Vec<ValueCount>>,
}

pub fn get_statistics(dataset: &Dataset, top_n: usize) -> Vec<ColumnStatistics> {
    dataset
        .headers()
        .iter()
        .zip(dataset.column_types())
        .enumerate()
        .map(|(idx, (header, kind))| column_statistics(dataset, idx, header, *kind, top_n))
        .collect()
}

fn column_statistics(
    dataset: &Dataset,
    idx: usize,
    header: &str,
    kind: ColumnKind,
    top_n: usize,
) -> ColumnStatistics {
    let missing = dataset.column(idx).filter(|v| v.is_missing()).count();
    let mut stats = ColumnStatistics {
        column: header.to_string(),
        kind,
        count: dataset.row_count() - missing,
        missing,
        numeric: None,
        unique_values: None,
        top_values: None,
    };
    match kind {
        ColumnKind::Number => {
            let values = sorted_numbers(dataset.column(idx));
            stats.numeric = numeric_summary(&values);
        }
        ColumnKind::Categorical | ColumnKind::Text => {
            let frequencies = frequencies(dataset.column(idx));
            stats.unique_values = Some(frequencies.len());
            stats.top_values = Some(top_values(frequencies, top_n));
        }
        ColumnKind::Date | ColumnKind::Empty => {}
    }
    stats
}

/// Expects `sorted` in ascending order.
pub fn numeric_summary(sorted: &[f64]) -> Option<NumericSummary> {
    let (first, last) = (sorted.first()?, sorted.last()?);
    let sum: f64 = sorted.iter().sum();
    Some(NumericSummary {
        min: *first,
        max: *last,
        mean: round2(sum / sorted.len() as f64),
        median: sorted[sorted.len() / 2],
    })
}

/// Numeric values of a column (non-numeric and missing cells skipped), sorted ascending.
pub fn sorted_numbers<'a>(values: impl Iterator<Item = &'a Value>) -> Vec<f64> {
    let mut numbers = values.filter_map(Value::as_number).collect::<Vec<_>>();
    numbers.sort_by(f64::total_cmp);
    numbers
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Outlier fences derived from truncated-index quartiles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IqrBounds {
    pub q1: f64,
    pub q3: f64,
    pub lower: f64,
    pub upper: f64,
}

impl IqrBounds {
    /// Expects `sorted` in ascending order.
    pub fn from_sorted(sorted: &[f64], multiplier: f64) -> Option<Self> {
        if sorted.is_empty() {
            return None;
        }
        let n = sorted.len();
        let q1 = sorted[(n as f64 * 0.25).floor() as usize];
        let q3 = sorted[((n as f64 * 0.75).floor() as usize).min(n - 1)];
        let iqr = q3 - q1;
        Some(Self {
            q1,
            q3,
            lower: q1 - multiplier * iqr,
            upper: q3 + multiplier * iqr,
        })
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }

    pub fn iqr(&self) -> f64 {
        self.q3 - self.q1
    }
}

/// Distinct display values with their counts, in first-seen order. Missing cells are skipped.
pub fn frequencies<'a>(values: impl Iterator<Item = &'a Value>) -> Vec<ValueCount> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut counts: Vec<ValueCount> = Vec::new();
    for value in values.filter(|v| !v.is_missing()) {
        let key = value.as_display();
        match positions.get(key.as_ref()) {
            Some(&pos) => counts[pos].count += 1,
            None => {
                positions.insert(key.to_string(), counts.len());
                counts.push(ValueCount {
                    value: key.into_owned(),
                    count: 1,
                });
            }
        }
    }
    counts
}

/// Highest counts first; equal counts keep first-seen order.
pub fn top_values(mut counts: Vec<ValueCount>, top_n: usize) -> Vec<ValueCount> {
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts.truncate(top_n);
    counts
}

/// Most frequent non-missing value; the earliest seen wins a tie.
pub fn mode<'a>(values: impl Iterator<Item = &'a Value>) -> Option<Value> {
    let mut best: Option<(&'a Value, usize)> = None;
    let mut seen: Vec<(&'a Value, usize)> = Vec::new();
    for value in values.filter(|v| !v.is_missing()) {
        match seen.iter_mut().find(|(candidate, _)| *candidate == value) {
            Some(entry) => entry.1 += 1,
            None => seen.push((value, 1)),
        }
    }
    for (value, count) in seen {
        if best.is_none_or(|(_, top)| count > top) {
            best = Some((value, count));
        }
    }
    best.map(|(value, _)| value.clone())
}

/// Order-independent fingerprint of a row: cells keyed by header, sorted by header name.
pub fn canonical_row_key(headers: &[String], row: &Row, columns: Option<&[usize]>) -> String {
    let mut cells = match columns {
        Some(columns) => columns
            .iter()
            .filter_map(|&idx| Some((headers.get(idx)?, row.get(idx)?)))
            .collect::<Vec<_>>(),
        None => headers.iter().zip(row).collect::<Vec<_>>(),
    };
    cells.sort_by(|a, b| a.0.cmp(b.0));
    let mut key = String::new();
    for (header, value) in cells {
        key.push_str(header);
        key.push('\u{1f}');
        key.push_str(value.type_tag());
        key.push(':');
        key.push_str(&value.as_display());
        key.push('\u{1e}');
    }
    key
}

/// Indices of rows that repeat an earlier row exactly; the first occurrence is not included.
pub fn duplicate_rows(dataset: &Dataset) -> Vec<usize> {
    let mut seen = HashSet::with_capacity(dataset.row_count());
    dataset
        .rows()
        .iter()
        .enumerate()
        .filter(|(_, row)| !seen.insert(canonical_row_key(dataset.headers(), row, None)))
        .map(|(idx, _)| idx)
        .collect()
}

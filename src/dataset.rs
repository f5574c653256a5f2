//! In-memory dataset model and column type inference.
//!
//! A [`Dataset`] owns its headers, its rows (each row is a [`Row`] aligned
//! with the headers) and the inferred [`ColumnKind`] of every column. Column
//! kinds are derived data: every constructor and every mutation path goes
//! through [`detect_column_types`], so callers can never hand-edit them.
//!
//! Inference checks, in order: empty, number, date, categorical, text. The
//! order matters because a column of `"1","2","3"` is both numeric and
//! low-cardinality and must classify as `number`.

use std::{borrow::Cow, collections::HashSet, fmt};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::{
    data::{NULL, Value, looks_like_date},
    error::EngineError,
};

pub type Row = Vec<Value>;

/// A column is categorical when it has fewer distinct values than this...
pub const CATEGORICAL_MAX_DISTINCT: usize = 20;
/// ...and fewer than this share of its non-empty count.
pub const CATEGORICAL_MAX_RATIO: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Number,
    Date,
    Categorical,
    Text,
    Empty,
}

impl ColumnKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnKind::Number => "number",
            ColumnKind::Date => "date",
            ColumnKind::Categorical => "categorical",
            ColumnKind::Text => "text",
            ColumnKind::Empty => "empty",
        }
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn detect_column_types(rows: &[Row], headers: &[String]) -> Vec<ColumnKind> {
    (0..headers.len())
        .map(|idx| classify_column(rows.iter().map(|row| row.get(idx).unwrap_or(&NULL))))
        .collect()
}

pub fn classify_column<'a, I>(values: I) -> ColumnKind
where
    I: IntoIterator<Item = &'a Value>,
{
    let present = values
        .into_iter()
        .filter(|value| !value.is_missing())
        .collect::<Vec<_>>();
    if present.is_empty() {
        return ColumnKind::Empty;
    }
    if present.iter().all(|value| value.as_number().is_some()) {
        return ColumnKind::Number;
    }
    if present
        .iter()
        .all(|value| looks_like_date(value.as_display().as_ref()))
    {
        return ColumnKind::Date;
    }
    let distinct = present
        .iter()
        .map(|value| value.as_display())
        .collect::<HashSet<Cow<'_, str>>>()
        .len();
    if (distinct as f64) < present.len() as f64 * CATEGORICAL_MAX_RATIO
        && distinct < CATEGORICAL_MAX_DISTINCT
    {
        ColumnKind::Categorical
    } else {
        ColumnKind::Text
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    headers: Vec<String>,
    column_types: Vec<ColumnKind>,
    rows: Vec<Row>,
}

impl Default for Dataset {
    fn default() -> Self {
        Dataset::from_trusted(Vec::new(), Vec::new())
    }
}

impl Dataset {
    /// Builds a dataset after checking that headers are unique and every row matches their width.
    pub fn new(headers: Vec<String>, rows: Vec<Row>) -> Result<Self, EngineError> {
        validate_shape(&headers, &rows)?;
        Ok(Dataset::from_trusted(headers, rows))
    }

    pub(crate) fn from_trusted(headers: Vec<String>, rows: Vec<Row>) -> Self {
        let column_types = detect_column_types(&rows, &headers);
        Dataset {
            headers,
            column_types,
            rows,
        }
    }

    /// Builds a dataset from JSON-style records. Without explicit headers the
    /// keys of the first record (in their original order) become the headers.
    pub fn from_records(
        records: Vec<Map<String, JsonValue>>,
        headers: Option<Vec<String>>,
    ) -> Result<Self, EngineError> {
        let headers = match headers {
            Some(headers) => headers,
            None => records
                .first()
                .map(|first| first.keys().cloned().collect())
                .unwrap_or_default(),
        };
        let rows = records
            .into_iter()
            .map(|mut record| {
                headers
                    .iter()
                    .map(|header| record.remove(header).map(Value::from).unwrap_or_default())
                    .collect::<Row>()
            })
            .collect::<Vec<_>>();
        Dataset::new(headers, rows)
    }

    pub fn to_records(&self) -> Vec<Map<String, JsonValue>> {
        self.rows
            .iter()
            .map(|row| {
                self.headers
                    .iter()
                    .zip(row)
                    .map(|(header, value)| {
                        let json = serde_json::to_value(value).unwrap_or(JsonValue::Null);
                        (header.clone(), json)
                    })
                    .collect()
            })
            .collect()
    }

    pub fn to_document(&self) -> DatasetDocument {
        DatasetDocument {
            headers: Some(self.headers.clone()),
            column_types: self
                .headers
                .iter()
                .zip(&self.column_types)
                .map(|(name, kind)| (name.clone(), JsonValue::String(kind.as_str().to_string())))
                .collect(),
            rows: self.to_records(),
        }
    }

    pub fn from_document(document: DatasetDocument) -> Result<Self, EngineError> {
        Dataset::from_records(document.rows, document.headers)
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn column_types(&self) -> &[ColumnKind] {
        &self.column_types
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|header| header == name)
    }

    pub fn column_type(&self, name: &str) -> Option<ColumnKind> {
        self.column_index(name).map(|idx| self.column_types[idx])
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Values of one column in row order.
    pub fn column(&self, idx: usize) -> impl Iterator<Item = &Value> + '_ {
        self.rows
            .iter()
            .map(move |row| row.get(idx).unwrap_or(&NULL))
    }

    /// Indices of all columns inferred as `kind`.
    pub fn columns_of_kind(&self, kind: ColumnKind) -> Vec<usize> {
        self.column_types
            .iter()
            .enumerate()
            .filter(|(_, candidate)| **candidate == kind)
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Mutates rows in place and re-derives column kinds afterwards.
    pub(crate) fn update_rows<R>(&mut self, edit: impl FnOnce(&mut Vec<Row>) -> R) -> R {
        let result = edit(&mut self.rows);
        self.column_types = detect_column_types(&self.rows, &self.headers);
        result
    }
}

fn validate_shape(headers: &[String], rows: &[Row]) -> Result<(), EngineError> {
    let mut seen = HashSet::with_capacity(headers.len());
    for header in headers {
        if !seen.insert(header.as_str()) {
            return Err(EngineError::InvalidDataset(format!(
                "duplicate header '{header}'"
            )));
        }
    }
    if let Some((idx, row)) = rows
        .iter()
        .enumerate()
        .find(|(_, row)| row.len() != headers.len())
    {
        return Err(EngineError::InvalidDataset(format!(
            "row {} has {} value(s) but there are {} header(s)",
            idx + 1,
            row.len(),
            headers.len()
        )));
    }
    Ok(())
}

/// Plain `{headers, columnTypes, rows}` exchange shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatasetDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<Vec<String>>,
    #[serde(default, rename = "columnTypes")]
    pub column_types: Map<String, JsonValue>,
    #[serde(default)]
    pub rows: Vec<Map<String, JsonValue>>,
}

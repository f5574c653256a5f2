//! Change log entries produced by operations, snippets and chains.
//!
//! Entries are plain data: the explanation layer ([`crate::explain`]) and any
//! external collaborator read them to describe what happened.

use serde::Serialize;

use crate::{condition::Logic, data::Value, profile::DatasetProfile};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeEntry {
    pub operation: String,
    pub rows_before: usize,
    pub rows_after: usize,
    pub cells_modified: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    pub detail: ChangeDetail,
}

impl ChangeEntry {
    pub fn new(operation: impl Into<String>, rows_before: usize, detail: ChangeDetail) -> Self {
        Self {
            operation: operation.into(),
            rows_before,
            rows_after: rows_before,
            cells_modified: 0,
            warnings: Vec::new(),
            detail,
        }
    }

    pub fn with_rows_after(mut self, rows_after: usize) -> Self {
        self.rows_after = rows_after;
        self
    }

    pub fn with_cells_modified(mut self, cells: usize) -> Self {
        self.cells_modified = cells;
        self
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }

    pub fn rows_removed(&self) -> usize {
        self.rows_before.saturating_sub(self.rows_after)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChangeDetail {
    Filter {
        conditions: Vec<String>,
        logic: Logic,
        unresolved_columns: Vec<String>,
    },
    Deduplicate {
        #[serde(skip_serializing_if = "Option::is_none")]
        key_columns: Option<Vec<String>>,
    },
    DropIncomplete,
    FillMissing {
        filled: Vec<FilledColumn>,
    },
    RemoveOutliers {
        columns: Vec<ColumnBounds>,
    },
    Standardize {
        trimmed: usize,
        lowercased_columns: Vec<String>,
    },
    Analysis {
        profile: Box<DatasetProfile>,
    },
    Code {
        statements: usize,
        columns_added: Vec<String>,
        columns_removed: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FillMethod {
    Mean,
    Mode,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilledColumn {
    pub column: String,
    pub method: FillMethod,
    pub value: Value,
    pub cells: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnBounds {
    pub column: String,
    pub lower: f64,
    pub upper: f64,
    pub removed: usize,
}

//! Engine error taxonomy.
//!
//! Every failure the engine reports is an [`EngineError`]. The engine boundary
//! never propagates these as panics or `anyhow` chains; [`crate::engine::Engine`]
//! folds them into an [`crate::engine::OperationResult`] together with the
//! stable [`ErrorKind`] and the caller-facing suggestion.

use serde::Serialize;
use thiserror::Error;

use crate::changes::ChangeEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnknownOperation,
    UnresolvableColumn,
    InvalidConditions,
    InvalidParameters,
    InvalidPlan,
    CodeValidationRejected,
    CodeExecutionError,
    ChainStepFailure,
    InvalidDataset,
}

#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("Unknown operation '{name}'")]
    UnknownOperation {
        name: String,
        known: Vec<&'static str>,
        closest: Option<&'static str>,
    },
    #[error("Column '{label}' could not be matched to any header")]
    UnresolvableColumn { label: String, headers: Vec<String> },
    #[error("filter_rows requires at least one condition")]
    InvalidConditions,
    #[error("Invalid parameters for '{operation}': {message}")]
    InvalidParameters { operation: String, message: String },
    #[error("Invalid plan: {0}")]
    InvalidPlan(String),
    #[error("Code rejected: {reason}")]
    CodeValidationRejected { reason: String },
    #[error("Code execution failed: {message}")]
    CodeExecutionError { message: String },
    #[error("Step {step} failed: {source}")]
    ChainStepFailure {
        step: usize,
        #[source]
        source: Box<EngineError>,
        completed: Vec<ChangeEntry>,
    },
    #[error("Invalid dataset: {0}")]
    InvalidDataset(String),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::UnknownOperation { .. } => ErrorKind::UnknownOperation,
            EngineError::UnresolvableColumn { .. } => ErrorKind::UnresolvableColumn,
            EngineError::InvalidConditions => ErrorKind::InvalidConditions,
            EngineError::InvalidParameters { .. } => ErrorKind::InvalidParameters,
            EngineError::InvalidPlan(_) => ErrorKind::InvalidPlan,
            EngineError::CodeValidationRejected { .. } => ErrorKind::CodeValidationRejected,
            EngineError::CodeExecutionError { .. } => ErrorKind::CodeExecutionError,
            EngineError::ChainStepFailure { .. } => ErrorKind::ChainStepFailure,
            EngineError::InvalidDataset(_) => ErrorKind::InvalidDataset,
        }
    }

    /// Caller-facing hint on how to recover. Part of the result contract.
    pub fn suggestion(&self) -> Option<String> {
        match self {
            EngineError::UnknownOperation { known, closest, .. } => {
                let listing = known.join(", ");
                Some(match closest {
                    Some(name) => format!("Did you mean '{name}'? Available operations: {listing}"),
                    None => format!("Available operations: {listing}"),
                })
            }
            EngineError::UnresolvableColumn { headers, .. } => Some(format!(
                "Rephrase the condition using one of the columns: {}",
                headers.join(", ")
            )),
            EngineError::InvalidConditions => Some(
                "Describe which rows to remove, for example 'remove rows where age > 65'"
                    .to_string(),
            ),
            EngineError::InvalidParameters { .. } | EngineError::InvalidPlan(_) => {
                Some("Check the command parameters and try again".to_string())
            }
            EngineError::CodeValidationRejected { .. } => Some(
                "Custom code may only transform rows; file, process, network and timer access is not allowed"
                    .to_string(),
            ),
            EngineError::CodeExecutionError { .. } => {
                Some("Check the column names and expressions used by the custom code".to_string())
            }
            EngineError::ChainStepFailure { source, .. } => source.suggestion(),
            EngineError::InvalidDataset(_) => None,
        }
    }

    /// The innermost error, looking through chain step wrappers.
    pub fn root(&self) -> &EngineError {
        match self {
            EngineError::ChainStepFailure { source, .. } => source.root(),
            other => other,
        }
    }
}

//! The engine facade.
//!
//! [`Engine::apply`] is the boundary: it validates a [`CommandPlan`], runs it,
//! and always answers with an [`OperationResult`]. Errors never escape as
//! `Err` or panics; they are folded into [`Failure`] with a stable kind and a
//! suggestion the caller can show.

use log::{info, warn};
use serde::Serialize;

use crate::{
    chain::ChainExecutor,
    changes::ChangeEntry,
    columns::{ColumnMatch, ColumnResolver},
    config::EngineConfig,
    dataset::Dataset,
    error::{EngineError, ErrorKind},
    operations::Applied,
    plan::{CommandPlan, PlanStep},
    store::{DatasetId, DatasetStore, StoreError},
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Failure {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    /// 1-based index of the chain step that failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<usize>,
}

impl From<&EngineError> for Failure {
    fn from(err: &EngineError) -> Self {
        let failed_step = match err {
            EngineError::ChainStepFailure { step, .. } => Some(*step),
            _ => None,
        };
        Failure {
            kind: err.kind(),
            message: err.to_string(),
            suggestion: err.suggestion(),
            failed_step,
        }
    }
}

/// Outcome of one command. `dataset` is the transformed data on success, the
/// untouched input when a single step failed, and the output of the last
/// successful step when a chain stopped early.
#[derive(Debug, Clone, Serialize)]
pub struct OperationResult {
    pub success: bool,
    #[serde(skip)]
    pub dataset: Dataset,
    pub changes: Vec<ChangeEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Failure>,
}

impl OperationResult {
    fn succeeded(dataset: Dataset, changes: Vec<ChangeEntry>) -> Self {
        Self {
            success: true,
            dataset,
            changes,
            error: None,
        }
    }

    fn failed(dataset: Dataset, changes: Vec<ChangeEntry>, err: &EngineError) -> Self {
        warn!("Command failed: {err}");
        Self {
            success: false,
            dataset,
            changes,
            error: Some(Failure::from(err)),
        }
    }

    pub fn rows_removed(&self) -> usize {
        self.changes.iter().map(ChangeEntry::rows_removed).sum()
    }
}

/// Result of [`Engine::run_stored`]: the command outcome and, when it was
/// committed, the dataset's new revision.
#[derive(Debug, Clone)]
pub struct StoredRun {
    pub result: OperationResult,
    pub revision: Option<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct Engine {
    config: EngineConfig,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn apply(&self, dataset: Dataset, plan: &CommandPlan) -> OperationResult {
        if let Err(err) = plan.validate() {
            return OperationResult::failed(dataset, Vec::new(), &err);
        }
        let executor = ChainExecutor::new(&self.config);
        let result = match plan {
            CommandPlan::Operation { name, parameters } => {
                let step = PlanStep::operation(name.clone(), parameters.clone());
                Self::single(executor.run_step(dataset, &step))
            }
            CommandPlan::Code { snippet } => {
                Self::single(executor.run_step(dataset, &PlanStep::code(snippet.clone())))
            }
            CommandPlan::Chain { steps } => {
                let outcome = executor.run(dataset, steps);
                match outcome.failure {
                    Some(err) => OperationResult::failed(outcome.dataset, outcome.changes, &err),
                    None => OperationResult::succeeded(outcome.dataset, outcome.changes),
                }
            }
        };
        if result.success {
            info!(
                "Command applied: {} change(s), {} row(s) remain",
                result.changes.len(),
                result.dataset.row_count()
            );
        }
        result
    }

    fn single(outcome: Result<Applied, (Dataset, EngineError)>) -> OperationResult {
        match outcome {
            Ok(applied) => OperationResult::succeeded(applied.dataset, applied.changes),
            Err((dataset, err)) => OperationResult::failed(dataset, Vec::new(), &err),
        }
    }

    /// Resolves a free-form column label against the dataset's headers.
    pub fn resolve_column(&self, dataset: &Dataset, label: &str) -> Result<ColumnMatch, EngineError> {
        ColumnResolver::new(dataset.headers())
            .resolve(label)
            .ok_or_else(|| EngineError::UnresolvableColumn {
                label: label.to_string(),
                headers: dataset.headers().to_vec(),
            })
    }

    /// Loads `id`, applies the plan and commits only a fully successful result.
    pub fn run_stored<S: DatasetStore>(
        &self,
        store: &mut S,
        id: DatasetId,
        plan: &CommandPlan,
    ) -> Result<StoredRun, StoreError> {
        let stored = store.load(id)?;
        let result = self.apply(stored.dataset, plan);
        if !result.success {
            return Ok(StoredRun {
                result,
                revision: None,
            });
        }
        let revision = store.commit(id, stored.revision, result.dataset.clone())?;
        Ok(StoredRun {
            result,
            revision: Some(revision),
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{data::Value, store::MemoryStore};

    fn ages() -> Dataset {
        Dataset::new(
            vec!["name".to_string(), "age".to_string()],
            vec![
                vec![Value::from("Ann"), Value::Number(30.0)],
                vec![Value::from("Bob"), Value::Number(70.0)],
            ],
        )
        .unwrap()
    }

    #[test]
    fn unknown_operations_fail_without_touching_data() {
        let engine = Engine::default();
        let plan = CommandPlan::Operation {
            name: "remove_duplicate".to_string(),
            parameters: json!(null),
        };
        let result = engine.apply(ages(), &plan);
        assert!(!result.success);
        assert_eq!(result.dataset, ages());
        let failure = result.error.unwrap();
        assert_eq!(failure.kind, ErrorKind::UnknownOperation);
        assert!(failure.suggestion.unwrap().contains("remove_duplicates"));
    }

    #[test]
    fn empty_filters_are_client_errors() {
        let plan = CommandPlan::Operation {
            name: "filter_rows".to_string(),
            parameters: json!({"conditions": []}),
        };
        let result = Engine::default().apply(ages(), &plan);
        assert_eq!(result.error.map(|f| f.kind), Some(ErrorKind::InvalidConditions));
    }

    #[test]
    fn resolve_column_reports_unresolvable_labels() {
        let engine = Engine::default();
        assert_eq!(engine.resolve_column(&ages(), "Customer's Age").unwrap().header, "age");
        let err = engine.resolve_column(&ages(), "zzz_not_a_column").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnresolvableColumn);
    }

    #[test]
    fn run_stored_commits_only_successes() {
        let engine = Engine::default();
        let mut store = MemoryStore::new();
        let id = store.insert(ages());

        let bad = CommandPlan::Code {
            snippet: "keep process.exit(0)".to_string(),
        };
        let run = engine.run_stored(&mut store, id, &bad).unwrap();
        assert!(!run.result.success);
        assert_eq!(run.revision, None);
        assert_eq!(store.revision(id), Ok(1));

        let good = CommandPlan::Operation {
            name: "filter".to_string(),
            parameters: json!({"conditions": ["age > 65"]}),
        };
        let run = engine.run_stored(&mut store, id, &good).unwrap();
        assert!(run.result.success);
        assert_eq!(run.revision, Some(2));
        assert_eq!(store.load(id).unwrap().dataset.row_count(), 1);
    }
}

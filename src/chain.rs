use log::{debug, info, warn};

use crate::{
    changes::ChangeEntry,
    config::EngineConfig,
    dataset::Dataset,
    error::EngineError,
    operations::Applied,
    plan::PlanStep,
    sandbox::CodeSandbox,
};

/// Runs ordered plan steps, feeding each step's output into the next.
pub struct ChainExecutor<'a> {
    config: &'a EngineConfig,
    sandbox: CodeSandbox,
}

/// What a chain produced. On failure `dataset` is the output of the last
/// successful step and `changes` holds only the successful steps' entries.
#[derive(Debug, Clone)]
pub struct ChainOutcome {
    pub dataset: Dataset,
    pub changes: Vec<ChangeEntry>,
    pub steps_completed: usize,
    pub failure: Option<EngineError>,
}

impl ChainOutcome {
    pub fn succeeded(&self) -> bool {
        self.failure.is_none()
    }
}

impl<'a> ChainExecutor<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self {
            config,
            sandbox: CodeSandbox::new(&config.sandbox),
        }
    }

    /// Runs a single step. The dataset is handed back untouched when the step fails.
    pub fn run_step(&self, dataset: Dataset, step: &PlanStep) -> Result<Applied, (Dataset, EngineError)> {
        match step {
            PlanStep::Operation { .. } => match step.resolve() {
                Ok(Some(operation)) => Ok(operation.apply(dataset, self.config)),
                Ok(None) => Ok(Applied {
                    dataset,
                    changes: Vec::new(),
                }),
                Err(err) => Err((dataset, err)),
            },
            PlanStep::Code { snippet } => match self.sandbox.run(snippet, &dataset) {
                Ok(applied) => Ok(applied),
                Err(err) => Err((dataset, err)),
            },
        }
    }

    /// Stops at the first failing step; step numbers in failures are 1-based.
    pub fn run(&self, dataset: Dataset, steps: &[PlanStep]) -> ChainOutcome {
        let mut current = dataset;
        let mut changes = Vec::new();
        for (idx, step) in steps.iter().enumerate() {
            let number = idx + 1;
            debug!("Chain step {number}/{}: {}", steps.len(), step.label());
            match self.run_step(current, step) {
                Ok(applied) => {
                    current = applied.dataset;
                    changes.extend(applied.changes);
                }
                Err((unchanged, err)) => {
                    warn!("Chain stopped at step {number} ({}): {err}", step.label());
                    let failure = EngineError::ChainStepFailure {
                        step: number,
                        source: Box::new(err),
                        completed: changes.clone(),
                    };
                    return ChainOutcome {
                        dataset: unchanged,
                        changes,
                        steps_completed: idx,
                        failure: Some(failure),
                    };
                }
            }
        }
        info!(
            "Chain completed {} step(s) with {} row(s)",
            steps.len(),
            current.row_count()
        );
        ChainOutcome {
            dataset: current,
            changes,
            steps_completed: steps.len(),
            failure: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value as JsonValue, json};

    use super::*;
    use crate::data::Value;

    fn people() -> Dataset {
        Dataset::new(
            vec!["name".to_string(), "age".to_string()],
            vec![
                vec![Value::from("  Ann "), Value::Number(30.0)],
                vec![Value::from("  Ann "), Value::Number(30.0)],
                vec![Value::from("Bob"), Value::Number(70.0)],
            ],
        )
        .unwrap()
    }

    #[test]
    fn stops_at_the_first_failing_step() {
        let config = EngineConfig::default();
        let steps = vec![
            PlanStep::operation("remove_duplicates", JsonValue::Null),
            PlanStep::operation("frobnicate", JsonValue::Null),
            PlanStep::operation("standardize", JsonValue::Null),
        ];
        let outcome = ChainExecutor::new(&config).run(people(), &steps);
        assert!(!outcome.succeeded());
        assert_eq!(outcome.steps_completed, 1);
        assert_eq!(outcome.changes.len(), 1);
        assert_eq!(outcome.dataset.row_count(), 2);
        match outcome.failure {
            Some(EngineError::ChainStepFailure { step, source, completed }) => {
                assert_eq!(step, 2);
                assert!(matches!(*source, EngineError::UnknownOperation { .. }));
                assert_eq!(completed.len(), 1);
            }
            other => panic!("unexpected failure {other:?}"),
        }
        // untrimmed: standardize never ran
        assert_eq!(outcome.dataset.rows()[0][0], Value::from("  Ann "));
    }

    #[test]
    fn threads_output_between_steps() {
        let config = EngineConfig::default();
        let steps = vec![
            PlanStep::operation("filter", json!({"conditions": ["age > 65"]})),
            PlanStep::code("set senior = age >= 65"),
            PlanStep::operation("standardize", JsonValue::Null),
        ];
        let outcome = ChainExecutor::new(&config).run(people(), &steps);
        assert!(outcome.succeeded());
        assert_eq!(outcome.steps_completed, 3);
        assert_eq!(outcome.changes.len(), 3);
        assert_eq!(outcome.dataset.row_count(), 2);
        assert_eq!(outcome.dataset.rows()[0][0], Value::from("ann"));
        assert_eq!(outcome.dataset.rows()[0][2], Value::Boolean(false));
    }
}

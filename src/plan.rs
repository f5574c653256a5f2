//! Command plans: the structured request an external collaborator hands the engine.
//!
//! ```json
//! {"type": "operation", "name": "filter_rows",
//!  "parameters": {"conditions": ["age > 65"]}}
//! {"type": "code", "snippet": "keep sales > 0"}
//! {"type": "chain", "steps": [{"type": "operation", "name": "clean"},
//!                             {"type": "code", "snippet": "limit 10"}]}
//! ```
//!
//! Plans are deserialized from JSON or YAML. Structural validation happens
//! here; operation names and parameters are interpreted when the step runs.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::{error::EngineError, operations::Operation};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlanStep {
    Operation {
        name: String,
        #[serde(default)]
        parameters: JsonValue,
    },
    Code {
        snippet: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommandPlan {
    Operation {
        name: String,
        #[serde(default)]
        parameters: JsonValue,
    },
    Code {
        snippet: String,
    },
    Chain {
        steps: Vec<PlanStep>,
    },
}

impl PlanStep {
    pub fn operation(name: impl Into<String>, parameters: JsonValue) -> Self {
        PlanStep::Operation {
            name: name.into(),
            parameters,
        }
    }

    pub fn code(snippet: impl Into<String>) -> Self {
        PlanStep::Code {
            snippet: snippet.into(),
        }
    }

    /// Short label used in logs and explanations.
    pub fn label(&self) -> &str {
        match self {
            PlanStep::Operation { name, .. } => name,
            PlanStep::Code { .. } => "custom code",
        }
    }

    fn validate(&self) -> Result<(), EngineError> {
        match self {
            PlanStep::Operation { name, .. } if name.trim().is_empty() => Err(
                EngineError::InvalidPlan("operation steps need a name".to_string()),
            ),
            PlanStep::Code { snippet } if snippet.trim().is_empty() => Err(
                EngineError::InvalidPlan("code steps need a snippet".to_string()),
            ),
            _ => Ok(()),
        }
    }

    /// Resolves an operation step into the closed [`Operation`] set.
    pub fn resolve(&self) -> Result<Option<Operation>, EngineError> {
        match self {
            PlanStep::Operation { name, parameters } => {
                Operation::from_named(name, parameters).map(Some)
            }
            PlanStep::Code { .. } => Ok(None),
        }
    }
}

impl CommandPlan {
    pub fn from_json(raw: &str) -> Result<Self, EngineError> {
        let plan: CommandPlan =
            serde_json::from_str(raw).map_err(|err| EngineError::InvalidPlan(err.to_string()))?;
        plan.validate()?;
        Ok(plan)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, EngineError> {
        let plan: CommandPlan =
            serde_yaml::from_str(raw).map_err(|err| EngineError::InvalidPlan(err.to_string()))?;
        plan.validate()?;
        Ok(plan)
    }

    /// Reads a plan file; `.yml`/`.yaml` are parsed as YAML, anything else as JSON.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Reading plan file {}", path.display()))?;
        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("yml") || ext.eq_ignore_ascii_case("yaml"));
        let plan = if is_yaml {
            Self::from_yaml(&raw)
        } else {
            Self::from_json(&raw)
        };
        plan.with_context(|| format!("Parsing plan file {}", path.display()))
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        match self {
            CommandPlan::Operation { name, parameters } => PlanStep::Operation {
                name: name.clone(),
                parameters: parameters.clone(),
            }
            .validate(),
            CommandPlan::Code { snippet } if snippet.trim().is_empty() => Err(
                EngineError::InvalidPlan("code plans need a snippet".to_string()),
            ),
            CommandPlan::Code { .. } => Ok(()),
            CommandPlan::Chain { steps } if steps.is_empty() => Err(EngineError::InvalidPlan(
                "a chain needs at least one step".to_string(),
            )),
            CommandPlan::Chain { steps } => steps.iter().try_for_each(PlanStep::validate),
        }
    }

    /// Number of steps this plan runs.
    pub fn step_count(&self) -> usize {
        match self {
            CommandPlan::Chain { steps } => steps.len(),
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_tagged_json_plans() {
        let plan = CommandPlan::from_json(
            r#"{"type": "chain", "steps": [
                {"type": "operation", "name": "remove_duplicates"},
                {"type": "code", "snippet": "limit 5"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(
            plan,
            CommandPlan::Chain {
                steps: vec![
                    PlanStep::operation("remove_duplicates", JsonValue::Null),
                    PlanStep::code("limit 5"),
                ]
            }
        );
        assert_eq!(plan.step_count(), 2);
    }

    #[test]
    fn parses_yaml_plans() {
        let plan = CommandPlan::from_yaml(
            "type: operation\nname: filter_rows\nparameters:\n  conditions:\n    - age > 65\n",
        )
        .unwrap();
        match plan {
            CommandPlan::Operation { name, parameters } => {
                assert_eq!(name, "filter_rows");
                assert_eq!(parameters, json!({"conditions": ["age > 65"]}));
            }
            other => panic!("unexpected plan {other:?}"),
        }
    }

    #[test]
    fn structural_problems_are_invalid_plans() {
        let err = CommandPlan::from_json(r#"{"type": "chain", "steps": []}"#).unwrap_err();
        assert!(matches!(err, EngineError::InvalidPlan(_)));
        let err = CommandPlan::from_json(r#"{"type": "teleport"}"#).unwrap_err();
        assert!(matches!(err, EngineError::InvalidPlan(_)));
        let err = CommandPlan::from_json(r#"{"type": "operation", "name": "  "}"#).unwrap_err();
        assert!(matches!(err, EngineError::InvalidPlan(_)));
    }

    #[test]
    fn unknown_names_survive_parsing() {
        let plan = CommandPlan::from_json(r#"{"type": "operation", "name": "explode"}"#).unwrap();
        match plan {
            CommandPlan::Operation { name, parameters } => {
                assert!(matches!(
                    PlanStep::operation(name, parameters).resolve(),
                    Err(EngineError::UnknownOperation { .. })
                ));
            }
            other => panic!("unexpected plan {other:?}"),
        }
    }
}

use std::{fmt, str::FromStr};

use anyhow::{Result, anyhow};
use log::warn;
use serde::{Deserialize, Deserializer, Serialize, de::Error as _};

use crate::{
    columns::ColumnResolver,
    data::{Value, parse_number},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    #[serde(alias = ">", alias = "greater_than")]
    Gt,
    #[serde(alias = "<", alias = "less_than")]
    Lt,
    #[serde(alias = "=", alias = "==", alias = "equals")]
    Eq,
    #[serde(alias = "!=", alias = "not_equals")]
    Ne,
    #[serde(alias = ">=")]
    Gte,
    #[serde(alias = "<=")]
    Lte,
    In,
    NotIn,
    Contains,
    NotContains,
    Odd,
    Even,
    #[serde(alias = "after")]
    DateAfter,
    #[serde(alias = "before")]
    DateBefore,
}

impl Operator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Gte => ">=",
            Operator::Lte => "<=",
            Operator::In => "in",
            Operator::NotIn => "not in",
            Operator::Contains => "contains",
            Operator::NotContains => "does not contain",
            Operator::Odd => "is odd",
            Operator::Even => "is even",
            Operator::DateAfter => "is after",
            Operator::DateBefore => "is before",
        }
    }

    fn takes_operand(&self) -> bool {
        !matches!(self, Operator::Odd | Operator::Even)
    }
}

/// Right-hand side of a condition: a scalar, or a list for `in`/`not_in`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Operand {
    List(Vec<Value>),
    Scalar(Value),
}

impl Default for Operand {
    fn default() -> Self {
        Operand::Scalar(Value::Null)
    }
}

impl Operand {
    fn as_slice(&self) -> &[Value] {
        match self {
            Operand::List(values) => values,
            Operand::Scalar(value) => std::slice::from_ref(value),
        }
    }

    fn scalar(&self) -> &Value {
        match self {
            Operand::Scalar(value) => value,
            Operand::List(values) => values.first().unwrap_or(&crate::data::NULL),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Scalar(value) => write!(f, "{value}"),
            Operand::List(values) => {
                let rendered = values.iter().map(|v| v.to_string()).collect::<Vec<_>>();
                write!(f, "[{}]", rendered.join(", "))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub column: String,
    pub operator: Operator,
    #[serde(default)]
    pub value: Operand,
}

impl Condition {
    pub fn new(column: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            operator,
            value: Operand::Scalar(value.into()),
        }
    }

    pub fn list(column: impl Into<String>, operator: Operator, values: Vec<Value>) -> Self {
        Self {
            column: column.into(),
            operator,
            value: Operand::List(values),
        }
    }

    /// Evaluates the condition against a single, already resolved cell.
    pub fn evaluate(&self, cell: &Value) -> bool {
        use Operator::*;
        match self.operator {
            Gt | Lt | Gte | Lte => {
                let (Some(left), Some(right)) = (cell.as_number(), self.value.scalar().as_number())
                else {
                    return false;
                };
                match self.operator {
                    Gt => left > right,
                    Lt => left < right,
                    Gte => left >= right,
                    _ => left <= right,
                }
            }
            Eq => text_equals(cell, self.value.scalar()),
            Ne => !text_equals(cell, self.value.scalar()),
            In => self.value.as_slice().iter().any(|item| loosely_equal(cell, item)),
            NotIn => !self.value.as_slice().iter().any(|item| loosely_equal(cell, item)),
            Contains => text_contains(cell, self.value.scalar()),
            NotContains => !text_contains(cell, self.value.scalar()),
            Odd | Even => {
                let Some(number) = cell.as_number() else {
                    return false;
                };
                let remainder = number % 2.0;
                if self.operator == Odd {
                    remainder.abs() == 1.0
                } else {
                    remainder == 0.0
                }
            }
            DateAfter | DateBefore => {
                let (Some(left), Some(right)) = (cell.as_date(), self.value.scalar().as_date())
                else {
                    return false;
                };
                if self.operator == DateAfter {
                    left > right
                } else {
                    left < right
                }
            }
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.operator.takes_operand() {
            write!(f, "{} {} {}", self.column, self.operator.symbol(), self.value)
        } else {
            write!(f, "{} {}", self.column, self.operator.symbol())
        }
    }
}

fn text_equals(cell: &Value, other: &Value) -> bool {
    cell.as_display().to_lowercase() == other.as_display().to_lowercase()
}

fn text_contains(cell: &Value, needle: &Value) -> bool {
    cell.as_display()
        .to_lowercase()
        .contains(&needle.as_display().to_lowercase())
}

fn loosely_equal(cell: &Value, item: &Value) -> bool {
    if let (Some(left), Some(right)) = (cell.as_number(), item.as_number())
        && left == right
    {
        return true;
    }
    text_equals(cell, item)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Logic {
    #[default]
    #[serde(rename = "AND", alias = "and", alias = "And")]
    And,
    #[serde(rename = "OR", alias = "or", alias = "Or")]
    Or,
}

/// A condition bound to a header index; `column == None` means resolution failed.
#[derive(Debug, Clone)]
pub struct BoundCondition<'c> {
    pub condition: &'c Condition,
    pub column: Option<usize>,
}

impl BoundCondition<'_> {
    pub fn evaluate(&self, row: &[Value]) -> bool {
        match self.column.and_then(|idx| row.get(idx)) {
            Some(cell) => self.condition.evaluate(cell),
            None => false,
        }
    }
}

/// Resolves every condition's column once. Unresolved labels come back as warnings.
pub fn bind_conditions<'c>(
    conditions: &'c [Condition],
    headers: &[String],
) -> (Vec<BoundCondition<'c>>, Vec<String>) {
    let resolver = ColumnResolver::new(headers);
    let mut unresolved = Vec::new();
    let bound = conditions
        .iter()
        .map(|condition| {
            let column = resolver.resolve(&condition.column).map(|found| found.index);
            if column.is_none() {
                warn!(
                    "Column '{}' not found; condition '{}' treated as false",
                    condition.column, condition
                );
                unresolved.push(condition.column.clone());
            }
            BoundCondition { condition, column }
        })
        .collect();
    (bound, unresolved)
}

pub fn matches_row(bound: &[BoundCondition<'_>], logic: Logic, row: &[Value]) -> bool {
    if bound.is_empty() {
        return false;
    }
    match logic {
        Logic::And => bound.iter().all(|condition| condition.evaluate(row)),
        Logic::Or => bound.iter().any(|condition| condition.evaluate(row)),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ConditionSpec {
    Text(String),
    Structured(Condition),
}

/// Accepts a list mixing structured conditions and textual ones (`"age > 65"`).
pub fn deserialize_conditions<'de, D>(deserializer: D) -> Result<Vec<Condition>, D::Error>
where
    D: Deserializer<'de>,
{
    Vec::<ConditionSpec>::deserialize(deserializer)?
        .into_iter()
        .map(|spec| match spec {
            ConditionSpec::Text(text) => text.parse::<Condition>().map_err(D::Error::custom),
            ConditionSpec::Structured(condition) => Ok(condition),
        })
        .collect()
}

impl FromStr for Condition {
    type Err = anyhow::Error;

    /// Parses `age > 25`, `name contains bob`, `id in 1,2,3`, `age is odd`,
    /// `joined date_after 2024-01-01` and similar forms.
    fn from_str(spec: &str) -> Result<Self> {
        let trimmed = spec.trim();
        if trimmed.is_empty() {
            return Err(anyhow!("Empty condition expression"));
        }
        let lowered = trimmed.to_ascii_lowercase();
        let infix = leftmost_operator(&lowered);

        for (suffix, op) in [
            (" is odd", Operator::Odd),
            (" is even", Operator::Even),
            (" odd", Operator::Odd),
            (" even", Operator::Even),
        ] {
            let start = trimmed.len().saturating_sub(suffix.len());
            if lowered.ends_with(suffix) && infix.is_none_or(|(idx, _, _)| idx >= start) {
                let column = trimmed[..start].trim();
                return Ok(Condition {
                    column: column.to_string(),
                    operator: op,
                    value: Operand::default(),
                });
            }
        }

        if let Some((idx, needle, operator)) = infix {
            let column = trimmed[..idx].trim();
            if column.is_empty() {
                return Err(anyhow!("Condition '{trimmed}' is missing a column name"));
            }
            let right = unquote(trimmed[idx + needle.len()..].trim());
            let value = if matches!(operator, Operator::In | Operator::NotIn) {
                Operand::List(
                    right
                        .split(',')
                        .map(|item| unquote(item.trim()))
                        .filter(|item| !item.is_empty())
                        .map(Value::from_raw)
                        .collect(),
                )
            } else {
                Operand::Scalar(Value::from_raw(right))
            };
            return Ok(Condition {
                column: column.to_string(),
                operator,
                value,
            });
        }

        Err(anyhow!("Failed to parse condition '{trimmed}'"))
    }
}

const INFIX_OPERATORS: &[(&str, Operator)] = &[
    (" not_contains ", Operator::NotContains),
    (" not contains ", Operator::NotContains),
    (" contains ", Operator::Contains),
    (" not_in ", Operator::NotIn),
    (" not in ", Operator::NotIn),
    (" in ", Operator::In),
    (" date_after ", Operator::DateAfter),
    (" date_before ", Operator::DateBefore),
    ("!=", Operator::Ne),
    (">=", Operator::Gte),
    ("<=", Operator::Lte),
    ("==", Operator::Eq),
    ("=", Operator::Eq),
    (">", Operator::Gt),
    ("<", Operator::Lt),
];

/// The operator token that starts earliest in `lowered`; the longest token wins at equal positions.
fn leftmost_operator(lowered: &str) -> Option<(usize, &'static str, Operator)> {
    INFIX_OPERATORS
        .iter()
        .filter_map(|(needle, op)| lowered.find(needle).map(|idx| (idx, *needle, *op)))
        .min_by(|a, b| a.0.cmp(&b.0).then(b.1.len().cmp(&a.1.len())))
}

fn unquote(value: &str) -> &str {
    if value.len() >= 2 {
        let bytes = value.as_bytes();
        if (bytes[0] == b'"' && bytes[value.len() - 1] == b'"')
            || (bytes[0] == b'\'' && bytes[value.len() - 1] == b'\'')
        {
            return &value[1..value.len() - 1];
        }
    }
    value
}

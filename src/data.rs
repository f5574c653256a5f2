use std::{borrow::Cow, fmt, sync::OnceLock};

use anyhow::{Result, anyhow};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// A single cell. Serializes as the bare JSON scalar (`null`, `true`, `4.5`, `"text"`).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
}

/// Shared missing cell for lookups past the end of a row.
pub static NULL: Value = Value::Null;

impl Value {
    /// Applies dynamic typing to a raw text cell (CSV import).
    pub fn from_raw(raw: &str) -> Self {
        if raw.is_empty() {
            return Value::Null;
        }
        if let Some(number) = parse_number(raw) {
            return Value::Number(number);
        }
        match raw {
            "true" | "TRUE" | "True" => Value::Boolean(true),
            "false" | "FALSE" | "False" => Value::Boolean(false),
            _ => Value::String(raw.to_string()),
        }
    }

    /// Null and empty strings count as missing.
    pub fn is_missing(&self) -> bool {
        match self {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Numeric coercion: numbers pass through, strings are parsed, everything else is non-numeric.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) if n.is_finite() => Some(*n),
            Value::String(s) => parse_number(s),
            _ => None,
        }
    }

    pub fn as_display(&self) -> Cow<'_, str> {
        match self {
            Value::Null => Cow::Borrowed(""),
            Value::Boolean(b) => Cow::Owned(b.to_string()),
            Value::Number(n) => Cow::Owned(format_number(*n)),
            Value::String(s) => Cow::Borrowed(s.as_str()),
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::String(s) => parse_naive_date(s.trim()).ok(),
            _ => None,
        }
    }

    pub fn type_tag(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value as f64)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(b),
            serde_json::Value::Number(n) => n.as_f64().map(Value::Number).unwrap_or(Value::Null),
            serde_json::Value::String(s) => Value::String(s),
            nested => Value::String(nested.to_string()),
        }
    }
}

pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        (value as i64).to_string()
    } else {
        value.to_string()
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn parse_number(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
}

fn date_like_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\d{1,4}[-/]\d{1,2}[-/]\d{1,4}").expect("date pattern is a valid regex")
    })
}

/// Loose date detection used by type inference; deliberately unanchored.
pub fn looks_like_date(value: &str) -> bool {
    date_like_pattern().is_match(value)
}

pub fn parse_naive_date(value: &str) -> Result<NaiveDate> {
    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d/%m/%Y", "%d-%m-%Y"];
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(value, fmt) {
            return Ok(parsed);
        }
    }
    if let Ok(parsed) = parse_naive_datetime(value) {
        return Ok(parsed.date());
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.date_naive());
    }
    Err(anyhow!("Failed to parse '{value}' as date"))
}

pub fn parse_naive_datetime(value: &str) -> Result<NaiveDateTime> {
    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%m/%d/%Y %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    for fmt in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, fmt) {
            return Ok(parsed);
        }
    }
    Err(anyhow!("Failed to parse '{value}' as datetime"))
}

/// Identifier form of a header used when binding columns into expressions.
pub fn normalize_column_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' => c,
            _ => '_',
        })
        .collect::<String>()
        .to_ascii_lowercase()
}

pub fn value_to_evalexpr(value: &Value) -> evalexpr::Value {
    match value {
        Value::Null => evalexpr::Value::Empty,
        Value::Boolean(b) => evalexpr::Value::Boolean(*b),
        Value::Number(n) => {
            if n.fract() == 0.0 && n.abs() < 9.0e15 {
                evalexpr::Value::Int(*n as i64)
            } else {
                evalexpr::Value::Float(*n)
            }
        }
        Value::String(s) => evalexpr::Value::String(s.clone()),
    }
}

pub fn value_from_evalexpr(value: evalexpr::Value) -> Value {
    match value {
        evalexpr::Value::String(s) => Value::String(s),
        evalexpr::Value::Int(i) => Value::Number(i as f64),
        evalexpr::Value::Float(f) if f.is_finite() => Value::Number(f),
        evalexpr::Value::Float(_) => Value::Null,
        evalexpr::Value::Boolean(b) => Value::Boolean(b),
        evalexpr::Value::Tuple(values) => Value::String(
            values
                .into_iter()
                .map(|v| value_from_evalexpr(v).to_string())
                .collect::<Vec<_>>()
                .join("|"),
        ),
        evalexpr::Value::Empty => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evalexpr::Value as EvalValue;

    #[test]
    fn from_raw_applies_dynamic_typing() {
        assert_eq!(Value::from_raw(""), Value::Null);
        assert_eq!(Value::from_raw("42"), Value::Number(42.0));
        assert_eq!(Value::from_raw("-3.5"), Value::Number(-3.5));
        assert_eq!(Value::from_raw("true"), Value::Boolean(true));
        assert_eq!(Value::from_raw("NaN"), Value::String("NaN".into()));
        assert_eq!(Value::from_raw("Alice"), Value::String("Alice".into()));
    }

    #[test]
    fn missing_covers_null_and_empty_strings_only() {
        assert!(Value::Null.is_missing());
        assert!(Value::String(String::new()).is_missing());
        assert!(!Value::String(" ".into()).is_missing());
        assert!(!Value::Number(0.0).is_missing());
        assert!(!Value::Boolean(false).is_missing());
    }

    #[test]
    fn numeric_coercion_parses_strings_but_not_booleans() {
        assert_eq!(Value::from(" 12 ").as_number(), Some(12.0));
        assert_eq!(Value::Boolean(true).as_number(), None);
        assert_eq!(Value::from("inf").as_number(), None);
        assert_eq!(Value::Null.as_number(), None);
    }

    #[test]
    fn display_drops_trailing_zero_fraction() {
        assert_eq!(Value::Number(30.0).to_string(), "30");
        assert_eq!(Value::Number(2.25).to_string(), "2.25");
        assert_eq!(Value::Null.to_string(), "");
    }

    #[test]
    fn date_detection_is_loose_but_parsing_is_strict() {
        assert!(looks_like_date("2024-01-05"));
        assert!(looks_like_date("1/2/2024"));
        assert!(!looks_like_date("January 5"));
        assert!(looks_like_date("99-99-99"));
        assert!(parse_naive_date("99-99-99").is_err());
        let expected = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
        assert_eq!(parse_naive_date("2024-05-06").unwrap(), expected);
        assert_eq!(parse_naive_date("05/06/2024").unwrap(), expected);
        assert_eq!(parse_naive_date("2024-05-06T10:30:00").unwrap(), expected);
    }

    #[test]
    fn evalexpr_bridge_preserves_integers() {
        assert_eq!(value_to_evalexpr(&Value::Number(42.0)), EvalValue::Int(42));
        assert_eq!(value_to_evalexpr(&Value::Number(1.5)), EvalValue::Float(1.5));
        assert_eq!(value_to_evalexpr(&Value::Null), EvalValue::Empty);
        assert_eq!(value_from_evalexpr(EvalValue::Int(7)), Value::Number(7.0));
    }

    #[test]
    fn normalize_column_name_replaces_non_alphanumeric() {
        assert_eq!(normalize_column_name("Order ID"), "order_id");
        assert_eq!(normalize_column_name("$Percent%"), "_percent_");
    }
}

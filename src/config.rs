//! Engine tuning knobs, loadable from YAML.
//!
//! Every field has a default matching the engine's documented behavior, so an
//! empty file (or no file at all) yields the standard thresholds. Type
//! inference thresholds are not configurable; see [`crate::dataset`].

use std::{fs, path::Path, time::Duration};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub top_values: usize,
    pub outliers: OutlierConfig,
    pub quality: QualityConfig,
    pub anomalies: AnomalyConfig,
    pub relationships: RelationshipConfig,
    pub standardize: StandardizeConfig,
    pub sandbox: SandboxConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            top_values: crate::stats::DEFAULT_TOP_VALUES,
            outliers: OutlierConfig::default(),
            quality: QualityConfig::default(),
            anomalies: AnomalyConfig::default(),
            relationships: RelationshipConfig::default(),
            standardize: StandardizeConfig::default(),
            sandbox: SandboxConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlierConfig {
    pub iqr_multiplier: f64,
}

impl Default for OutlierConfig {
    fn default() -> Self {
        Self {
            iqr_multiplier: 1.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    pub missing_weight: f64,
    pub duplicate_weight: f64,
    pub outlier_weight: f64,
    /// Outlier percentage a column must exceed before it is penalised.
    pub outlier_threshold_percent: f64,
    pub inconsistent_type_penalty: f64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            missing_weight: 0.5,
            duplicate_weight: 0.3,
            outlier_weight: 0.2,
            outlier_threshold_percent: 5.0,
            inconsistent_type_penalty: 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyConfig {
    pub missing_ratio: f64,
    pub high_missing_ratio: f64,
    pub constant_min_values: usize,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            missing_ratio: 0.10,
            high_missing_ratio: 0.30,
            constant_min_values: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelationshipConfig {
    pub tolerance: f64,
    pub min_support: f64,
    /// Numeric columns beyond this count are left out of the scan.
    pub max_columns: usize,
}

impl Default for RelationshipConfig {
    fn default() -> Self {
        Self {
            tolerance: 0.01,
            min_support: 0.9,
            max_columns: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StandardizeConfig {
    pub lowercase_max_distinct: usize,
}

impl Default for StandardizeConfig {
    fn default() -> Self {
        Self {
            lowercase_max_distinct: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    pub timeout_ms: u64,
    pub extra_denied_tokens: Vec<String>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5_000,
            extra_denied_tokens: Vec::new(),
        }
    }
}

impl SandboxConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).with_context(|| format!("Opening config file {path:?}"))?;
        Self::from_yaml_str(&raw).with_context(|| format!("Parsing config file {path:?}"))
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }

    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}

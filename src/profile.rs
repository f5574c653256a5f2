use serde::Serialize;

use crate::{
    anomalies::{Anomaly, detect_anomalies},
    config::EngineConfig,
    dataset::Dataset,
    quality::{QualityReport, calculate_quality_score},
    relationships::{Relationship, detect_relationships},
    stats::{ColumnStatistics, get_statistics},
};

/// Everything the `analyze` operation reports about a dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetProfile {
    pub rows: usize,
    pub columns: usize,
    pub statistics: Vec<ColumnStatistics>,
    pub quality: QualityReport,
    pub anomalies: Vec<Anomaly>,
    pub relationships: Vec<Relationship>,
}

pub fn profile_dataset(dataset: &Dataset, config: &EngineConfig) -> DatasetProfile {
    DatasetProfile {
        rows: dataset.row_count(),
        columns: dataset.column_count(),
        statistics: get_statistics(dataset, config.top_values),
        quality: calculate_quality_score(dataset, config),
        anomalies: detect_anomalies(dataset, config),
        relationships: detect_relationships(dataset, config),
    }
}

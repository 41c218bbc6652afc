//! Feature view construction for model scoring.
//!
//! Builds the ordered numeric vector adapters consume from a raw record and
//! a column-config list. Normalization and binning definitions live with the
//! models themselves; this module only resolves raw cells into numbers.

use crate::config::{ColumnConfig, ColumnKind};
use crate::types::record::Record;

/// Turns records into model input features.
///
/// Feature order is the declaration order of final-selected numeric and
/// categorical columns, which must match the order the models were trained
/// with.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    columns: Vec<ColumnConfig>,
    missing_fill: f64,
}

impl FeatureExtractor {
    pub fn new(columns: &[ColumnConfig], missing_fill: f64) -> Self {
        let columns = columns
            .iter()
            .filter(|c| {
                c.final_select && matches!(c.kind, ColumnKind::Numeric | ColumnKind::Categorical)
            })
            .cloned()
            .collect();
        Self {
            columns,
            missing_fill,
        }
    }

    /// Extract the feature vector for one record. Missing, blank, or
    /// unparseable cells resolve to the configured fill value.
    pub fn extract(&self, record: &Record) -> Vec<f64> {
        let mut features = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            let value = record
                .resolve_non_blank(&column.name)
                .and_then(|raw| raw.parse::<f64>().ok())
                .unwrap_or(self.missing_fill);
            features.push(value);
        }
        features
    }

    pub fn feature_count(&self) -> usize {
        self.columns.len()
    }

    pub fn feature_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

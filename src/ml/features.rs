use crate::error::{AppError, Result};
use crate::ml::ingest::{FlightRecord, COL_DAY_OF_WEEK, COL_ORIGIN_AIRPORT_ID};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Column order the classifier is trained on
pub const FEATURE_NAMES: [&str; 2] = [COL_DAY_OF_WEEK, COL_ORIGIN_AIRPORT_ID];

/// Binary delay label
pub type Label = usize;

/// Number of label classes
pub const N_CLASSES: usize = 2;

/// Inputs to the classifier for one flight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub day_of_week: i64,
    pub origin_airport_id: i64,
}

impl FeatureVector {
    pub fn new(day_of_week: i64, origin_airport_id: i64) -> Self {
        Self {
            day_of_week,
            origin_airport_id,
        }
    }

    /// Value of a named feature
    pub fn value(&self, name: &str) -> Option<f64> {
        match name {
            COL_DAY_OF_WEEK => Some(self.day_of_week as f64),
            COL_ORIGIN_AIRPORT_ID => Some(self.origin_airport_id as f64),
            _ => None,
        }
    }

    /// Feature row laid out in `order`
    ///
    /// Fails on a name this vector does not carry, so an artifact trained on
    /// different columns is never fed silently.
    pub fn to_row(&self, order: &[String]) -> Result<Vec<f64>> {
        order
            .iter()
            .map(|name| {
                self.value(name).ok_or_else(|| {
                    AppError::Prediction(format!("unsupported feature in artifact: {}", name))
                })
            })
            .collect()
    }
}

/// Feature matrix and parallel labels
#[derive(Debug, Clone)]
pub struct TrainingDataset {
    /// Feature matrix (n_samples × n_features), columns in `FEATURE_NAMES` order
    pub features: Array2<f64>,

    /// Labels, one per row
    pub labels: Vec<Label>,

    /// Feature names
    pub feature_names: Vec<String>,
}

impl TrainingDataset {
    pub fn n_samples(&self) -> usize {
        self.labels.len()
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    /// Rows selected by index, in the given order
    pub fn select(&self, rows: &[usize]) -> TrainingDataset {
        TrainingDataset {
            features: self.features.select(ndarray::Axis(0), rows),
            labels: rows.iter().map(|&i| self.labels[i]).collect(),
            feature_names: self.feature_names.clone(),
        }
    }

    /// Count of rows per class
    pub fn class_counts(&self) -> [usize; N_CLASSES] {
        let mut counts = [0; N_CLASSES];
        for &label in &self.labels {
            counts[label] += 1;
        }
        counts
    }
}

/// Project cleaned records onto the fixed feature set, preserving row order
pub fn project(records: &[FlightRecord]) -> TrainingDataset {
    let n_features = FEATURE_NAMES.len();
    let mut features = Array2::zeros((records.len(), n_features));
    let mut labels = Vec::with_capacity(records.len());

    for (i, record) in records.iter().enumerate() {
        let vector = FeatureVector::new(record.day_of_week, record.origin_airport_id);
        features[[i, 0]] = vector.day_of_week as f64;
        features[[i, 1]] = vector.origin_airport_id as f64;
        labels.push(record.dep_del15 as Label);
    }

    TrainingDataset {
        features,
        labels,
        feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
    }
}

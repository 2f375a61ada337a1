use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Hyperparameters and split settings for one training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Seed shared by the split and the forest
    pub seed: u64,

    /// Holdout fraction (0.0 - 1.0)
    pub test_size: f64,

    /// Number of trees in the ensemble
    pub n_estimators: usize,

    /// Maximum depth per tree
    pub max_depth: usize,

    /// Minimum samples a node needs before it may split
    pub min_samples_split: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            test_size: 0.2,
            n_estimators: 100,
            max_depth: 10,
            min_samples_split: 5,
        }
    }
}

impl TrainingConfig {
    /// Hyperparameters as recorded in metadata
    pub fn hyperparameters(&self) -> BTreeMap<String, String> {
        [
            ("n_estimators", self.n_estimators.to_string()),
            ("max_depth", self.max_depth.to_string()),
            ("min_samples_split", self.min_samples_split.to_string()),
            ("random_state", self.seed.to_string()),
            ("test_size", self.test_size.to_string()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }
}

/// Model type enumeration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ModelType {
    /// Bagged ensemble of CART trees
    RandomForestClassifier,
}

impl ModelType {
    /// Numeric tag written into the artifact header
    pub fn tag(self) -> u16 {
        match self {
            ModelType::RandomForestClassifier => 1,
        }
    }

    pub fn from_tag(tag: u16) -> Option<Self> {
        match tag {
            1 => Some(ModelType::RandomForestClassifier),
            _ => None,
        }
    }
}

impl std::fmt::Display for ModelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelType::RandomForestClassifier => write!(f, "RandomForestClassifier"),
        }
    }
}

/// Per-class evaluation metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

/// Model evaluation metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    /// Accuracy
    pub accuracy: f64,

    /// Macro-averaged precision
    pub precision: f64,

    /// Macro-averaged recall
    pub recall: f64,

    /// Macro-averaged F1 score
    pub f1_score: f64,

    /// Per-class metrics keyed by label
    pub per_class_metrics: BTreeMap<String, ClassMetrics>,
}

impl ModelMetrics {
    pub fn new() -> Self {
        Self {
            accuracy: 0.0,
            precision: 0.0,
            recall: 0.0,
            f1_score: 0.0,
            per_class_metrics: BTreeMap::new(),
        }
    }

    /// Holdout report for binary labels
    ///
    /// Pairs whose labels are not 0 or 1 are skipped.
    pub fn calculate(y_true: &[usize], y_pred: &[usize]) -> Self {
        // confusion[actual][predicted]
        let mut confusion = [[0usize; 2]; 2];
        for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
            if t < 2 && p < 2 {
                confusion[t][p] += 1;
            }
        }

        let total: usize = confusion.iter().flatten().sum();
        if total == 0 {
            return Self::new();
        }

        let ratio = |num: usize, den: usize| if den > 0 { num as f64 / den as f64 } else { 0.0 };

        let per_class: BTreeMap<String, ClassMetrics> = (0..2)
            .map(|class| {
                let other = 1 - class;
                let hits = confusion[class][class];
                let precision = ratio(hits, hits + confusion[other][class]);
                let recall = ratio(hits, hits + confusion[class][other]);
                let f1_score = if precision + recall > 0.0 {
                    2.0 * precision * recall / (precision + recall)
                } else {
                    0.0
                };
                let metrics = ClassMetrics {
                    precision,
                    recall,
                    f1_score,
                    support: confusion[class].iter().sum(),
                };
                (class.to_string(), metrics)
            })
            .collect();

        let macro_avg = |f: fn(&ClassMetrics) -> f64| per_class.values().map(f).sum::<f64>() / 2.0;

        Self {
            accuracy: ratio(confusion[0][0] + confusion[1][1], total),
            precision: macro_avg(|m| m.precision),
            recall: macro_avg(|m| m.recall),
            f1_score: macro_avg(|m| m.f1_score),
            per_class_metrics: per_class,
        }
    }
}

impl Default for ModelMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// One entry of the feature importance ranking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

/// Companion record persisted next to the model blob
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Feature names in the order the classifier consumes them
    pub features: Vec<String>,

    /// Model kind tag
    pub model_type: ModelType,

    /// Holdout accuracy
    pub accuracy: f64,

    /// Human readable summary
    pub description: String,

    /// Artifact format version this record was written with
    pub format_version: u16,

    /// Training timestamp
    pub trained_at: chrono::DateTime<chrono::Utc>,

    /// Rows in the training partition
    pub n_training_samples: usize,

    /// Rows in the holdout partition
    pub n_test_samples: usize,

    /// Hyperparameters
    pub hyperparameters: BTreeMap<String, String>,

    /// Importance ranking, descending
    pub feature_importance: Vec<FeatureImportance>,

    /// Holdout classification report
    pub metrics: ModelMetrics,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_perfect_predictions() {
        let y = vec![0, 1, 1, 0];
        let metrics = ModelMetrics::calculate(&y, &y);
        assert_eq!(metrics.accuracy, 1.0);
        assert_eq!(metrics.f1_score, 1.0);
        assert_eq!(metrics.per_class_metrics["1"].support, 2);
    }

    #[test]
    fn test_metrics_mixed_predictions() {
        let y_true = vec![0, 0, 0, 1];
        let y_pred = vec![0, 0, 1, 1];
        let metrics = ModelMetrics::calculate(&y_true, &y_pred);

        assert_eq!(metrics.accuracy, 0.75);
        let class1 = &metrics.per_class_metrics["1"];
        assert_eq!(class1.precision, 0.5);
        assert_eq!(class1.recall, 1.0);
        let class0 = &metrics.per_class_metrics["0"];
        assert_eq!(class0.precision, 1.0);
        assert!((class0.recall - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_metrics_macro_averages() {
        // One true positive, one false negative, two true negatives
        let y_true = vec![1, 1, 0, 0];
        let y_pred = vec![1, 0, 0, 0];
        let metrics = ModelMetrics::calculate(&y_true, &y_pred);

        let class0 = &metrics.per_class_metrics["0"];
        let class1 = &metrics.per_class_metrics["1"];
        assert_eq!(class0.support, 2);
        assert_eq!(class1.support, 2);
        assert!((class0.precision - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(class1.recall, 0.5);
        assert!((metrics.precision - (class0.precision + class1.precision) / 2.0).abs() < 1e-12);
        assert!((metrics.f1_score - (class0.f1_score + class1.f1_score) / 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_metrics_missing_class_scores_zero() {
        let metrics = ModelMetrics::calculate(&[0, 0, 1], &[0, 0, 0]);
        let class1 = &metrics.per_class_metrics["1"];
        assert_eq!(class1.precision, 0.0);
        assert_eq!(class1.f1_score, 0.0);
        assert_eq!(class1.support, 1);
    }

    #[test]
    fn test_metrics_empty_input() {
        let metrics = ModelMetrics::calculate(&[], &[]);
        assert_eq!(metrics, ModelMetrics::new());
    }

    #[test]
    fn test_model_type_tag_round_trip() {
        let tag = ModelType::RandomForestClassifier.tag();
        assert_eq!(ModelType::from_tag(tag), Some(ModelType::RandomForestClassifier));
        assert_eq!(ModelType::from_tag(99), None);
        assert_eq!(
            ModelType::RandomForestClassifier.to_string(),
            "RandomForestClassifier"
        );
    }

    #[test]
    fn test_hyperparameters_recorded() {
        let params = TrainingConfig::default().hyperparameters();
        assert_eq!(params["n_estimators"], "100");
        assert_eq!(params["max_depth"], "10");
        assert_eq!(params["min_samples_split"], "5");
        assert_eq!(params["random_state"], "42");
    }
}

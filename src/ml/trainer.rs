use crate::error::{AppError, Result};
use crate::ml::classifier::ProbabilisticClassifier;
use crate::ml::features::{TrainingDataset, N_CLASSES};
use crate::ml::forest::RandomForest;
use crate::ml::models::{FeatureImportance, ModelMetrics, TrainingConfig};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{debug, info};

/// Result of a successful training run
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    /// Fitted classifier
    pub model: RandomForest,

    /// Holdout classification report
    pub metrics: ModelMetrics,

    /// Importance ranking, descending
    pub feature_importance: Vec<FeatureImportance>,

    /// Rows per partition
    pub n_train: usize,
    pub n_test: usize,
}

/// Fits and evaluates the forest under one explicit configuration
pub struct Trainer {
    config: TrainingConfig,
}

impl Trainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Stratified shuffle split into (train, test)
    ///
    /// Each class is shuffled independently with the configured seed and
    /// contributes `round(count * test_size)` rows to the holdout partition.
    /// Both partitions keep the original row order. Fails if either
    /// partition is empty or misses a class.
    pub fn split(&self, dataset: &TrainingDataset) -> Result<(TrainingDataset, TrainingDataset)> {
        let test_size = self.config.test_size;
        if !(test_size > 0.0 && test_size < 1.0) {
            return Err(AppError::Configuration(format!(
                "test_size must be in (0, 1), got {}",
                test_size
            )));
        }

        let mut by_class: Vec<Vec<usize>> = vec![Vec::new(); N_CLASSES];
        for (row, &label) in dataset.labels.iter().enumerate() {
            by_class[label].push(row);
        }

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut train_rows = Vec::new();
        let mut test_rows = Vec::new();

        for (class, rows) in by_class.iter_mut().enumerate() {
            if rows.is_empty() {
                return Err(AppError::Training(format!(
                    "class {} has no samples; cannot stratify",
                    class
                )));
            }

            rows.shuffle(&mut rng);
            let n_test = (rows.len() as f64 * test_size).round() as usize;
            let n_test = n_test.min(rows.len());
            if n_test == 0 || n_test == rows.len() {
                return Err(AppError::Training(format!(
                    "class {} with {} samples leaves a partition without it",
                    class,
                    rows.len()
                )));
            }

            test_rows.extend_from_slice(&rows[..n_test]);
            train_rows.extend_from_slice(&rows[n_test..]);
        }

        train_rows.sort_unstable();
        test_rows.sort_unstable();

        Ok((dataset.select(&train_rows), dataset.select(&test_rows)))
    }

    /// Split, fit, and evaluate
    pub fn train(&self, dataset: &TrainingDataset) -> Result<TrainingOutcome> {
        let (train, test) = self.split(dataset)?;

        info!(
            train_rows = train.n_samples(),
            test_rows = test.n_samples(),
            "Data split"
        );
        log_distribution("train", &train);
        log_distribution("test", &test);

        info!(
            n_estimators = self.config.n_estimators,
            max_depth = self.config.max_depth,
            min_samples_split = self.config.min_samples_split,
            seed = self.config.seed,
            "Training random forest"
        );
        let model = RandomForest::fit(&train.features, &train.labels, &self.config)?;
        debug!(
            nodes = model.trees().iter().map(|t| t.node_count()).sum::<usize>(),
            "Forest grown"
        );

        let predictions = model.classify_batch(&test.features)?;
        let metrics = ModelMetrics::calculate(&test.labels, &predictions);
        let feature_importance = rank_importance(&dataset.feature_names, model.feature_importances());

        info!(
            accuracy = metrics.accuracy,
            "Model accuracy: {:.4} ({:.2}%)",
            metrics.accuracy,
            metrics.accuracy * 100.0
        );
        for (class, m) in &metrics.per_class_metrics {
            info!(
                class = %class,
                precision = m.precision,
                recall = m.recall,
                f1_score = m.f1_score,
                support = m.support,
                "Classification report"
            );
        }
        for entry in &feature_importance {
            info!(feature = %entry.feature, importance = entry.importance, "Feature importance");
        }

        Ok(TrainingOutcome {
            model,
            metrics,
            feature_importance,
            n_train: train.n_samples(),
            n_test: test.n_samples(),
        })
    }
}

/// Pair importances with names and sort descending; ties keep column order
pub fn rank_importance(names: &[String], importances: &[f64]) -> Vec<FeatureImportance> {
    let mut ranked: Vec<FeatureImportance> = names
        .iter()
        .zip(importances.iter())
        .map(|(feature, &importance)| FeatureImportance {
            feature: feature.clone(),
            importance,
        })
        .collect();
    ranked.sort_by(|a, b| b.importance.total_cmp(&a.importance));
    ranked
}

fn log_distribution(partition: &str, dataset: &TrainingDataset) {
    let counts = dataset.class_counts();
    let total = dataset.n_samples().max(1) as f64;
    info!(
        partition,
        on_time = counts[0],
        delayed = counts[1],
        delayed_ratio = counts[1] as f64 / total,
        "Class distribution"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn dataset(n: usize, positive_every: usize) -> TrainingDataset {
        let mut features = Array2::zeros((n, 2));
        let mut labels = Vec::with_capacity(n);
        for i in 0..n {
            let day = (i % 7 + 1) as f64;
            features[[i, 0]] = day;
            features[[i, 1]] = (10_000 + i % 5) as f64;
            labels.push(usize::from(i % positive_every == 0));
        }
        TrainingDataset {
            features,
            labels,
            feature_names: vec!["DayOfWeek".to_string(), "OriginAirportID".to_string()],
        }
    }

    fn quick_config() -> TrainingConfig {
        TrainingConfig {
            n_estimators: 8,
            max_depth: 5,
            min_samples_split: 2,
            ..Default::default()
        }
    }

    #[test]
    fn test_split_is_stratified() {
        let data = dataset(100, 4);
        let (train, test) = Trainer::new(quick_config()).split(&data).unwrap();

        assert_eq!(train.n_samples() + test.n_samples(), 100);
        assert_eq!(test.n_samples(), 20);
        assert_eq!(test.class_counts(), [15, 5]);
        assert_eq!(train.class_counts(), [60, 20]);
    }

    #[test]
    fn test_split_is_reproducible() {
        let data = dataset(100, 3);
        let trainer = Trainer::new(quick_config());
        let (a_train, a_test) = trainer.split(&data).unwrap();
        let (b_train, b_test) = trainer.split(&data).unwrap();

        assert_eq!(a_train.features, b_train.features);
        assert_eq!(a_test.labels, b_test.labels);
        assert_eq!(a_test.features, b_test.features);
    }

    #[test]
    fn test_different_seed_changes_split() {
        let data = dataset(200, 3);
        let (_, a) = Trainer::new(quick_config()).split(&data).unwrap();
        let (_, b) = Trainer::new(TrainingConfig {
            seed: 1234,
            ..quick_config()
        })
        .split(&data)
        .unwrap();

        assert_ne!(a.features, b.features);
    }

    #[test]
    fn test_missing_class_is_fatal() {
        let mut data = dataset(50, 2);
        data.labels = vec![0; 50];
        let err = Trainer::new(quick_config()).split(&data).unwrap_err();
        assert!(matches!(err, AppError::Training(_)));
    }

    #[test]
    fn test_tiny_class_is_fatal() {
        let mut data = dataset(50, 2);
        data.labels = vec![0; 50];
        data.labels[3] = 1;
        assert!(Trainer::new(quick_config()).train(&data).is_err());
    }

    #[test]
    fn test_invalid_test_size() {
        let data = dataset(50, 2);
        let config = TrainingConfig {
            test_size: 1.5,
            ..quick_config()
        };
        let err = Trainer::new(config).split(&data).unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)));
    }

    #[test]
    fn test_train_reports_metrics_and_importance() {
        let data = dataset(140, 3);
        let outcome = Trainer::new(quick_config()).train(&data).unwrap();

        assert!((0.0..=1.0).contains(&outcome.metrics.accuracy));
        assert_eq!(outcome.n_train + outcome.n_test, 140);
        assert_eq!(outcome.feature_importance.len(), 2);

        let total: f64 = outcome.feature_importance.iter().map(|f| f.importance).sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert!(outcome.feature_importance[0].importance >= outcome.feature_importance[1].importance);
    }

    #[test]
    fn test_rank_importance_descending() {
        let names = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let ranked = rank_importance(&names, &[0.2, 0.5, 0.3]);
        let order: Vec<&str> = ranked.iter().map(|f| f.feature.as_str()).collect();
        assert_eq!(order, vec!["b", "c", "a"]);
    }
}

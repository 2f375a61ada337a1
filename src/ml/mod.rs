/// Machine learning core for flight delay prediction
///
/// This module provides:
/// - Flight record ingestion from CSV
/// - Feature projection (day of week, origin airport)
/// - A seeded random forest classifier
/// - Stratified split, fit and holdout evaluation
/// - Versioned artifact persistence
/// - The end-to-end training pipeline

pub mod artifact;
pub mod classifier;
pub mod features;
pub mod forest;
pub mod ingest;
pub mod models;
pub mod pipeline;
pub mod trainer;

pub use artifact::{ModelArtifact, FORMAT_VERSION};
pub use classifier::{ClassProbabilities, ProbabilisticClassifier};
pub use features::{FeatureVector, Label, TrainingDataset, FEATURE_NAMES};
pub use forest::RandomForest;
pub use ingest::{load_flights, read_flights, FlightRecord};
pub use models::{
    ClassMetrics, FeatureImportance, ModelMetadata, ModelMetrics, ModelType, TrainingConfig,
};
pub use pipeline::{run_training, ExamplePrediction, TrainingReport};
pub use trainer::{Trainer, TrainingOutcome};

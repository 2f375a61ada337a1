//! End-to-end training run: raw flights in, model artifact and airport
//! table out.

use crate::airports::AirportDirectory;
use crate::config::{ArtifactsConfig, TrainingSettings};
use crate::error::Result;
use crate::ml::artifact::{ModelArtifact, FORMAT_VERSION};
use crate::ml::classifier::ProbabilisticClassifier;
use crate::ml::features::{self, FeatureVector};
use crate::ml::ingest::load_flights;
use crate::ml::models::{ModelMetadata, ModelMetrics, ModelType};
use crate::ml::trainer::Trainer;
use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

pub const MODEL_DESCRIPTION: &str =
    "Predicts probability of flight delay >15 minutes based on day of week and airport";

/// (day_of_week, airport_id) pairs checked after every run
const EXAMPLE_INPUTS: [(i64, i64); 3] = [(1, 13930), (5, 12478), (7, 12892)];

/// Delay probability for one example input
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExamplePrediction {
    pub day_of_week: i64,
    pub airport_id: i64,
    pub airport_name: String,
    pub delay_probability: f64,
}

/// Summary of a finished training run
#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub n_records: usize,
    pub n_airports: usize,
    pub accuracy: f64,
    pub metrics: ModelMetrics,
    pub metadata: ModelMetadata,
    pub examples: Vec<ExamplePrediction>,
}

/// Ingest, project, train, persist
///
/// Both artifacts are written only after training succeeds.
pub fn run_training(settings: &TrainingSettings, artifacts: &ArtifactsConfig) -> Result<TrainingReport> {
    info!(path = %settings.data_path.display(), "Loading flight data");
    let flights = load_flights(&settings.data_path)?;

    let dataset = features::project(&flights);
    info!(
        rows = dataset.n_samples(),
        features = ?dataset.feature_names,
        "Features projected"
    );

    let config = settings.to_training_config();
    let outcome = Trainer::new(config.clone()).train(&dataset)?;

    let metadata = ModelMetadata {
        features: dataset.feature_names.clone(),
        model_type: ModelType::RandomForestClassifier,
        accuracy: outcome.metrics.accuracy,
        description: MODEL_DESCRIPTION.to_string(),
        format_version: FORMAT_VERSION,
        trained_at: Utc::now(),
        n_training_samples: outcome.n_train,
        n_test_samples: outcome.n_test,
        hyperparameters: config.hyperparameters(),
        feature_importance: outcome.feature_importance.clone(),
        metrics: outcome.metrics.clone(),
    };

    let directory = AirportDirectory::from_flights(&flights);
    let examples = predict_examples(&outcome.model, &metadata.features, &directory);

    let artifact = ModelArtifact::new(outcome.model, metadata);
    artifact.save(&artifacts.model_path, &artifacts.metadata_path)?;
    directory.save_csv(&artifacts.airports_path)?;

    info!(
        records = flights.len(),
        airports = directory.len(),
        accuracy = artifact.metadata.accuracy,
        "Training complete"
    );

    Ok(TrainingReport {
        n_records: flights.len(),
        n_airports: directory.len(),
        accuracy: artifact.metadata.accuracy,
        metrics: outcome.metrics,
        metadata: artifact.metadata,
        examples,
    })
}

fn predict_examples(
    classifier: &dyn ProbabilisticClassifier,
    feature_order: &[String],
    directory: &AirportDirectory,
) -> Vec<ExamplePrediction> {
    let mut examples = Vec::new();
    for (day_of_week, airport_id) in EXAMPLE_INPUTS {
        let Some(airport) = directory.get(airport_id) else {
            continue;
        };

        let result = FeatureVector::new(day_of_week, airport_id)
            .to_row(feature_order)
            .and_then(|row| classifier.classify_proba(&row));

        match result {
            Ok(p) => {
                info!(
                    day_of_week,
                    airport = %airport.name,
                    "Example: {:.2}% chance of delay",
                    p.delay * 100.0
                );
                examples.push(ExamplePrediction {
                    day_of_week,
                    airport_id,
                    airport_name: airport.name.clone(),
                    delay_probability: p.delay,
                });
            }
            Err(e) => warn!(day_of_week, airport_id, error = %e, "Example prediction failed"),
        }
    }
    examples
}

//! Shared fixtures for integration tests
//!
//! Builds a small synthetic flight dataset, trains on it inside a temporary
//! directory, and provides a counting stub classifier.

#![allow(dead_code)]

use flight_delay_predictor::airports::{AirportDirectory, AirportRecord};
use flight_delay_predictor::config::{ArtifactsConfig, TrainingSettings};
use flight_delay_predictor::error::Result;
use flight_delay_predictor::ml::artifact::FORMAT_VERSION;
use flight_delay_predictor::ml::classifier::{ClassProbabilities, ProbabilisticClassifier};
use flight_delay_predictor::ml::features::FEATURE_NAMES;
use flight_delay_predictor::ml::models::{ModelMetadata, ModelMetrics, ModelType};
use flight_delay_predictor::ml::pipeline::{run_training, TrainingReport};
use flight_delay_predictor::service::{PredictionService, ServiceContext};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// (id, name, city, state)
pub const ORIGINS: [(i64, &str, &str, &str); 4] = [
    (13930, "Chicago O'Hare International", "Chicago", "IL"),
    (12478, "John F. Kennedy International", "New York", "NY"),
    (12892, "Los Angeles International", "Los Angeles", "CA"),
    (10397, "Hartsfield-Jackson Atlanta International", "Atlanta", "GA"),
];

/// Only ever appears as a destination
pub const SEATTLE: (i64, &str, &str, &str) = (14747, "Seattle/Tacoma International", "Seattle", "WA");

const HEADER: &str = "Year,Month,DayofMonth,DayOfWeek,Carrier,OriginAirportID,OriginAirportName,OriginCity,OriginState,DestAirportID,DestAirportName,DestCity,DestState,CRSDepTime,DepDelay,DepDel15";

/// Deterministic flights: Chicago late in the week is mostly delayed,
/// everything else is delayed roughly one time in six
pub fn flights_csv() -> String {
    let mut lines = vec![HEADER.to_string()];
    let mut n = 0usize;

    for rep in 0..6 {
        for (o, origin) in ORIGINS.iter().enumerate() {
            for day in 1..=7i64 {
                let dest = if (day as usize + rep) % 3 == 0 {
                    SEATTLE
                } else {
                    ORIGINS[(o + 1) % ORIGINS.len()]
                };
                let delayed = if origin.0 == 13930 && day >= 5 {
                    rep != 0
                } else {
                    n % 6 == 0
                };
                lines.push(format!(
                    "2013,{},{},{},DL,{},{},{},{},{},{},{},{},{},{},{}",
                    rep + 1,
                    day + 1,
                    day,
                    origin.0,
                    origin.1,
                    origin.2,
                    origin.3,
                    dest.0,
                    dest.1,
                    dest.2,
                    dest.3,
                    900 + day * 10,
                    if delayed { 25 } else { -3 },
                    u8::from(delayed)
                ));
                n += 1;
            }
        }
    }

    lines.join("\n") + "\n"
}

pub fn write_flights(dir: &Path) -> PathBuf {
    let path = dir.join("data/flights.csv");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, flights_csv()).unwrap();
    path
}

pub fn artifacts_in(dir: &Path) -> ArtifactsConfig {
    ArtifactsConfig {
        model_path: dir.join("model/flight_delay_model.bin"),
        metadata_path: dir.join("model/model_info.json"),
        airports_path: dir.join("data/airports.csv"),
    }
}

pub fn quick_settings(data_path: PathBuf) -> TrainingSettings {
    TrainingSettings {
        data_path,
        seed: 42,
        test_size: 0.2,
        n_estimators: 12,
        max_depth: 6,
        min_samples_split: 2,
    }
}

/// A completed training run living in its own temporary directory
pub struct TrainedFixture {
    pub dir: TempDir,
    pub artifacts: ArtifactsConfig,
    pub settings: TrainingSettings,
    pub report: TrainingReport,
}

pub fn train_fixture() -> TrainedFixture {
    let dir = tempfile::tempdir().unwrap();
    let settings = quick_settings(write_flights(dir.path()));
    let artifacts = artifacts_in(dir.path());
    let report = run_training(&settings, &artifacts).unwrap();

    TrainedFixture {
        dir,
        artifacts,
        settings,
        report,
    }
}

/// Returns fixed probabilities and counts invocations
pub struct CountingClassifier {
    probabilities: ClassProbabilities,
    calls: AtomicUsize,
}

impl CountingClassifier {
    pub fn new(no_delay: f64, delay: f64) -> Arc<Self> {
        Arc::new(Self {
            probabilities: ClassProbabilities::new(no_delay, delay),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ProbabilisticClassifier for CountingClassifier {
    fn classify_proba(&self, _features: &[f64]) -> Result<ClassProbabilities> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.probabilities)
    }

    fn model_type(&self) -> ModelType {
        ModelType::RandomForestClassifier
    }
}

pub fn stub_metadata() -> ModelMetadata {
    ModelMetadata {
        features: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
        model_type: ModelType::RandomForestClassifier,
        accuracy: 0.8123,
        description: "stub model".to_string(),
        format_version: FORMAT_VERSION,
        trained_at: chrono::Utc::now(),
        n_training_samples: 80,
        n_test_samples: 20,
        hyperparameters: BTreeMap::new(),
        feature_importance: Vec::new(),
        metrics: ModelMetrics::new(),
    }
}

pub fn stub_directory() -> AirportDirectory {
    let records = ORIGINS
        .iter()
        .chain(std::iter::once(&SEATTLE))
        .map(|&(id, name, city, state)| AirportRecord {
            id,
            name: name.to_string(),
            city: city.to_string(),
            state: state.to_string(),
        })
        .collect();
    AirportDirectory::from_records(records).unwrap()
}

/// Ready service backed by a counting stub
pub fn stub_service(no_delay: f64, delay: f64) -> (PredictionService, Arc<CountingClassifier>) {
    let classifier = CountingClassifier::new(no_delay, delay);
    let service = PredictionService::ready(ServiceContext::new(
        classifier.clone(),
        stub_metadata(),
        stub_directory(),
    ));
    (service, classifier)
}

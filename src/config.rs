use crate::ml::models::TrainingConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,

    /// Artifact locations shared by training and serving
    pub artifacts: ArtifactsConfig,

    /// Training run configuration
    pub training: TrainingSettings,

    /// Observability configuration
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("FDP_CONFIG_PATH").unwrap_or_else(|_| "config/local.toml".to_string());

        config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            // Override with config file if it exists
            .add_source(config::File::with_name(&config_path).required(false))
            // Override with environment variables (prefix: FDP_)
            .add_source(
                config::Environment::with_prefix("FDP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            artifacts: ArtifactsConfig::default(),
            training: TrainingSettings::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_http_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_http_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactsConfig {
    /// Serialized classifier blob
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,

    /// Companion metadata record
    #[serde(default = "default_metadata_path")]
    pub metadata_path: PathBuf,

    /// Flat airports table
    #[serde(default = "default_airports_path")]
    pub airports_path: PathBuf,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            metadata_path: default_metadata_path(),
            airports_path: default_airports_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingSettings {
    /// Raw flight records (CSV)
    #[serde(default = "default_data_path")]
    pub data_path: PathBuf,

    /// Seed for the split and the forest
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Holdout fraction
    #[serde(default = "default_test_size")]
    pub test_size: f64,

    /// Number of trees
    #[serde(default = "default_n_estimators")]
    pub n_estimators: usize,

    /// Depth cap per tree
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Minimum samples required to split a node
    #[serde(default = "default_min_samples_split")]
    pub min_samples_split: usize,
}

impl TrainingSettings {
    /// Explicit hyperparameter record handed to the trainer
    pub fn to_training_config(&self) -> TrainingConfig {
        TrainingConfig {
            seed: self.seed,
            test_size: self.test_size,
            n_estimators: self.n_estimators,
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
        }
    }
}

impl Default for TrainingSettings {
    fn default() -> Self {
        Self {
            data_path: default_data_path(),
            seed: default_seed(),
            test_size: default_test_size(),
            n_estimators: default_n_estimators(),
            max_depth: default_max_depth(),
            min_samples_split: default_min_samples_split(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logs: bool,

    /// Service name
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
            service_name: default_service_name(),
        }
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    5000
}

fn default_model_path() -> PathBuf {
    PathBuf::from("model/flight_delay_model.bin")
}

fn default_metadata_path() -> PathBuf {
    PathBuf::from("model/model_info.json")
}

fn default_airports_path() -> PathBuf {
    PathBuf::from("data/airports.csv")
}

fn default_data_path() -> PathBuf {
    PathBuf::from("data/flights.csv")
}

fn default_seed() -> u64 {
    42
}

fn default_test_size() -> f64 {
    0.2
}

fn default_n_estimators() -> usize {
    100
}

fn default_max_depth() -> usize {
    10
}

fn default_min_samples_split() -> usize {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    "flight-delay-predictor".to_string()
}

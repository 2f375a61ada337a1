//! Flight Delay Predictor
//!
//! Offline training of a random forest over historical flight records, and
//! a JSON service that answers "how likely is a departure delay of more than
//! 15 minutes on this day of week at this origin airport".
//!
//! # Layout
//!
//! - [`ml`]: ingestion, features, forest, training, artifacts, pipeline
//! - [`airports`]: deduplicated airport directory
//! - [`service`]: request validation and response shaping
//! - [`api`]: axum router over the service

pub mod airports;
pub mod api;
pub mod config;
pub mod error;
pub mod ml;
pub mod observability;
pub mod service;

pub use error::{AppError, Result, ValidationError};
pub use service::{PredictRequest, PredictionResponse, PredictionService, ServiceContext};

//! Request validation, classification and response shaping.
//!
//! A [`PredictionService`] is either unready (no artifacts) or ready with an
//! immutable [`ServiceContext`] built once at startup. Nothing on the request
//! path mutates the context, so clones of the service can be shared freely
//! across concurrent handlers.

use crate::airports::{AirportDirectory, AirportRecord};
use crate::config::ArtifactsConfig;
use crate::error::{AppError, Result, ValidationError};
use crate::ml::artifact::ModelArtifact;
use crate::ml::classifier::{ClassProbabilities, ProbabilisticClassifier};
use crate::ml::features::FeatureVector;
use crate::ml::models::ModelMetadata;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

const PROBABILITY_TOLERANCE: f64 = 1e-6;

const DAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// Day name for 1 (Monday) through 7 (Sunday)
pub fn day_name(day_of_week: i64) -> Option<&'static str> {
    if (1..=7).contains(&day_of_week) {
        Some(DAY_NAMES[(day_of_week - 1) as usize])
    } else {
        None
    }
}

/// Loaded artifacts shared read-only by every request
pub struct ServiceContext {
    classifier: Arc<dyn ProbabilisticClassifier>,
    metadata: ModelMetadata,
    directory: AirportDirectory,
}

impl ServiceContext {
    pub fn new(
        classifier: Arc<dyn ProbabilisticClassifier>,
        metadata: ModelMetadata,
        directory: AirportDirectory,
    ) -> Self {
        Self {
            classifier,
            metadata,
            directory,
        }
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    pub fn directory(&self) -> &AirportDirectory {
        &self.directory
    }
}

/// Raw prediction request; fields stay untyped until validated
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PredictRequest {
    #[serde(default)]
    pub day_of_week: Option<Value>,
    #[serde(default)]
    pub airport_id: Option<Value>,
}

impl PredictRequest {
    pub fn new(day_of_week: i64, airport_id: i64) -> Self {
        Self {
            day_of_week: Some(Value::from(day_of_week)),
            airport_id: Some(Value::from(airport_id)),
        }
    }

    /// Interpret a JSON body; anything but an object is an empty body
    pub fn from_json(body: &Value) -> Result<Self> {
        if !body.is_object() {
            return Err(ValidationError::EmptyBody.into());
        }
        serde_json::from_value(body.clone()).map_err(|_| ValidationError::EmptyBody.into())
    }
}

/// Confidence tier derived from the confidence percentage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

impl ConfidenceLevel {
    /// High above 80%, Medium above 60%, Low otherwise
    pub fn from_percent(confidence_percent: f64) -> Self {
        if confidence_percent > 80.0 {
            ConfidenceLevel::High
        } else if confidence_percent > 60.0 {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionInput {
    pub day_of_week: i64,
    pub day_name: String,
    pub airport_id: i64,
    pub airport_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interpretation {
    pub message: String,
    pub confidence_level: ConfidenceLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub delay_probability: f64,
    pub delay_chance_percent: f64,
    pub confidence_percent: f64,
    pub no_delay_probability: f64,
    pub input: PredictionInput,
    pub interpretation: Interpretation,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub model_loaded: bool,
    pub airports_loaded: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AirportListResponse {
    pub airports: Vec<AirportRecord>,
    pub total_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AirportResponse {
    pub airport: AirportRecord,
}

/// Prediction service over immutable, shared artifacts
#[derive(Clone, Default)]
pub struct PredictionService {
    context: Option<Arc<ServiceContext>>,
}

impl PredictionService {
    /// Service that rejects every request until artifacts exist
    pub fn unready() -> Self {
        Self { context: None }
    }

    pub fn ready(context: ServiceContext) -> Self {
        Self {
            context: Some(Arc::new(context)),
        }
    }

    /// Load the model artifact and airport directory; any failure is fatal
    pub fn load(artifacts: &ArtifactsConfig) -> Result<Self> {
        let artifact = ModelArtifact::load(&artifacts.model_path, &artifacts.metadata_path)?;
        let directory = AirportDirectory::load_csv(&artifacts.airports_path)?;

        info!(
            model_type = %artifact.metadata.model_type,
            airports = directory.len(),
            "Prediction service ready"
        );

        Ok(Self::ready(ServiceContext::new(
            Arc::new(artifact.model),
            artifact.metadata,
            directory,
        )))
    }

    pub fn is_ready(&self) -> bool {
        self.context.is_some()
    }

    pub fn context(&self) -> Option<&ServiceContext> {
        self.context.as_deref()
    }

    pub fn health(&self) -> HealthStatus {
        HealthStatus {
            status: "healthy".to_string(),
            model_loaded: self.is_ready(),
            airports_loaded: self.is_ready(),
        }
    }

    fn ready_context(&self, reason: &str) -> Result<&ServiceContext> {
        self.context
            .as_deref()
            .ok_or_else(|| AppError::ServiceUnavailable(reason.to_string()))
    }

    /// Validate, classify, and shape the response
    pub fn predict(&self, request: &PredictRequest) -> Result<PredictionResponse> {
        let ctx = self.ready_context("Model not loaded")?;

        let (day_of_week, airport_id) = validate(request, &ctx.directory)?;
        let airport = ctx.directory.lookup(airport_id)?;

        let vector = FeatureVector::new(day_of_week, airport_id);
        let row = vector.to_row(&ctx.metadata.features)?;
        let probabilities = ctx.classifier.classify_proba(&row)?;
        check_distribution(&probabilities)?;

        let delay_probability = probabilities.delay;
        let no_delay_probability = probabilities.no_delay;
        let confidence_percent = probabilities.max() * 100.0;
        let delay_chance_percent = delay_probability * 100.0;
        let day = day_name(day_of_week).unwrap_or("Unknown");

        debug!(
            day_of_week,
            airport_id,
            delay_probability,
            confidence_percent,
            "Prediction computed"
        );

        Ok(PredictionResponse {
            delay_probability,
            delay_chance_percent,
            confidence_percent,
            no_delay_probability,
            input: PredictionInput {
                day_of_week,
                day_name: day.to_string(),
                airport_id,
                airport_name: airport.name.clone(),
            },
            interpretation: Interpretation {
                message: format!(
                    "There is a {:.2}% chance of delay on {} at {}",
                    delay_chance_percent, day, airport.name
                ),
                confidence_level: ConfidenceLevel::from_percent(confidence_percent),
            },
        })
    }

    /// All airports, alphabetical by name
    pub fn list_airports(&self) -> Result<AirportListResponse> {
        let ctx = self.ready_context("Airports data not loaded")?;
        let airports: Vec<AirportRecord> = ctx.directory.list().into_iter().cloned().collect();
        Ok(AirportListResponse {
            total_count: airports.len(),
            airports,
        })
    }

    /// One airport by id
    pub fn get_airport(&self, id: i64) -> Result<AirportResponse> {
        let ctx = self.ready_context("Airports data not loaded")?;
        Ok(AirportResponse {
            airport: ctx.directory.lookup(id)?.clone(),
        })
    }
}

/// Checks run in order; the first failure is reported
fn validate(request: &PredictRequest, directory: &AirportDirectory) -> Result<(i64, i64)> {
    let day = request
        .day_of_week
        .as_ref()
        .filter(|v| !v.is_null())
        .ok_or(ValidationError::MissingField("day_of_week"))?;
    let airport = request
        .airport_id
        .as_ref()
        .filter(|v| !v.is_null())
        .ok_or(ValidationError::MissingField("airport_id"))?;

    let day_of_week = as_integer(day).ok_or(ValidationError::InvalidType("day_of_week"))?;
    let airport_id = as_integer(airport).ok_or(ValidationError::InvalidType("airport_id"))?;

    if !(1..=7).contains(&day_of_week) {
        return Err(ValidationError::DayOutOfRange(day_of_week).into());
    }
    let airport_id = i64::try_from(airport_id)
        .ok()
        .filter(|id| directory.contains(*id))
        .ok_or(ValidationError::UnknownAirport(airport_id))?;

    Ok((day_of_week as i64, airport_id))
}

/// Any JSON integer, including unsigned values past `i64::MAX`
fn as_integer(value: &Value) -> Option<i128> {
    value
        .as_i64()
        .map(i128::from)
        .or_else(|| value.as_u64().map(i128::from))
}

fn check_distribution(p: &ClassProbabilities) -> Result<()> {
    let in_range = |v: f64| (0.0..=1.0).contains(&v);
    if !in_range(p.delay) || !in_range(p.no_delay) {
        return Err(AppError::Prediction(format!(
            "probabilities out of range: {:?}",
            p
        )));
    }
    if (p.delay + p.no_delay - 1.0).abs() > PROBABILITY_TOLERANCE {
        return Err(AppError::Prediction(format!(
            "probabilities do not sum to 1: {:?}",
            p
        )));
    }
    Ok(())
}

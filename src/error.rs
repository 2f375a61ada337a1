use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Per-request input failures, reported in the order they are checked
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Request body absent or not a JSON object
    #[error("No JSON data provided")]
    EmptyBody,

    /// A required field is absent
    #[error("Missing required fields: day_of_week and airport_id (missing {0})")]
    MissingField(&'static str),

    /// A field is present but not an integer
    #[error("{0} must be an integer")]
    InvalidType(&'static str),

    /// day_of_week outside [1, 7]
    #[error("day_of_week must be an integer between 1 (Monday) and 7 (Sunday), got {0}")]
    DayOutOfRange(i128),

    /// airport_id not present in the airport directory
    #[error("Airport ID {0} not found in database")]
    UnknownAirport(i128),
}

impl ValidationError {
    /// Stable, machine-readable category of the violation
    pub fn kind(&self) -> &'static str {
        match self {
            ValidationError::EmptyBody | ValidationError::MissingField(_) => "missing field",
            ValidationError::InvalidType(_) => "type",
            ValidationError::DayOutOfRange(_) => "range",
            ValidationError::UnknownAirport(_) => "unknown airport",
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Training data source absent or unparsable
    #[error("Failed to load flight data: {0}")]
    Load(String),

    /// Persisted artifact was written by an incompatible format version
    #[error("Artifact format version mismatch: found {found}, expected {expected}")]
    ArtifactVersion { found: u16, expected: u16 },

    /// Persisted artifact missing, unreadable or corrupt
    #[error("Failed to load artifact: {0}")]
    ArtifactLoad(String),

    /// Training could not produce a model
    #[error("Training failed: {0}")]
    Training(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Classifier failed while serving a request
    #[error("Prediction failed: {0}")]
    Prediction(String),

    /// Artifacts not loaded yet
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AppError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Load(_)
            | AppError::ArtifactVersion { .. }
            | AppError::ArtifactLoad(_)
            | AppError::Training(_)
            | AppError::Prediction(_)
            | AppError::Configuration(_)
            | AppError::Io(_)
            | AppError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error code string
    pub fn error_code(&self) -> &str {
        match self {
            AppError::Load(_) => "LOAD_ERROR",
            AppError::ArtifactVersion { .. } => "ARTIFACT_VERSION_ERROR",
            AppError::ArtifactLoad(_) => "ARTIFACT_LOAD_ERROR",
            AppError::Training(_) => "TRAINING_ERROR",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Prediction(_) => "PREDICTION_ERROR",
            AppError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::Io(_) => "IO_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }
}

/// Convert AppError to HTTP response
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code().to_string();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(
                error_code = %error_code,
                status_code = status.as_u16(),
                message = %message,
                "Request error"
            );
        } else {
            tracing::debug!(
                error_code = %error_code,
                status_code = status.as_u16(),
                message = %message,
                "Request rejected"
            );
        }

        let mut error = json!({
            "code": error_code,
            "message": message,
            "status": status.as_u16(),
        });
        if let AppError::Validation(ref v) = self {
            error["kind"] = json!(v.kind());
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}

/// Conversion from serde_json::Error
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Conversion from bincode::Error
impl From<bincode::Error> for AppError {
    fn from(err: bincode::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Conversion from config::ConfigError
impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AppError>;

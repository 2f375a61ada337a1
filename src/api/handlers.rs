use crate::api::AppState;
use crate::error::{AppError, Result, ValidationError};
use crate::service::{
    AirportListResponse, AirportResponse, HealthStatus, PredictRequest, PredictionResponse,
};
use axum::{
    extract::{rejection::JsonRejection, rejection::PathRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};

/// API information endpoint
pub async fn api_info(State(state): State<AppState>) -> Json<Value> {
    let model_info = match state.service.context() {
        Some(ctx) => {
            let metadata = ctx.metadata();
            json!({
                "type": metadata.model_type.to_string(),
                "accuracy": metadata.accuracy,
                "features": metadata.features,
            })
        }
        None => json!({
            "type": "Not loaded",
            "accuracy": "Unknown",
            "features": "Unknown",
        }),
    };

    Json(json!({
        "message": "Flight Delay Prediction API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "/": "GET - API information",
            "/health": "GET - Health check",
            "/predict": "POST - Predict flight delay probability",
            "/airports": "GET - Get list of airports",
            "/airports/:id": "GET - Get specific airport",
        },
        "model_info": model_info,
    }))
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(state.service.health())
}

/// Predict delay probability for a day of week and origin airport
pub async fn predict(
    State(state): State<AppState>,
    body: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Json<PredictionResponse>> {
    let Json(body) = body.map_err(|rejection| {
        tracing::debug!(reason = %rejection.body_text(), "Unreadable prediction body");
        AppError::from(ValidationError::EmptyBody)
    })?;

    let request = PredictRequest::from_json(&body)?;
    let response = state.service.predict(&request)?;
    Ok(Json(response))
}

/// All airports, alphabetical by name
pub async fn list_airports(State(state): State<AppState>) -> Result<Json<AirportListResponse>> {
    Ok(Json(state.service.list_airports()?))
}

/// One airport by id; a non-integer id is treated as an unknown route
pub async fn get_airport(
    State(state): State<AppState>,
    id: std::result::Result<Path<i64>, PathRejection>,
) -> Result<Json<AirportResponse>> {
    let Path(id) = id.map_err(|_| AppError::NotFound("Endpoint not found".to_string()))?;
    Ok(Json(state.service.get_airport(id)?))
}

/// Fallback for unknown routes
pub async fn not_found() -> AppError {
    AppError::NotFound("Endpoint not found".to_string())
}

/// Fallback for a known route hit with the wrong method
pub async fn method_not_allowed() -> Response {
    let status = StatusCode::METHOD_NOT_ALLOWED;
    (
        status,
        Json(json!({
            "error": {
                "code": "METHOD_NOT_ALLOWED",
                "message": "Method not allowed",
                "status": status.as_u16(),
            }
        })),
    )
        .into_response()
}

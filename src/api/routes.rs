use crate::api::{handlers, AppState};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

/// Build the main API router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Service info
        .route(
            "/",
            get(handlers::api_info).fallback(handlers::method_not_allowed),
        )
        .route(
            "/health",
            get(handlers::health_check).fallback(handlers::method_not_allowed),
        )
        // Prediction
        .route(
            "/predict",
            post(handlers::predict).fallback(handlers::method_not_allowed),
        )
        // Airport directory
        .route(
            "/airports",
            get(handlers::list_airports).fallback(handlers::method_not_allowed),
        )
        .route(
            "/airports/:id",
            get(handlers::get_airport).fallback(handlers::method_not_allowed),
        )
        .fallback(handlers::not_found)
        // Add state
        .with_state(state)
        // Add middleware
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
        .layer(CorsLayer::permissive())
}

use anyhow::Context;
use flight_delay_predictor::{
    api::{build_router, AppState},
    config::Config,
    observability::init_tracing,
    service::PredictionService,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::load().context("failed to load configuration")?;

    // Initialize tracing
    init_tracing(&config.observability);

    tracing::info!("Starting Flight Delay Prediction API v{}", env!("CARGO_PKG_VERSION"));

    // Artifacts are required; without them the port is never bound
    let service = PredictionService::load(&config.artifacts).map_err(|e| {
        tracing::error!(
            error = %e,
            model = %config.artifacts.model_path.display(),
            airports = %config.artifacts.airports_path.display(),
            "Failed to load model and data. Server not started. Run `fdp-cli train` first"
        );
        anyhow::Error::new(e)
    })?;

    let app = build_router(AppState::new(service));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    tracing::info!("HTTP API server listening on http://{}", addr);
    tracing::info!("   GET  /              - API information");
    tracing::info!("   GET  /health        - Health check");
    tracing::info!("   POST /predict       - Predict flight delay");
    tracing::info!("   GET  /airports      - Get all airports");
    tracing::info!("   GET  /airports/:id  - Get specific airport");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    tracing::info!("Shutting down gracefully...");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

use anyhow::Context;
use heart_risk::{
    api::{build_router, AppState},
    artifacts::FileArtifactStore,
    config::Config,
    ml::InferencePipeline,
    prediction_log::CsvPredictionLog,
    telemetry,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    telemetry::init(&config.observability)?;

    tracing::info!("Starting heart-risk server v{}", env!("CARGO_PKG_VERSION"));

    // Artifacts must load before the server accepts traffic
    let store = FileArtifactStore::open_existing(&config.artifacts.dir)
        .context("Artifact directory unavailable; run `heart-risk train` first")?;
    let log = Arc::new(CsvPredictionLog::new(&config.prediction_log.path));
    let pipeline = InferencePipeline::load(&store, log).context("Failed to load model artifacts")?;

    tracing::info!(
        run_id = ?pipeline.run_id(),
        trained_at = %pipeline.metadata().trained_at,
        "✅ Model artifacts loaded"
    );
    tracing::info!(
        path = %config.prediction_log.path.display(),
        "✅ Prediction log ready"
    );

    let app = build_router(AppState::new(Arc::new(pipeline)));

    let http_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&http_addr)
        .await
        .with_context(|| format!("Failed to bind {}", http_addr))?;

    tracing::info!("🚀 HTTP API server listening on http://{}", http_addr);
    tracing::info!("   Health check: http://{}/health", http_addr);
    tracing::info!("   Predict: POST http://{}/v1/predict", http_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("Shutdown signal received");
        })
        .await?;

    tracing::info!("Shutting down gracefully...");
    Ok(())
}

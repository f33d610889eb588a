use crate::api::AppState;
use crate::error::{AppError, Result};
use crate::ml::ModelMetrics;
use crate::models::{PatientInput, PredictionOutcome};
use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;
use validator::Validate;

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>> {
    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        run_id: state.pipeline.run_id(),
    }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    /// Training run of the loaded artifacts
    pub run_id: Option<Uuid>,
}

/// Score one patient
pub async fn predict(
    State(state): State<AppState>,
    Json(request): Json<PredictRequest>,
) -> Result<Json<PredictionOutcome>> {
    request.validate()?;

    let pipeline = state.pipeline.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        pipeline.predict(&request.patient, request.username.as_deref())
    })
    .await
    .map_err(|e| AppError::Internal(format!("Prediction task failed: {}", e)))??;

    tracing::info!(
        identifier = %outcome.identifier,
        band = %outcome.assessment.band,
        probability = outcome.probabilities.disease,
        "Prediction served"
    );

    Ok(Json(outcome))
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PredictRequest {
    /// Recorded in the prediction log; `Anonymous` when absent or blank
    #[serde(default)]
    #[validate(length(max = 128))]
    pub username: Option<String>,

    #[serde(flatten)]
    pub patient: PatientInput,
}

/// Describe the loaded model
pub async fn model_info(State(state): State<AppState>) -> Result<Json<ModelInfoResponse>> {
    let metadata = state.pipeline.metadata();
    Ok(Json(ModelInfoResponse {
        run_id: state.pipeline.run_id(),
        name: metadata.name.clone(),
        model_type: metadata.model_type.to_string(),
        version: metadata.version.clone(),
        trained_at: metadata.trained_at,
        n_training_samples: metadata.n_training_samples,
        feature_names: metadata.feature_names.clone(),
        hyperparameters: metadata.hyperparameters.clone(),
        test_metrics: metadata.validation_metrics.clone(),
    }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ModelInfoResponse {
    pub run_id: Option<Uuid>,
    pub name: String,
    pub model_type: String,
    pub version: String,
    pub trained_at: DateTime<Utc>,
    pub n_training_samples: usize,
    pub feature_names: Vec<String>,
    pub hyperparameters: BTreeMap<String, String>,
    pub test_metrics: Option<ModelMetrics>,
}

/// HTTP API integration tests
///
/// Requests go straight through the router with `oneshot`; no socket is bound.
mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use heart_risk::{
    api::{build_router, AppState},
    ml::{InferencePipeline, RawTable, TrainingPipeline},
    prediction_log::InMemoryPredictionLog,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

struct TestApp {
    router: Router,
    log: Arc<InMemoryPredictionLog>,
    run_id: Uuid,
}

fn test_app() -> TestApp {
    let raw = RawTable::from_reader(common::synthetic_csv(200, 17).as_bytes()).unwrap();
    let trained = TrainingPipeline::new(common::training_config("heart.csv".into()))
        .fit(&raw)
        .unwrap();
    let run_id = trained.artifacts.run_id;

    let log = Arc::new(InMemoryPredictionLog::new());
    let pipeline = InferencePipeline::from_artifacts(trained.artifacts, log.clone()).unwrap();
    TestApp {
        router: build_router(AppState::new(Arc::new(pipeline))),
        log,
        run_id,
    }
}

async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn patient_json() -> Value {
    serde_json::to_value(common::sample_patient()).unwrap()
}

#[tokio::test]
async fn test_health_reports_run() {
    let app = test_app();
    let (status, body) = send(app.router, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["run_id"], app.run_id.to_string());
}

#[tokio::test]
async fn test_predict_returns_assessment_and_logs() {
    let app = test_app();
    let mut body = patient_json();
    body["username"] = json!("Ada");

    let (status, outcome) = send(app.router.clone(), post_json("/v1/predict", &body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["identifier"], "Ada");
    assert!(outcome["logged"].as_bool().unwrap());

    let probability = outcome["probabilities"]["disease"].as_f64().unwrap();
    assert!((0.0..=1.0).contains(&probability));
    let expected_band = if probability < 0.30 {
        "low"
    } else if probability < 0.60 {
        "moderate"
    } else {
        "high"
    };
    assert_eq!(outcome["assessment"]["band"], expected_band);

    let records = app.log.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].username, "Ada");
    assert_eq!(records[0].probability, probability);
}

#[tokio::test]
async fn test_predict_accepts_string_flags_and_blank_username() {
    let app = test_app();
    let mut body = patient_json();
    body["fbs"] = json!("True");
    body["exang"] = json!("False");
    body["username"] = json!("   ");

    let (status, outcome) = send(app.router, post_json("/v1/predict", &body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["identifier"], "Anonymous");
}

#[tokio::test]
async fn test_predict_missing_field_is_bad_request() {
    let app = test_app();
    let mut body = patient_json();
    body.as_object_mut().unwrap().remove("thal");

    let (status, error) = send(app.router, post_json("/v1/predict", &body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["error"]["code"], "PREDICTION_ERROR");
    assert_eq!(error["error"]["cause"], "VALIDATION_ERROR");
    assert!(error["error"]["message"].as_str().unwrap().contains("thal"));
    assert!(app.log.is_empty());
}

#[tokio::test]
async fn test_predict_rejects_unknown_category_value() {
    let app = test_app();
    let mut body = patient_json();
    body["cp"] = json!("crushing");

    let (status, error) = send(app.router, post_json("/v1/predict", &body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["error"]["cause"], "VALIDATION_ERROR");
    assert!(app.log.is_empty());
}

#[tokio::test]
async fn test_predict_rejects_long_username() {
    let app = test_app();
    let mut body = patient_json();
    body["username"] = json!("x".repeat(200));

    let (status, error) = send(app.router, post_json("/v1/predict", &body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["error"]["code"], "VALIDATION_ERROR");
    assert!(app.log.is_empty());
}

#[tokio::test]
async fn test_model_info_lists_schema() {
    let app = test_app();
    let (status, info) = send(app.router, get("/v1/model")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(info["run_id"], app.run_id.to_string());
    assert_eq!(info["model_type"], "Random Forest");

    let features: Vec<&str> = info["feature_names"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();
    assert_eq!(features.len(), 13);
    assert_eq!(features[0], "age");
    assert_eq!(features[12], "thal");
    assert_eq!(info["hyperparameters"]["n_trees"], "25");
    assert!(info["test_metrics"]["accuracy"].as_f64().is_some());
}

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Training data missing, unreadable or malformed
    #[error("Data source error: {0}")]
    DataSource(String),

    /// Training data present but structurally unusable (e.g. missing target column)
    #[error("Data error: {0}")]
    Data(String),

    /// Degenerate input while fitting an encoder, scaler or classifier
    #[error("Fit error: {0}")]
    Fit(String),

    /// Category value never seen while the encoder was fitted
    #[error("Unknown category '{value}' for field '{field}'")]
    UnknownCategory { field: String, value: String },

    /// Missing or malformed inference field
    #[error("Validation error: {0}")]
    Validation(String),

    /// Missing, corrupt or inconsistent persisted artifact
    #[error("Artifact error: {0}")]
    Artifact(String),

    /// Failure while serving a single prediction
    #[error("Prediction error: {0}")]
    Prediction(Box<AppError>),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Wrap an error raised while serving a prediction.
    ///
    /// Already-wrapped errors are returned unchanged so the cause chain stays one level deep.
    pub fn prediction(err: AppError) -> Self {
        match err {
            AppError::Prediction(_) => err,
            other => AppError::Prediction(Box::new(other)),
        }
    }

    /// Innermost cause, unwrapping `Prediction`
    pub fn root_cause(&self) -> &AppError {
        match self {
            AppError::Prediction(inner) => inner.root_cause(),
            other => other,
        }
    }

    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::UnknownCategory { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Prediction(inner) => inner.status_code(),
            AppError::DataSource(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Data(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Fit(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Artifact(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error code string
    pub fn error_code(&self) -> &str {
        match self {
            AppError::DataSource(_) => "DATA_SOURCE_ERROR",
            AppError::Data(_) => "DATA_ERROR",
            AppError::Fit(_) => "FIT_ERROR",
            AppError::UnknownCategory { .. } => "UNKNOWN_CATEGORY",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Artifact(_) => "ARTIFACT_ERROR",
            AppError::Prediction(_) => "PREDICTION_ERROR",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Io(_) => "IO_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// Convert AppError to HTTP response
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code().to_string();
        let cause = self.root_cause().error_code().to_string();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(
                error_code = %error_code,
                status_code = status.as_u16(),
                message = %message,
                "Request error"
            );
        } else {
            tracing::warn!(
                error_code = %error_code,
                status_code = status.as_u16(),
                message = %message,
                "Request rejected"
            );
        }

        let body = Json(json!({
            "error": {
                "code": error_code,
                "cause": cause,
                "message": message,
                "status": status.as_u16(),
            }
        }));

        (status, body).into_response()
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

/// Conversion from csv::Error
impl From<csv::Error> for AppError {
    fn from(err: csv::Error) -> Self {
        AppError::DataSource(err.to_string())
    }
}

/// Conversion from validator::ValidationErrors
impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
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

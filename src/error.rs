use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Triage engine error types
#[derive(Error, Debug)]
pub enum TriageError {
    /// Malformed or empty input (absorbed inside classification; only
    /// surfaced when a caller bypasses the fallback path)
    #[error("Input error: {0}")]
    Input(String),

    /// Not enough labeled samples to train a candidate model
    #[error("Insufficient training data: got {got}, need at least {need}")]
    InsufficientData { got: usize, need: usize },

    /// No usable model artifact at startup; the service must not classify
    /// without a bound model
    #[error("Model load error: {0}")]
    ModelLoad(String),

    /// Unknown taxonomy node or team
    #[error("Not found: {0}")]
    NotFound(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Operation timed out
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl TriageError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            TriageError::Input(_) => StatusCode::BAD_REQUEST,
            TriageError::Validation(_) => StatusCode::BAD_REQUEST,
            TriageError::NotFound(_) => StatusCode::NOT_FOUND,
            TriageError::InsufficientData { .. } => StatusCode::CONFLICT,
            TriageError::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
            TriageError::ModelLoad(_) => StatusCode::SERVICE_UNAVAILABLE,
            TriageError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            TriageError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            TriageError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
            TriageError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error code string
    pub fn error_code(&self) -> &str {
        match self {
            TriageError::Input(_) => "INPUT_ERROR",
            TriageError::Validation(_) => "VALIDATION_ERROR",
            TriageError::NotFound(_) => "NOT_FOUND",
            TriageError::InsufficientData { .. } => "INSUFFICIENT_DATA",
            TriageError::Timeout(_) => "TIMEOUT",
            TriageError::ModelLoad(_) => "MODEL_LOAD_ERROR",
            TriageError::Configuration(_) => "CONFIGURATION_ERROR",
            TriageError::Io(_) => "IO_ERROR",
            TriageError::Serialization(_) => "SERIALIZATION_ERROR",
            TriageError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// Convert TriageError to HTTP response
impl IntoResponse for TriageError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();
        let message = self.to_string();

        tracing::error!(
            error_code = error_code,
            status_code = status.as_u16(),
            message = %message,
            "Request error"
        );

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
                "status": status.as_u16(),
            }
        }));

        (status, body).into_response()
    }
}

impl From<serde_json::Error> for TriageError {
    fn from(err: serde_json::Error) -> Self {
        TriageError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for TriageError {
    fn from(err: serde_yaml::Error) -> Self {
        TriageError::Serialization(err.to_string())
    }
}

impl From<validator::ValidationErrors> for TriageError {
    fn from(err: validator::ValidationErrors) -> Self {
        TriageError::Validation(err.to_string())
    }
}

impl From<config::ConfigError> for TriageError {
    fn from(err: config::ConfigError) -> Self {
        TriageError::Configuration(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, TriageError>;

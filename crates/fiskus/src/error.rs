use crate::config::ConfigError;
use crate::jobs::{JobServiceError, RepositoryError};
use crate::telemetry::TelemetryError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Job(JobServiceError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Job(err) => write!(f, "job error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Job(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Job(JobServiceError::Repository(RepositoryError::EntityNotFound)) => (
                StatusCode::NOT_FOUND,
                "entity_not_found".to_string(),
                "no job with this id".to_string(),
            ),
            AppError::Job(err @ JobServiceError::Mapping(_)) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                err.error_code(),
                err.error_message(),
            ),
            AppError::Job(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                err.error_code(),
                err.error_message(),
            ),
            other => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error".to_string(),
                other.to_string(),
            ),
        };

        let body = Json(json!({ "errorCode": code, "errorMessage": message }));
        (status, body).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<JobServiceError> for AppError {
    fn from(value: JobServiceError) -> Self {
        Self::Job(value)
    }
}

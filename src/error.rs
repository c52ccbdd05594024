use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Failure to bring a model artifact into memory at startup.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("model file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("could not read model file: {0}")]
    Io(#[from] std::io::Error),
    #[error("onnx runtime rejected the model: {0}")]
    Runtime(#[from] ort::Error),
    #[error("incompatible model: {0}")]
    Incompatible(String),
}

/// Failure raised while running a single inference call.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("{0}")]
    Runtime(#[from] ort::Error),
    #[error("could not reshape features: {0}")]
    Shape(#[from] ndarray::ShapeError),
    #[error("model expects {expected} features, got {actual}")]
    FeatureCount { expected: usize, actual: usize },
    #[error("unsupported prediction type: {0}")]
    Unsupported(String),
    #[error("invalid model output: {0}")]
    InvalidOutput(String),
}

pub type InferenceResult<T> = Result<T, InferenceError>;

/// Errors surfaced to HTTP callers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("model not available")]
    ModelUnavailable,
    #[error("prediction failed: {0}")]
    InferenceFailure(#[from] InferenceError),
    #[error("{0}")]
    Validation(String),
}

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::ModelUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::InferenceFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorBody {
            detail: self.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_error_kind() {
        assert_eq!(
            ApiError::ModelUnavailable.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::Validation("features must not be empty".into()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        let failure: ApiError = InferenceError::FeatureCount {
            expected: 4,
            actual: 2,
        }
        .into();
        assert_eq!(failure.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn inference_failure_keeps_underlying_description() {
        let failure: ApiError = InferenceError::FeatureCount {
            expected: 4,
            actual: 2,
        }
        .into();
        assert_eq!(
            failure.to_string(),
            "prediction failed: model expects 4 features, got 2"
        );
    }
}

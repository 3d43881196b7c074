use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use tg_core::params::FieldError;

use crate::pipeline::PipelineError;
use crate::store::StoreError;

/// Error taxonomy surfaced to API callers. Nothing here is retried
/// server-side; the body carries enough detail for the caller to adjust and
/// resubmit.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("validation failed")]
    Validation(Vec<FieldError>),

    #[error("pipeline not ready: {0}")]
    Unavailable(String),

    #[error("generation failed: {0}")]
    Generation(String),

    #[error("accelerator memory exhausted: {0}")]
    ResourceExhausted(String),

    #[error("export failed: {0}")]
    Export(String),

    #[error("not found")]
    NotFound,

    #[error("job exceeded the allotted {0} seconds")]
    Timeout(u64),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Generation(_) | Self::ResourceExhausted(_) | Self::Export(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Unavailable(_) => "unavailable",
            Self::Generation(_) => "generation",
            Self::ResourceExhausted(_) => "resource_exhausted",
            Self::Export(_) => "export",
            Self::NotFound => "not_found",
            Self::Timeout(_) => "timeout",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "error": self.kind(),
            "detail": self.to_string(),
        });
        if let Self::Validation(fields) = &self {
            body["fields"] = json!(fields);
        }
        (self.status(), Json(body)).into_response()
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Unavailable(msg) => Self::Unavailable(msg),
            PipelineError::ResourceExhausted(msg) => Self::ResourceExhausted(msg),
            PipelineError::Failed(msg) => Self::Generation(msg),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => Self::NotFound,
            StoreError::Io(io) => Self::Export(io.to_string()),
            StoreError::Corrupt(msg) => Self::Export(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::Validation(vec![]).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(ApiError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::Timeout(600).status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            ApiError::Unavailable("loading".into()).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_oom_maps_to_resource_exhausted() {
        let err: ApiError = PipelineError::ResourceExhausted("CUDA out of memory".into()).into();
        assert_eq!(err.kind(), "resource_exhausted");
    }
}

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    pub result: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    pub detail: String,
    pub kind: String,
}

/// Every pipeline failure, including malformed request bodies, is answered
/// with 422 and the original message.
#[derive(Debug)]
pub enum ApiError {
    Pipeline(PipelineError),
    Rejected(JsonRejection),
    Unauthorized,
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        ApiError::Pipeline(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Rejected(rejection)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail, kind) = match self {
            ApiError::Pipeline(err) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                err.to_string(),
                err.kind(),
            ),
            ApiError::Rejected(rejection) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                rejection.body_text(),
                "invalid_input",
            ),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "invalid or missing API key".to_string(),
                "unauthorized",
            ),
        };
        (
            status,
            Json(ErrorBody {
                detail,
                kind: kind.to_string(),
            }),
        )
            .into_response()
    }
}

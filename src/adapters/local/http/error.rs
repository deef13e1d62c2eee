use crate::error::PipelineError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
}

/// A pipeline error on its way out over HTTP.
#[derive(Debug)]
pub struct ApiError(pub PipelineError);

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match &self.0 {
            PipelineError::TaskNotFound(_) | PipelineError::ObjectNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            PipelineError::InvalidClip(_) => StatusCode::BAD_REQUEST,
            PipelineError::UnavailableDependency(_) => StatusCode::SERVICE_UNAVAILABLE,
            PipelineError::Inference(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self.0, "request failed");
        }
        (
            status,
            Json(ErrorResponse {
                detail: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError(PipelineError::TaskNotFound("x".into())).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError(PipelineError::ObjectNotFound("transcripts/x.json".into())).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError(PipelineError::unavailable("storage")).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError(PipelineError::queue("down")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}

//! API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use trailtag_models::NoSubtitlesResponse;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unprocessable: no analyzable subtitles for {}", .0.video_id)]
    NoSubtitles(Box<NoSubtitlesResponse>),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn no_subtitles(body: NoSubtitlesResponse) -> Self {
        Self::NoSubtitles(Box::new(body))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::NoSubtitles(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error body: `detail` is a string for simple errors and a structured
/// object for the no-subtitles case, matching the original API.
#[derive(Serialize)]
struct ErrorResponse {
    detail: Value,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let detail = match &self {
            ApiError::NoSubtitles(body) => {
                serde_json::to_value(body.as_ref()).unwrap_or_else(|_| Value::Null)
            }
            ApiError::Internal(_) => {
                // Don't expose internal error details in production.
                if std::env::var("ENVIRONMENT").unwrap_or_default() == "production" {
                    Value::from("An internal error occurred")
                } else {
                    Value::from(self.to_string())
                }
            }
            ApiError::BadRequest(msg) | ApiError::NotFound(msg) => Value::from(msg.clone()),
        };

        (status, Json(ErrorResponse { detail })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trailtag_models::SubtitleStatus;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::bad_request("x").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::not_found("x").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::no_subtitles(NoSubtitlesResponse::new(
                "dQw4w9WgXcQ",
                SubtitleStatus::unavailable()
            ))
            .status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ApiError::internal("x").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}

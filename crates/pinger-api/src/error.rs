use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

#[derive(Debug)]
pub enum ApiError {
    TooManyRequests { message: String, retry_after_secs: u64 },
    /// `context` becomes the `error` field; `message` carries the underlying cause.
    Internal { context: String, message: String },
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::TooManyRequests {
                message,
                retry_after_secs,
            } => {
                let body = ErrorBody {
                    error: "too_many_requests".to_string(),
                    message,
                };
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    [(header::RETRY_AFTER, retry_after_secs.to_string())],
                    axum::Json(body),
                )
                    .into_response()
            }
            ApiError::Internal { context, message } => {
                let body = ErrorBody {
                    error: context,
                    message,
                };
                (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(body)).into_response()
            }
        }
    }
}

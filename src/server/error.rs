//! JSON error responses for the HTTP service.

use crate::error::{ErrorKind, Pdf2ImgError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: String,
}

/// An error mapped to an HTTP status and a stable machine-readable code.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }
}

impl From<Pdf2ImgError> for ApiError {
    fn from(err: Pdf2ImgError) -> Self {
        let (status, code) = match (err.kind(), err.is_bad_input()) {
            (ErrorKind::Config, _) => (StatusCode::BAD_REQUEST, "INVALID_OPTIONS"),
            (ErrorKind::Render, true) => (StatusCode::BAD_REQUEST, "INVALID_DOCUMENT"),
            (ErrorKind::Render, false) => (StatusCode::INTERNAL_SERVER_ERROR, "CONVERSION_FAILED"),
            (ErrorKind::Io, _) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
            (ErrorKind::Internal, _) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };
        let message = match err.kind() {
            ErrorKind::Config => err.to_string(),
            _ => format!("Conversion failed: {err}"),
        };
        Self::new(status, code, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!("{} ({}): {}", self.status, self.code, self.message);
        } else {
            tracing::debug!("{} ({}): {}", self.status, self.code, self.message);
        }

        let body = Json(ErrorResponse {
            error: self.message,
            code: self.code.to_string(),
        });
        (self.status, body).into_response()
    }
}

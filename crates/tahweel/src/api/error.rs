//! API error mapping.
//!
//! Translates pipeline errors into HTTP outcomes. Client faults keep their
//! message; anything internal is logged server-side and replaced by a
//! generic message — diagnostic detail never reaches the response body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use super::types::ErrorResponse;
use crate::error::TahweelError;

/// Generic message for internal failures.
const INTERNAL_MESSAGE: &str = "An unexpected error occurred. Please try again later.";

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<TahweelError> for ApiError {
    fn from(err: TahweelError) -> Self {
        match &err {
            TahweelError::Validation { .. } | TahweelError::UnsupportedFormat(_) => Self {
                status: StatusCode::BAD_REQUEST,
                message: err.to_string(),
            },
            TahweelError::NoEngineAvailable => Self {
                status: StatusCode::SERVICE_UNAVAILABLE,
                message: "No conversion engine is currently available.".to_string(),
            },
            _ => {
                tracing::error!("request failed: {}", err);
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    message: INTERNAL_MESSAGE.to_string(),
                }
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            success: false,
            error: self.message,
            code: self.status.as_u16(),
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_keep_their_message() {
        let api_err: ApiError = TahweelError::validation("no file content provided").into();
        assert_eq!(api_err.status(), StatusCode::BAD_REQUEST);
        assert!(api_err.message().contains("no file content provided"));

        let api_err: ApiError = TahweelError::UnsupportedFormat("exe".to_string()).into();
        assert_eq!(api_err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_no_engine_maps_to_service_unavailable() {
        let api_err: ApiError = TahweelError::NoEngineAvailable.into();
        assert_eq!(api_err.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_internal_errors_never_leak_detail() {
        let source = crate::engine::EngineError::Failed(
            "mutool exited with 1: /var/lib/tahweel/uploads/secret_client_file.pdf".to_string(),
        );
        let api_err: ApiError = TahweelError::engine_failure("standard", source).into();

        assert_eq!(api_err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api_err.message(), INTERNAL_MESSAGE);
        assert!(!api_err.message().contains("secret_client_file"));
    }

    #[test]
    fn test_io_errors_are_internal() {
        let api_err: ApiError =
            TahweelError::Io(std::io::Error::other("disk full at /srv/tahweel")).into();
        assert_eq!(api_err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api_err.message(), INTERNAL_MESSAGE);
    }
}

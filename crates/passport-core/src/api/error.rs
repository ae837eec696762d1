//! Mapping of core errors to HTTP responses

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::{Error, ErrorKind};

/// Body of every error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub trace_id: String,
    pub message: String,
}

/// Core error tagged with the code of the endpoint that produced it
#[derive(Debug)]
pub struct ApiError {
    trace_id: &'static str,
    error: Error,
}

impl ApiError {
    pub fn new(trace_id: &'static str, error: Error) -> Self {
        Self { trace_id, error }
    }

    /// Adapter for `map_err`
    pub fn with(trace_id: &'static str) -> impl Fn(Error) -> Self {
        move |error| Self::new(trace_id, error)
    }

    pub fn status(&self) -> StatusCode {
        match self.error.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Authentication => StatusCode::UNAUTHORIZED,
            ErrorKind::Authorization => StatusCode::FORBIDDEN,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Infrastructure => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing message. Only validation and conflict errors carry
    /// their own text; nothing else may help an enumeration attempt.
    fn message(&self) -> String {
        match self.error.kind() {
            ErrorKind::Validation | ErrorKind::Conflict => self.error.to_string(),
            ErrorKind::Authentication => match self.error {
                Error::InvalidCredentials => "invalid credentials".to_string(),
                _ => "unauthorized".to_string(),
            },
            ErrorKind::Authorization => "no permission to access".to_string(),
            ErrorKind::NotFound => "resource not found".to_string(),
            ErrorKind::Infrastructure => "internal server error".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(trace_id = self.trace_id, "request failed: {}", self.error);
        } else {
            debug!(trace_id = self.trace_id, %status, "request rejected: {}", self.error);
        }

        let body = ErrorResponse {
            trace_id: self.trace_id.to_string(),
            message: self.message(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (Error::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (Error::InvalidRole("x".into()), StatusCode::BAD_REQUEST),
            (Error::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (Error::TokenExpired, StatusCode::UNAUTHORIZED),
            (Error::PermissionDenied, StatusCode::FORBIDDEN),
            (Error::UsernameTaken, StatusCode::CONFLICT),
            (Error::not_found("session"), StatusCode::NOT_FOUND),
            (Error::Store("down".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, status) in cases {
            assert_eq!(ApiError::new("test-001", error).status(), status);
        }
    }

    #[test]
    fn test_messages_do_not_leak_internals() {
        let err = ApiError::new("test-001", Error::InvalidToken("signature mismatch".into()));
        assert_eq!(err.message(), "unauthorized");

        let err = ApiError::new("test-001", Error::Store("disk /var/db full".into()));
        assert_eq!(err.message(), "internal server error");

        let err = ApiError::new("test-001", Error::EmailTaken);
        assert_eq!(err.message(), "Email has been used");
    }
}

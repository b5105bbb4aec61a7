//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use fulfillment::{CoreError, ErrorKind};

use crate::signature::SignatureError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Missing or malformed identity headers.
    Unauthorized(String),
    /// The server cannot take the request right now.
    Unavailable(String),
    /// The request body could not be understood.
    BadRequest(String),
    /// The endpoint needs configuration this server does not have.
    NotConfigured(&'static str),
    /// A webhook failed signature verification.
    InvalidSignature(SignatureError),
    /// Error raised by a coordination service.
    Core(CoreError),
}

/// HTTP status for each error kind.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::InvalidTransition
        | ErrorKind::InsufficientStock
        | ErrorKind::AlreadyClaimed
        | ErrorKind::NoLongerAvailable
        | ErrorKind::OrderNotPayable
        | ErrorKind::CancellationWindowClosed
        | ErrorKind::DriverUnavailable => StatusCode::CONFLICT,
        ErrorKind::AmountMismatch
        | ErrorKind::BelowMinimumCharge
        | ErrorKind::InvalidOrder
        | ErrorKind::InvalidLocation => StatusCode::BAD_REQUEST,
        ErrorKind::AccessDenied => StatusCode::FORBIDDEN,
        ErrorKind::PaymentUnavailable => StatusCode::NOT_IMPLEMENTED,
        ErrorKind::OrdersPaused => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Infrastructure => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg),
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, "UNAVAILABLE", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::NotConfigured(msg) => {
                (StatusCode::NOT_IMPLEMENTED, "NOT_CONFIGURED", msg.to_string())
            }
            ApiError::InvalidSignature(err) => (
                StatusCode::BAD_REQUEST,
                "INVALID_SIGNATURE",
                err.message().to_string(),
            ),
            ApiError::Core(err) => {
                let kind = err.kind();
                let message = if kind == ErrorKind::Infrastructure {
                    tracing::error!(error = %err, "internal server error");
                    "Internal server error".to_string()
                } else {
                    err.to_string()
                };
                (status_for(kind), kind.code(), message)
            }
        };

        let body = serde_json::json!({ "error": { "code": code, "message": message } });
        (status, axum::Json(body)).into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        ApiError::Core(err)
    }
}

//! Maps [`LedgerError`] onto HTTP status codes (spec §7).
//!
//! The match below is exhaustive: adding a new [`LedgerError`] variant
//! forces every call site to decide its status code rather than falling
//! through to a default `500`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use gm_types::LedgerError;

/// A short, human-readable error body plus its status code. Never carries a
/// stack trace or internal detail across the HTTP boundary.
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    /// Builds an error response with an explicit status and message.
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        ApiError {
            status,
            message: message.into(),
        }
    }

    /// `400 Bad Request` for malformed input.
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::new(StatusCode::BAD_REQUEST, message)
    }

    /// `422 Unprocessable Entity` for a syntactically well-formed but
    /// Luhn-invalid order number.
    pub fn invalid_order_number() -> Self {
        ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, "invalid order number")
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        let status = match &err {
            LedgerError::LoginConflict => StatusCode::CONFLICT,
            LedgerError::UserNotFound => StatusCode::UNAUTHORIZED,
            LedgerError::OrderConflict => StatusCode::CONFLICT,
            LedgerError::OrderNotFound => StatusCode::INTERNAL_SERVER_ERROR,
            LedgerError::NoOrdersFound => StatusCode::NO_CONTENT,
            LedgerError::NoOrdersToPoll => StatusCode::INTERNAL_SERVER_ERROR,
            LedgerError::InsufficientFunds => StatusCode::PAYMENT_REQUIRED,
            LedgerError::NoWithdrawalsFound => StatusCode::NO_CONTENT,
            LedgerError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %err, "unexpected ledger error reached the HTTP boundary");
        }

        ApiError::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status == StatusCode::NO_CONTENT {
            return self.status.into_response();
        }
        (self.status, self.message).into_response()
    }
}

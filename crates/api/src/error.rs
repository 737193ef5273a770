//! API error types with HTTP response mapping.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use checkout::{CheckoutError, ErrorCategory, GatewayError};

/// API-level error type that maps to HTTP responses.
///
/// Every response body has the shape
/// `{ "error": <message>, "category": <category> }`, plus `reference` when
/// the caller can retry payment for an already placed order.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client.
    BadRequest(String),
    /// Missing or invalid credentials.
    Unauthorized(String),
    /// Valid credentials without the required role.
    Forbidden(String),
    /// Checkout service error.
    Checkout(CheckoutError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, category, message, reference) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "validation", msg, None),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg, None),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg, None),
            ApiError::Checkout(err) => {
                let category = err.category();
                let status = checkout_status(&err);
                if category == ErrorCategory::Internal {
                    tracing::error!(error = %err, "internal server error");
                }
                let reference = err.reference().map(|r| r.to_string());
                (status, category.as_str(), err.to_string(), reference)
            }
        };

        let mut body = serde_json::json!({ "error": message, "category": category });
        if let Some(reference) = reference {
            body["reference"] = serde_json::Value::String(reference);
        }
        (status, axum::Json(body)).into_response()
    }
}

fn checkout_status(err: &CheckoutError) -> StatusCode {
    match err {
        CheckoutError::GatewayTimeout(_) | CheckoutError::Gateway(GatewayError::Timeout) => {
            StatusCode::GATEWAY_TIMEOUT
        }
        _ => match err.category() {
            ErrorCategory::Validation => StatusCode::BAD_REQUEST,
            ErrorCategory::NotFound => StatusCode::NOT_FOUND,
            ErrorCategory::Conflict => StatusCode::CONFLICT,
            ErrorCategory::Gateway => StatusCode::BAD_GATEWAY,
            ErrorCategory::Signature => StatusCode::UNAUTHORIZED,
            ErrorCategory::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        },
    }
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        ApiError::Checkout(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<domain::OrderError> for ApiError {
    fn from(err: domain::OrderError) -> Self {
        ApiError::Checkout(err.into())
    }
}

//! Checkout error types.

use common::{ProductId, Reference};
use domain::{OrderError, OrderStatus, ProductError};
use serde::Serialize;
use store::StoreError;
use thiserror::Error;

use crate::services::GatewayError;

/// Broad class of a failure, used to pick a response for the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Malformed input; nothing was changed.
    Validation,
    NotFound,
    /// The request conflicts with current state (stock, status, uniqueness).
    Conflict,
    /// The payment gateway was unreachable, slow or incoherent.
    Gateway,
    /// A webhook failed authentication.
    Signature,
    Internal,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Validation => "validation",
            ErrorCategory::NotFound => "not_found",
            ErrorCategory::Conflict => "conflict",
            ErrorCategory::Gateway => "gateway",
            ErrorCategory::Signature => "signature",
            ErrorCategory::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur during checkout operations.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Product(#[from] ProductError),

    #[error("Product already exists: {0}")]
    DuplicateProduct(ProductId),

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Payment not found for reference {0}")]
    PaymentNotFound(Reference),

    /// No free order reference could be generated.
    #[error("Duplicate order reference: {0}")]
    DuplicateReference(Reference),

    #[error("Cannot {action} order {reference} in {status} state")]
    InvalidTransition {
        reference: Reference,
        status: OrderStatus,
        action: &'static str,
    },

    /// The order was saved but no checkout session could be opened. Payment
    /// can be resumed with the reference.
    #[error("Payment gateway unavailable for order {reference}: {reason}")]
    PaymentGatewayUnavailable { reference: Reference, reason: String },

    /// Verification did not get an answer from the gateway in time.
    #[error("Payment gateway timed out verifying {0}")]
    GatewayTimeout(Reference),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// The webhook signature is missing or does not match the body.
    #[error("Invalid webhook signature")]
    InvalidSignature,

    /// A signed webhook body could not be parsed.
    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),

    #[error("Amount {0} cannot be expressed in minor units")]
    AmountOutOfRange(String),

    #[error("Storage error: {0}")]
    Store(StoreError),
}

impl CheckoutError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            CheckoutError::Order(e) if e.is_validation() => ErrorCategory::Validation,
            CheckoutError::Order(OrderError::ProductNotFound(_)) => ErrorCategory::NotFound,
            CheckoutError::Order(_) => ErrorCategory::Conflict,
            CheckoutError::Product(ProductError::StockOverflow { .. }) => ErrorCategory::Conflict,
            CheckoutError::Product(_) | CheckoutError::InvalidPayload(_) => {
                ErrorCategory::Validation
            }
            CheckoutError::OrderNotFound(_) | CheckoutError::PaymentNotFound(_) => {
                ErrorCategory::NotFound
            }
            CheckoutError::DuplicateProduct(_)
            | CheckoutError::DuplicateReference(_)
            | CheckoutError::InvalidTransition { .. } => ErrorCategory::Conflict,
            CheckoutError::PaymentGatewayUnavailable { .. }
            | CheckoutError::GatewayTimeout(_)
            | CheckoutError::Gateway(_) => ErrorCategory::Gateway,
            CheckoutError::InvalidSignature => ErrorCategory::Signature,
            CheckoutError::AmountOutOfRange(_) | CheckoutError::Store(_) => {
                ErrorCategory::Internal
            }
        }
    }

    /// The order reference the caller needs to retry, if any.
    pub fn reference(&self) -> Option<&Reference> {
        match self {
            CheckoutError::PaymentGatewayUnavailable { reference, .. } => Some(reference),
            _ => None,
        }
    }

    /// Short label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            CheckoutError::Order(OrderError::ProductNotFound(_)) => "product_not_found",
            CheckoutError::Order(OrderError::InsufficientStock { .. }) => "insufficient_stock",
            CheckoutError::DuplicateReference(_) => "duplicate_reference",
            _ => self.category().as_str(),
        }
    }
}

impl From<StoreError> for CheckoutError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Order(e) => CheckoutError::Order(e),
            StoreError::Product(e) => CheckoutError::Product(e),
            StoreError::DuplicateProduct(id) => CheckoutError::DuplicateProduct(id),
            StoreError::DuplicateReference(r) => CheckoutError::DuplicateReference(r),
            StoreError::OrderNotFound(r) => CheckoutError::OrderNotFound(r),
            StoreError::PaymentNotFound(r) => CheckoutError::PaymentNotFound(r),
            StoreError::InvalidTransition {
                reference,
                status,
                action,
            } => CheckoutError::InvalidTransition {
                reference,
                status,
                action,
            },
            other => CheckoutError::Store(other),
        }
    }
}

/// Convenience type alias for checkout results.
pub type Result<T> = std::result::Result<T, CheckoutError>;

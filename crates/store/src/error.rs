use common::{ProductId, Reference};
use domain::{OrderError, OrderStatus, ParseEnumError, ProductError};
use thiserror::Error;

/// Errors that can occur when interacting with the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The order was rejected by a domain rule while being placed.
    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Product(#[from] ProductError),

    #[error("Product already exists: {0}")]
    DuplicateProduct(ProductId),

    /// Another order already uses this reference.
    #[error("Duplicate order reference: {0}")]
    DuplicateReference(Reference),

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Payment not found for reference {0}")]
    PaymentNotFound(Reference),

    /// The order is not in a state that allows the requested change.
    #[error("Cannot {action} order {reference} in {status} state")]
    InvalidTransition {
        reference: Reference,
        status: OrderStatus,
        action: &'static str,
    },

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored row holds a value no domain type accepts.
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

impl From<ParseEnumError> for StoreError {
    fn from(err: ParseEnumError) -> Self {
        StoreError::Corrupt(err.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

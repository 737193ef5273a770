//! Orders: checkout commands, cart pricing and the order state machine.

mod commands;
mod pricing;
mod state;
mod value_objects;

pub use commands::PlaceOrder;
pub use pricing::{PricedCart, PricedLine, price_cart};
pub use state::OrderStatus;
pub use value_objects::{CartLine, Email, Identity, Owner, ShippingAddress};

use common::ProductId;
use thiserror::Error;

/// Errors that can occur while validating or placing an order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    /// The cart has no lines.
    #[error("Order has no items")]
    NoItems,

    /// A cart line asked for zero units.
    #[error("Invalid quantity {quantity} for product {product_id} (must be greater than 0)")]
    InvalidQuantity { product_id: ProductId, quantity: u32 },

    #[error("Shipping address is required")]
    MissingShippingAddress,

    #[error("Shipping address is missing {field}")]
    InvalidShippingAddress { field: &'static str },

    /// Neither an authenticated identity nor a guest email was supplied.
    #[error("Guest email is required when not signed in")]
    GuestEmailRequired,

    #[error("Invalid email address: '{0}'")]
    InvalidEmail(String),

    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    #[error(
        "Insufficient stock for product {product_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },
}

impl OrderError {
    /// Returns true for errors caused by the request itself rather than by
    /// the current state of inventory or the order.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            OrderError::NoItems
                | OrderError::InvalidQuantity { .. }
                | OrderError::MissingShippingAddress
                | OrderError::InvalidShippingAddress { .. }
                | OrderError::GuestEmailRequired
                | OrderError::InvalidEmail(_)
        )
    }
}

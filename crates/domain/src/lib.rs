//! Domain layer for the checkout system.
//!
//! This crate holds the rules that do not depend on storage or transport:
//! - [`Money`] as a fixed-point decimal with minor-unit conversion
//! - [`Product`] and its stock checks
//! - [`PlaceOrder`] validation and [`price_cart`]
//! - The order and payment state machines

pub mod error;
pub mod money;
pub mod order;
pub mod payment;
pub mod product;

pub use error::ParseEnumError;
pub use money::Money;
pub use order::{
    CartLine, Email, Identity, OrderError, OrderStatus, Owner, PlaceOrder, PricedCart, PricedLine,
    ShippingAddress, price_cart,
};
pub use payment::{PaymentMethod, PaymentOutcome, PaymentStatus, Transition};
pub use product::{Product, ProductError};

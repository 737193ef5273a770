//! Persistence for the checkout system.
//!
//! The [`Store`] trait is the single owner of product stock and of order and
//! payment status. [`InMemoryStore`] backs tests and single-process runs;
//! [`PostgresStore`] backs production.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod records;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use records::{
    OrderDetails, OrderDraft, OrderItemRecord, OrderRecord, PaymentRecord, Settlement,
};
pub use store::Store;

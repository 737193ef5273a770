use async_trait::async_trait;
use common::{OrderId, ProductId, Reference};
use domain::{PaymentOutcome, Product};

use crate::{OrderDetails, OrderDraft, PaymentRecord, Result, Settlement};

/// Core trait for store implementations.
///
/// A store owns products, orders, order items and payments, and is the only
/// place where stock and statuses change. Every mutating method is atomic:
/// it either applies all of its writes or none of them. All implementations
/// must be thread-safe (Send + Sync).
#[async_trait]
pub trait Store: Send + Sync {
    /// Checks that the backing storage is reachable.
    async fn ping(&self) -> Result<()>;

    /// Registers a new product.
    ///
    /// Fails with `DuplicateProduct` if the id is already taken.
    async fn insert_product(&self, product: Product) -> Result<Product>;

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>>;

    /// Adds `quantity` units to a product's stock and returns the product.
    async fn restock(&self, id: ProductId, quantity: u32) -> Result<Product>;

    /// Removes `quantity` units from stock if at least that many are left.
    ///
    /// Fails with `InsufficientStock` otherwise, leaving stock untouched.
    async fn reserve_stock(&self, id: ProductId, quantity: u32) -> Result<Product>;

    /// Places an order in one atomic unit.
    ///
    /// Prices each line from the current product rows, checks and decrements
    /// stock, inserts the order, its items and a pending payment sharing the
    /// order's reference. Any failure leaves no trace.
    ///
    /// Fails with `DuplicateReference` if the draft's reference is taken.
    async fn place_order(&self, draft: OrderDraft) -> Result<OrderDetails>;

    /// Remembers the hosted-checkout URL issued for a payment.
    async fn record_checkout_session(
        &self,
        reference: &Reference,
        authorization_url: &str,
    ) -> Result<PaymentRecord>;

    async fn get_order(&self, id: OrderId) -> Result<Option<OrderDetails>>;

    async fn get_order_by_reference(&self, reference: &Reference) -> Result<Option<OrderDetails>>;

    async fn get_payment_by_reference(&self, reference: &Reference)
    -> Result<Option<PaymentRecord>>;

    /// Applies a gateway outcome to the payment with this reference.
    ///
    /// The write is guarded by the stored status: only a pending payment
    /// moves, and a success also marks the order paid in the same unit.
    /// Concurrent callers for the same reference serialize here, and all but
    /// the first observe `Settlement::AlreadySettled`.
    async fn settle_payment(
        &self,
        reference: &Reference,
        outcome: PaymentOutcome,
    ) -> Result<Settlement>;

    /// Cancels a pending order and returns its items to stock.
    ///
    /// A pending payment is marked failed. Fails with `InvalidTransition`
    /// unless the order is pending.
    async fn cancel_order(&self, reference: &Reference) -> Result<OrderDetails>;
}

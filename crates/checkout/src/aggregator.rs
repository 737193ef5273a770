//! Order aggregation: turning a validated cart into a committed order with
//! an open checkout session.

use common::Reference;
use domain::PlaceOrder;
use store::{OrderDetails, OrderDraft, Store, StoreError};

use crate::error::{CheckoutError, Result};
use crate::initiator::{OrderReceipt, PaymentInitiator};
use crate::notifications::{self, NotificationQueue};
use crate::services::PaymentGateway;

/// How many fresh references are tried before giving up on a collision.
pub const MAX_REFERENCE_ATTEMPTS: u32 = 3;

/// Places orders and hands them to the payment initiator.
///
/// Pricing, stock checks, stock decrements and the order, item and payment
/// inserts all happen inside one store call, so a failed placement leaves
/// nothing behind. Opening the checkout session happens after commit.
#[derive(Clone)]
pub struct OrderAggregator<S, G> {
    store: S,
    initiator: PaymentInitiator<S, G>,
    notifications: NotificationQueue,
}

impl<S, G> OrderAggregator<S, G>
where
    S: Store,
    G: PaymentGateway,
{
    pub fn new(
        store: S,
        initiator: PaymentInitiator<S, G>,
        notifications: NotificationQueue,
    ) -> Self {
        Self {
            store,
            initiator,
            notifications,
        }
    }

    /// Places an order and opens its checkout session.
    ///
    /// If the gateway is unavailable the order stays committed and pending,
    /// and the error carries its reference so payment can be resumed.
    #[tracing::instrument(skip(self, command), fields(lines = command.lines().len()))]
    pub async fn place_order(&self, command: PlaceOrder) -> Result<OrderReceipt> {
        let started = std::time::Instant::now();

        let details = match self.commit(&command).await {
            Ok(details) => details,
            Err(e) => {
                metrics::counter!("orders_rejected_total", "reason" => e.reason()).increment(1);
                tracing::info!(error = %e, "order rejected");
                return Err(e);
            }
        };

        metrics::counter!("orders_placed_total").increment(1);
        tracing::info!(
            order_id = %details.order.id,
            reference = %details.order.reference,
            total = %details.order.total_amount,
            "order placed"
        );

        let receipt = self.initiator.initiate(details).await;
        metrics::histogram!("place_order_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        let receipt = receipt?;

        self.notifications.enqueue(notifications::order_pending(
            &receipt.details.order,
            &receipt.payment_url,
        ));
        Ok(receipt)
    }

    /// Commits the order, drawing a new reference if the generated one is
    /// already taken.
    async fn commit(&self, command: &PlaceOrder) -> Result<OrderDetails> {
        let mut draft = OrderDraft::new(command, Reference::generate());
        let mut attempt = 1;
        loop {
            match self.store.place_order(draft.clone()).await {
                Ok(details) => return Ok(details),
                Err(StoreError::DuplicateReference(reference))
                    if attempt < MAX_REFERENCE_ATTEMPTS =>
                {
                    tracing::warn!(%reference, attempt, "order reference collision, regenerating");
                    attempt += 1;
                    draft = draft.with_reference(Reference::generate());
                }
                Err(e) => return Err(CheckoutError::from(e)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use domain::{CartLine, Money, OrderError, OrderStatus, Product, ShippingAddress};
    use store::InMemoryStore;

    use super::*;
    use crate::notifications::RetryPolicy;
    use crate::services::{InMemoryGateway, InMemoryNotifier};

    struct Fixture {
        store: InMemoryStore,
        gateway: InMemoryGateway,
        notifier: InMemoryNotifier,
        queue: NotificationQueue,
        aggregator: OrderAggregator<InMemoryStore, InMemoryGateway>,
    }

    fn fixture() -> Fixture {
        let store = InMemoryStore::new();
        let gateway = InMemoryGateway::new();
        let notifier = InMemoryNotifier::new();
        let (queue, _worker) = NotificationQueue::spawn(
            notifier.clone(),
            RetryPolicy::new(1, Duration::ZERO),
            16,
        );
        let initiator = PaymentInitiator::new(store.clone(), gateway.clone(), "http://cb");
        let aggregator = OrderAggregator::new(store.clone(), initiator, queue.clone());
        Fixture {
            store,
            gateway,
            notifier,
            queue,
            aggregator,
        }
    }

    fn guest_order(product: &Product, quantity: u32) -> PlaceOrder {
        PlaceOrder::new(
            vec![CartLine::new(product.id, quantity)],
            Some(ShippingAddress::new("1 Marina Rd", "Lagos", "Lagos")),
            None,
            Some("guest@example.com"),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_place_order_commits_and_notifies() {
        let f = fixture();
        let product = f
            .store
            .insert_product(Product::new("Comb", Money::from_major(1000), 5).unwrap())
            .await
            .unwrap();

        let receipt = f.aggregator.place_order(guest_order(&product, 2)).await.unwrap();

        assert_eq!(receipt.details.order.status, OrderStatus::Pending);
        assert_eq!(receipt.details.order.total_amount, Money::from_major(2000));
        assert_eq!(receipt.details.payment.reference, receipt.details.order.reference);

        f.queue.flush().await;
        let sent = f.notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "Order Confirmation");
        assert!(sent[0].body.contains(&receipt.payment_url));
    }

    #[tokio::test]
    async fn test_rejected_order_leaves_no_trace() {
        let f = fixture();
        let product = f
            .store
            .insert_product(Product::new("Comb", Money::from_major(1000), 1).unwrap())
            .await
            .unwrap();

        let err = f
            .aggregator
            .place_order(guest_order(&product, 2))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CheckoutError::Order(OrderError::InsufficientStock { .. })
        ));
        assert_eq!(f.store.order_count().await, 0);
        assert_eq!(f.store.get_product(product.id).await.unwrap().unwrap().stock, 1);
        assert_eq!(f.gateway.initialize_calls(), 0);
    }

    #[tokio::test]
    async fn test_gateway_failure_keeps_order_and_skips_notification() {
        let f = fixture();
        let product = f
            .store
            .insert_product(Product::new("Comb", Money::from_major(1000), 5).unwrap())
            .await
            .unwrap();
        f.gateway.set_fail_on_initialize(true);

        let err = f
            .aggregator
            .place_order(guest_order(&product, 1))
            .await
            .unwrap_err();

        let reference = err.reference().cloned().unwrap();
        let stored = f.store.get_order_by_reference(&reference).await.unwrap().unwrap();
        assert_eq!(stored.order.status, OrderStatus::Pending);

        f.queue.flush().await;
        assert_eq!(f.notifier.sent_count(), 0);
    }
}

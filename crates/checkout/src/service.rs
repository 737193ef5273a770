//! Checkout facade wiring the ledger, aggregator, initiator and reconciler
//! over one store and one gateway.

use std::time::Duration;

use common::{OrderId, ProductId, Reference};
use domain::{Money, PlaceOrder, Product};
use store::{OrderDetails, Store};

use crate::aggregator::OrderAggregator;
use crate::error::{CheckoutError, Result};
use crate::initiator::{OrderReceipt, PaymentInitiator};
use crate::inventory::InventoryLedger;
use crate::notifications::NotificationQueue;
use crate::reconciler::{GatewayReconciler, Verification, WebhookAck};
use crate::services::PaymentGateway;

/// Settings shared by the checkout services.
#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    /// Where the gateway sends the customer after checkout.
    pub callback_url: String,
    /// Secret used to authenticate webhook deliveries.
    pub webhook_secret: Vec<u8>,
    /// Upper bound on a single verification call to the gateway.
    pub verify_timeout: Duration,
}

/// Entry point for every checkout operation.
#[derive(Clone)]
pub struct CheckoutService<S, G> {
    store: S,
    ledger: InventoryLedger<S>,
    initiator: PaymentInitiator<S, G>,
    aggregator: OrderAggregator<S, G>,
    reconciler: GatewayReconciler<S, G>,
}

impl<S, G> CheckoutService<S, G>
where
    S: Store + Clone,
    G: PaymentGateway + Clone,
{
    pub fn new(
        store: S,
        gateway: G,
        notifications: NotificationQueue,
        settings: CheckoutSettings,
    ) -> Self {
        let initiator =
            PaymentInitiator::new(store.clone(), gateway.clone(), settings.callback_url);
        let aggregator =
            OrderAggregator::new(store.clone(), initiator.clone(), notifications.clone());
        let reconciler = GatewayReconciler::new(
            store.clone(),
            gateway,
            notifications,
            settings.webhook_secret,
            settings.verify_timeout,
        );
        Self {
            ledger: InventoryLedger::new(store.clone()),
            store,
            initiator,
            aggregator,
            reconciler,
        }
    }

    pub fn ledger(&self) -> &InventoryLedger<S> {
        &self.ledger
    }

    /// Checks that the store is reachable.
    pub async fn ping(&self) -> Result<()> {
        Ok(self.store.ping().await?)
    }

    pub async fn register_product(&self, name: &str, price: Money, stock: u32) -> Result<Product> {
        self.ledger.register(name, price, stock).await
    }

    pub async fn restock(&self, id: ProductId, quantity: u32) -> Result<Product> {
        self.ledger.restock(id, quantity).await
    }

    pub async fn get_product(&self, id: ProductId) -> Result<Product> {
        self.ledger.stock_level(id).await
    }

    pub async fn place_order(&self, command: PlaceOrder) -> Result<OrderReceipt> {
        self.aggregator.place_order(command).await
    }

    /// Re-opens checkout for a pending order whose session failed to open
    /// or was lost.
    pub async fn resume_payment(&self, reference: &Reference) -> Result<OrderReceipt> {
        self.initiator.resume(reference).await
    }

    pub async fn get_order(&self, reference: &Reference) -> Result<OrderDetails> {
        self.store
            .get_order_by_reference(reference)
            .await?
            .ok_or_else(|| CheckoutError::OrderNotFound(reference.to_string()))
    }

    pub async fn get_order_by_id(&self, id: OrderId) -> Result<OrderDetails> {
        self.store
            .get_order(id)
            .await?
            .ok_or_else(|| CheckoutError::OrderNotFound(id.to_string()))
    }

    /// Cancels a pending order and returns its stock.
    #[tracing::instrument(skip(self, reference), fields(reference = %reference))]
    pub async fn cancel_order(&self, reference: &Reference) -> Result<OrderDetails> {
        let details = self.store.cancel_order(reference).await?;
        metrics::counter!("orders_cancelled_total").increment(1);
        tracing::info!(order_id = %details.order.id, "order cancelled");
        Ok(details)
    }

    pub async fn handle_webhook(&self, payload: &[u8], signature: Option<&str>) -> Result<WebhookAck> {
        self.reconciler.handle_webhook(payload, signature).await
    }

    pub async fn verify_payment(&self, reference: &Reference) -> Result<Verification> {
        self.reconciler.verify_payment(reference).await
    }
}

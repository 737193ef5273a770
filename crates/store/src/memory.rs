use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{OrderId, OrderItemId, PaymentId, ProductId, Reference};
use domain::{
    OrderError, OrderStatus, PaymentOutcome, PaymentStatus, Product, ProductError, Transition,
    price_cart,
};
use tokio::sync::RwLock;

use crate::{
    OrderDetails, OrderDraft, OrderItemRecord, OrderRecord, PaymentRecord, Result, Settlement,
    Store, StoreError,
};

#[derive(Debug, Default)]
struct State {
    products: HashMap<ProductId, Product>,
    orders: HashMap<OrderId, OrderRecord>,
    items: HashMap<OrderId, Vec<OrderItemRecord>>,
    payments: HashMap<OrderId, PaymentRecord>,
    references: HashMap<Reference, OrderId>,
}

impl State {
    fn order_id_for(&self, reference: &Reference) -> Option<OrderId> {
        self.references.get(reference).copied()
    }

    fn details(&self, order_id: OrderId) -> Result<Option<OrderDetails>> {
        let Some(order) = self.orders.get(&order_id) else {
            return Ok(None);
        };
        let payment = self.payments.get(&order_id).ok_or_else(|| {
            StoreError::Corrupt(format!("order {order_id} has no payment"))
        })?;

        Ok(Some(OrderDetails {
            order: order.clone(),
            items: self.items.get(&order_id).cloned().unwrap_or_default(),
            payment: payment.clone(),
        }))
    }
}

/// In-memory store implementation for testing and single-process use.
///
/// All state sits behind one write lock, so every operation is serialized
/// and trivially atomic. Each mutating method validates everything it needs
/// before its first write.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }

    /// Returns the total number of payments stored.
    pub async fn payment_count(&self) -> usize {
        self.state.read().await.payments.len()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn insert_product(&self, product: Product) -> Result<Product> {
        let mut state = self.state.write().await;
        if state.products.contains_key(&product.id) {
            return Err(StoreError::DuplicateProduct(product.id));
        }
        state.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.state.read().await.products.get(&id).cloned())
    }

    async fn restock(&self, id: ProductId, quantity: u32) -> Result<Product> {
        if quantity == 0 {
            return Err(ProductError::InvalidQuantity { quantity }.into());
        }

        let mut state = self.state.write().await;
        let product = state
            .products
            .get_mut(&id)
            .ok_or(OrderError::ProductNotFound(id))?;
        product.release(quantity)?;
        Ok(product.clone())
    }

    async fn reserve_stock(&self, id: ProductId, quantity: u32) -> Result<Product> {
        if quantity == 0 {
            return Err(ProductError::InvalidQuantity { quantity }.into());
        }

        let mut state = self.state.write().await;
        let product = state
            .products
            .get_mut(&id)
            .ok_or(OrderError::ProductNotFound(id))?;
        if !product.has_stock_for(quantity) {
            return Err(OrderError::InsufficientStock {
                product_id: id,
                requested: quantity,
                available: product.stock,
            }
            .into());
        }
        product.stock -= quantity;
        Ok(product.clone())
    }

    async fn place_order(&self, draft: OrderDraft) -> Result<OrderDetails> {
        let mut state = self.state.write().await;

        if state.references.contains_key(&draft.reference) {
            return Err(StoreError::DuplicateReference(draft.reference));
        }
        let priced = price_cart(&draft.lines, &state.products)?;

        for line in &priced.lines {
            if let Some(product) = state.products.get_mut(&line.product_id) {
                product.stock -= line.quantity;
            }
        }

        let now = Utc::now();
        let order_id = draft.order_id;
        let order = OrderRecord {
            id: order_id,
            owner: draft.owner,
            contact_email: draft.contact_email,
            total_amount: priced.total,
            status: OrderStatus::Pending,
            shipping_address: draft.shipping_address,
            reference: draft.reference.clone(),
            created_at: now,
            updated_at: now,
        };
        let items: Vec<OrderItemRecord> = priced
            .lines
            .iter()
            .map(|line| OrderItemRecord {
                id: OrderItemId::new(),
                order_id,
                product_id: line.product_id,
                quantity: line.quantity,
                price: line.unit_price,
            })
            .collect();
        let payment = PaymentRecord {
            id: PaymentId::new(),
            order_id,
            amount: priced.total,
            status: PaymentStatus::Pending,
            reference: draft.reference.clone(),
            payment_method: draft.payment_method,
            authorization_url: None,
            created_at: now,
            updated_at: now,
        };

        state.references.insert(draft.reference, order_id);
        state.orders.insert(order_id, order.clone());
        state.items.insert(order_id, items.clone());
        state.payments.insert(order_id, payment.clone());

        Ok(OrderDetails {
            order,
            items,
            payment,
        })
    }

    async fn record_checkout_session(
        &self,
        reference: &Reference,
        authorization_url: &str,
    ) -> Result<PaymentRecord> {
        let mut state = self.state.write().await;
        let payment = state
            .order_id_for(reference)
            .and_then(|order_id| state.payments.get_mut(&order_id))
            .ok_or_else(|| StoreError::PaymentNotFound(reference.clone()))?;

        payment.authorization_url = Some(authorization_url.to_string());
        payment.updated_at = Utc::now();
        Ok(payment.clone())
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<OrderDetails>> {
        self.state.read().await.details(id)
    }

    async fn get_order_by_reference(&self, reference: &Reference) -> Result<Option<OrderDetails>> {
        let state = self.state.read().await;
        match state.order_id_for(reference) {
            Some(order_id) => state.details(order_id),
            None => Ok(None),
        }
    }

    async fn get_payment_by_reference(
        &self,
        reference: &Reference,
    ) -> Result<Option<PaymentRecord>> {
        let state = self.state.read().await;
        Ok(state
            .order_id_for(reference)
            .and_then(|order_id| state.payments.get(&order_id))
            .cloned())
    }

    async fn settle_payment(
        &self,
        reference: &Reference,
        outcome: PaymentOutcome,
    ) -> Result<Settlement> {
        let mut state = self.state.write().await;
        let order_id = state
            .order_id_for(reference)
            .ok_or_else(|| StoreError::PaymentNotFound(reference.clone()))?;

        let State {
            orders, payments, ..
        } = &mut *state;
        let payment = payments
            .get_mut(&order_id)
            .ok_or_else(|| StoreError::PaymentNotFound(reference.clone()))?;
        let order = orders
            .get_mut(&order_id)
            .ok_or_else(|| StoreError::OrderNotFound(reference.to_string()))?;

        match payment.status.apply(outcome) {
            Transition::AlreadySettled(_) => Ok(Settlement::AlreadySettled {
                payment: payment.clone(),
                order: order.clone(),
            }),
            Transition::Applied { to, .. } => {
                let now = Utc::now();
                payment.status = to;
                payment.updated_at = now;
                if to == PaymentStatus::Success && order.status.can_mark_paid() {
                    order.status = OrderStatus::Paid;
                    order.updated_at = now;
                }
                Ok(Settlement::Applied {
                    payment: payment.clone(),
                    order: order.clone(),
                })
            }
        }
    }

    async fn cancel_order(&self, reference: &Reference) -> Result<OrderDetails> {
        let mut state = self.state.write().await;
        let order_id = state
            .order_id_for(reference)
            .ok_or_else(|| StoreError::OrderNotFound(reference.to_string()))?;
        let details = state
            .details(order_id)?
            .ok_or_else(|| StoreError::OrderNotFound(reference.to_string()))?;

        if !details.order.status.can_cancel() || details.payment.status == PaymentStatus::Success {
            return Err(StoreError::InvalidTransition {
                reference: reference.clone(),
                status: details.order.status,
                action: "cancel",
            });
        }

        let mut restocked = Vec::with_capacity(details.items.len());
        for item in &details.items {
            let mut product = state.products.get(&item.product_id).cloned().ok_or_else(|| {
                StoreError::Corrupt(format!("order item references missing product {}", item.product_id))
            })?;
            product.release(item.quantity)?;
            restocked.push(product);
        }

        for product in restocked {
            state.products.insert(product.id, product);
        }

        let now = Utc::now();
        if let Some(payment) = state.payments.get_mut(&order_id)
            && payment.status == PaymentStatus::Pending
        {
            payment.status = PaymentStatus::Failed;
            payment.updated_at = now;
        }
        if let Some(order) = state.orders.get_mut(&order_id) {
            order.status = OrderStatus::Cancelled;
            order.updated_at = now;
        }

        state
            .details(order_id)?
            .ok_or_else(|| StoreError::OrderNotFound(reference.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use domain::{CartLine, Email, Money, Owner, PaymentMethod, ShippingAddress};
    use rust_decimal_macros::dec;

    use super::*;

    async fn seeded(stock: u32) -> (InMemoryStore, Product) {
        let store = InMemoryStore::new();
        let product = store
            .insert_product(Product::new("Shea butter", Money::from_major(1000), stock).unwrap())
            .await
            .unwrap();
        (store, product)
    }

    fn draft(lines: Vec<CartLine>) -> OrderDraft {
        let email = Email::parse("a@b.com").unwrap();
        OrderDraft {
            order_id: OrderId::new(),
            reference: Reference::generate(),
            owner: Owner::Guest {
                email: email.clone(),
            },
            contact_email: email,
            shipping_address: ShippingAddress::new("1 Marina Rd", "Lagos", "Lagos"),
            lines,
            payment_method: PaymentMethod::Card,
        }
    }

    #[tokio::test]
    async fn test_place_order_reserves_and_creates_pending_payment() {
        let (store, product) = seeded(5).await;

        let details = store
            .place_order(draft(vec![CartLine::new(product.id, 2)]))
            .await
            .unwrap();

        assert_eq!(details.order.total_amount.amount(), dec!(2000.00));
        assert_eq!(details.order.status, OrderStatus::Pending);
        assert_eq!(details.payment.status, PaymentStatus::Pending);
        assert_eq!(details.payment.amount, details.order.total_amount);
        assert_eq!(details.payment.reference, details.order.reference);
        assert_eq!(details.items.len(), 1);
        assert_eq!(details.items[0].price, product.price);

        let product = store.get_product(product.id).await.unwrap().unwrap();
        assert_eq!(product.stock, 3);
    }

    #[tokio::test]
    async fn test_failed_placement_leaves_no_trace() {
        let (store, product) = seeded(5).await;
        let missing = ProductId::new();

        let result = store
            .place_order(draft(vec![
                CartLine::new(product.id, 2),
                CartLine::new(missing, 1),
            ]))
            .await;

        assert!(matches!(
            result,
            Err(StoreError::Order(OrderError::ProductNotFound(id))) if id == missing
        ));
        assert_eq!(store.order_count().await, 0);
        assert_eq!(store.payment_count().await, 0);
        assert_eq!(store.get_product(product.id).await.unwrap().unwrap().stock, 5);
    }

    #[tokio::test]
    async fn test_repeated_lines_cannot_overdraw_stock() {
        let (store, product) = seeded(5).await;

        let result = store
            .place_order(draft(vec![
                CartLine::new(product.id, 3),
                CartLine::new(product.id, 3),
            ]))
            .await;

        assert!(matches!(
            result,
            Err(StoreError::Order(OrderError::InsufficientStock {
                requested: 6,
                available: 5,
                ..
            }))
        ));
        assert_eq!(store.order_count().await, 0);
        assert_eq!(store.get_product(product.id).await.unwrap().unwrap().stock, 5);
    }

    #[tokio::test]
    async fn test_duplicate_reference_is_rejected() {
        let (store, product) = seeded(5).await;
        let first = draft(vec![CartLine::new(product.id, 1)]);
        let reference = first.reference.clone();
        store.place_order(first).await.unwrap();

        let second = draft(vec![CartLine::new(product.id, 1)]).with_reference(reference.clone());
        let result = store.place_order(second).await;

        assert!(matches!(result, Err(StoreError::DuplicateReference(r)) if r == reference));
        assert_eq!(store.get_product(product.id).await.unwrap().unwrap().stock, 4);
    }

    #[tokio::test]
    async fn test_settle_success_marks_order_paid_once() {
        let (store, product) = seeded(5).await;
        let details = store
            .place_order(draft(vec![CartLine::new(product.id, 1)]))
            .await
            .unwrap();
        let reference = details.reference().clone();

        let first = store
            .settle_payment(&reference, PaymentOutcome::Success)
            .await
            .unwrap();
        assert!(first.is_applied());
        assert_eq!(first.payment().status, PaymentStatus::Success);
        assert_eq!(first.order().status, OrderStatus::Paid);

        let second = store
            .settle_payment(&reference, PaymentOutcome::Failed)
            .await
            .unwrap();
        assert!(!second.is_applied());
        assert_eq!(second.payment().status, PaymentStatus::Success);
    }

    #[tokio::test]
    async fn test_settle_failure_leaves_order_pending() {
        let (store, product) = seeded(5).await;
        let details = store
            .place_order(draft(vec![CartLine::new(product.id, 1)]))
            .await
            .unwrap();

        let settlement = store
            .settle_payment(details.reference(), PaymentOutcome::Failed)
            .await
            .unwrap();

        assert_eq!(settlement.payment().status, PaymentStatus::Failed);
        assert_eq!(settlement.order().status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_settle_unknown_reference() {
        let store = InMemoryStore::new();
        let result = store
            .settle_payment(&Reference::new("order-0-missing"), PaymentOutcome::Success)
            .await;
        assert!(matches!(result, Err(StoreError::PaymentNotFound(_))));
    }

    #[tokio::test]
    async fn test_cancel_releases_stock() {
        let (store, product) = seeded(5).await;
        let details = store
            .place_order(draft(vec![CartLine::new(product.id, 3)]))
            .await
            .unwrap();

        let cancelled = store.cancel_order(details.reference()).await.unwrap();

        assert_eq!(cancelled.order.status, OrderStatus::Cancelled);
        assert_eq!(cancelled.payment.status, PaymentStatus::Failed);
        assert_eq!(store.get_product(product.id).await.unwrap().unwrap().stock, 5);

        let again = store.cancel_order(details.reference()).await;
        assert!(matches!(again, Err(StoreError::InvalidTransition { .. })));
    }

    #[tokio::test]
    async fn test_paid_order_cannot_be_cancelled() {
        let (store, product) = seeded(5).await;
        let details = store
            .place_order(draft(vec![CartLine::new(product.id, 1)]))
            .await
            .unwrap();
        store
            .settle_payment(details.reference(), PaymentOutcome::Success)
            .await
            .unwrap();

        let result = store.cancel_order(details.reference()).await;
        assert!(matches!(
            result,
            Err(StoreError::InvalidTransition {
                status: OrderStatus::Paid,
                ..
            })
        ));
        assert_eq!(store.get_product(product.id).await.unwrap().unwrap().stock, 4);
    }

    #[tokio::test]
    async fn test_reserve_and_restock() {
        let (store, product) = seeded(2).await;

        assert_eq!(store.reserve_stock(product.id, 2).await.unwrap().stock, 0);
        assert!(matches!(
            store.reserve_stock(product.id, 1).await,
            Err(StoreError::Order(OrderError::InsufficientStock { available: 0, .. }))
        ));
        assert_eq!(store.restock(product.id, 4).await.unwrap().stock, 4);
        assert!(matches!(
            store.restock(product.id, 0).await,
            Err(StoreError::Product(ProductError::InvalidQuantity { .. }))
        ));
    }

    #[tokio::test]
    async fn test_record_checkout_session() {
        let (store, product) = seeded(1).await;
        let details = store
            .place_order(draft(vec![CartLine::new(product.id, 1)]))
            .await
            .unwrap();

        let payment = store
            .record_checkout_session(details.reference(), "https://checkout.example/abc")
            .await
            .unwrap();
        assert_eq!(
            payment.authorization_url.as_deref(),
            Some("https://checkout.example/abc")
        );

        let looked_up = store
            .get_order(details.order.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(looked_up.payment, payment);
    }
}

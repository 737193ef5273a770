//! End-to-end checkout flows over the in-memory store and gateway.

use std::time::Duration;

use checkout::{
    CheckoutError, CheckoutService, CheckoutSettings, ErrorCategory, InMemoryGateway,
    InMemoryNotifier, NotificationQueue, RetryPolicy, WebhookAck, sign_payload,
};
use common::{Reference, UserId};
use domain::{
    CartLine, Email, Identity, Money, OrderError, OrderStatus, Owner, PaymentStatus, PlaceOrder,
    Product, ShippingAddress,
};
use rust_decimal_macros::dec;
use store::{InMemoryStore, Store};

const SECRET: &[u8] = b"sk_test_integration";

type TestService = CheckoutService<InMemoryStore, InMemoryGateway>;

struct TestHarness {
    service: TestService,
    store: InMemoryStore,
    gateway: InMemoryGateway,
    notifier: InMemoryNotifier,
    queue: NotificationQueue,
}

impl TestHarness {
    fn new() -> Self {
        Self::with_verify_timeout(Duration::from_secs(2))
    }

    fn with_verify_timeout(verify_timeout: Duration) -> Self {
        let store = InMemoryStore::new();
        let gateway = InMemoryGateway::new();
        let notifier = InMemoryNotifier::new();
        let (queue, _worker) =
            NotificationQueue::spawn(notifier.clone(), RetryPolicy::new(1, Duration::ZERO), 64);

        let service = CheckoutService::new(
            store.clone(),
            gateway.clone(),
            queue.clone(),
            CheckoutSettings {
                callback_url: "http://localhost:3000/payments/callback".to_string(),
                webhook_secret: SECRET.to_vec(),
                verify_timeout,
            },
        );

        Self {
            service,
            store,
            gateway,
            notifier,
            queue,
        }
    }

    async fn product(&self, price: i64, stock: u32) -> Product {
        self.service
            .register_product("Shea butter", Money::from_major(price), stock)
            .await
            .unwrap()
    }

    async fn stock(&self, product: &Product) -> u32 {
        self.service.get_product(product.id).await.unwrap().stock
    }

    async fn subjects(&self) -> Vec<String> {
        self.queue.flush().await;
        self.notifier
            .sent()
            .into_iter()
            .map(|n| n.subject)
            .collect()
    }

    fn signed(&self, event: &str, reference: &Reference, amount: i64) -> (Vec<u8>, String) {
        let body = serde_json::to_vec(&serde_json::json!({
            "event": event,
            "data": { "reference": reference.as_str(), "amount": amount, "status": "success" }
        }))
        .unwrap();
        let signature = sign_payload(SECRET, &body);
        (body, signature)
    }
}

fn address() -> ShippingAddress {
    ShippingAddress::new("12 Admiralty Way", "Lekki", "Lagos")
}

fn guest_cart(lines: Vec<CartLine>) -> PlaceOrder {
    PlaceOrder::new(lines, Some(address()), None, Some("ada@example.com")).unwrap()
}

#[tokio::test]
async fn test_guest_checkout_scenario() {
    let h = TestHarness::new();
    let product = h.product(1000, 5).await;

    let receipt = h
        .service
        .place_order(guest_cart(vec![CartLine::new(product.id, 2)]))
        .await
        .unwrap();

    let details = &receipt.details;
    assert_eq!(details.order.total_amount.amount(), dec!(2000.00));
    assert_eq!(details.order.status, OrderStatus::Pending);
    assert_eq!(details.payment.status, PaymentStatus::Pending);
    assert_eq!(details.payment.amount, details.order.total_amount);
    assert_eq!(details.payment.reference, details.order.reference);
    assert_eq!(details.items.len(), 1);
    assert_eq!(details.items[0].price, Money::from_major(1000));
    assert_eq!(
        details.order.owner,
        Owner::Guest {
            email: Email::parse("ada@example.com").unwrap()
        }
    );
    assert!(receipt.payment_url.starts_with("https://"));
    assert_eq!(h.stock(&product).await, 3);

    let session = h.gateway.session(receipt.reference()).unwrap();
    assert_eq!(session.amount_minor, 200_000);
    assert_eq!(h.subjects().await, vec!["Order Confirmation"]);
}

#[tokio::test]
async fn test_registered_user_checkout() {
    let h = TestHarness::new();
    let product = h.product(250, 10).await;
    let user_id = UserId::new();
    let identity = Identity::new(user_id, Email::parse("user@example.com").unwrap());

    let command = PlaceOrder::new(
        vec![CartLine::new(product.id, 1)],
        Some(address()),
        Some(identity),
        Some("ignored@example.com"),
    )
    .unwrap();
    let receipt = h.service.place_order(command).await.unwrap();

    assert_eq!(receipt.details.order.owner, Owner::User { user_id });
    assert_eq!(receipt.details.order.contact_email.as_str(), "user@example.com");
}

#[tokio::test]
async fn test_total_is_sum_of_line_totals() {
    let h = TestHarness::new();
    let a = h.product(1000, 5).await;
    let b = h
        .service
        .register_product("Comb", Money::new(dec!(49.99)), 5)
        .await
        .unwrap();

    let receipt = h
        .service
        .place_order(guest_cart(vec![
            CartLine::new(a.id, 1),
            CartLine::new(b.id, 3),
        ]))
        .await
        .unwrap();

    let details = receipt.details;
    let sum: Money = details.items.iter().map(|item| item.line_total()).sum();
    assert_eq!(details.order.total_amount, sum);
    assert_eq!(sum.amount(), dec!(1149.97));
}

#[tokio::test]
async fn test_validation_failures_touch_nothing() {
    let h = TestHarness::new();
    let product = h.product(1000, 5).await;

    let empty = PlaceOrder::new(vec![], Some(address()), None, Some("ada@example.com"));
    assert_eq!(empty.unwrap_err(), OrderError::NoItems);

    let no_address = PlaceOrder::new(
        vec![CartLine::new(product.id, 1)],
        None,
        None,
        Some("ada@example.com"),
    );
    assert_eq!(no_address.unwrap_err(), OrderError::MissingShippingAddress);

    let err = CheckoutError::from(OrderError::GuestEmailRequired);
    assert_eq!(err.category(), ErrorCategory::Validation);

    assert_eq!(h.store.order_count().await, 0);
    assert_eq!(h.stock(&product).await, 5);
    assert_eq!(h.gateway.initialize_calls(), 0);
}

#[tokio::test]
async fn test_unknown_product_and_insufficient_stock() {
    let h = TestHarness::new();
    let product = h.product(1000, 1).await;

    let err = h
        .service
        .place_order(guest_cart(vec![CartLine::new(common::ProductId::new(), 1)]))
        .await
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::NotFound);

    let err = h
        .service
        .place_order(guest_cart(vec![CartLine::new(product.id, 2)]))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CheckoutError::Order(OrderError::InsufficientStock {
            requested: 2,
            available: 1,
            ..
        })
    ));
    assert_eq!(h.store.order_count().await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_last_unit_goes_to_exactly_one_order() {
    let h = TestHarness::new();
    let product = h.product(1000, 1).await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let service = h.service.clone();
        let cart = guest_cart(vec![CartLine::new(product.id, 1)]);
        handles.push(tokio::spawn(async move { service.place_order(cart).await }));
    }

    let mut placed = 0;
    let mut out_of_stock = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => placed += 1,
            Err(CheckoutError::Order(OrderError::InsufficientStock { .. })) => out_of_stock += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(placed, 1);
    assert_eq!(out_of_stock, 7);
    assert_eq!(h.stock(&product).await, 0);
    assert_eq!(h.store.order_count().await, 1);
}

#[tokio::test]
async fn test_replayed_webhook_notifies_once() {
    let h = TestHarness::new();
    let product = h.product(1000, 5).await;
    let receipt = h
        .service
        .place_order(guest_cart(vec![CartLine::new(product.id, 2)]))
        .await
        .unwrap();
    let (body, signature) = h.signed("charge.success", receipt.reference(), 200_000);

    let mut acks = Vec::new();
    for _ in 0..3 {
        acks.push(
            h.service
                .handle_webhook(&body, Some(&signature))
                .await
                .unwrap(),
        );
    }

    assert_eq!(acks[0], WebhookAck::Applied(PaymentStatus::Success));
    assert_eq!(acks[1], WebhookAck::Duplicate(PaymentStatus::Success));
    assert_eq!(acks[2], WebhookAck::Duplicate(PaymentStatus::Success));

    let order = h.service.get_order(receipt.reference()).await.unwrap();
    assert_eq!(order.order.status, OrderStatus::Paid);
    assert_eq!(order.payment.status, PaymentStatus::Success);
    assert_eq!(
        h.subjects().await,
        vec!["Order Confirmation", "Payment Confirmed"]
    );
}

#[tokio::test]
async fn test_tampered_webhook_changes_nothing() {
    let h = TestHarness::new();
    let product = h.product(1000, 5).await;
    let receipt = h
        .service
        .place_order(guest_cart(vec![CartLine::new(product.id, 2)]))
        .await
        .unwrap();
    let (mut body, signature) = h.signed("charge.success", receipt.reference(), 200_000);
    body.push(b' ');

    let err = h
        .service
        .handle_webhook(&body, Some(&signature))
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::InvalidSignature));

    let order = h.service.get_order(receipt.reference()).await.unwrap();
    assert_eq!(order.order.status, OrderStatus::Pending);
    assert_eq!(order.payment.status, PaymentStatus::Pending);
    assert_eq!(h.subjects().await, vec!["Order Confirmation"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_webhook_and_verify_race_applies_once() {
    let h = TestHarness::new();
    let product = h.product(1000, 5).await;
    let receipt = h
        .service
        .place_order(guest_cart(vec![CartLine::new(product.id, 2)]))
        .await
        .unwrap();
    let reference = receipt.reference().clone();
    h.gateway.set_transaction_status(&reference, "success");
    let (body, signature) = h.signed("charge.success", &reference, 200_000);

    let webhook = {
        let service = h.service.clone();
        tokio::spawn(async move { service.handle_webhook(&body, Some(&signature)).await })
    };
    let verify = {
        let service = h.service.clone();
        let reference = reference.clone();
        tokio::spawn(async move { service.verify_payment(&reference).await })
    };

    let ack = webhook.await.unwrap().unwrap();
    let verification = verify.await.unwrap().unwrap();

    assert!(matches!(
        ack,
        WebhookAck::Applied(PaymentStatus::Success) | WebhookAck::Duplicate(PaymentStatus::Success)
    ));
    assert_eq!(verification.status, PaymentStatus::Success);
    assert_eq!(verification.order.status, OrderStatus::Paid);

    let confirmations = h
        .subjects()
        .await
        .into_iter()
        .filter(|s| s == "Payment Confirmed")
        .count();
    assert_eq!(confirmations, 1);
}

#[tokio::test]
async fn test_gateway_outage_then_resume() {
    let h = TestHarness::new();
    let product = h.product(1000, 5).await;
    h.gateway.set_fail_on_initialize(true);

    let err = h
        .service
        .place_order(guest_cart(vec![CartLine::new(product.id, 1)]))
        .await
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Gateway);
    let reference = err.reference().cloned().unwrap();

    // The order is committed and its stock is held while payment is pending.
    assert_eq!(h.stock(&product).await, 4);
    let order = h.service.get_order(&reference).await.unwrap();
    assert_eq!(order.order.status, OrderStatus::Pending);

    h.gateway.set_fail_on_initialize(false);
    let receipt = h.service.resume_payment(&reference).await.unwrap();
    assert_eq!(receipt.reference(), &reference);
    assert_eq!(
        receipt.details.payment.authorization_url.as_deref(),
        Some(receipt.payment_url.as_str())
    );
}

#[tokio::test]
async fn test_cancel_releases_stock_and_blocks_payment() {
    let h = TestHarness::new();
    let product = h.product(1000, 5).await;
    let receipt = h
        .service
        .place_order(guest_cart(vec![CartLine::new(product.id, 2)]))
        .await
        .unwrap();
    let reference = receipt.reference().clone();

    let cancelled = h.service.cancel_order(&reference).await.unwrap();
    assert_eq!(cancelled.order.status, OrderStatus::Cancelled);
    assert_eq!(cancelled.payment.status, PaymentStatus::Failed);
    assert_eq!(h.stock(&product).await, 5);

    let (body, signature) = h.signed("charge.success", &reference, 200_000);
    let ack = h
        .service
        .handle_webhook(&body, Some(&signature))
        .await
        .unwrap();
    assert_eq!(ack, WebhookAck::Duplicate(PaymentStatus::Failed));

    let err = h.service.cancel_order(&reference).await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Conflict);
    let err = h.service.resume_payment(&reference).await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Conflict);
}

#[tokio::test]
async fn test_paid_order_cannot_be_cancelled() {
    let h = TestHarness::new();
    let product = h.product(1000, 5).await;
    let receipt = h
        .service
        .place_order(guest_cart(vec![CartLine::new(product.id, 1)]))
        .await
        .unwrap();
    let (body, signature) = h.signed("charge.success", receipt.reference(), 100_000);
    h.service
        .handle_webhook(&body, Some(&signature))
        .await
        .unwrap();

    let err = h
        .service
        .cancel_order(receipt.reference())
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::InvalidTransition { .. }));
    assert_eq!(h.stock(&product).await, 4);
}

#[tokio::test(start_paused = true)]
async fn test_verify_timeout_keeps_payment_pending() {
    let h = TestHarness::with_verify_timeout(Duration::from_millis(500));
    let product = h.product(1000, 5).await;
    let receipt = h
        .service
        .place_order(guest_cart(vec![CartLine::new(product.id, 1)]))
        .await
        .unwrap();
    h.gateway.set_verify_delay(Some(Duration::from_secs(30)));

    let err = h
        .service
        .verify_payment(receipt.reference())
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::GatewayTimeout(_)));

    let payment = h
        .store
        .get_payment_by_reference(receipt.reference())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Pending);
}

#[tokio::test]
async fn test_orders_are_readable_by_id_and_reference() {
    let h = TestHarness::new();
    let product = h.product(1000, 5).await;
    let receipt = h
        .service
        .place_order(guest_cart(vec![CartLine::new(product.id, 1)]))
        .await
        .unwrap();

    let by_id = h
        .service
        .get_order_by_id(receipt.details.order.id)
        .await
        .unwrap();
    let by_reference = h.service.get_order(receipt.reference()).await.unwrap();
    assert_eq!(by_id, by_reference);

    let err = h
        .service
        .get_order(&Reference::new("order-0-missing"))
        .await
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::NotFound);
}

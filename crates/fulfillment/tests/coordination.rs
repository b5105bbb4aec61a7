//! End-to-end coordination flows over the in-memory store.

use std::sync::Arc;

use common::{Actor, DriverId, OrderId, Role, UserId, VariantId};
use domain::{Driver, Money, Order, OrderStatus, VariantRecord};
use fulfillment::services::{InMemoryCache, InMemoryPaymentProvider};
use fulfillment::{
    Checkout, ClaimService, DriverService, ErrorKind, LineRequest, OrderLifecycle, OrderRequest,
    PaymentCoordinator, PaymentEvent, PaymentEventKind, ReconcileOutcome,
};
use futures_util::future::join_all;
use notify::{ChannelSink, Hub, Subscriber};
use order_store::{InMemoryOrderStore, OrderStore};
use serde_json::Value;
use tokio::sync::mpsc::UnboundedReceiver;

struct TestHarness {
    store: InMemoryOrderStore,
    hub: Arc<Hub>,
    payments_provider: InMemoryPaymentProvider,
    checkout: Checkout<InMemoryOrderStore>,
    lifecycle: OrderLifecycle<InMemoryOrderStore>,
    claims: ClaimService<InMemoryOrderStore>,
    payments: PaymentCoordinator<InMemoryOrderStore>,
    drivers: DriverService<InMemoryOrderStore>,
    admin: Actor,
}

impl TestHarness {
    fn new() -> Self {
        let store = InMemoryOrderStore::new();
        let hub = Arc::new(Hub::new());
        let payments_provider = InMemoryPaymentProvider::new();

        Self {
            checkout: Checkout::new(store.clone(), hub.clone(), Arc::new(InMemoryCache::new())),
            lifecycle: OrderLifecycle::new(store.clone(), hub.clone()),
            claims: ClaimService::new(store.clone(), hub.clone()),
            payments: PaymentCoordinator::new(
                store.clone(),
                hub.clone(),
                Some(Arc::new(payments_provider.clone())),
            ),
            drivers: DriverService::new(store.clone(), hub.clone()),
            admin: Actor::admin(UserId::new()),
            store,
            hub,
            payments_provider,
        }
    }

    async fn variant(&self, name: &str, stock: i64, price_cents: i64) -> VariantRecord {
        let variant =
            VariantRecord::new(VariantId::new(), name, stock, Money::from_cents(price_cents));
        self.store.upsert_variant(&variant).await.unwrap();
        variant
    }

    async fn stock_of(&self, variant: &VariantRecord) -> i64 {
        self.store.get_variant(variant.id).await.unwrap().unwrap().stock
    }

    async fn available_driver(&self) -> Driver {
        let user_id = UserId::new();
        self.drivers
            .register(user_id, "bike".to_string(), "AB-123".to_string())
            .await
            .unwrap();
        self.drivers.set_availability(user_id, true).await.unwrap()
    }

    async fn place(&self, customer: UserId, lines: &[(&VariantRecord, u32)], tip: i64) -> Order {
        self.checkout
            .place_order(Actor::customer(customer), request(lines, tip))
            .await
            .unwrap()
    }

    async fn advance(&self, order_id: OrderId, statuses: &[OrderStatus]) -> Order {
        let mut order = None;
        for status in statuses {
            order = Some(
                self.lifecycle
                    .transition(order_id, *status, None, self.admin)
                    .await
                    .unwrap(),
            );
        }
        order.unwrap()
    }

    /// Places a one-line order and moves it to `ready`.
    async fn ready_order(&self) -> Order {
        let variant = self.variant("Peonies", 10, 1500).await;
        let order = self.place(UserId::new(), &[(&variant, 1)], 0).await;
        self.advance(order.id, &[OrderStatus::Processing, OrderStatus::Ready])
            .await
    }

    fn listen(&self, user_id: UserId, role: Role) -> UnboundedReceiver<Arc<str>> {
        let (sink, mut rx) = ChannelSink::new();
        self.hub
            .subscribe(Subscriber::new(user_id, role), Arc::new(sink))
            .unwrap();
        let greeting = rx.try_recv().unwrap();
        assert_eq!(event_type(&greeting), "connected");
        rx
    }
}

fn request(lines: &[(&VariantRecord, u32)], tip: i64) -> OrderRequest {
    OrderRequest {
        items: lines
            .iter()
            .map(|(variant, quantity)| LineRequest {
                variant_id: variant.id,
                quantity: *quantity,
            })
            .collect(),
        delivery_address: "12 Garden Row".to_string(),
        delivery_instructions: None,
        tip: Money::from_cents(tip),
    }
}

fn event_type(frame: &str) -> String {
    let value: Value = serde_json::from_str(frame).unwrap();
    value["type"].as_str().unwrap().to_string()
}

fn drain(rx: &mut UnboundedReceiver<Arc<str>>) -> Vec<Value> {
    let mut frames = Vec::new();
    while let Ok(frame) = rx.try_recv() {
        frames.push(serde_json::from_str(&frame).unwrap());
    }
    frames
}

fn succeeded(intent_id: &str) -> PaymentEvent {
    PaymentEvent {
        kind: PaymentEventKind::Succeeded,
        intent_id: intent_id.to_string(),
        metadata: Default::default(),
    }
}

#[tokio::test]
async fn test_checkout_prices_and_reserves_stock() {
    let h = TestHarness::new();
    let v1 = h.variant("Rose Bouquet", 5, 1000).await;

    let order = h.place(UserId::new(), &[(&v1, 2)], 200).await;

    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.totals.subtotal().cents(), 2000);
    assert_eq!(order.totals.tip().cents(), 200);
    assert_eq!(order.total().cents(), 2200);
    assert_eq!(order.items[0].variant_name, "Rose Bouquet");
    assert_eq!(order.items[0].unit_price.cents(), 1000);
    assert_eq!(h.stock_of(&v1).await, 3);
}

#[tokio::test]
async fn test_checkout_notifies_admins_and_drivers() {
    let h = TestHarness::new();
    let mut admin = h.listen(h.admin.user_id, Role::Admin);
    let mut driver = h.listen(UserId::new(), Role::Driver);
    let mut other_customer = h.listen(UserId::new(), Role::Customer);
    let variant = h.variant("Tulips", 5, 800).await;

    let order = h.place(UserId::new(), &[(&variant, 1)], 0).await;

    let frames = drain(&mut admin);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0]["type"], "order:new");
    assert_eq!(frames[0]["payload"]["orderId"], order.id.to_string());
    assert_eq!(frames[0]["payload"]["total"], 800);

    let frames = drain(&mut driver);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0]["type"], "order:available");
    assert_eq!(frames[0]["payload"]["deliveryAddress"], "12 Garden Row");

    assert!(drain(&mut other_customer).is_empty());
}

#[tokio::test]
async fn test_failed_checkout_leaves_stock_untouched() {
    let h = TestHarness::new();
    let plenty = h.variant("Daisies", 10, 500).await;
    let scarce = h.variant("Orchid", 1, 4000).await;

    let err = h
        .checkout
        .place_order(
            Actor::customer(UserId::new()),
            request(&[(&plenty, 3), (&scarce, 2)], 0),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InsufficientStock);
    assert!(err.to_string().contains("Orchid"));
    assert_eq!(h.stock_of(&plenty).await, 10);
    assert_eq!(h.stock_of(&scarce).await, 1);
    assert_eq!(h.store.order_count().await, 0);
}

#[tokio::test]
async fn test_oversized_amounts_are_rejected_without_side_effects() {
    let h = TestHarness::new();
    let roses = h.variant("Roses", 5, 1000).await;
    let gold = h.variant("Gold Leaf", 5, i64::MAX / 2).await;
    let customer = Actor::customer(UserId::new());

    let err = h
        .checkout
        .place_order(customer, request(&[(&roses, 1)], i64::MAX))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOrder);

    let err = h
        .checkout
        .place_order(customer, request(&[(&gold, 3)], 0))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOrder);

    assert_eq!(h.stock_of(&roses).await, 5);
    assert_eq!(h.stock_of(&gold).await, 5);
    assert_eq!(h.store.order_count().await, 0);
}

#[tokio::test]
async fn test_concurrent_checkouts_never_oversell() {
    let h = TestHarness::new();
    let variant = h.variant("Sunflowers", 10, 900).await;

    let attempts = (0..25).map(|_| {
        let checkout = h.checkout.clone();
        let request = request(&[(&variant, 1)], 0);
        tokio::spawn(async move {
            checkout
                .place_order(Actor::customer(UserId::new()), request)
                .await
        })
    });
    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let placed = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(placed, 10);
    assert!(
        results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| e.kind() == ErrorKind::InsufficientStock)
    );
    assert_eq!(h.stock_of(&variant).await, 0);
}

#[tokio::test]
async fn test_paused_intake_rejects_orders() {
    let h = TestHarness::new();
    let variant = h.variant("Lilies", 5, 700).await;

    h.checkout.set_accepting_orders(false).await.unwrap();
    assert!(!h.checkout.accepting_orders().await);
    let err = h
        .checkout
        .place_order(Actor::customer(UserId::new()), request(&[(&variant, 1)], 0))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::OrdersPaused);
    assert_eq!(h.stock_of(&variant).await, 5);

    h.checkout.set_accepting_orders(true).await.unwrap();
    h.place(UserId::new(), &[(&variant, 1)], 0).await;
    assert_eq!(h.stock_of(&variant).await, 4);
}

#[tokio::test]
async fn test_only_customers_place_orders() {
    let h = TestHarness::new();
    let variant = h.variant("Lilies", 5, 700).await;

    let err = h
        .checkout
        .place_order(h.admin, request(&[(&variant, 1)], 0))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AccessDenied);
}

#[tokio::test]
async fn test_concurrent_claims_have_one_winner() {
    let h = TestHarness::new();
    let order = h.ready_order().await;

    let mut drivers = Vec::new();
    for _ in 0..8 {
        drivers.push(h.available_driver().await);
    }

    let attempts = drivers.iter().map(|driver| {
        let claims = h.claims.clone();
        let user_id = driver.user_id;
        tokio::spawn(async move { claims.claim(order.id, user_id).await })
    });
    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let winners: Vec<&Order> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1);
    assert_eq!(winners[0].status, OrderStatus::Delivering);

    let losers: Vec<ErrorKind> = results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .map(|e| e.kind())
        .collect();
    assert_eq!(losers.len(), 7);
    assert!(losers.iter().all(|k| *k == ErrorKind::AlreadyClaimed));

    let stored = h.store.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.driver_id, winners[0].driver_id);
}

#[tokio::test]
async fn test_claim_notifies_customer_admin_and_driver() {
    let h = TestHarness::new();
    let order = h.ready_order().await;
    let driver = h.available_driver().await;

    let mut customer = h.listen(order.customer_id, Role::Customer);
    let mut admin = h.listen(h.admin.user_id, Role::Admin);
    let mut driver_rx = h.listen(driver.user_id, Role::Driver);

    h.claims.claim(order.id, driver.user_id).await.unwrap();

    let frames = drain(&mut customer);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0]["type"], "order:updated");
    assert_eq!(frames[0]["payload"]["status"], "delivering");
    assert_eq!(frames[0]["payload"]["driverId"], driver.id.to_string());

    assert_eq!(drain(&mut admin).len(), 1);

    let types: Vec<String> = drain(&mut driver_rx)
        .iter()
        .map(|f| f["type"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(types, ["order:updated", "order:assigned"]);
}

#[tokio::test]
async fn test_claim_classifies_misses() {
    let h = TestHarness::new();
    let driver = h.available_driver().await;

    let err = h.claims.claim(OrderId::new(), driver.user_id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let order = h.ready_order().await;
    h.lifecycle.cancel(order.id, h.admin).await.unwrap();
    let err = h.claims.claim(order.id, driver.user_id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoLongerAvailable);
    assert_eq!(err.to_string(), "Order is no longer available");
}

#[tokio::test]
async fn test_claim_requires_available_driver_profile() {
    let h = TestHarness::new();
    let order = h.ready_order().await;

    let err = h.claims.claim(order.id, UserId::new()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let user_id = UserId::new();
    h.drivers
        .register(user_id, "van".to_string(), "XY-9".to_string())
        .await
        .unwrap();
    let err = h.claims.claim(order.id, user_id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DriverUnavailable);

    let stored = h.store.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Ready);
    assert!(stored.driver_id.is_none());
}

#[tokio::test]
async fn test_available_and_active_orders() {
    let h = TestHarness::new();
    let first = h.ready_order().await;
    let second = h.ready_order().await;
    let driver = h.available_driver().await;

    let available: Vec<OrderId> = h
        .claims
        .available_orders()
        .await
        .unwrap()
        .iter()
        .map(|o| o.id)
        .collect();
    assert_eq!(available, [first.id, second.id]);

    h.claims.claim(first.id, driver.user_id).await.unwrap();

    let available = h.claims.available_orders().await.unwrap();
    assert_eq!(available.len(), 1);
    assert_eq!(available[0].id, second.id);

    let active = h.claims.active_orders(driver.user_id).await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, first.id);
}

#[tokio::test]
async fn test_cancel_restores_stock_and_notifies_once() {
    let h = TestHarness::new();
    let a = h.variant("A", 5, 100).await;
    let b = h.variant("B", 3, 200).await;
    let c = h.variant("C", 9, 300).await;
    let customer = UserId::new();
    let order = h.place(customer, &[(&a, 2), (&b, 3), (&c, 1)], 0).await;
    assert_eq!(h.stock_of(&b).await, 0);

    let mut rx = h.listen(customer, Role::Customer);
    let cancelled = h
        .lifecycle
        .cancel(order.id, Actor::customer(customer))
        .await
        .unwrap();

    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(h.stock_of(&a).await, 5);
    assert_eq!(h.stock_of(&b).await, 3);
    assert_eq!(h.stock_of(&c).await, 9);

    let frames = drain(&mut rx);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0]["type"], "order:updated");
    assert_eq!(frames[0]["payload"]["status"], "cancelled");
}

#[tokio::test]
async fn test_terminal_orders_reject_transitions_without_side_effects() {
    let h = TestHarness::new();
    let order = h.ready_order().await;
    let driver = h.available_driver().await;
    let variant_id = order.items[0].variant_id;
    h.claims.claim(order.id, driver.user_id).await.unwrap();
    h.lifecycle
        .complete_delivery(order.id, driver.user_id, None, None)
        .await
        .unwrap();
    let stock_before = h.store.get_variant(variant_id).await.unwrap().unwrap().stock;

    let mut admin = h.listen(h.admin.user_id, Role::Admin);
    for target in [OrderStatus::Cancelled, OrderStatus::Delivering] {
        let err = h
            .lifecycle
            .transition(order.id, target, None, h.admin)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);
    }

    let stored = h.store.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Delivered);
    let stock_after = h.store.get_variant(variant_id).await.unwrap().unwrap().stock;
    assert_eq!(stock_after, stock_before);
    assert!(drain(&mut admin).is_empty());
}

#[tokio::test]
async fn test_customer_cancel_window() {
    let h = TestHarness::new();
    let order = h.ready_order().await;

    let err = h
        .lifecycle
        .cancel(order.id, Actor::customer(order.customer_id))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CancellationWindowClosed);

    let err = h
        .lifecycle
        .cancel(order.id, Actor::customer(UserId::new()))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AccessDenied);
}

#[tokio::test]
async fn test_transition_to_delivering_records_driver() {
    let h = TestHarness::new();
    let order = h.ready_order().await;
    let driver = h.available_driver().await;

    let err = h
        .lifecycle
        .transition(
            order.id,
            OrderStatus::Delivering,
            Some(DriverId::new()),
            h.admin,
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let moved = h
        .lifecycle
        .transition(order.id, OrderStatus::Delivering, Some(driver.id), h.admin)
        .await
        .unwrap();
    assert_eq!(moved.driver_id, Some(driver.id));
}

#[tokio::test]
async fn test_complete_delivery_requires_assigned_driver() {
    let h = TestHarness::new();
    let order = h.ready_order().await;
    let assigned = h.available_driver().await;
    let other = h.available_driver().await;
    h.claims.claim(order.id, assigned.user_id).await.unwrap();

    let err = h
        .lifecycle
        .complete_delivery(order.id, other.user_id, None, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AccessDenied);

    let delivered = h
        .lifecycle
        .complete_delivery(
            order.id,
            assigned.user_id,
            Some("Left with concierge".to_string()),
            Some("photos/abc.jpg".to_string()),
        )
        .await
        .unwrap();
    assert_eq!(delivered.status, OrderStatus::Delivered);
    assert!(delivered.delivered_at.is_some());
    assert_eq!(delivered.delivery_notes.as_deref(), Some("Left with concierge"));
    assert_eq!(delivered.delivery_photo_ref.as_deref(), Some("photos/abc.jpg"));
}

#[tokio::test]
async fn test_customers_see_only_their_orders() {
    let h = TestHarness::new();
    let variant = h.variant("Ferns", 10, 600).await;
    let alice = UserId::new();
    let bob = UserId::new();
    let order = h.place(alice, &[(&variant, 1)], 0).await;
    h.place(bob, &[(&variant, 1)], 0).await;

    let err = h
        .lifecycle
        .get_order(order.id, Actor::customer(bob))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AccessDenied);

    let mine = h
        .lifecycle
        .list_orders(Actor::customer(alice), order_store::OrderFilter::new())
        .await
        .unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].id, order.id);

    let all = h
        .lifecycle
        .list_orders(h.admin, order_store::OrderFilter::new())
        .await
        .unwrap();
    assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn test_payment_intent_and_replayed_webhook() {
    let h = TestHarness::new();
    let variant = h.variant("Roses", 5, 1000).await;
    let customer = UserId::new();
    let order = h.place(customer, &[(&variant, 2)], 200).await;

    let receipt = h
        .payments
        .open_intent(order.id, Some(2200), Actor::customer(customer))
        .await
        .unwrap();
    assert_eq!(receipt.amount_cents, 2200);
    let (charged, currency) = h.payments_provider.charged(&receipt.intent_id).unwrap();
    assert_eq!((charged, currency.as_str()), (2200, "usd"));

    let mut rx = h.listen(customer, Role::Customer);
    let event = succeeded(&receipt.intent_id);

    let first = h.payments.reconcile(&event).await.unwrap();
    let ReconcileOutcome::Applied(applied) = first else {
        panic!("expected the first delivery to apply");
    };
    assert_eq!(applied.status, OrderStatus::Processing);

    let second = h.payments.reconcile(&event).await.unwrap();
    assert_eq!(
        second,
        ReconcileOutcome::Unchanged {
            order_id: order.id,
            status: OrderStatus::Processing,
        }
    );

    let stored = h.store.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Processing);
    assert_eq!(stored.payment_intent_id.as_deref(), Some(receipt.intent_id.as_str()));
    assert_eq!(drain(&mut rx).len(), 1);
}

#[tokio::test]
async fn test_reopening_intent_returns_the_attached_one() {
    let h = TestHarness::new();
    let variant = h.variant("Roses", 5, 1000).await;
    let customer = UserId::new();
    let order = h.place(customer, &[(&variant, 1)], 0).await;

    let first = h
        .payments
        .open_intent(order.id, None, Actor::customer(customer))
        .await
        .unwrap();
    let second = h
        .payments
        .open_intent(order.id, Some(1000), Actor::customer(customer))
        .await
        .unwrap();
    assert_eq!(second, first);
    assert_eq!(h.payments_provider.intent_count(), 1);

    let outcome = h.payments.reconcile(&succeeded(&first.intent_id)).await.unwrap();
    assert!(matches!(
        outcome,
        ReconcileOutcome::Applied(ref o) if o.status == OrderStatus::Processing
    ));
}

#[tokio::test]
async fn test_payment_failure_restores_stock() {
    let h = TestHarness::new();
    let variant = h.variant("Roses", 5, 1000).await;
    let customer = UserId::new();
    let order = h.place(customer, &[(&variant, 2)], 0).await;
    let receipt = h
        .payments
        .open_intent(order.id, None, Actor::customer(customer))
        .await
        .unwrap();
    assert_eq!(h.stock_of(&variant).await, 3);

    let event = PaymentEvent {
        kind: PaymentEventKind::Failed,
        ..succeeded(&receipt.intent_id)
    };
    let outcome = h.payments.reconcile(&event).await.unwrap();
    assert!(matches!(
        outcome,
        ReconcileOutcome::Applied(ref o) if o.status == OrderStatus::PaymentFailed
    ));
    assert_eq!(h.stock_of(&variant).await, 5);

    // A late success for the same intent changes nothing.
    let outcome = h
        .payments
        .reconcile(&succeeded(&receipt.intent_id))
        .await
        .unwrap();
    assert!(matches!(outcome, ReconcileOutcome::Unchanged { .. }));
    assert_eq!(h.stock_of(&variant).await, 5);
}

#[tokio::test]
async fn test_payment_guards() {
    let h = TestHarness::new();
    let variant = h.variant("Roses", 5, 1000).await;
    let cheap = h.variant("Seeds", 5, 30).await;
    let customer = UserId::new();
    let order = h.place(customer, &[(&variant, 1)], 0).await;

    let err = h
        .payments
        .open_intent(order.id, Some(999), Actor::customer(customer))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AmountMismatch);

    let err = h
        .payments
        .open_intent(order.id, None, Actor::customer(UserId::new()))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AccessDenied);

    let small = h.place(customer, &[(&cheap, 1)], 0).await;
    let err = h
        .payments
        .open_intent(small.id, None, Actor::customer(customer))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BelowMinimumCharge);

    h.lifecycle
        .cancel(order.id, Actor::customer(customer))
        .await
        .unwrap();
    let err = h
        .payments
        .open_intent(order.id, None, Actor::customer(customer))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::OrderNotPayable);
    assert_eq!(h.payments_provider.intent_count(), 0);

    let unconfigured = PaymentCoordinator::new(h.store.clone(), h.hub.clone(), None);
    let err = unconfigured
        .open_intent(small.id, None, Actor::customer(customer))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PaymentUnavailable);
}

#[tokio::test]
async fn test_unknown_and_ignored_webhooks() {
    let h = TestHarness::new();

    let outcome = h.payments.reconcile(&succeeded("pi_missing")).await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::UnknownIntent);

    let event = PaymentEvent {
        kind: PaymentEventKind::Other,
        ..succeeded("pi_missing")
    };
    assert_eq!(
        h.payments.reconcile(&event).await.unwrap(),
        ReconcileOutcome::Ignored
    );
}

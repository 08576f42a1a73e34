use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use log::*;
use serde_json::json;
use ticketing_engine::{
    db_types::{OrderId, PaymentOrderStatus, TicketStatus, SANDBOX_CHANNEL},
    evidence::{EvidenceSource, Trigger},
    events::{EventHandlers, EventHooks, EventProducers},
    sessions::CartSessionStore,
    test_utils::{
        fixtures::{insert_order, seed_catalogue, snapshot_for, Catalogue},
        prepare_env::{drop_database, prepare_test_env, random_db_path},
        scripted_gateway::ScriptedGateway,
    },
    traits::{PaymentOrderManagement, TicketManagement},
    ReconcilerApi,
    SqliteDatabase,
};
use tkt_common::Paise;

struct System {
    db: SqliteDatabase,
    gateway: ScriptedGateway,
    api: ReconcilerApi<SqliteDatabase, ScriptedGateway>,
    catalogue: Catalogue,
}

async fn setup(capacity: i64, attendees_per_ticket: i64, producers: EventProducers) -> System {
    let url = random_db_path();
    let db = prepare_test_env(&url).await;
    let catalogue = seed_catalogue(&db, capacity, Paise::from(25_000), attendees_per_ticket).await;
    let gateway = ScriptedGateway::default();
    let api = ReconcilerApi::new(db.clone(), gateway.clone(), CartSessionStore::new(), producers)
        .with_gateway_timeout(Duration::from_millis(100));
    System { db, gateway, api, catalogue }
}

fn webhook(status: &str, cf_payment_id: &str) -> Trigger {
    Trigger::Webhook {
        payment_status: Some(status.into()),
        cf_payment_id: Some(cf_payment_id.into()),
        raw: json!({ "type": "PAYMENT_SUCCESS_WEBHOOK" }),
    }
}

fn placeholder_callback() -> Trigger {
    Trigger::Callback { payment_status: Some("{payment_status}".into()), transaction_id: Some("{transaction_id}".into()) }
}

#[tokio::test]
async fn successful_webhook_issues_one_consolidated_ticket() {
    let mut sys = setup(100, 2, EventProducers::default()).await;
    let snapshot = snapshot_for(&sys.catalogue, 2, None);
    assert_eq!(snapshot.total, Paise::from(50_000));
    insert_order(&sys.db, "order_abc123", sys.catalogue.customer.id, &snapshot, "Cashfree").await;
    let oid = OrderId::from("order_abc123");
    sys.gateway.set_status(&oid, "PAID", Some("cf_5001"));

    let first = sys.api.reconcile(&oid, webhook("SUCCESS", "5001")).await.expect("Reconciliation failed");
    assert_eq!(first.status, PaymentOrderStatus::Success);
    assert_eq!(first.decided_by, Some(EvidenceSource::GatewayApi));
    assert!(!first.already_complete);
    assert!(!first.needs_attention);
    assert_eq!(first.tickets.len(), 1);
    let ticket = &first.tickets[0];
    assert_eq!(ticket.booking_quantity, 2);
    assert_eq!(ticket.total_admission_count, 4);
    assert_eq!(ticket.status, TicketStatus::Sold);
    assert_ne!(ticket.unique_secure_token, ticket.unique_id);
    assert_eq!(first.order.transaction_id.as_deref(), Some("cf_5001"));
    assert_eq!(first.order.cf_payment_id.as_deref(), Some("5001"));

    // Duplicate delivery changes nothing
    let second = sys.api.reconcile(&oid, webhook("SUCCESS", "5001")).await.expect("Reconciliation failed");
    assert!(second.already_complete);
    assert_eq!(second.status, PaymentOrderStatus::Success);
    assert_eq!(second.tickets, first.tickets);
    let tickets = sys.db.fetch_tickets_for_order(&oid).await.unwrap();
    assert_eq!(tickets.len(), 1);
    drop_database(&mut sys.db).await;
}

#[tokio::test]
async fn ambiguity_leaves_order_pending_until_a_real_webhook() {
    let mut sys = setup(100, 2, EventProducers::default()).await;
    let snapshot = snapshot_for(&sys.catalogue, 2, None);
    insert_order(&sys.db, "order_abc123", sys.catalogue.customer.id, &snapshot, "Cashfree").await;
    let oid = OrderId::from("order_abc123");
    sys.gateway.hang_status(&oid);

    let outcome = sys.api.reconcile(&oid, placeholder_callback()).await.expect("Reconciliation failed");
    assert_eq!(outcome.status, PaymentOrderStatus::Pending);
    assert_eq!(outcome.decided_by, None);
    assert!(outcome.tickets.is_empty());
    assert!(sys.db.fetch_tickets_for_order(&oid).await.unwrap().is_empty());
    let audit = outcome.order.audit();
    assert_eq!(audit["verifications"].as_array().map(Vec::len), Some(1));
    assert_eq!(audit["verifications"][0]["outcome"], "unknown");
    assert_eq!(audit["errors"][0]["stage"], "status_query");

    // The gateway recovers and the real webhook arrives
    sys.gateway.set_status(&oid, "PAID", Some("cf_77"));
    let outcome = sys.api.reconcile(&oid, webhook("SUCCESS", "77")).await.expect("Reconciliation failed");
    assert_eq!(outcome.status, PaymentOrderStatus::Success);
    assert_eq!(outcome.tickets.len(), 1);
    assert_eq!(outcome.order.audit()["verifications"].as_array().map(Vec::len), Some(2));
    drop_database(&mut sys.db).await;
}

#[tokio::test]
async fn gateway_errors_fall_back_to_trigger_evidence() {
    let mut sys = setup(100, 1, EventProducers::default()).await;
    let snapshot = snapshot_for(&sys.catalogue, 1, None);
    insert_order(&sys.db, "order_fallback", sys.catalogue.customer.id, &snapshot, "Cashfree").await;
    let oid = OrderId::from("order_fallback");
    sys.gateway.fail_status(&oid, "connection reset");

    let outcome = sys.api.reconcile(&oid, webhook("SUCCESS", "901")).await.expect("Reconciliation failed");
    assert_eq!(outcome.status, PaymentOrderStatus::Success);
    assert_eq!(outcome.decided_by, Some(EvidenceSource::Webhook));
    assert_eq!(outcome.tickets.len(), 1);
    drop_database(&mut sys.db).await;
}

#[tokio::test]
async fn failure_then_late_success() {
    let mut sys = setup(100, 1, EventProducers::default()).await;
    let snapshot = snapshot_for(&sys.catalogue, 1, None);
    insert_order(&sys.db, "order_retry", sys.catalogue.customer.id, &snapshot, "Cashfree").await;
    let oid = OrderId::from("order_retry");

    sys.gateway.set_status(&oid, "FAILED", None);
    let outcome = sys.api.reconcile(&oid, Trigger::Sweep).await.unwrap();
    assert_eq!(outcome.status, PaymentOrderStatus::Failed);
    assert!(outcome.tickets.is_empty());

    // A cancellation cannot overwrite a failure
    sys.gateway.set_status(&oid, "CANCELLED", None);
    let outcome = sys.api.reconcile(&oid, Trigger::Sweep).await.unwrap();
    assert_eq!(outcome.status, PaymentOrderStatus::Failed);

    // Captured money outranks the earlier failed attempt
    sys.gateway.set_status(&oid, "PAID", Some("cf_2"));
    let outcome = sys.api.reconcile(&oid, Trigger::Sweep).await.unwrap();
    assert_eq!(outcome.status, PaymentOrderStatus::Success);
    assert_eq!(outcome.tickets.len(), 1);
    drop_database(&mut sys.db).await;
}

#[tokio::test]
async fn failed_payment_puts_the_cart_back() {
    let mut sys = setup(100, 1, EventProducers::default()).await;
    let snapshot = snapshot_for(&sys.catalogue, 2, None);
    let order = insert_order(&sys.db, "order_cancel", sys.catalogue.customer.id, &snapshot, "Cashfree").await;
    let oid = OrderId::from("order_cancel");
    let session_id = order.session_id().expect("Order has no session");
    sys.api.sessions().remember_order(oid.clone(), snapshot.clone()).await;
    sys.gateway.set_status(&oid, "USER_DROPPED", None);

    let outcome = sys.api.reconcile(&oid, Trigger::Sweep).await.unwrap();
    assert_eq!(outcome.status, PaymentOrderStatus::Failed);
    assert_eq!(sys.api.sessions().cart(&session_id).await, Some(snapshot.to_cart()));
    assert_eq!(sys.api.sessions().filed_orders().await, 0);
    drop_database(&mut sys.db).await;
}

#[tokio::test]
async fn payment_on_a_cancelled_order_raises_alert() {
    let alerts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&alerts);
    let mut hooks = EventHooks::default();
    hooks.on_order_needs_attention(move |_| {
        let counter = Arc::clone(&counter);
        Box::pin(async move {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    });
    let handlers = EventHandlers::new(10, hooks);
    let producers = handlers.producers();
    handlers.start_handlers().await;

    let mut sys = setup(100, 1, producers).await;
    let snapshot = snapshot_for(&sys.catalogue, 1, None);
    insert_order(&sys.db, "order_late", sys.catalogue.customer.id, &snapshot, "Cashfree").await;
    let oid = OrderId::from("order_late");
    sys.gateway.set_status(&oid, "CANCELLED", None);
    let outcome = sys.api.reconcile(&oid, Trigger::Sweep).await.unwrap();
    assert_eq!(outcome.status, PaymentOrderStatus::Cancelled);

    // The money arrives anyway
    sys.gateway.set_status(&oid, "PAID", Some("cf_31"));
    let outcome = sys.api.reconcile(&oid, webhook("SUCCESS", "31")).await.unwrap();
    assert_eq!(outcome.status, PaymentOrderStatus::Cancelled);
    assert!(outcome.needs_attention);
    assert!(outcome.tickets.is_empty());
    assert!(sys.db.fetch_tickets_for_order(&oid).await.unwrap().is_empty());
    let order = sys.db.fetch_payment_order(&oid).await.unwrap().unwrap();
    assert_eq!(order.status, PaymentOrderStatus::Cancelled);
    assert_eq!(order.audit()["verifications"].as_array().map(Vec::len), Some(2));
    assert_eq!(sys.gateway.status_queries(), 2);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(alerts.load(Ordering::SeqCst), 1);
    drop_database(&mut sys.db).await;
}

#[tokio::test]
async fn success_is_never_reverted() {
    let mut sys = setup(100, 1, EventProducers::default()).await;
    let snapshot = snapshot_for(&sys.catalogue, 3, None);
    insert_order(&sys.db, "order_final", sys.catalogue.customer.id, &snapshot, "Cashfree").await;
    let oid = OrderId::from("order_final");
    sys.gateway.set_status(&oid, "PAID", None);
    sys.api.reconcile(&oid, Trigger::Sweep).await.unwrap();

    sys.gateway.set_status(&oid, "FAILED", None);
    let failed_callback = Trigger::Callback { payment_status: Some("FAILED".into()), transaction_id: None };
    let outcome = sys.api.reconcile(&oid, failed_callback).await.unwrap();
    assert!(outcome.already_complete);
    assert_eq!(outcome.status, PaymentOrderStatus::Success);
    let order = sys.db.fetch_payment_order(&oid).await.unwrap().unwrap();
    assert_eq!(order.status, PaymentOrderStatus::Success);
    // The short-circuit does not even ask the gateway again
    assert_eq!(sys.gateway.status_queries(), 1);
    drop_database(&mut sys.db).await;
}

#[tokio::test]
async fn capacity_error_keeps_success_and_raises_alert() {
    let alerts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&alerts);
    let mut hooks = EventHooks::default();
    hooks.on_order_needs_attention(move |ev| {
        let counter = Arc::clone(&counter);
        Box::pin(async move {
            info!("🚀️ Attention needed for {}: {}", ev.order.order_id, ev.reason);
            counter.fetch_add(1, Ordering::SeqCst);
        })
    });
    let handlers = EventHandlers::new(10, hooks);
    let producers = handlers.producers();
    handlers.start_handlers().await;

    let mut sys = setup(5, 2, producers).await;
    // 3 couple passes is 6 attendees, one more than the event can take
    let snapshot = snapshot_for(&sys.catalogue, 3, None);
    insert_order(&sys.db, "order_oversold", sys.catalogue.customer.id, &snapshot, "Cashfree").await;
    let oid = OrderId::from("order_oversold");
    sys.gateway.set_status(&oid, "PAID", Some("cf_9"));

    let outcome = sys.api.reconcile(&oid, Trigger::Sweep).await.unwrap();
    assert_eq!(outcome.status, PaymentOrderStatus::Success);
    assert!(outcome.needs_attention);
    assert!(outcome.tickets.is_empty());
    assert!(sys.db.fetch_tickets_for_order(&oid).await.unwrap().is_empty());
    assert_eq!(outcome.order.payment_status.as_deref(), Some("Error - Capacity"));
    assert_eq!(outcome.order.audit()["errors"][0]["stage"], "ticket_issuance");
    assert_eq!(sys.db.remaining_capacity(sys.catalogue.event.id).await.unwrap(), 5);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(alerts.load(Ordering::SeqCst), 1);
    drop_database(&mut sys.db).await;
}

#[tokio::test]
async fn concurrent_triggers_issue_once() {
    let mut sys = setup(100, 2, EventProducers::default()).await;
    let snapshot = snapshot_for(&sys.catalogue, 2, None);
    insert_order(&sys.db, "order_race", sys.catalogue.customer.id, &snapshot, SANDBOX_CHANNEL).await;
    let oid = OrderId::from("order_race");
    sys.gateway.set_status(&oid, "PAID", Some("cf_1"));

    let callback = Trigger::Callback { payment_status: Some("SUCCESS".into()), transaction_id: Some("cf_1".into()) };
    let (a, b) = tokio::join!(sys.api.reconcile(&oid, webhook("SUCCESS", "1")), sys.api.reconcile(&oid, callback));
    let (a, b) = (a.expect("webhook failed"), b.expect("callback failed"));
    assert_eq!(a.status, PaymentOrderStatus::Success);
    assert_eq!(b.status, PaymentOrderStatus::Success);
    assert_eq!(a.tickets, b.tickets);
    assert_eq!(sys.db.fetch_tickets_for_order(&oid).await.unwrap().len(), 1);
    drop_database(&mut sys.db).await;
}

#[tokio::test]
async fn sweep_resolves_and_alerts() {
    let alerts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&alerts);
    let mut hooks = EventHooks::default();
    hooks.on_order_needs_attention(move |_| {
        let counter = Arc::clone(&counter);
        Box::pin(async move {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    });
    let handlers = EventHandlers::new(10, hooks);
    let producers = handlers.producers();
    handlers.start_handlers().await;

    let mut sys = setup(100, 1, producers).await;
    let snapshot = snapshot_for(&sys.catalogue, 1, None);
    for oid in ["order_s1", "order_s2", "order_s3"] {
        insert_order(&sys.db, oid, sys.catalogue.customer.id, &snapshot, "Cashfree").await;
    }
    sys.gateway.set_status(&OrderId::from("order_s1"), "PAID", None);
    sys.gateway.set_status(&OrderId::from("order_s2"), "USER_DROPPED", None);
    // order_s3 stays ACTIVE

    let report =
        sys.api.sweep_unresolved(chrono::Duration::zero(), chrono::Duration::zero()).await.expect("Sweep failed");
    assert_eq!(report.checked, 3);
    assert_eq!(report.resolved, 2);
    assert_eq!(report.still_pending, 1);
    assert_eq!(report.alerted, 1);
    assert_eq!(report.errors, 0);
    let s3 = sys.db.fetch_payment_order(&OrderId::from("order_s3")).await.unwrap().unwrap();
    assert_eq!(s3.status, PaymentOrderStatus::Pending);

    // Nothing is old enough to be swept an hour from now
    let report = sys.api.sweep_unresolved(chrono::Duration::hours(1), chrono::Duration::zero()).await.unwrap();
    assert_eq!(report.checked, 0);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(alerts.load(Ordering::SeqCst), 1);
    drop_database(&mut sys.db).await;
}

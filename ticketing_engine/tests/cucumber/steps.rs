use std::time::Duration;

use cucumber::{given, then, when};
use serde_json::json;
use ticketing_engine::{
    db_types::{OrderId, PaymentOrderStatus},
    evidence::Trigger,
    test_utils::fixtures::{insert_order, snapshot_for},
    traits::{PaymentOrderManagement, TicketManagement},
};

use crate::cucumber::TicketingWorld;

#[given(expr = "order {word} for {int} passes")]
async fn create_order(world: &mut TicketingWorld, order_id: String, quantity: i64) {
    let sys = world.system();
    let catalogue = sys.catalogue();
    let snapshot = snapshot_for(catalogue, quantity, None);
    insert_order(&sys.db, &order_id, catalogue.customer.id, &snapshot, "Cashfree").await;
}

#[given(expr = "the gateway reports order {word} as {word}")]
async fn gateway_reports(world: &mut TicketingWorld, order_id: String, status: String) {
    world.system().gateway.set_status(&OrderId::from(order_id), &status, None);
}

#[given(expr = "the gateway does not answer for order {word}")]
async fn gateway_hangs(world: &mut TicketingWorld, order_id: String) {
    world.system().gateway.hang_status(&OrderId::from(order_id));
}

async fn reconcile(world: &mut TicketingWorld, order_id: String, trigger: Trigger) {
    let oid = OrderId::from(order_id);
    let sys = world.system_mut();
    let outcome = sys.reconciler.reconcile(&oid, trigger).await.expect("Error reconciling order");
    sys.last_outcome = Some((oid, outcome));
}

#[when(expr = "a signed webhook reports order {word} as {word}")]
async fn webhook(world: &mut TicketingWorld, order_id: String, status: String) {
    let trigger = Trigger::Webhook {
        payment_status: Some(status),
        cf_payment_id: Some(format!("cf_{order_id}")),
        raw: json!({ "data": { "order": { "order_id": order_id } } }),
    };
    reconcile(world, order_id, trigger).await;
}

#[when(expr = "the customer returns for order {word} with unsubstituted placeholders")]
async fn placeholder_callback(world: &mut TicketingWorld, order_id: String) {
    let trigger = Trigger::Callback {
        payment_status: Some("{payment_status}".into()),
        transaction_id: Some("{transaction_id}".into()),
    };
    reconcile(world, order_id, trigger).await;
}

#[when(expr = "the customer returns for order {word} reporting {word}")]
async fn callback(world: &mut TicketingWorld, order_id: String, status: String) {
    let trigger = Trigger::Callback { payment_status: Some(status), transaction_id: None };
    reconcile(world, order_id, trigger).await;
}

#[when("the pending sweep runs")]
async fn sweep(world: &mut TicketingWorld) {
    let report = world
        .system()
        .reconciler
        .sweep_unresolved(chrono::Duration::zero(), chrono::Duration::minutes(30))
        .await
        .expect("Error running sweep");
    log::info!("🚀️ Sweep report: {report:?}");
}

#[when(expr = "I pause for {int}ms")]
async fn pause(_world: &mut TicketingWorld, ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

#[then(expr = "order {word} has status {word}")]
async fn check_status(world: &mut TicketingWorld, order_id: String, status: String) {
    let expected = status.parse::<PaymentOrderStatus>().expect("Not a valid order status");
    let order = world
        .system()
        .db
        .fetch_payment_order(&OrderId::from(order_id))
        .await
        .expect("Error fetching order")
        .expect("Order does not exist");
    assert_eq!(order.status, expected);
}

#[then(expr = "order {word} has {int} ticket(s)")]
async fn check_ticket_count(world: &mut TicketingWorld, order_id: String, count: usize) {
    let tickets = world.system().db.fetch_tickets_for_order(&OrderId::from(order_id)).await.expect("Error fetching tickets");
    assert_eq!(tickets.len(), count);
}

#[then(expr = "the ticket for order {word} books {int} passes admitting {int} people")]
async fn check_ticket(world: &mut TicketingWorld, order_id: String, booking: i64, admissions: i64) {
    let tickets = world.system().db.fetch_tickets_for_order(&OrderId::from(order_id)).await.expect("Error fetching tickets");
    let ticket = tickets.first().expect("Order has no tickets");
    assert_eq!(ticket.booking_quantity, booking);
    assert_eq!(ticket.total_admission_count, admissions);
    assert_eq!(ticket.status.to_string(), "SOLD");
}

#[then(expr = "order {word} records {int} verification attempt(s)")]
async fn check_verifications(world: &mut TicketingWorld, order_id: String, count: usize) {
    let order = world
        .system()
        .db
        .fetch_payment_order(&OrderId::from(order_id))
        .await
        .expect("Error fetching order")
        .expect("Order does not exist");
    let attempts = order.audit()["verifications"].as_array().map(Vec::len).unwrap_or_default();
    assert_eq!(attempts, count);
}

#[then("the last reconciliation needs attention")]
async fn check_attention(world: &mut TicketingWorld) {
    let (_, outcome) = world.system().last_outcome.as_ref().expect("Nothing was reconciled");
    assert!(outcome.needs_attention);
}

#[then("the last reconciliation found the order already complete")]
async fn check_already_complete(world: &mut TicketingWorld) {
    let (_, outcome) = world.system().last_outcome.as_ref().expect("Nothing was reconciled");
    assert!(outcome.already_complete);
}

use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use cashfree_tools::signature::{webhook_signature, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use serde_json::json;
use ticketing_engine::{
    db_types::{OrderId, PaymentOrderStatus, TicketStatus},
    events::EventProducers,
    sessions::CartSessionStore,
    traits::{GatewayError, GatewayOrderStatus, PromoAccounting, SuccessTransition},
    ReconcilerApi,
};
use tkt_common::Secret;

use super::{
    helpers::{json_body, paid_order, payment_order, send, ticket},
    mocks::{MockGateway, MockTicketingBackend},
};
use crate::{
    config::ServerOptions,
    middleware::WebhookSignatureFactory,
    routes::{PaymentReturnRoute, PaymentWebhookRoute},
};

const WEBHOOK_SECRET: &str = "cfsk_ma_test_4f6a";
const ORDER_ID: &str = "order_5f1c0a9e2b7d";

fn reconciler(backend: MockTicketingBackend, gateway: MockGateway) -> ReconcilerApi<MockTicketingBackend, MockGateway> {
    ReconcilerApi::new(backend, gateway, CartSessionStore::new(), EventProducers::default())
}

fn register_return(cfg: &mut ServiceConfig, backend: MockTicketingBackend, gateway: MockGateway) {
    cfg.service(PaymentReturnRoute::<MockTicketingBackend, MockGateway>::new())
        .app_data(web::Data::new(ServerOptions::default()))
        .app_data(web::Data::new(reconciler(backend, gateway)));
}

fn register_webhook(cfg: &mut ServiceConfig, backend: MockTicketingBackend, gateway: MockGateway) {
    cfg.service(
        web::scope("")
            .wrap(WebhookSignatureFactory::new(Secret::new(WEBHOOK_SECRET.to_string()), true))
            .service(PaymentWebhookRoute::<MockTicketingBackend, MockGateway>::new()),
    )
    .app_data(web::Data::new(reconciler(backend, gateway)));
}

/// An open order that the gateway reports as paid. Completion issues one ticket.
fn paid_at_gateway() -> (MockTicketingBackend, MockGateway) {
    let mut backend = MockTicketingBackend::new();
    backend
        .expect_fetch_payment_order()
        .returning(|id| Ok(Some(payment_order(id.as_str(), PaymentOrderStatus::Created))));
    backend
        .expect_append_audit_entry()
        .withf(|_, key, _| key == "verifications")
        .times(1)
        .returning(|id, _, _| Ok(payment_order(id.as_str(), PaymentOrderStatus::Created)));
    backend
        .expect_complete_order()
        .withf(|_, payment| payment.transaction_id.as_deref() == Some("5114910811548"))
        .times(1)
        .returning(|id, _| {
            Ok(SuccessTransition {
                order: paid_order(id.as_str()),
                tickets: vec![ticket(11, TicketStatus::Valid)],
                already_complete: false,
                newly_issued: true,
                issuance_error: None,
                promo: PromoAccounting::NotApplicable,
            })
        });
    let mut gateway = MockGateway::new();
    gateway.expect_fetch_order_status().times(1).returning(|_| {
        Ok(GatewayOrderStatus {
            order_status: Some("PAID".into()),
            transaction_id: Some("5114910811548".into()),
            raw: json!({ "order": { "order_status": "PAID" } }),
        })
    });
    (backend, gateway)
}

fn configure_paid_return(cfg: &mut ServiceConfig) {
    let (backend, gateway) = paid_at_gateway();
    register_return(cfg, backend, gateway);
}

fn configure_paid_webhook(cfg: &mut ServiceConfig) {
    let (backend, gateway) = paid_at_gateway();
    register_webhook(cfg, backend, gateway);
}

/// The gateway cannot be reached and the browser brought no usable status.
fn configure_unreachable_gateway(cfg: &mut ServiceConfig) {
    let mut backend = MockTicketingBackend::new();
    backend
        .expect_fetch_payment_order()
        .returning(|id| Ok(Some(payment_order(id.as_str(), PaymentOrderStatus::Created))));
    backend
        .expect_append_audit_entry()
        .withf(|_, key, _| key == "errors")
        .times(1)
        .returning(|id, _, _| Ok(payment_order(id.as_str(), PaymentOrderStatus::Created)));
    backend
        .expect_append_audit_entry()
        .withf(|_, key, _| key == "verifications")
        .times(1)
        .returning(|id, _, _| Ok(payment_order(id.as_str(), PaymentOrderStatus::Created)));
    backend
        .expect_mark_order_pending()
        .times(1)
        .returning(|id| Ok(payment_order(id.as_str(), PaymentOrderStatus::Pending)));
    let mut gateway = MockGateway::new();
    gateway
        .expect_fetch_order_status()
        .returning(|_| Err(GatewayError::Transport("connection reset by peer".into())));
    register_return(cfg, backend, gateway);
}

fn configure_already_paid(cfg: &mut ServiceConfig) {
    let mut backend = MockTicketingBackend::new();
    backend.expect_fetch_payment_order().returning(|id| Ok(Some(paid_order(id.as_str()))));
    backend
        .expect_fetch_tickets_for_order()
        .returning(|_| Ok(vec![ticket(11, TicketStatus::Valid), ticket(12, TicketStatus::Valid)]));
    // The gateway is never asked about a completed order
    register_return(cfg, backend, MockGateway::new());
}

fn configure_unknown_order(cfg: &mut ServiceConfig) {
    let mut backend = MockTicketingBackend::new();
    backend.expect_fetch_payment_order().returning(|_| Ok(None));
    register_return(cfg, backend, MockGateway::new());
}

fn return_uri(order_id: &str, payment_status: &str) -> String {
    format!(
        "/return?order_id=%7Border_id%7D&session_order_id={order_id}&payment_status={payment_status}&transaction_id=\
         %7Btransaction_id%7D"
    )
}

#[actix_web::test]
async fn return_with_placeholders_uses_the_session_order_id() {
    let _ = env_logger::try_init().ok();
    let req = TestRequest::get().uri(&return_uri(ORDER_ID, "%7Bpayment_status%7D"));
    let (status, body) = send(req, configure_paid_return).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let response = json_body(&body);
    assert_eq!(response["status"], "success");
    assert_eq!(response["order_id"], ORDER_ID);
    assert_eq!(response["tickets"].as_array().map(Vec::len), Some(1));
    assert_eq!(response["message"], "Payment successful! Your tickets have been booked.");
    // The secure token never leaves the server
    assert!(response["tickets"][0].get("unique_secure_token").is_none());
}

#[actix_web::test]
async fn return_while_the_gateway_is_down_stays_pending() {
    let _ = env_logger::try_init().ok();
    let req = TestRequest::get().uri(&return_uri(ORDER_ID, "%7Bpayment_status%7D"));
    let (status, body) = send(req, configure_unreachable_gateway).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let response = json_body(&body);
    assert_eq!(response["status"], "processing");
    assert!(response["message"].as_str().unwrap().contains(ORDER_ID));
}

#[actix_web::test]
async fn repeated_return_for_a_paid_order() {
    let _ = env_logger::try_init().ok();
    let req = TestRequest::get().uri(&return_uri(ORDER_ID, "SUCCESS"));
    let (status, body) = send(req, configure_already_paid).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let response = json_body(&body);
    assert_eq!(response["status"], "success");
    assert_eq!(response["tickets"].as_array().map(Vec::len), Some(2));
}

#[actix_web::test]
async fn return_for_an_unknown_order() {
    let _ = env_logger::try_init().ok();
    let req = TestRequest::get().uri(&return_uri("order_000000000000", "SUCCESS"));
    let (status, _) = send(req, configure_unknown_order).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let req = TestRequest::get().uri("/return?order_id=%7Border_id%7D");
    let (status, _) = send(req, configure_unknown_order).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

fn webhook_body() -> String {
    json!({
        "data": {
            "order": { "order_id": ORDER_ID, "order_amount": 1000.0 },
            "payment": { "cf_payment_id": 5114910811548_i64, "payment_status": "SUCCESS" }
        },
        "event_time": "2024-05-06T18:31:07+05:30",
        "type": "PAYMENT_SUCCESS_WEBHOOK"
    })
    .to_string()
}

fn signed_webhook(body: &str) -> TestRequest {
    let timestamp = "1715000467";
    TestRequest::post()
        .uri("/webhook")
        .insert_header((TIMESTAMP_HEADER, timestamp))
        .insert_header((SIGNATURE_HEADER, webhook_signature(WEBHOOK_SECRET, timestamp, body.as_bytes())))
        .insert_header(("content-type", "application/json"))
        .set_payload(body.to_string())
}

#[actix_web::test]
async fn signed_webhook_completes_the_order() {
    let _ = env_logger::try_init().ok();
    let body = webhook_body();
    let (status, body) = send(signed_webhook(&body), configure_paid_webhook).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let response = json_body(&body);
    assert_eq!(response["success"], true);
    assert_eq!(response["message"], format!("Order {} is SUCCESS", OrderId::from(ORDER_ID)));
}

#[actix_web::test]
async fn unsigned_webhook_changes_nothing() {
    let _ = env_logger::try_init().ok();
    let req = TestRequest::post().uri("/webhook").set_payload(webhook_body());
    // An untouched backend proves nothing was read or written
    let configure: fn(&mut ServiceConfig) =
        |cfg| register_webhook(cfg, MockTicketingBackend::new(), MockGateway::new());
    let (status, body) = send(req, configure).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(&body)["error"], "Webhook signature is missing or invalid");

    let tampered = webhook_body().replace("SUCCESS\"", "FAILED\"");
    let mut req = signed_webhook(&webhook_body());
    req = req.set_payload(tampered);
    let (status, _) = send(req, configure).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn malformed_webhook_body() {
    let _ = env_logger::try_init().ok();
    let configure: fn(&mut ServiceConfig) =
        |cfg| register_webhook(cfg, MockTicketingBackend::new(), MockGateway::new());
    let (status, _) = send(signed_webhook("{\"data\": "), configure).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = send(signed_webhook(r#"{"data": {"payment": {}}}"#), configure).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use chrono::Utc;
use serde_json::json;
use ticketing_engine::{
    checkout_objects::CheckoutSettings,
    db_types::{Customer, Event, PaymentOrder, PaymentOrderStatus, TicketType},
    sessions::CartSessionStore,
    traits::GatewaySession,
    OrderInitiatorApi,
};
use tkt_common::Paise;

use super::{
    helpers::{json_body, payment_order, send, timestamp, SESSION_ID},
    mocks::{MockGateway, MockTicketingBackend},
};
use crate::routes::{put_cart, CheckoutRoute};

fn cart_body() -> serde_json::Value {
    json!({
        "cart": { "event_id": 1, "lines": [{ "ticket_type_id": 3, "quantity": 2 }] },
        "terms_accepted": true
    })
}

fn checkout_request() -> TestRequest {
    TestRequest::post()
        .uri("/checkout")
        .insert_header(("x-session-id", SESSION_ID))
        .insert_header(("x-customer-id", "7"))
}

fn register(cfg: &mut ServiceConfig, backend: MockTicketingBackend, gateway: MockGateway) {
    let settings = CheckoutSettings::new("https://tickets.example.org");
    let api = OrderInitiatorApi::new(backend, gateway, CartSessionStore::new(), settings);
    cfg.service(CheckoutRoute::<MockTicketingBackend, MockGateway>::new()).app_data(web::Data::new(api));
}

// No expectations are set, so any backend or gateway call fails the test.
fn configure_untouched(cfg: &mut ServiceConfig) {
    register(cfg, MockTicketingBackend::new(), MockGateway::new());
}

fn configure_happy_path(cfg: &mut ServiceConfig) {
    let mut backend = MockTicketingBackend::new();
    backend.expect_fetch_customer().returning(|id| {
        Ok(Some(Customer {
            id,
            name: "Asha Rao".into(),
            email: "asha@example.org".into(),
            phone: Some("+91 98765 43210".into()),
            created_at: timestamp(),
        }))
    });
    backend.expect_fetch_event().returning(|id| {
        Ok(Some(Event {
            id,
            title: "Monsoon Jazz Night".into(),
            venue: Some("Blue Frog".into()),
            max_attendees: 200,
            starts_at: None,
            created_at: timestamp(),
        }))
    });
    backend.expect_fetch_ticket_type().returning(|id| {
        Ok(Some(TicketType {
            id,
            event_id: 1,
            type_name: "General".into(),
            price: Paise::from(50_000),
            attendees_per_ticket: 1,
        }))
    });
    backend.expect_insert_payment_order().times(1).returning(|new| {
        let order = PaymentOrder {
            id: 1,
            order_id: new.order_id,
            customer_id: new.customer_id,
            event_id: new.event_id,
            amount: new.amount,
            currency: new.currency,
            status: PaymentOrderStatus::Created,
            payment_gateway: new.payment_gateway,
            transaction_id: None,
            cf_payment_id: None,
            payment_status: None,
            quantity: new.quantity,
            response_data: new.response_data.to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        Ok((order, true))
    });
    backend
        .expect_set_audit_field()
        .withf(|_, key, _| key == "gateway_session")
        .times(1)
        .returning(|id, _, _| Ok(payment_order(id.as_str(), PaymentOrderStatus::Created)));
    let mut gateway = MockGateway::new();
    gateway.expect_channel().returning(|| "SANDBOX".to_string());
    gateway
        .expect_create_order()
        .withf(|r| {
            r.amount == Paise::from(100_000) &&
                r.customer.phone == "9876543210" &&
                r.return_url.contains(&format!("session_order_id={}", r.order_id))
        })
        .times(1)
        .returning(|_| {
            Ok(GatewaySession {
                payment_session_id: "session_9f8e7d".into(),
                gateway_order_id: Some("2149460581".into()),
                payment_link: None,
            })
        });
    register(cfg, backend, gateway);
}

#[actix_web::test]
async fn checkout_without_identity_headers() {
    let _ = env_logger::try_init().ok();
    let req = TestRequest::post().uri("/checkout").set_json(cart_body());
    let (status, body) = send(req, configure_untouched).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json_body(&body)["error"], "Missing or invalid header: x-session-id");
}

#[actix_web::test]
async fn checkout_requires_accepted_terms() {
    let _ = env_logger::try_init().ok();
    let mut body = cart_body();
    body["terms_accepted"] = json!(false);
    let (status, body) = send(checkout_request().set_json(body), configure_untouched).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json_body(&body)["error"].as_str().unwrap().contains("terms"), "{body}");
}

#[actix_web::test]
async fn checkout_with_empty_session_cart() {
    let _ = env_logger::try_init().ok();
    let req = checkout_request().set_json(json!({ "terms_accepted": true }));
    let (status, _) = send(req, configure_untouched).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn checkout_opens_a_payment_session() {
    let _ = env_logger::try_init().ok();
    let (status, body) = send(checkout_request().set_json(cart_body()), configure_happy_path).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let response = json_body(&body);
    assert_eq!(response["payment_session_id"], "session_9f8e7d");
    assert!(!response["order_id"].as_str().unwrap().is_empty());
}

fn configure_cart(cfg: &mut ServiceConfig) {
    cfg.service(put_cart).app_data(web::Data::new(CartSessionStore::new()));
}

#[actix_web::test]
async fn put_cart_rejects_empty_carts() {
    let _ = env_logger::try_init().ok();
    let req = TestRequest::put()
        .uri("/cart")
        .insert_header(("x-session-id", SESSION_ID))
        .set_json(json!({ "event_id": 1, "lines": [] }));
    let (status, _) = send(req, configure_cart).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let req = TestRequest::put()
        .uri("/cart")
        .insert_header(("x-session-id", SESSION_ID))
        .set_json(json!({ "event_id": 1, "lines": [{ "ticket_type_id": 3, "quantity": 1 }] }));
    let (status, body) = send(req, configure_cart).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body)["success"], true);
}

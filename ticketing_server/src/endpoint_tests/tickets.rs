use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use serde_json::json;
use ticketing_engine::{
    db_types::{OrderId, PaymentOrderStatus, Ticket, TicketStatus},
    events::EventProducers,
    traits::{IssuanceError, IssuedTickets, ValidationError},
    TicketIssuerApi,
    TicketValidationApi,
};

use super::{
    helpers::{json_body, paid_order, payment_order, send, ticket, timestamp},
    mocks::MockTicketingBackend,
};
use crate::routes::{IssueTicketsRoute, OrderByIdRoute, ValidateTicketRoute};

const TOKEN: &str = "b8f0c2d94e6a4f1f9d3e";

fn configure_door(cfg: &mut ServiceConfig) {
    let mut backend = MockTicketingBackend::new();
    backend.expect_validate_ticket().returning(|id, token, volunteer| match (id, token) {
        (_, t) if t != TOKEN => Err(ValidationError::TokenMismatch),
        (11, _) => Ok(Ticket {
            status: TicketStatus::Used,
            validated_by: Some(volunteer),
            used_at: Some(timestamp()),
            ..ticket(11, TicketStatus::Valid)
        }),
        (12, _) => Err(ValidationError::AlreadyUsed { used_at: Some(timestamp()) }),
        (id, _) => Err(ValidationError::TicketNotFound(id)),
    });
    cfg.service(ValidateTicketRoute::<MockTicketingBackend>::new())
        .app_data(web::Data::new(TicketValidationApi::new(backend)));
}

fn door_scan(ticket_id: i64, token: &str) -> TestRequest {
    TestRequest::post()
        .uri(&format!("/tickets/{ticket_id}/validate"))
        .set_json(json!({ "secure_token": token, "volunteer_id": 3 }))
}

#[actix_web::test]
async fn valid_ticket_is_admitted() {
    let _ = env_logger::try_init().ok();
    // Tokens are trimmed before they are compared
    let (status, body) = send(door_scan(11, &format!(" {TOKEN}\n")), configure_door).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let ticket = json_body(&body);
    assert_eq!(ticket["status"], "USED");
    assert_eq!(ticket["validated_by"], 3);
}

#[actix_web::test]
async fn used_ticket_is_refused() {
    let _ = env_logger::try_init().ok();
    let (status, body) = send(door_scan(12, TOKEN), configure_door).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json_body(&body)["error"], "This ticket has already been used");
}

#[actix_web::test]
async fn bad_token_or_unknown_ticket() {
    let _ = env_logger::try_init().ok();
    let (status, _) = send(door_scan(11, "not-the-token"), configure_door).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = send(door_scan(404, TOKEN), configure_door).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

fn configure_orders(cfg: &mut ServiceConfig) {
    let mut backend = MockTicketingBackend::new();
    backend.expect_fetch_payment_order().returning(|id| match id.as_str() {
        "order_paid" => Ok(Some(paid_order("order_paid"))),
        "order_open" => Ok(Some(payment_order("order_open", PaymentOrderStatus::Pending))),
        _ => Ok(None),
    });
    backend.expect_fetch_tickets_for_order().returning(|id| match id.as_str() {
        "order_paid" => Ok(vec![ticket(11, TicketStatus::Valid)]),
        _ => Ok(Vec::new()),
    });
    backend.expect_issue_tickets_for_order().returning(|id| match id.as_str() {
        "order_paid" => Ok(IssuedTickets { tickets: vec![ticket(11, TicketStatus::Valid)], newly_issued: false }),
        "order_open" => {
            Err(IssuanceError::OrderNotPaid { order_id: id.clone(), status: PaymentOrderStatus::Pending })
        },
        _ => Err(IssuanceError::OrderNotFound(id.clone())),
    });
    let api = TicketIssuerApi::new(backend, EventProducers::default());
    cfg.service(OrderByIdRoute::<MockTicketingBackend>::new())
        .service(IssueTicketsRoute::<MockTicketingBackend>::new())
        .app_data(web::Data::new(api));
}

#[actix_web::test]
async fn fetch_order_with_tickets() {
    let _ = env_logger::try_init().ok();
    let (status, body) = send(TestRequest::get().uri("/orders/order_paid"), configure_orders).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let result = json_body(&body);
    assert_eq!(result["order"]["order_id"], "order_paid");
    assert_eq!(result["order"]["status"], "SUCCESS");
    assert_eq!(result["tickets"][0]["ticket_number"], "TKT-1-000011");

    let (status, _) = send(TestRequest::get().uri("/orders/order_missing"), configure_orders).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn reissue_is_idempotent() {
    let _ = env_logger::try_init().ok();
    let (status, body) = send(TestRequest::post().uri("/orders/order_paid/issue_tickets"), configure_orders).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let issued = json_body(&body);
    assert_eq!(issued["newly_issued"], false);
    assert_eq!(issued["tickets"].as_array().map(Vec::len), Some(1));
}

#[actix_web::test]
async fn unpaid_orders_get_no_tickets() {
    let _ = env_logger::try_init().ok();
    let (status, body) = send(TestRequest::post().uri("/orders/order_open/issue_tickets"), configure_orders).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let expected = format!(
        "The request cannot be processed. Tickets can only be issued for successful orders. Order {} is PENDING",
        OrderId::from("order_open")
    );
    assert_eq!(json_body(&body)["error"], expected);
    let (status, _) = send(TestRequest::post().uri("/orders/order_gone/issue_tickets"), configure_orders).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

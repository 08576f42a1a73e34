use actix_web::{
    body::MessageBody,
    http::StatusCode,
    test,
    test::TestRequest,
    web::ServiceConfig,
    App,
};
use chrono::{DateTime, TimeZone, Utc};
use log::debug;
use serde_json::{json, Value};
use ticketing_engine::db_types::{OrderId, PaymentOrder, PaymentOrderStatus, Ticket, TicketStatus};
use tkt_common::Paise;

pub const SESSION_ID: &str = "sess_7f3a";

/// Sends `req` to an app built by `configure` and returns the status and the body as text.
pub async fn send(req: TestRequest, configure: fn(&mut ServiceConfig)) -> (StatusCode, String) {
    let app = test::init_service(App::new().configure(configure)).await;
    debug!("Making request");
    // Middleware rejections come back as service errors rather than responses
    let res = match test::try_call_service(&app, req.to_request()).await {
        Ok(res) => res.into_parts().1,
        Err(e) => e.error_response(),
    };
    let status = res.status();
    let body = res.into_body().try_into_bytes().map(|b| String::from_utf8_lossy(&b).into_owned()).unwrap_or_default();
    (status, body)
}

pub fn json_body(body: &str) -> Value {
    serde_json::from_str(body).unwrap_or_else(|e| panic!("Response body is not JSON. {e}\n{body}"))
}

pub fn timestamp() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 6, 18, 30, 0).unwrap()
}

pub fn payment_order(order_id: &str, status: PaymentOrderStatus) -> PaymentOrder {
    PaymentOrder {
        id: 1,
        order_id: OrderId::from(order_id),
        customer_id: 7,
        event_id: 1,
        amount: Paise::from(100_000),
        currency: "INR".into(),
        status,
        payment_gateway: "Cashfree".into(),
        transaction_id: None,
        cf_payment_id: None,
        payment_status: None,
        quantity: 2,
        response_data: json!({ "session_id": SESSION_ID }).to_string(),
        created_at: timestamp(),
        updated_at: timestamp(),
    }
}

pub fn paid_order(order_id: &str) -> PaymentOrder {
    PaymentOrder {
        transaction_id: Some("5114910811548".into()),
        payment_status: Some("Success".into()),
        ..payment_order(order_id, PaymentOrderStatus::Success)
    }
}

pub fn ticket(id: i64, status: TicketStatus) -> Ticket {
    Ticket {
        id,
        event_id: 1,
        ticket_type_id: 3,
        customer_id: 7,
        ticket_number: format!("TKT-1-{id:06}"),
        status,
        unique_secure_token: "b8f0c2d94e6a4f1f9d3e".into(),
        unique_id: format!("pass-{id}"),
        booking_quantity: 2,
        total_admission_count: 2,
        payment_order_id: 1,
        validated_by: None,
        used_at: None,
        purchase_date: timestamp(),
    }
}

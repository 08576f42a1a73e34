use chrono::Utc;
use serde_json::json;
use tkt_common::Paise;

use crate::{
    db_types::{
        CartSnapshot,
        Customer,
        Event,
        NewCustomer,
        NewEvent,
        NewPaymentOrder,
        NewTicketType,
        OrderId,
        PaymentOrder,
        SnapshotLine,
        TicketType,
    },
    traits::{CatalogManagement, PaymentOrderManagement},
    SqliteDatabase,
};

/// A customer, an event and one ticket type for it.
#[derive(Debug, Clone)]
pub struct Catalogue {
    pub customer: Customer,
    pub event: Event,
    pub ticket_type: TicketType,
}

pub async fn seed_catalogue(
    db: &SqliteDatabase,
    capacity: i64,
    price: Paise,
    attendees_per_ticket: i64,
) -> Catalogue {
    let customer = db
        .insert_customer(NewCustomer {
            name: "Asha Rao".into(),
            email: "asha@example.org".into(),
            phone: Some("+91 98765 43210".into()),
        })
        .await
        .expect("Error inserting customer");
    let event = db
        .insert_event(NewEvent {
            title: "Monsoon Music Night".into(),
            venue: Some("Bengaluru".into()),
            max_attendees: capacity,
            starts_at: Some(Utc::now() + chrono::Duration::days(30)),
        })
        .await
        .expect("Error inserting event");
    let ticket_type = db
        .insert_ticket_type(NewTicketType {
            event_id: event.id,
            type_name: "Couple pass".into(),
            price,
            attendees_per_ticket,
        })
        .await
        .expect("Error inserting ticket type");
    Catalogue { customer, event, ticket_type }
}

/// A snapshot of `quantity` units of the catalogue's ticket type, with an optional promo code and discount.
pub fn snapshot_for(catalogue: &Catalogue, quantity: i64, promo: Option<(&str, Paise)>) -> CartSnapshot {
    let line = SnapshotLine {
        ticket_type_id: catalogue.ticket_type.id,
        type_name: catalogue.ticket_type.type_name.clone(),
        quantity,
        unit_price: catalogue.ticket_type.price,
        attendees_per_ticket: catalogue.ticket_type.attendees_per_ticket,
    };
    let subtotal = line.line_total();
    let discount = promo.map(|(_, d)| d).unwrap_or_default();
    CartSnapshot {
        event_id: catalogue.event.id,
        total_attendees: quantity * catalogue.ticket_type.attendees_per_ticket,
        lines: vec![line],
        subtotal,
        discount,
        total: subtotal - discount,
        promo_code: promo.map(|(code, _)| code.to_string()),
    }
}

/// Inserts a `CREATED` order for the snapshot directly, bypassing checkout.
pub async fn insert_order(
    db: &SqliteDatabase,
    order_id: &str,
    customer_id: i64,
    snapshot: &CartSnapshot,
    channel: &str,
) -> PaymentOrder {
    let order = NewPaymentOrder {
        order_id: OrderId::from(order_id),
        customer_id,
        event_id: snapshot.event_id,
        amount: snapshot.total,
        currency: "INR".into(),
        payment_gateway: channel.to_string(),
        quantity: snapshot.total_quantity(),
        response_data: json!({ "ticket_order": snapshot, "session_id": format!("session_{order_id}") }),
    };
    let (order, _) = db.insert_payment_order(order).await.expect("Error inserting order");
    order
}

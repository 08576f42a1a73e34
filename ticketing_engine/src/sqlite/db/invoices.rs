use log::{debug, info};
use sqlx::SqliteConnection;
use tkt_common::Paise;

use super::{catalog, tickets};
use crate::{
    db_types::{Invoice, PaymentOrder},
    helpers::{allocate, new_invoice_number},
};

pub async fn fetch_invoices_for_payment_order(
    payment_order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Invoice>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM invoices WHERE payment_order_id = $1 ORDER BY id")
        .bind(payment_order_id)
        .fetch_all(conn)
        .await
}

async fn invoice_exists(ticket_id: i64, payment_order_id: i64, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM invoices WHERE ticket_id = $1 AND payment_order_id = $2")
        .bind(ticket_id)
        .bind(payment_order_id)
        .fetch_one(conn)
        .await?;
    Ok(count > 0)
}

/// One invoice per ticket of the order.
///
/// The order amount is split across the tickets in proportion to their list price, so the invoices of an order always
/// sum to what the customer paid. The event's commission terms are applied to each share, and the base price is what
/// remains.
pub async fn create_invoices_for_order(
    order: &PaymentOrder,
    conn: &mut SqliteConnection,
) -> Result<Vec<Invoice>, sqlx::Error> {
    let tickets = tickets::fetch_tickets_for_payment_order(order.id, conn).await?;
    let snapshot = order.cart_snapshot();
    let weights = tickets
        .iter()
        .map(|t| {
            snapshot
                .as_ref()
                .and_then(|s| s.lines.iter().find(|l| l.ticket_type_id == t.ticket_type_id))
                .map(|l| l.line_total())
                .unwrap_or_default()
        })
        .collect::<Vec<Paise>>();
    let shares = allocate(order.amount, &weights);
    let commission_terms = catalog::fetch_event_commission(order.event_id, conn).await?;
    for (ticket, total) in tickets.iter().zip(shares) {
        if invoice_exists(ticket.id, order.id, conn).await? {
            debug!("🧾️ Ticket {} already has an invoice for order {}", ticket.ticket_number, order.order_id);
            continue;
        }
        let commission = commission_terms
            .as_ref()
            .map(|c| c.commission_for(total, ticket.total_admission_count))
            .unwrap_or_default();
        let base_price = total - commission;
        let invoice: Invoice = sqlx::query_as(
            r#"INSERT INTO invoices (
                invoice_number, ticket_id, customer_id, event_id, ticket_type_id, payment_order_id,
                base_price, commission, total_price
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING *"#,
        )
        .bind(new_invoice_number())
        .bind(ticket.id)
        .bind(ticket.customer_id)
        .bind(ticket.event_id)
        .bind(ticket.ticket_type_id)
        .bind(order.id)
        .bind(base_price)
        .bind(commission)
        .bind(total)
        .fetch_one(&mut *conn)
        .await?;
        info!("🧾️ Invoice {} created for ticket {} ({total})", invoice.invoice_number, ticket.ticket_number);
    }
    fetch_invoices_for_payment_order(order.id, conn).await
}

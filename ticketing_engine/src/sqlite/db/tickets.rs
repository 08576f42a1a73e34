use log::{debug, info, trace, warn};
use sqlx::SqliteConnection;

use super::catalog;
use crate::{
    db_types::{NewTicket, PaymentOrder, Ticket, TicketStatus, TicketType},
    helpers::{fallback_ticket_number, new_secure_token, random_ticket_number, MAX_TICKET_NUMBER_ATTEMPTS},
    traits::{IssuanceError, IssuedTickets, TicketingDatabaseError, ValidationError},
};

pub async fn fetch_tickets_for_payment_order(
    payment_order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Ticket>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM tickets WHERE payment_order_id = $1 ORDER BY id")
        .bind(payment_order_id)
        .fetch_all(conn)
        .await
}

pub async fn fetch_ticket(id: i64, conn: &mut SqliteConnection) -> Result<Option<Ticket>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM tickets WHERE id = $1").bind(id).fetch_optional(conn).await
}

async fn ticket_number_exists(ticket_number: &str, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tickets WHERE ticket_number = $1")
        .bind(ticket_number)
        .fetch_one(conn)
        .await?;
    Ok(count > 0)
}

/// Random ticket numbers are tried against the table a bounded number of times before falling back to a
/// UUID-derived number.
async fn unused_ticket_number(conn: &mut SqliteConnection) -> Result<String, sqlx::Error> {
    for attempt in 1..=MAX_TICKET_NUMBER_ATTEMPTS {
        let candidate = random_ticket_number(&mut rand::thread_rng());
        if !ticket_number_exists(&candidate, conn).await? {
            return Ok(candidate);
        }
        trace!("🎟️ Ticket number {candidate} is taken (attempt {attempt})");
    }
    let fallback = fallback_ticket_number();
    warn!("🎟️ Could not find a free ticket number in {MAX_TICKET_NUMBER_ATTEMPTS} attempts. Using {fallback}");
    Ok(fallback)
}

/// The number of attendees already holding admissible tickets for the event.
pub async fn admissions_sold(event_id: i64, conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT COALESCE(SUM(total_admission_count), 0) FROM tickets WHERE event_id = $1 AND status IN ('SOLD', \
         'VALID')",
    )
    .bind(event_id)
    .fetch_one(conn)
    .await
}

pub async fn remaining_capacity(event_id: i64, conn: &mut SqliteConnection) -> Result<i64, TicketingDatabaseError> {
    let event = catalog::fetch_event(event_id, conn).await?.ok_or(TicketingDatabaseError::EventNotFound(event_id))?;
    let sold = admissions_sold(event_id, conn).await?;
    Ok(event.max_attendees - sold)
}

async fn insert_ticket(ticket: NewTicket, conn: &mut SqliteConnection) -> Result<Ticket, sqlx::Error> {
    sqlx::query_as(
        r#"
            INSERT INTO tickets (
                event_id,
                ticket_type_id,
                customer_id,
                ticket_number,
                status,
                unique_secure_token,
                unique_id,
                booking_quantity,
                total_admission_count,
                payment_order_id
            ) VALUES ($1, $2, $3, $4, 'SOLD', $5, $6, $7, $8, $9)
            RETURNING *;
        "#,
    )
    .bind(ticket.event_id)
    .bind(ticket.ticket_type_id)
    .bind(ticket.customer_id)
    .bind(ticket.ticket_number)
    .bind(ticket.unique_secure_token)
    .bind(ticket.unique_id)
    .bind(ticket.booking_quantity)
    .bind(ticket.total_admission_count)
    .bind(ticket.payment_order_id)
    .fetch_one(conn)
    .await
}

/// Materialises the tickets for a paid order from its cart snapshot.
///
/// * If any ticket already references the order, those tickets are returned and nothing is written.
/// * One ticket row is created per ticket type in the snapshot, with `booking_quantity` units and
///   `total_admission_count = booking_quantity × attendees_per_ticket` taken from the ticket type as it is now.
/// * The whole order is refused with [`IssuanceError::Capacity`] if the event cannot admit everyone. No rows are
///   written in that case.
///
/// This is not atomic. Run it inside a transaction or savepoint so that a failure part-way through leaves no tickets
/// behind.
pub async fn issue_tickets(order: &PaymentOrder, conn: &mut SqliteConnection) -> Result<IssuedTickets, IssuanceError> {
    let existing = fetch_tickets_for_payment_order(order.id, conn).await?;
    if !existing.is_empty() {
        debug!("🎟️ Order {} already has {} tickets. Nothing to issue.", order.order_id, existing.len());
        return Ok(IssuedTickets { tickets: existing, newly_issued: false });
    }
    let snapshot = order.cart_snapshot().ok_or_else(|| IssuanceError::MissingSnapshot(order.order_id.clone()))?;
    if snapshot.lines.is_empty() {
        return Err(IssuanceError::EmptySnapshot(order.order_id.clone()));
    }
    let mut resolved: Vec<(TicketType, i64)> = Vec::with_capacity(snapshot.lines.len());
    for line in &snapshot.lines {
        if let Some((_, quantity)) = resolved.iter_mut().find(|(tt, _)| tt.id == line.ticket_type_id) {
            *quantity += line.quantity;
            continue;
        }
        let ticket_type = catalog::fetch_ticket_type(line.ticket_type_id, conn)
            .await?
            .filter(|tt| tt.event_id == snapshot.event_id)
            .ok_or(IssuanceError::UnknownTicketType {
                ticket_type_id: line.ticket_type_id,
                event_id: snapshot.event_id,
            })?;
        resolved.push((ticket_type, line.quantity));
    }
    let requested = resolved.iter().map(|(tt, qty)| qty * tt.attendees_per_ticket).sum::<i64>();
    let event = catalog::fetch_event(snapshot.event_id, conn)
        .await?
        .ok_or(IssuanceError::UnknownEvent(snapshot.event_id))?;
    let remaining = event.max_attendees - admissions_sold(event.id, conn).await?;
    if requested > remaining {
        warn!(
            "🎟️ Event #{} cannot admit {requested} more attendees for order {}. Only {remaining} places remain.",
            event.id, order.order_id
        );
        return Err(IssuanceError::Capacity { requested, remaining });
    }
    let mut tickets = Vec::with_capacity(resolved.len());
    for (ticket_type, quantity) in resolved {
        let ticket_number = unused_ticket_number(conn).await?;
        let ticket = NewTicket {
            event_id: event.id,
            ticket_type_id: ticket_type.id,
            customer_id: order.customer_id,
            ticket_number,
            unique_secure_token: new_secure_token(),
            unique_id: new_secure_token(),
            booking_quantity: quantity,
            total_admission_count: quantity * ticket_type.attendees_per_ticket,
            payment_order_id: order.id,
        };
        let ticket = insert_ticket(ticket, conn).await?;
        debug!(
            "🎟️ Ticket {} issued for order {}: {} x {} ({} admissions)",
            ticket.ticket_number, order.order_id, ticket.booking_quantity, ticket_type.type_name,
            ticket.total_admission_count
        );
        tickets.push(ticket);
    }
    info!("🎟️ {} tickets issued for order {}", tickets.len(), order.order_id);
    Ok(IssuedTickets { tickets, newly_issued: true })
}

/// Door validation. The ticket must carry the matching secure token and be in an admissible state.
///
/// The conditional update runs first; the ticket is only read to explain a refusal.
pub async fn validate_ticket(
    ticket_id: i64,
    secure_token: &str,
    volunteer_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Ticket, ValidationError> {
    let updated: Option<Ticket> = sqlx::query_as(
        r#"UPDATE tickets SET status = 'USED', validated_by = $1, used_at = CURRENT_TIMESTAMP
        WHERE id = $2 AND unique_secure_token = $3 AND status IN ('SOLD', 'VALID') RETURNING *"#,
    )
    .bind(volunteer_id)
    .bind(ticket_id)
    .bind(secure_token)
    .fetch_optional(&mut *conn)
    .await?;
    if let Some(ticket) = updated {
        info!("🎟️ Ticket {} validated by volunteer #{volunteer_id}", ticket.ticket_number);
        return Ok(ticket);
    }
    let ticket = fetch_ticket(ticket_id, conn).await?.ok_or(ValidationError::TicketNotFound(ticket_id))?;
    if ticket.unique_secure_token != secure_token {
        warn!("🎟️ Validation of ticket #{ticket_id} by volunteer #{volunteer_id} failed: token mismatch");
        return Err(ValidationError::TokenMismatch);
    }
    match ticket.status {
        TicketStatus::Used => Err(ValidationError::AlreadyUsed { used_at: ticket.used_at }),
        s => Err(ValidationError::NotValidatable(s)),
    }
}

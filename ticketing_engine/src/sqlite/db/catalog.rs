use sqlx::SqliteConnection;

use crate::db_types::{Customer, Event, EventCommission, NewCustomer, NewEvent, NewTicketType, TicketType};

pub async fn insert_customer(customer: NewCustomer, conn: &mut SqliteConnection) -> Result<Customer, sqlx::Error> {
    sqlx::query_as("INSERT INTO customers (name, email, phone) VALUES ($1, $2, $3) RETURNING *")
        .bind(customer.name)
        .bind(customer.email)
        .bind(customer.phone)
        .fetch_one(conn)
        .await
}

pub async fn fetch_customer(id: i64, conn: &mut SqliteConnection) -> Result<Option<Customer>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM customers WHERE id = $1").bind(id).fetch_optional(conn).await
}

pub async fn insert_event(event: NewEvent, conn: &mut SqliteConnection) -> Result<Event, sqlx::Error> {
    sqlx::query_as("INSERT INTO events (title, venue, max_attendees, starts_at) VALUES ($1, $2, $3, $4) RETURNING *")
        .bind(event.title)
        .bind(event.venue)
        .bind(event.max_attendees)
        .bind(event.starts_at)
        .fetch_one(conn)
        .await
}

pub async fn fetch_event(id: i64, conn: &mut SqliteConnection) -> Result<Option<Event>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM events WHERE id = $1").bind(id).fetch_optional(conn).await
}

pub async fn insert_ticket_type(tt: NewTicketType, conn: &mut SqliteConnection) -> Result<TicketType, sqlx::Error> {
    sqlx::query_as(
        r#"INSERT INTO ticket_types (event_id, type_name, price, attendees_per_ticket)
        VALUES ($1, $2, $3, $4) RETURNING *"#,
    )
    .bind(tt.event_id)
    .bind(tt.type_name)
    .bind(tt.price)
    .bind(tt.attendees_per_ticket)
    .fetch_one(conn)
    .await
}

pub async fn fetch_ticket_type(id: i64, conn: &mut SqliteConnection) -> Result<Option<TicketType>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM ticket_types WHERE id = $1").bind(id).fetch_optional(conn).await
}

pub async fn fetch_ticket_types_for_event(
    event_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<TicketType>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM ticket_types WHERE event_id = $1 ORDER BY id").bind(event_id).fetch_all(conn).await
}

pub async fn upsert_event_commission(
    commission: EventCommission,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"INSERT INTO event_commissions (event_id, commission_type, commission_value) VALUES ($1, $2, $3)
        ON CONFLICT (event_id) DO UPDATE SET
            commission_type = excluded.commission_type,
            commission_value = excluded.commission_value"#,
    )
    .bind(commission.event_id)
    .bind(commission.commission_type)
    .bind(commission.commission_value)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn fetch_event_commission(
    event_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<EventCommission>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM event_commissions WHERE event_id = $1").bind(event_id).fetch_optional(conn).await
}

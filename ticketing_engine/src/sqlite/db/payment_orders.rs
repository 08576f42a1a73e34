use log::{debug, trace, warn};
use serde_json::{Map, Value};
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{NewPaymentOrder, OrderId, PaymentOrder, PaymentOrderStatus},
    order_objects::OrderQueryFilter,
    traits::{PaymentReference, TicketingDatabaseError},
};

/// Inserts the order into the database, returning `false` in the second parameter if the order already exists.
///
/// An existing order with the same id is only accepted if it belongs to the same customer and is for the same amount.
pub async fn idempotent_insert(
    order: NewPaymentOrder,
    conn: &mut SqliteConnection,
) -> Result<(PaymentOrder, bool), TicketingDatabaseError> {
    let order_id = order.order_id.clone();
    let (customer_id, amount) = (order.customer_id, order.amount);
    if let Some(order) = insert_order(order, conn).await? {
        debug!("🗃️ Payment order [{}] inserted with id {}", order.order_id, order.id);
        return Ok((order, true));
    }
    let existing = fetch_order_by_order_id(&order_id, conn)
        .await?
        .ok_or_else(|| TicketingDatabaseError::OrderNotFound(order_id.clone()))?;
    if existing.customer_id != customer_id || existing.amount != amount {
        return Err(TicketingDatabaseError::OrderConflict(order_id));
    }
    trace!("🗃️ Payment order [{order_id}] already exists");
    Ok((existing, false))
}

/// Inserts a new order in `CREATED` status, or returns `None` if the order id is taken.
async fn insert_order(order: NewPaymentOrder, conn: &mut SqliteConnection) -> Result<Option<PaymentOrder>, sqlx::Error> {
    let order = sqlx::query_as(
        r#"
            INSERT INTO payment_orders (
                order_id,
                customer_id,
                event_id,
                amount,
                currency,
                status,
                payment_gateway,
                payment_status,
                quantity,
                response_data
            ) VALUES ($1, $2, $3, $4, $5, 'CREATED', $6, 'Pending', $7, $8)
            ON CONFLICT (order_id) DO NOTHING
            RETURNING *;
        "#,
    )
    .bind(order.order_id)
    .bind(order.customer_id)
    .bind(order.event_id)
    .bind(order.amount)
    .bind(order.currency)
    .bind(order.payment_gateway)
    .bind(order.quantity)
    .bind(order.response_data.to_string())
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

/// Takes SQLite's write lock by touching the order row. Transactions that read before they write call this first:
/// SQLite refuses, rather than queues, a reader that tries to become a writer while another writer is active.
pub async fn lock_order(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE payment_orders SET updated_at = CURRENT_TIMESTAMP WHERE order_id = $1")
        .bind(order_id.as_str())
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn fetch_order_by_order_id(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentOrder>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM payment_orders WHERE order_id = $1")
        .bind(order_id.as_str())
        .fetch_optional(conn)
        .await?;
    Ok(order)
}

pub async fn fetch_order_by_id(id: i64, conn: &mut SqliteConnection) -> Result<Option<PaymentOrder>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM payment_orders WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(order)
}

/// Fetches orders according to criteria specified in the `OrderQueryFilter`
///
/// Resulting orders are ordered by `created_at` in ascending order
pub async fn search_orders(
    query: OrderQueryFilter,
    conn: &mut SqliteConnection,
) -> Result<Vec<PaymentOrder>, sqlx::Error> {
    let statuses = query.statuses().map(<[PaymentOrderStatus]>::to_vec);
    let mut builder = QueryBuilder::new("SELECT * FROM payment_orders ");
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(order_id) = query.order_id {
        where_clause.push("order_id = ");
        where_clause.push_bind_unseparated(order_id.0);
    }
    if let Some(cid) = query.customer_id {
        where_clause.push("customer_id = ");
        where_clause.push_bind_unseparated(cid);
    }
    if let Some(event_id) = query.event_id {
        where_clause.push("event_id = ");
        where_clause.push_bind_unseparated(event_id);
    }
    if let Some(channel) = query.payment_gateway {
        where_clause.push("payment_gateway = ");
        where_clause.push_bind_unseparated(channel);
    }
    if let Some(statuses) = statuses {
        where_clause.push("status IN (");
        for (i, status) in statuses.iter().enumerate() {
            if i > 0 {
                where_clause.push_unseparated(", ");
            }
            where_clause.push_bind_unseparated(status.to_string());
        }
        where_clause.push_unseparated(")");
    }
    if let Some(age) = query.min_age_secs {
        where_clause.push("created_at <= datetime('now', ");
        where_clause.push_bind_unseparated(format!("-{age} seconds"));
        where_clause.push_unseparated(")");
    }
    builder.push(" ORDER BY created_at ASC, id ASC");

    trace!("🗃️ Executing query: {}", builder.sql());
    let query = builder.build_query_as::<PaymentOrder>();
    let orders = query.fetch_all(conn).await?;
    trace!("🗃️ Result of search_orders: {:?}", orders.len());
    Ok(orders)
}

/// Read-modify-write of the audit blob. Run it inside a transaction.
async fn modify_audit<F>(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
    f: F,
) -> Result<PaymentOrder, TicketingDatabaseError>
where
    F: FnOnce(&mut Map<String, Value>),
{
    lock_order(order_id, conn).await?;
    let order = fetch_order_by_order_id(order_id, conn)
        .await?
        .ok_or_else(|| TicketingDatabaseError::OrderNotFound(order_id.clone()))?;
    let mut audit = match order.audit() {
        Value::Object(map) => map,
        other => {
            warn!("🗃️ Audit blob for order {order_id} was not an object. Preserving it under 'legacy'.");
            let mut map = Map::new();
            map.insert("legacy".into(), other);
            map
        },
    };
    f(&mut audit);
    let order = sqlx::query_as(
        "UPDATE payment_orders SET response_data = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING *",
    )
    .bind(Value::Object(audit).to_string())
    .bind(order.id)
    .fetch_one(conn)
    .await?;
    Ok(order)
}

pub async fn append_audit_entry(
    order_id: &OrderId,
    key: &str,
    entry: Value,
    conn: &mut SqliteConnection,
) -> Result<PaymentOrder, TicketingDatabaseError> {
    modify_audit(order_id, conn, |audit| {
        let slot = audit.entry(key.to_string()).or_insert_with(|| Value::Array(Vec::new()));
        match slot {
            Value::Array(entries) => entries.push(entry),
            other => *other = Value::Array(vec![other.take(), entry]),
        }
    })
    .await
}

pub async fn set_audit_field(
    order_id: &OrderId,
    key: &str,
    value: Value,
    conn: &mut SqliteConnection,
) -> Result<PaymentOrder, TicketingDatabaseError> {
    modify_audit(order_id, conn, |audit| {
        audit.insert(key.to_string(), value);
    })
    .await
}

/// `CREATED` → `PENDING`. Returns `None` if the order was in any other status.
pub async fn mark_pending(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Option<PaymentOrder>, sqlx::Error> {
    let order = sqlx::query_as(
        r#"UPDATE payment_orders SET status = 'PENDING', payment_status = 'Pending', updated_at = CURRENT_TIMESTAMP
        WHERE order_id = $1 AND status = 'CREATED' RETURNING *"#,
    )
    .bind(order_id.as_str())
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

/// Moves an unresolved order to `FAILED` or `CANCELLED`. Returns `None` if the order was not `CREATED` or `PENDING`.
pub async fn close_order(
    order_id: &OrderId,
    status: PaymentOrderStatus,
    payment: PaymentReference,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentOrder>, sqlx::Error> {
    let label = match status {
        PaymentOrderStatus::Cancelled => "Cancelled",
        _ => "Failed",
    };
    let order = sqlx::query_as(
        r#"UPDATE payment_orders SET
            status = $1,
            payment_status = $2,
            transaction_id = COALESCE($3, transaction_id),
            cf_payment_id = COALESCE($4, cf_payment_id),
            updated_at = CURRENT_TIMESTAMP
        WHERE order_id = $5 AND status IN ('CREATED', 'PENDING') RETURNING *"#,
    )
    .bind(status.to_string())
    .bind(label)
    .bind(payment.transaction_id)
    .bind(payment.cf_payment_id)
    .bind(order_id.as_str())
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

/// The serialization point for successful reconciliation. Only one caller can ever see `Some` for a given order, since
/// the update is conditional on the order not yet being `SUCCESS`. `CANCELLED` orders are never promoted.
pub async fn mark_success(
    order_id: &OrderId,
    payment: PaymentReference,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentOrder>, sqlx::Error> {
    let order = sqlx::query_as(
        r#"UPDATE payment_orders SET
            status = 'SUCCESS',
            payment_status = 'Success',
            transaction_id = COALESCE($1, transaction_id),
            cf_payment_id = COALESCE($2, cf_payment_id),
            updated_at = CURRENT_TIMESTAMP
        WHERE order_id = $3 AND status IN ('CREATED', 'PENDING', 'FAILED') RETURNING *"#,
    )
    .bind(payment.transaction_id)
    .bind(payment.cf_payment_id)
    .bind(order_id.as_str())
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

pub async fn set_payment_status(
    order_id: &OrderId,
    payment_status: &str,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE payment_orders SET payment_status = $1, updated_at = CURRENT_TIMESTAMP WHERE order_id = $2")
        .bind(payment_status)
        .bind(order_id.as_str())
        .execute(conn)
        .await?;
    Ok(())
}

use log::{debug, info, warn};
use sqlx::{FromRow, SqliteConnection};
use tkt_common::Paise;

use crate::{
    db_types::{CartSnapshot, NewPromoCode, PaymentOrder, PromoCode, PromoCodeUsage, Ticket},
    traits::{PromoAccounting, PromoLedgerError, PromoResync, PromoUsageStats},
};

/// Ledger rows that count towards `current_uses`: the usage's ticket belongs to a `SUCCESS` order on a live channel.
const COUNTED_USAGES: &str = r#"
    FROM promo_code_usages u
    JOIN tickets t ON t.id = u.ticket_id
    JOIN payment_orders o ON o.id = t.payment_order_id
    WHERE o.status = 'SUCCESS' AND o.payment_gateway != 'SANDBOX'
"#;

pub async fn insert_promo_code(promo: NewPromoCode, conn: &mut SqliteConnection) -> Result<PromoCode, sqlx::Error> {
    sqlx::query_as(
        r#"INSERT INTO promo_codes (code, event_id, discount_type, discount_value, valid_from, valid_until, max_uses)
        VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *"#,
    )
    .bind(promo.code.trim().to_uppercase())
    .bind(promo.event_id)
    .bind(promo.discount_type)
    .bind(promo.discount_value)
    .bind(promo.valid_from)
    .bind(promo.valid_until)
    .bind(promo.max_uses)
    .fetch_one(conn)
    .await
}

pub async fn fetch_promo_code(
    code: &str,
    event_id: Option<i64>,
    conn: &mut SqliteConnection,
) -> Result<Option<PromoCode>, sqlx::Error> {
    let code = code.trim().to_uppercase();
    match event_id {
        Some(event_id) => {
            sqlx::query_as("SELECT * FROM promo_codes WHERE code = $1 AND event_id = $2")
                .bind(code)
                .bind(event_id)
                .fetch_optional(conn)
                .await
        },
        None => sqlx::query_as("SELECT * FROM promo_codes WHERE code = $1").bind(code).fetch_optional(conn).await,
    }
}

pub async fn fetch_promo_code_by_id(id: i64, conn: &mut SqliteConnection) -> Result<Option<PromoCode>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM promo_codes WHERE id = $1").bind(id).fetch_optional(conn).await
}

pub async fn fetch_usages_for_promo(
    promo_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<PromoCodeUsage>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM promo_code_usages WHERE promo_code_id = $1 ORDER BY id")
        .bind(promo_id)
        .fetch_all(conn)
        .await
}

/// The usage row for (promo code, customer, any ticket of this order), if one exists.
async fn fetch_usage_for_order(
    promo_id: i64,
    customer_id: i64,
    payment_order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<PromoCodeUsage>, sqlx::Error> {
    sqlx::query_as(
        r#"SELECT u.* FROM promo_code_usages u JOIN tickets t ON t.id = u.ticket_id
        WHERE u.promo_code_id = $1 AND u.customer_id = $2 AND t.payment_order_id = $3
        LIMIT 1"#,
    )
    .bind(promo_id)
    .bind(customer_id)
    .bind(payment_order_id)
    .fetch_optional(conn)
    .await
}

/// Writes the ledger line for a successful order, once.
///
/// Sandbox orders get a ledger line but never move `current_uses`. This is not atomic; run it inside the same
/// transaction (or a savepoint of it) that marked the order `SUCCESS`.
pub async fn record_usage(
    order: &PaymentOrder,
    snapshot: &CartSnapshot,
    tickets: &[Ticket],
    conn: &mut SqliteConnection,
) -> Result<PromoAccounting, PromoLedgerError> {
    let code = match snapshot.promo_code.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        Some(code) => code,
        None => return Ok(PromoAccounting::NotApplicable),
    };
    let promo = match fetch_promo_code(code, Some(snapshot.event_id), conn).await? {
        Some(promo) => promo,
        None => {
            warn!(
                "🏷️ Promo code {code} on order {} does not exist for event #{}. Skipping promo accounting.",
                order.order_id, snapshot.event_id
            );
            return Ok(PromoAccounting::PromoNotFound { code: code.to_string() });
        },
    };
    let ticket = match tickets.first() {
        Some(t) => t,
        None => {
            warn!("🏷️ Order {} has no tickets to attach promo usage of {code} to.", order.order_id);
            return Ok(PromoAccounting::NoTicket);
        },
    };
    if fetch_usage_for_order(promo.id, order.customer_id, order.id, conn).await?.is_some() {
        debug!("🏷️ Promo usage of {code} for order {} is already recorded", order.order_id);
        return Ok(PromoAccounting::AlreadyRecorded);
    }
    let usage: PromoCodeUsage = sqlx::query_as(
        r#"INSERT INTO promo_code_usages (promo_code_id, customer_id, ticket_id, order_total, discount_amount)
        VALUES ($1, $2, $3, $4, $5) RETURNING *"#,
    )
    .bind(promo.id)
    .bind(order.customer_id)
    .bind(ticket.id)
    .bind(snapshot.subtotal)
    .bind(snapshot.discount)
    .fetch_one(&mut *conn)
    .await?;
    let counted = !order.is_test_transaction();
    if counted {
        sqlx::query("UPDATE promo_codes SET current_uses = current_uses + 1 WHERE id = $1")
            .bind(promo.id)
            .execute(conn)
            .await?;
    }
    info!(
        "🏷️ Promo code {} used on order {} ({} off). Counted: {counted}",
        promo.code, order.order_id, snapshot.discount
    );
    Ok(PromoAccounting::Recorded { usage, counted })
}

/// Takes the write lock before the counters are read. See `payment_orders::lock_order`.
pub async fn lock_promo_codes(promo_id: Option<i64>, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE promo_codes SET current_uses = current_uses WHERE $1 IS NULL OR id = $1")
        .bind(promo_id)
        .execute(conn)
        .await?;
    Ok(())
}

#[derive(Debug, FromRow)]
struct UsageCount {
    id: i64,
    code: String,
    current_uses: i64,
    effective_uses: i64,
}

/// Sets `current_uses` to the number of counted ledger rows. Returns the codes that had drifted.
pub async fn recompute_current_uses(
    promo_id: Option<i64>,
    conn: &mut SqliteConnection,
) -> Result<Vec<PromoResync>, sqlx::Error> {
    let sql = format!(
        r#"SELECT p.id, p.code, p.current_uses,
            (SELECT COUNT(*) {COUNTED_USAGES} AND u.promo_code_id = p.id) AS effective_uses
        FROM promo_codes p
        WHERE $1 IS NULL OR p.id = $1
        ORDER BY p.id"#
    );
    let counts: Vec<UsageCount> = sqlx::query_as(&sql).bind(promo_id).fetch_all(&mut *conn).await?;
    let mut corrected = Vec::new();
    for count in counts.into_iter().filter(|c| c.current_uses != c.effective_uses) {
        sqlx::query("UPDATE promo_codes SET current_uses = $1 WHERE id = $2")
            .bind(count.effective_uses)
            .bind(count.id)
            .execute(&mut *conn)
            .await?;
        info!("🏷️ Promo code {} counter corrected from {} to {}", count.code, count.current_uses, count.effective_uses);
        corrected.push(PromoResync {
            promo_id: count.id,
            code: count.code,
            previous_uses: count.current_uses,
            current_uses: count.effective_uses,
        });
    }
    Ok(corrected)
}

#[derive(Debug, FromRow)]
struct StatsRow {
    uses: i64,
    tickets_booked: i64,
    amount_saved: i64,
    revenue: i64,
}

pub async fn usage_stats(promo_id: i64, conn: &mut SqliteConnection) -> Result<PromoUsageStats, sqlx::Error> {
    let sql = format!(
        r#"SELECT
            COUNT(*) AS uses,
            COALESCE(SUM((SELECT SUM(t2.booking_quantity) FROM tickets t2 WHERE t2.payment_order_id = o.id)), 0)
                AS tickets_booked,
            COALESCE(SUM(u.discount_amount), 0) AS amount_saved,
            COALESCE(SUM(o.amount), 0) AS revenue
        {COUNTED_USAGES} AND u.promo_code_id = $1"#
    );
    let row: StatsRow = sqlx::query_as(&sql).bind(promo_id).fetch_one(conn).await?;
    Ok(PromoUsageStats {
        uses: row.uses,
        tickets_booked: row.tickets_booked,
        amount_saved: Paise::from(row.amount_saved),
        revenue: Paise::from(row.revenue),
    })
}

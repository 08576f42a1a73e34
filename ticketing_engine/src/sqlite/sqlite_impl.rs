//! `SqliteDatabase` is a concrete implementation of a ticketing engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module.
//!
//! SQLite serializes writers. The successful-payment transition therefore opens its transaction with the conditional
//! status update, so that the write lock is taken before anything is read. A second reconciliation of the same order
//! waits on that lock and then finds the order already `SUCCESS`.
use std::fmt::Debug;

use chrono::Utc;
use log::*;
use serde_json::json;
use sqlx::{Acquire, SqlitePool};

use super::db::{catalog, db_url, invoices, new_pool, payment_orders, promo_codes, tickets};
use crate::{
    db_types::{
        Customer,
        Event,
        EventCommission,
        Invoice,
        NewCustomer,
        NewEvent,
        NewPaymentOrder,
        NewPromoCode,
        NewTicketType,
        OrderId,
        PaymentOrder,
        PaymentOrderStatus,
        PromoCode,
        PromoCodeUsage,
        Ticket,
        TicketType,
    },
    order_objects::OrderQueryFilter,
    traits::{
        CatalogManagement,
        InvoiceManagement,
        IssuanceError,
        IssuedTickets,
        PaymentOrderManagement,
        PaymentReference,
        PromoAccounting,
        PromoLedgerError,
        PromoManagement,
        PromoResync,
        PromoUsageStats,
        SuccessTransition,
        TicketManagement,
        TicketingDatabase,
        TicketingDatabaseError,
        ValidationError,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl TicketingDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }
}

impl PaymentOrderManagement for SqliteDatabase {
    async fn insert_payment_order(
        &self,
        order: NewPaymentOrder,
    ) -> Result<(PaymentOrder, bool), TicketingDatabaseError> {
        let mut tx = self.pool.begin().await?;
        let result = payment_orders::idempotent_insert(order, &mut tx).await?;
        tx.commit().await?;
        Ok(result)
    }

    async fn fetch_payment_order(&self, order_id: &OrderId) -> Result<Option<PaymentOrder>, TicketingDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        let order = payment_orders::fetch_order_by_order_id(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn search_payment_orders(&self, query: OrderQueryFilter) -> Result<Vec<PaymentOrder>, TicketingDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        let orders = payment_orders::search_orders(query, &mut conn).await?;
        Ok(orders)
    }

    async fn append_audit_entry(
        &self,
        order_id: &OrderId,
        key: &str,
        entry: serde_json::Value,
    ) -> Result<PaymentOrder, TicketingDatabaseError> {
        let mut tx = self.pool.begin().await?;
        let order = payment_orders::append_audit_entry(order_id, key, entry, &mut tx).await?;
        tx.commit().await?;
        trace!("🗃️ Audit entry added to '{key}' for order {order_id}");
        Ok(order)
    }

    async fn set_audit_field(
        &self,
        order_id: &OrderId,
        key: &str,
        value: serde_json::Value,
    ) -> Result<PaymentOrder, TicketingDatabaseError> {
        let mut tx = self.pool.begin().await?;
        let order = payment_orders::set_audit_field(order_id, key, value, &mut tx).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn mark_order_pending(&self, order_id: &OrderId) -> Result<PaymentOrder, TicketingDatabaseError> {
        let mut tx = self.pool.begin().await?;
        let order = match payment_orders::mark_pending(order_id, &mut tx).await? {
            Some(order) => {
                debug!("🗃️ Order {order_id} is now PENDING");
                order
            },
            None => payment_orders::fetch_order_by_order_id(order_id, &mut tx)
                .await?
                .ok_or_else(|| TicketingDatabaseError::OrderNotFound(order_id.clone()))?,
        };
        tx.commit().await?;
        Ok(order)
    }

    async fn close_order(
        &self,
        order_id: &OrderId,
        status: PaymentOrderStatus,
        payment: PaymentReference,
    ) -> Result<(PaymentOrder, bool), TicketingDatabaseError> {
        if !matches!(status, PaymentOrderStatus::Failed | PaymentOrderStatus::Cancelled) {
            return Err(TicketingDatabaseError::ForbiddenTransition {
                order_id: order_id.clone(),
                from: PaymentOrderStatus::Pending,
                to: status,
            });
        }
        let mut tx = self.pool.begin().await?;
        let result = match payment_orders::close_order(order_id, status, payment, &mut tx).await? {
            Some(order) => {
                info!("🗃️ Order {order_id} closed as {status}");
                (order, true)
            },
            None => {
                let order = payment_orders::fetch_order_by_order_id(order_id, &mut tx)
                    .await?
                    .ok_or_else(|| TicketingDatabaseError::OrderNotFound(order_id.clone()))?;
                debug!("🗃️ Order {order_id} is {} and cannot be closed as {status}. Left untouched.", order.status);
                (order, false)
            },
        };
        tx.commit().await?;
        Ok(result)
    }

    async fn complete_order(
        &self,
        order_id: &OrderId,
        payment: PaymentReference,
    ) -> Result<SuccessTransition, TicketingDatabaseError> {
        let mut tx = self.pool.begin().await?;
        let order = match payment_orders::mark_success(order_id, payment, &mut tx).await? {
            Some(order) => order,
            None => {
                let current = payment_orders::fetch_order_by_order_id(order_id, &mut tx)
                    .await?
                    .ok_or_else(|| TicketingDatabaseError::OrderNotFound(order_id.clone()))?;
                return match current.status {
                    PaymentOrderStatus::Success => {
                        let tickets = tickets::fetch_tickets_for_payment_order(current.id, &mut tx).await?;
                        tx.commit().await?;
                        debug!("🗃️ Order {order_id} was already SUCCESS with {} tickets", tickets.len());
                        Ok(SuccessTransition::already_complete(current, tickets))
                    },
                    from => Err(TicketingDatabaseError::ForbiddenTransition {
                        order_id: order_id.clone(),
                        from,
                        to: PaymentOrderStatus::Success,
                    }),
                };
            },
        };
        info!("🗃️ Order {order_id} marked SUCCESS");

        let issuance = {
            let mut savepoint = (&mut tx).begin().await?;
            match tickets::issue_tickets(&order, &mut savepoint).await {
                Ok(issued) => {
                    savepoint.commit().await?;
                    Ok(issued)
                },
                Err(e) => {
                    savepoint.rollback().await?;
                    Err(e)
                },
            }
        };
        let (tickets, newly_issued, issuance_error) = match issuance {
            Ok(issued) => (issued.tickets, issued.newly_issued, None),
            Err(e) => {
                error!("🗃️ Order {order_id} is paid, but its tickets could not be issued. {e}");
                let entry = json!({ "stage": "ticket_issuance", "error": e.to_string(), "error_timestamp": Utc::now() });
                payment_orders::append_audit_entry(order_id, "errors", entry, &mut tx).await?;
                payment_orders::set_payment_status(order_id, e.payment_status_label(), &mut tx).await?;
                (Vec::new(), false, Some(e.to_string()))
            },
        };

        let promo = match order.cart_snapshot() {
            Some(snapshot) => {
                let mut savepoint = (&mut tx).begin().await?;
                match promo_codes::record_usage(&order, &snapshot, &tickets, &mut savepoint).await {
                    Ok(accounting) => {
                        savepoint.commit().await?;
                        accounting
                    },
                    Err(e) => {
                        savepoint.rollback().await?;
                        error!("🗃️ Promo accounting for order {order_id} failed. {e}");
                        let entry =
                            json!({ "stage": "promo_accounting", "error": e.to_string(), "error_timestamp": Utc::now() });
                        payment_orders::append_audit_entry(order_id, "errors", entry, &mut tx).await?;
                        PromoAccounting::Failed { reason: e.to_string() }
                    },
                }
            },
            None => PromoAccounting::NotApplicable,
        };

        let order = payment_orders::fetch_order_by_id(order.id, &mut tx)
            .await?
            .ok_or_else(|| TicketingDatabaseError::OrderNotFound(order_id.clone()))?;
        tx.commit().await?;
        Ok(SuccessTransition { order, tickets, already_complete: false, newly_issued, issuance_error, promo })
    }
}

impl TicketManagement for SqliteDatabase {
    async fn fetch_tickets_for_order(&self, order_id: &OrderId) -> Result<Vec<Ticket>, TicketingDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        let order = payment_orders::fetch_order_by_order_id(order_id, &mut conn)
            .await?
            .ok_or_else(|| TicketingDatabaseError::OrderNotFound(order_id.clone()))?;
        let tickets = tickets::fetch_tickets_for_payment_order(order.id, &mut conn).await?;
        Ok(tickets)
    }

    async fn fetch_ticket(&self, ticket_id: i64) -> Result<Option<Ticket>, TicketingDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        let ticket = tickets::fetch_ticket(ticket_id, &mut conn).await?;
        Ok(ticket)
    }

    async fn issue_tickets_for_order(&self, order_id: &OrderId) -> Result<IssuedTickets, IssuanceError> {
        let mut tx = self.pool.begin().await?;
        payment_orders::lock_order(order_id, &mut tx).await?;
        let order = payment_orders::fetch_order_by_order_id(order_id, &mut tx)
            .await?
            .ok_or_else(|| IssuanceError::OrderNotFound(order_id.clone()))?;
        if order.status != PaymentOrderStatus::Success {
            return Err(IssuanceError::OrderNotPaid { order_id: order_id.clone(), status: order.status });
        }
        let issued = tickets::issue_tickets(&order, &mut tx).await?;
        if issued.newly_issued {
            payment_orders::set_payment_status(order_id, "Success", &mut tx).await?;
        }
        tx.commit().await?;
        Ok(issued)
    }

    async fn remaining_capacity(&self, event_id: i64) -> Result<i64, TicketingDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        tickets::remaining_capacity(event_id, &mut conn).await
    }

    async fn validate_ticket(
        &self,
        ticket_id: i64,
        secure_token: &str,
        volunteer_id: i64,
    ) -> Result<Ticket, ValidationError> {
        let mut tx = self.pool.begin().await?;
        let ticket = tickets::validate_ticket(ticket_id, secure_token, volunteer_id, &mut tx).await?;
        tx.commit().await?;
        Ok(ticket)
    }
}

impl PromoManagement for SqliteDatabase {
    async fn insert_promo_code(&self, promo: NewPromoCode) -> Result<PromoCode, PromoLedgerError> {
        let mut conn = self.pool.acquire().await?;
        let promo = promo_codes::insert_promo_code(promo, &mut conn).await?;
        debug!("🗃️ Promo code {} created for event #{}", promo.code, promo.event_id);
        Ok(promo)
    }

    async fn fetch_promo_code(&self, code: &str, event_id: Option<i64>) -> Result<Option<PromoCode>, PromoLedgerError> {
        let mut conn = self.pool.acquire().await?;
        let promo = promo_codes::fetch_promo_code(code, event_id, &mut conn).await?;
        Ok(promo)
    }

    async fn fetch_promo_code_by_id(&self, promo_id: i64) -> Result<Option<PromoCode>, PromoLedgerError> {
        let mut conn = self.pool.acquire().await?;
        let promo = promo_codes::fetch_promo_code_by_id(promo_id, &mut conn).await?;
        Ok(promo)
    }

    async fn fetch_usages_for_promo(&self, promo_id: i64) -> Result<Vec<PromoCodeUsage>, PromoLedgerError> {
        let mut conn = self.pool.acquire().await?;
        let usages = promo_codes::fetch_usages_for_promo(promo_id, &mut conn).await?;
        Ok(usages)
    }

    async fn recompute_current_uses(&self, promo_id: Option<i64>) -> Result<Vec<PromoResync>, PromoLedgerError> {
        let mut tx = self.pool.begin().await?;
        promo_codes::lock_promo_codes(promo_id, &mut tx).await?;
        if let Some(id) = promo_id {
            promo_codes::fetch_promo_code_by_id(id, &mut tx).await?.ok_or(PromoLedgerError::PromoIdNotFound(id))?;
        }
        let corrected = promo_codes::recompute_current_uses(promo_id, &mut tx).await?;
        tx.commit().await?;
        Ok(corrected)
    }

    async fn promo_usage_stats(&self, promo_id: i64) -> Result<PromoUsageStats, PromoLedgerError> {
        let mut conn = self.pool.acquire().await?;
        let stats = promo_codes::usage_stats(promo_id, &mut conn).await?;
        Ok(stats)
    }
}

impl CatalogManagement for SqliteDatabase {
    async fn insert_customer(&self, customer: NewCustomer) -> Result<Customer, TicketingDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        let customer = catalog::insert_customer(customer, &mut conn).await?;
        Ok(customer)
    }

    async fn fetch_customer(&self, customer_id: i64) -> Result<Option<Customer>, TicketingDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        let customer = catalog::fetch_customer(customer_id, &mut conn).await?;
        Ok(customer)
    }

    async fn insert_event(&self, event: NewEvent) -> Result<Event, TicketingDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        let event = catalog::insert_event(event, &mut conn).await?;
        Ok(event)
    }

    async fn fetch_event(&self, event_id: i64) -> Result<Option<Event>, TicketingDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        let event = catalog::fetch_event(event_id, &mut conn).await?;
        Ok(event)
    }

    async fn insert_ticket_type(&self, ticket_type: NewTicketType) -> Result<TicketType, TicketingDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        let tt = catalog::insert_ticket_type(ticket_type, &mut conn).await?;
        Ok(tt)
    }

    async fn fetch_ticket_type(&self, ticket_type_id: i64) -> Result<Option<TicketType>, TicketingDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        let tt = catalog::fetch_ticket_type(ticket_type_id, &mut conn).await?;
        Ok(tt)
    }

    async fn fetch_ticket_types_for_event(&self, event_id: i64) -> Result<Vec<TicketType>, TicketingDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        let types = catalog::fetch_ticket_types_for_event(event_id, &mut conn).await?;
        Ok(types)
    }

    async fn set_event_commission(&self, commission: EventCommission) -> Result<(), TicketingDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        catalog::upsert_event_commission(commission, &mut conn).await?;
        Ok(())
    }

    async fn fetch_event_commission(&self, event_id: i64) -> Result<Option<EventCommission>, TicketingDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        let commission = catalog::fetch_event_commission(event_id, &mut conn).await?;
        Ok(commission)
    }
}

impl InvoiceManagement for SqliteDatabase {
    async fn create_invoices_for_order(&self, order_id: &OrderId) -> Result<Vec<Invoice>, TicketingDatabaseError> {
        let mut tx = self.pool.begin().await?;
        payment_orders::lock_order(order_id, &mut tx).await?;
        let order = payment_orders::fetch_order_by_order_id(order_id, &mut tx)
            .await?
            .ok_or_else(|| TicketingDatabaseError::OrderNotFound(order_id.clone()))?;
        let invoices = invoices::create_invoices_for_order(&order, &mut tx).await?;
        tx.commit().await?;
        Ok(invoices)
    }

    async fn fetch_invoices_for_order(&self, order_id: &OrderId) -> Result<Vec<Invoice>, TicketingDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        let order = payment_orders::fetch_order_by_order_id(order_id, &mut conn)
            .await?
            .ok_or_else(|| TicketingDatabaseError::OrderNotFound(order_id.clone()))?;
        let invoices = invoices::fetch_invoices_for_payment_order(order.id, &mut conn).await?;
        Ok(invoices)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the database URL from `TKT_DATABASE_URL`.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Applies the embedded schema migrations.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    pub async fn close(&mut self) -> Result<(), sqlx::Error> {
        self.pool.close().await;
        Ok(())
    }
}

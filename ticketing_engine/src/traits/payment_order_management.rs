use serde_json::Value;
use thiserror::Error;

use crate::{
    db_types::{NewPaymentOrder, OrderId, PaymentOrder, PaymentOrderStatus},
    order_objects::OrderQueryFilter,
    traits::{PaymentReference, SuccessTransition},
};

#[derive(Debug, Clone, Error)]
pub enum TicketingDatabaseError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("Payment order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Payment order {order_id} cannot move from {from} to {to}")]
    ForbiddenTransition { order_id: OrderId, from: PaymentOrderStatus, to: PaymentOrderStatus },
    #[error("Customer #{0} does not exist")]
    CustomerNotFound(i64),
    #[error("Event #{0} does not exist")]
    EventNotFound(i64),
    #[error("Ticket type #{0} does not exist")]
    TicketTypeNotFound(i64),
    #[error("Order {0} was inserted with a different payload")]
    OrderConflict(OrderId),
}

impl From<sqlx::Error> for TicketingDatabaseError {
    fn from(e: sqlx::Error) -> Self {
        TicketingDatabaseError::DatabaseError(e.to_string())
    }
}

/// Storage for payment orders and the reconciliation state machine.
///
/// Every state-changing method here must be atomic. Implementations must use the order row as the serialization point
/// for concurrent reconciliations of the same order.
#[allow(async_fn_in_trait)]
pub trait PaymentOrderManagement {
    /// Stores a new payment order in `CREATED` status. Idempotent on `order_id`: the second element of the result is
    /// false if the order already existed.
    async fn insert_payment_order(&self, order: NewPaymentOrder)
        -> Result<(PaymentOrder, bool), TicketingDatabaseError>;

    async fn fetch_payment_order(&self, order_id: &OrderId) -> Result<Option<PaymentOrder>, TicketingDatabaseError>;

    /// Fetches orders according to criteria specified in the `OrderQueryFilter`, oldest first.
    async fn search_payment_orders(&self, query: OrderQueryFilter) -> Result<Vec<PaymentOrder>, TicketingDatabaseError>;

    /// Appends `entry` to the array stored under `key` in the order's audit blob, creating the array if needed.
    async fn append_audit_entry(
        &self,
        order_id: &OrderId,
        key: &str,
        entry: Value,
    ) -> Result<PaymentOrder, TicketingDatabaseError>;

    /// Replaces the value stored under `key` in the order's audit blob.
    async fn set_audit_field(
        &self,
        order_id: &OrderId,
        key: &str,
        value: Value,
    ) -> Result<PaymentOrder, TicketingDatabaseError>;

    /// `CREATED` becomes `PENDING`. Any other status is left alone. The current order is returned either way.
    async fn mark_order_pending(&self, order_id: &OrderId) -> Result<PaymentOrder, TicketingDatabaseError>;

    /// Moves an unresolved order to `FAILED` or `CANCELLED`. Returns the order and whether its status changed.
    /// Orders that are already terminal are returned untouched.
    async fn close_order(
        &self,
        order_id: &OrderId,
        status: PaymentOrderStatus,
        payment: PaymentReference,
    ) -> Result<(PaymentOrder, bool), TicketingDatabaseError>;

    /// Marks the order `SUCCESS` and, in the same transaction, issues its tickets and records any promo usage.
    ///
    /// * If the order was already `SUCCESS`, nothing is written and the existing tickets are returned with
    ///   `already_complete` set.
    /// * Issuance and promo accounting run in their own savepoints. A failure in either is rolled back on its own,
    ///   recorded in the audit blob and in `payment_status`, and reported in the result. The `SUCCESS` status is
    ///   committed regardless, since the payment was captured.
    /// * A `CANCELLED` order is never completed. [`TicketingDatabaseError::ForbiddenTransition`] is returned.
    async fn complete_order(
        &self,
        order_id: &OrderId,
        payment: PaymentReference,
    ) -> Result<SuccessTransition, TicketingDatabaseError>;
}

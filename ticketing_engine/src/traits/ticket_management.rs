use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    db_types::{OrderId, PaymentOrderStatus, Ticket, TicketStatus},
    traits::{IssuedTickets, TicketingDatabaseError},
};

#[derive(Debug, Clone, Error)]
pub enum IssuanceError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("Payment order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Tickets can only be issued for successful orders. Order {order_id} is {status}")]
    OrderNotPaid { order_id: OrderId, status: PaymentOrderStatus },
    #[error("Order {0} has no cart snapshot")]
    MissingSnapshot(OrderId),
    #[error("The cart snapshot for order {0} has no lines")]
    EmptySnapshot(OrderId),
    #[error("Event #{0} does not exist")]
    UnknownEvent(i64),
    #[error("Ticket type #{ticket_type_id} does not exist for event #{event_id}")]
    UnknownTicketType { ticket_type_id: i64, event_id: i64 },
    #[error("Not enough capacity. {requested} attendees requested, but only {remaining} places remain")]
    Capacity { requested: i64, remaining: i64 },
}

impl IssuanceError {
    /// The operator-facing label written to the order's `payment_status` when issuance fails after payment.
    pub fn payment_status_label(&self) -> &'static str {
        match self {
            IssuanceError::Capacity { .. } => "Error - Capacity",
            _ => "Error - Issuance",
        }
    }
}

impl From<sqlx::Error> for IssuanceError {
    fn from(e: sqlx::Error) -> Self {
        IssuanceError::DatabaseError(e.to_string())
    }
}

impl From<TicketingDatabaseError> for IssuanceError {
    fn from(e: TicketingDatabaseError) -> Self {
        match e {
            TicketingDatabaseError::OrderNotFound(oid) => IssuanceError::OrderNotFound(oid),
            TicketingDatabaseError::EventNotFound(id) => IssuanceError::UnknownEvent(id),
            e => IssuanceError::DatabaseError(e.to_string()),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("Ticket #{0} does not exist")]
    TicketNotFound(i64),
    #[error("The secure token does not match this ticket")]
    TokenMismatch,
    #[error("This ticket has already been used")]
    AlreadyUsed { used_at: Option<DateTime<Utc>> },
    #[error("A ticket in status {0} cannot be validated")]
    NotValidatable(TicketStatus),
}

impl From<sqlx::Error> for ValidationError {
    fn from(e: sqlx::Error) -> Self {
        ValidationError::DatabaseError(e.to_string())
    }
}

#[allow(async_fn_in_trait)]
pub trait TicketManagement {
    async fn fetch_tickets_for_order(&self, order_id: &OrderId) -> Result<Vec<Ticket>, TicketingDatabaseError>;

    async fn fetch_ticket(&self, ticket_id: i64) -> Result<Option<Ticket>, TicketingDatabaseError>;

    /// Issues the tickets for a `SUCCESS` order from its cart snapshot, or returns the existing tickets if the order
    /// already has them. Used to repair orders whose issuance failed during reconciliation.
    async fn issue_tickets_for_order(&self, order_id: &OrderId) -> Result<IssuedTickets, IssuanceError>;

    /// `max_attendees` less the admissions already sold for the event.
    async fn remaining_capacity(&self, event_id: i64) -> Result<i64, TicketingDatabaseError>;

    /// Marks a ticket as `USED` at the door.
    async fn validate_ticket(
        &self,
        ticket_id: i64,
        secure_token: &str,
        volunteer_id: i64,
    ) -> Result<Ticket, ValidationError>;
}

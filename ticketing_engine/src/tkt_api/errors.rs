use thiserror::Error;
use tkt_common::Paise;

use crate::{
    db_types::OrderId,
    traits::{PromoLedgerError, TicketingDatabaseError},
};

/// Reasons a checkout is refused. Everything except [`CheckoutError::GatewayUnavailable`] and
/// [`CheckoutError::DatabaseError`] is raised before any order is written.
#[derive(Debug, Clone, Error)]
pub enum CheckoutError {
    #[error("The cart is empty")]
    EmptyCart,
    #[error("The terms of service must be accepted before paying")]
    TermsNotAccepted,
    #[error("The order total must be positive, but it is {0}")]
    NonPositiveTotal(Paise),
    #[error("The cart is not valid. {0}")]
    InvalidCart(String),
    #[error("The promo code cannot be used. {0}")]
    InvalidPromo(String),
    #[error("Customer #{0} does not exist")]
    CustomerNotFound(i64),
    #[error("Event #{0} does not exist")]
    EventNotFound(i64),
    #[error("We could not start the payment right now. Please try again in a few minutes.")]
    GatewayUnavailable,
    #[error("Internal database error: {0}")]
    DatabaseError(String),
}

impl From<TicketingDatabaseError> for CheckoutError {
    fn from(e: TicketingDatabaseError) -> Self {
        match e {
            TicketingDatabaseError::CustomerNotFound(id) => CheckoutError::CustomerNotFound(id),
            TicketingDatabaseError::EventNotFound(id) => CheckoutError::EventNotFound(id),
            TicketingDatabaseError::TicketTypeNotFound(id) => {
                CheckoutError::InvalidCart(format!("Ticket type #{id} does not exist"))
            },
            e => CheckoutError::DatabaseError(e.to_string()),
        }
    }
}

impl From<PromoLedgerError> for CheckoutError {
    fn from(e: PromoLedgerError) -> Self {
        CheckoutError::DatabaseError(e.to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum ReconcileError {
    #[error("Payment order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Internal database error: {0}")]
    DatabaseError(String),
}

impl From<TicketingDatabaseError> for ReconcileError {
    fn from(e: TicketingDatabaseError) -> Self {
        match e {
            TicketingDatabaseError::OrderNotFound(oid) => ReconcileError::OrderNotFound(oid),
            e => ReconcileError::DatabaseError(e.to_string()),
        }
    }
}

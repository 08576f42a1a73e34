use serde::{Deserialize, Serialize};

use crate::db_types::{PaymentOrder, Ticket};

/// Tickets were created for a paid order. Invoice generation and confirmation emails hang off this event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketsIssuedEvent {
    pub order: PaymentOrder,
    pub tickets: Vec<Ticket>,
}

impl TicketsIssuedEvent {
    pub fn new(order: PaymentOrder, tickets: Vec<Ticket>) -> Self {
        Self { order, tickets }
    }
}

/// An order that an operator should look at: money may have been captured without tickets, or the order has been
/// unresolved for too long.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderNeedsAttentionEvent {
    pub order: PaymentOrder,
    pub reason: String,
}

impl OrderNeedsAttentionEvent {
    pub fn new<S: Into<String>>(order: PaymentOrder, reason: S) -> Self {
        Self { order, reason: reason.into() }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventType {
    TicketsIssued(TicketsIssuedEvent),
    OrderNeedsAttention(OrderNeedsAttentionEvent),
}

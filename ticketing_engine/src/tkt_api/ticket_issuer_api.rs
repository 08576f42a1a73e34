use std::fmt::Debug;

use log::*;

use crate::{
    db_types::OrderId,
    events::{EventProducers, TicketsIssuedEvent},
    order_objects::OrderResult,
    traits::{IssuanceError, IssuedTickets, PaymentOrderManagement, TicketManagement, TicketingDatabaseError},
};

/// Operator-facing access to tickets. Issuance during reconciliation happens inside the backend's success
/// transition; this API repairs orders where that did not complete.
pub struct TicketIssuerApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for TicketIssuerApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TicketIssuerApi")
    }
}

impl<B> TicketIssuerApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }
}

impl<B> TicketIssuerApi<B>
where B: PaymentOrderManagement + TicketManagement
{
    /// Issues the tickets for a `SUCCESS` order, or returns the ones it already has.
    pub async fn issue_tickets(&self, order_id: &OrderId) -> Result<IssuedTickets, IssuanceError> {
        let issued = self.db.issue_tickets_for_order(order_id).await?;
        if issued.newly_issued {
            info!("🎟️ {} tickets issued for order {order_id} on request", issued.tickets.len());
            let order = self
                .db
                .fetch_payment_order(order_id)
                .await?
                .ok_or_else(|| IssuanceError::OrderNotFound(order_id.clone()))?;
            self.producers.publish_tickets_issued(TicketsIssuedEvent::new(order, issued.tickets.clone())).await;
        } else {
            debug!("🎟️ Order {order_id} already had its tickets");
        }
        Ok(issued)
    }

    pub async fn order_with_tickets(&self, order_id: &OrderId) -> Result<Option<OrderResult>, TicketingDatabaseError> {
        let order = match self.db.fetch_payment_order(order_id).await? {
            Some(order) => order,
            None => return Ok(None),
        };
        let tickets = self.db.fetch_tickets_for_order(order_id).await?;
        Ok(Some(OrderResult { order, tickets }))
    }

    pub async fn remaining_capacity(&self, event_id: i64) -> Result<i64, TicketingDatabaseError> {
        self.db.remaining_capacity(event_id).await
    }
}

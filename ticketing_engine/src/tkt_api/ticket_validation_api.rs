use std::fmt::Debug;

use log::*;

use crate::{
    db_types::Ticket,
    traits::{TicketManagement, ValidationError},
};

/// Door scanning. Volunteers present the ticket id and the secure token from the QR code.
pub struct TicketValidationApi<B> {
    db: B,
}

impl<B> Debug for TicketValidationApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TicketValidationApi")
    }
}

impl<B> TicketValidationApi<B>
where B: TicketManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub async fn validate_ticket(
        &self,
        ticket_id: i64,
        secure_token: &str,
        volunteer_id: i64,
    ) -> Result<Ticket, ValidationError> {
        let result = self.db.validate_ticket(ticket_id, secure_token.trim(), volunteer_id).await;
        if let Err(e) = &result {
            debug!("🎟️ Ticket #{ticket_id} refused at the door: {e}");
        }
        result
    }
}

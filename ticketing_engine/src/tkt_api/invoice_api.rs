use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{Invoice, OrderId},
    traits::{InvoiceManagement, TicketingDatabaseError},
};

pub struct InvoiceApi<B> {
    db: B,
}

impl<B> Debug for InvoiceApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "InvoiceApi")
    }
}

impl<B> InvoiceApi<B>
where B: InvoiceManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// One invoice per ticket of the order. Calling this again creates nothing new.
    pub async fn create_invoices_for_order(&self, order_id: &OrderId) -> Result<Vec<Invoice>, TicketingDatabaseError> {
        let invoices = self.db.create_invoices_for_order(order_id).await?;
        debug!("🧾️ Order {order_id} has {} invoices", invoices.len());
        Ok(invoices)
    }

    pub async fn invoices_for_order(&self, order_id: &OrderId) -> Result<Vec<Invoice>, TicketingDatabaseError> {
        self.db.fetch_invoices_for_order(order_id).await
    }
}

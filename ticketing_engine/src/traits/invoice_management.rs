use crate::{
    db_types::{Invoice, OrderId},
    traits::TicketingDatabaseError,
};

#[allow(async_fn_in_trait)]
pub trait InvoiceManagement {
    /// Creates one invoice per ticket of the order. Tickets that already have an invoice for this order are skipped,
    /// so the call can be retried freely. Returns all invoices for the order.
    async fn create_invoices_for_order(&self, order_id: &OrderId) -> Result<Vec<Invoice>, TicketingDatabaseError>;

    async fn fetch_invoices_for_order(&self, order_id: &OrderId) -> Result<Vec<Invoice>, TicketingDatabaseError>;
}

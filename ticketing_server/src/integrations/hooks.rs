use futures::future::BoxFuture;
use log::*;
use ticketing_engine::{
    events::{EventHandlers, EventHooks, OrderNeedsAttentionEvent, TicketsIssuedEvent},
    InvoiceApi,
    SqliteDatabase,
};

pub const TICKETING_EVENT_BUFFER_SIZE: usize = 25;

/// Assigns the server's event handlers.
///
/// 1. TicketsIssuedEvent - one invoice is raised per issued ticket. Invoicing is idempotent, so a replayed event does
///    no harm.
/// 2. OrderNeedsAttentionEvent - the order is logged at error level for operators. Money may have been captured for
///    it without tickets being issued.
pub fn create_ticketing_event_handlers(db: SqliteDatabase) -> EventHandlers {
    let mut hooks = EventHooks::default();
    // --- On TicketsIssued Handler ---
    hooks.on_tickets_issued(move |ev| {
        let TicketsIssuedEvent { order, tickets } = ev;
        if tickets.is_empty() {
            return no_op();
        }
        let api = InvoiceApi::new(db.clone());
        debug!("📬️ {} tickets issued for order {}. Raising invoices.", tickets.len(), order.order_id);
        Box::pin(async move {
            match api.create_invoices_for_order(&order.order_id).await {
                Ok(invoices) => info!("🧾️ {} invoices raised for order {}", invoices.len(), order.order_id),
                Err(e) => error!("🧾️ Could not raise invoices for order {}. {e}", order.order_id),
            }
        })
    });
    // --- On OrderNeedsAttention Handler ---
    hooks.on_order_needs_attention(|ev| {
        let OrderNeedsAttentionEvent { order, reason } = ev;
        error!(
            "🚨️ Order {} needs attention. {reason}. Status: {}. Payment status: {}. Customer #{}. Amount: {}",
            order.order_id,
            order.status,
            order.payment_status.as_deref().unwrap_or("None"),
            order.customer_id,
            order.amount
        );
        no_op()
    });
    EventHandlers::new(TICKETING_EVENT_BUFFER_SIZE, hooks)
}

fn no_op() -> BoxFuture<'static, ()> {
    Box::pin(async {})
}

mod amounts;
mod identifiers;

pub use amounts::allocate;
pub use identifiers::{
    fallback_ticket_number,
    gateway_customer_id,
    new_invoice_number,
    new_order_id,
    new_secure_token,
    pick_ticket_number,
    random_ticket_number,
    MAX_TICKET_NUMBER_ATTEMPTS,
};

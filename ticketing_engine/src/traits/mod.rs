//! # Backend contracts
//!
//! This module defines the interfaces that storage backends and payment gateways must expose to drive the ticketing
//! engine.
//!
//! * [`PaymentOrderManagement`] stores payment orders, their audit trail and the reconciliation state transitions.
//!   The successful transition is where tickets are issued and promo usage is accounted, all inside one backend
//!   transaction.
//! * [`TicketManagement`] queries and issues tickets, and handles door validation.
//! * [`PromoManagement`] reads promo codes and maintains the usage ledger.
//! * [`CatalogManagement`] manages customers, events, ticket types and commissions.
//! * [`InvoiceManagement`] creates invoices for issued tickets.
//! * [`TicketingDatabase`] bundles all of the above. [`crate::SqliteDatabase`] implements it.
//! * [`PaymentGateway`] is the contract with the external hosted-payment provider.
mod catalog_management;
mod data_objects;
mod invoice_management;
mod payment_gateway;
mod payment_order_management;
mod promo_management;
mod ticket_management;

pub use catalog_management::CatalogManagement;
pub use data_objects::{
    GatewayCustomer,
    GatewayOrderStatus,
    GatewaySession,
    GatewaySessionRequest,
    IssuedTickets,
    PaymentReference,
    PromoAccounting,
    PromoResync,
    PromoUsageStats,
    SuccessTransition,
};
pub use invoice_management::InvoiceManagement;
pub use payment_gateway::{GatewayError, PaymentGateway};
pub use payment_order_management::{PaymentOrderManagement, TicketingDatabaseError};
pub use promo_management::{PromoLedgerError, PromoManagement};
pub use ticket_management::{IssuanceError, TicketManagement, ValidationError};

/// The complete set of behaviour a storage backend needs to run the ticketing engine.
pub trait TicketingDatabase:
    Clone + PaymentOrderManagement + TicketManagement + PromoManagement + CatalogManagement + InvoiceManagement
{
    /// The URL of the database
    fn url(&self) -> &str;
}

//! Ticketing Engine
//!
//! The ticketing engine takes a customer from a cart of ticket selections to issued tickets. It is gateway-agnostic:
//! the hosted payment provider is reached through the [`traits::PaymentGateway`] trait.
//!
//! The library is divided into these sections:
//! 1. Storage ([`traits`] and the SQLite backend, [`SqliteDatabase`]). The traits describe what a backend must do;
//!    the state transitions that must be atomic (marking an order paid, issuing its tickets and accounting its promo
//!    code) are single backend calls. The data types stored by backends live in [`db_types`].
//! 2. The public API, re-exported at the crate root: order initiation ([`OrderInitiatorApi`]), payment reconciliation
//!    ([`ReconcilerApi`]), ticket issuance, the promo ledger, ticket validation and invoicing.
//! 3. Events ([`events`]). Hooks are called when tickets are issued and when an order needs an operator's attention.
//!    Handlers run on their own tasks and cannot affect the operation that raised the event.
pub mod db_types;
pub mod events;
pub mod helpers;
pub mod sessions;
pub mod traits;

#[cfg(feature = "sqlite")]
mod sqlite;
mod tkt_api;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use sqlite::{db as sqlite_db, SqliteDatabase};
pub use tkt_api::{
    checkout_objects,
    errors::{CheckoutError, ReconcileError},
    evidence,
    invoice_api::InvoiceApi,
    order_initiator_api::OrderInitiatorApi,
    order_objects,
    promo_ledger_api::PromoLedgerApi,
    promo_objects,
    reconciler_api::{ReconcileOutcome, ReconcilerApi, SweepReport},
    ticket_issuer_api::TicketIssuerApi,
    ticket_validation_api::TicketValidationApi,
};

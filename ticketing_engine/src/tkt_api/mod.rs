//! # Ticketing engine public API
//!
//! The `tkt_api` module exposes the programmatic API of the ticketing engine. Each API is a thin layer of business
//! rules over a storage backend and, where needed, the payment gateway.
//!
//! * [`order_initiator_api`] prices a cart, creates the payment order and opens a hosted payment session.
//! * [`reconciler_api`] decides the real outcome of a payment from the gateway and the trigger, and applies it.
//! * [`ticket_issuer_api`] lets operators (re-)issue tickets for paid orders and look orders up.
//! * [`promo_ledger_api`] quotes promo codes, reports on them and re-derives their usage counters.
//! * [`ticket_validation_api`] validates tickets at the door.
//! * [`invoice_api`] creates invoices for issued tickets.
//!
//! # API usage
//!
//! An API instance is created by supplying a backend that implements the traits the API needs:
//!
//! ```rust,ignore
//! use ticketing_engine::{PromoLedgerApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url("sqlite://data/tickets.db", 5).await?;
//! let api = PromoLedgerApi::new(db);
//! let resynced = api.recompute_current_uses(None).await?;
//! ```
pub mod checkout_objects;
pub mod errors;
pub mod evidence;
pub mod invoice_api;
pub mod order_initiator_api;
pub mod order_objects;
pub mod promo_ledger_api;
pub mod promo_objects;
pub mod reconciler_api;
pub mod ticket_issuer_api;
pub mod ticket_validation_api;

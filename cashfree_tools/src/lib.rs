//! A thin, typed client for the Cashfree payment gateway.
//!
//! Only the parts of the gateway contract that the ticketing engine relies on are covered:
//! * creating a hosted-payment order ([`CashfreeApi::create_order`]),
//! * fetching the authoritative order status ([`CashfreeApi::get_order`], [`CashfreeApi::get_payments_for_order`]),
//! * parsing and authenticating webhook notifications ([`WebhookNotification`], [`signature`]).
//!
//! The client holds no global state. The gateway environment (sandbox or production) is part of the
//! [`CashfreeConfig`] supplied at construction.
mod api;
mod config;
mod error;

pub mod data_objects;
pub mod helpers;
pub mod signature;

pub use api::CashfreeApi;
pub use config::{CashfreeConfig, CashfreeEnvironment};
pub use data_objects::{
    CreateOrderRequest,
    CustomerDetails,
    GatewayOrder,
    GatewayPayment,
    OrderMeta,
    WebhookNotification,
};
pub use error::CashfreeApiError;

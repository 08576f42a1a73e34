//! # Ticketing server
//! This crate hosts the HTTP server for event ticketing. It is responsible for:
//! * Holding customers' carts and starting checkouts with the payment gateway.
//! * Receiving the browser return and the signed payment webhooks, and handing both to the reconciler.
//! * Running the background workers: the pending-order sweep and the promo counter resync.
//! * Raising invoices when tickets are issued, and logging orders that need an operator's attention.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `PUT /api/cart`: Stores the cart for the session in the `x-session-id` header.
//! * `POST /api/checkout`: Creates an order and a hosted payment session.
//! * `GET /payment/return`: The browser return from the hosted payment page.
//! * `POST /payment/webhook`: Signed payment notifications from the gateway.
//! * `GET /api/orders/{order_id}`: The order and its tickets.
//! * `POST /api/orders/{order_id}/issue_tickets`: Re-issues tickets for a paid order whose issuance failed.
//! * `GET /api/promo/{code}`: Quotes a promo code for an event and subtotal.
//! * `GET /api/promo/{id}/analytics`: Usage analytics for a promo code.
//! * `POST /api/promo/resync`: Re-derives all promo usage counters from the ledger.
//! * `POST /api/tickets/{id}/validate`: Door validation by a volunteer.

pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod helpers;
pub mod integrations;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod workers;

#[cfg(test)]
mod endpoint_tests;

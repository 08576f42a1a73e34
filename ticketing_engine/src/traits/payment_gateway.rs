use thiserror::Error;

use crate::{
    db_types::OrderId,
    traits::{GatewayOrderStatus, GatewaySession, GatewaySessionRequest},
};

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("The payment gateway did not respond in time: {0}")]
    Timeout(String),
    #[error("Could not reach the payment gateway: {0}")]
    Transport(String),
    #[error("The payment gateway rejected the request. Status {status}. {message}")]
    Rejected { status: u16, message: String },
    #[error("The payment gateway sent a response we could not read: {0}")]
    MalformedResponse(String),
    #[error("The payment gateway client is not configured: {0}")]
    NotConfigured(String),
}

/// The hosted-payment provider, reduced to the two calls the engine needs.
///
/// Implementations carry their own configuration, including the environment (sandbox or production). There is no
/// global client.
#[allow(async_fn_in_trait)]
pub trait PaymentGateway {
    /// The payment channel label stored against orders. `SANDBOX` marks test transactions.
    fn channel(&self) -> String;

    /// Requests a hosted payment session for a new order.
    async fn create_order(&self, request: GatewaySessionRequest) -> Result<GatewaySession, GatewayError>;

    /// Asks the gateway for the authoritative status of an order.
    async fn fetch_order_status(&self, order_id: &OrderId) -> Result<GatewayOrderStatus, GatewayError>;
}

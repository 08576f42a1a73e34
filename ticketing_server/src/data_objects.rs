use std::fmt::Display;

use serde::{Deserialize, Serialize};
use ticketing_engine::{
    db_types::{OrderId, PaymentOrderStatus, Ticket},
    evidence::sanitize,
    ReconcileOutcome,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

/// The query string the gateway appends when it sends the customer back. The gateway fills in templated fields, and
/// sometimes fails to, leaving values like `{payment_status}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub session_order_id: Option<String>,
    #[serde(default)]
    pub payment_status: Option<String>,
    #[serde(default)]
    pub transaction_id: Option<String>,
}

impl CallbackParams {
    /// The gateway's order id if it was substituted, otherwise the one we put in the return URL ourselves.
    pub fn resolved_order_id(&self) -> Option<OrderId> {
        sanitize(self.order_id.as_deref()).or_else(|| sanitize(self.session_order_id.as_deref())).map(OrderId::from)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallbackStatus {
    Success,
    Failed,
    Cancelled,
    Processing,
}

/// What the customer sees after returning from the payment page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbackResponse {
    pub status: CallbackStatus,
    pub order_id: OrderId,
    pub message: String,
    pub tickets: Vec<Ticket>,
}

impl From<ReconcileOutcome> for CallbackResponse {
    fn from(outcome: ReconcileOutcome) -> Self {
        let order_id = outcome.order.order_id.clone();
        let (status, message) = match outcome.status {
            PaymentOrderStatus::Success if outcome.tickets.is_empty() => (
                CallbackStatus::Success,
                format!(
                    "Payment successful! Your tickets are being prepared. If they do not appear shortly, please contact \
                     support with your order id, {order_id}."
                ),
            ),
            PaymentOrderStatus::Success => {
                (CallbackStatus::Success, "Payment successful! Your tickets have been booked.".to_string())
            },
            PaymentOrderStatus::Failed => {
                (CallbackStatus::Failed, "Your payment failed. No tickets were booked. You can try again.".to_string())
            },
            PaymentOrderStatus::Cancelled => {
                (CallbackStatus::Cancelled, "Your payment was cancelled. No tickets were booked.".to_string())
            },
            PaymentOrderStatus::Created | PaymentOrderStatus::Pending => (
                CallbackStatus::Processing,
                format!(
                    "We are confirming your payment with the bank. Please wait a few minutes. If you have been \
                     charged and this does not resolve, contact support with your order id, {order_id}."
                ),
            ),
        };
        Self { status, order_id, message, tickets: outcome.tickets }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromoQuery {
    pub event_id: i64,
    /// In paise
    pub subtotal: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateTicketRequest {
    pub secure_token: String,
    pub volunteer_id: i64,
}

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db_types::{Cart, OrderId};

pub const DEFAULT_CURRENCY: &str = "INR";
pub const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckoutRequest {
    /// If omitted, the cart held in the customer's session is used
    #[serde(default)]
    pub cart: Option<Cart>,
    #[serde(default)]
    pub terms_accepted: bool,
    #[serde(default)]
    pub terms_accepted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutResponse {
    pub payment_session_id: String,
    pub order_id: OrderId,
    pub payment_link: Option<String>,
}

/// Where the gateway should send the customer and its notifications, and how long to wait for it.
#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    pub public_base_url: String,
    pub currency: String,
    pub gateway_timeout: Duration,
}

impl CheckoutSettings {
    pub fn new<S: Into<String>>(public_base_url: S) -> Self {
        Self {
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
            currency: DEFAULT_CURRENCY.to_string(),
            gateway_timeout: DEFAULT_GATEWAY_TIMEOUT,
        }
    }

    pub fn with_gateway_timeout(mut self, timeout: Duration) -> Self {
        self.gateway_timeout = timeout;
        self
    }

    /// The browser return URL. `{order_id}`, `{payment_status}` and `{transaction_id}` are filled in by the gateway;
    /// `session_order_id` is ours, in case the gateway leaves `{order_id}` unsubstituted.
    pub fn return_url(&self, order_id: &OrderId) -> String {
        format!(
            "{}/payment/return?order_id={{order_id}}&session_order_id={order_id}&payment_status={{payment_status}}&\
             transaction_id={{transaction_id}}",
            self.public_base_url
        )
    }

    pub fn notify_url(&self) -> String {
        format!("{}/payment/webhook", self.public_base_url)
    }
}

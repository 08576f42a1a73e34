use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

//--------------------------------------   Create order   ---------------------------------------------------------
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CustomerDetails {
    pub customer_id: String,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OrderMeta {
    pub return_url: String,
    pub notify_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateOrderRequest {
    pub order_id: String,
    /// Decimal rupees
    pub order_amount: f64,
    pub order_currency: String,
    pub customer_details: CustomerDetails,
    pub order_meta: OrderMeta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_note: Option<String>,
}

//--------------------------------------   Gateway order   ---------------------------------------------------------
/// The gateway's view of an order. Returned by both the create and fetch calls.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GatewayOrder {
    #[serde(default, deserialize_with = "string_or_number")]
    pub cf_order_id: Option<String>,
    pub order_id: String,
    #[serde(default)]
    pub order_amount: Option<f64>,
    #[serde(default)]
    pub order_currency: Option<String>,
    /// e.g. `ACTIVE`, `PAID`, `EXPIRED`, `TERMINATED`
    #[serde(default)]
    pub order_status: Option<String>,
    #[serde(default)]
    pub payment_session_id: Option<String>,
    #[serde(default)]
    pub payment_link: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GatewayPayment {
    #[serde(default, deserialize_with = "string_or_number")]
    pub cf_payment_id: Option<String>,
    #[serde(default)]
    pub order_id: Option<String>,
    /// e.g. `SUCCESS`, `FAILED`, `USER_DROPPED`, `PENDING`, `CANCELLED`
    #[serde(default)]
    pub payment_status: Option<String>,
    #[serde(default)]
    pub payment_amount: Option<f64>,
    #[serde(default)]
    pub payment_time: Option<String>,
}

impl GatewayPayment {
    pub fn is_success(&self) -> bool {
        self.payment_status.as_deref().map(|s| s.eq_ignore_ascii_case("SUCCESS")).unwrap_or(false)
    }
}

//--------------------------------------     Webhooks     ---------------------------------------------------------
/// Payment webhook body. Only the fields the reconciliation flow needs are typed; everything else is kept in the raw
/// JSON by callers.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WebhookNotification {
    pub data: WebhookData,
    #[serde(default)]
    pub event_time: Option<String>,
    #[serde(default, rename = "type")]
    pub notification_type: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WebhookData {
    pub order: WebhookOrder,
    #[serde(default)]
    pub payment: Option<GatewayPayment>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WebhookOrder {
    pub order_id: String,
    #[serde(default)]
    pub order_amount: Option<f64>,
}

impl WebhookNotification {
    pub fn order_id(&self) -> &str {
        self.data.order.order_id.as_str()
    }

    pub fn payment_status(&self) -> Option<&str> {
        self.data.payment.as_ref().and_then(|p| p.payment_status.as_deref())
    }

    pub fn cf_payment_id(&self) -> Option<&str> {
        self.data.payment.as_ref().and_then(|p| p.cf_payment_id.as_deref())
    }
}

/// Cashfree sends some identifiers as JSON numbers in one API version and as strings in another.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where D: Deserializer<'de> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

//! The production [`PaymentGateway`], backed by the Cashfree order API.
use cashfree_tools::{
    helpers::cashfree_amount,
    CashfreeApi,
    CashfreeApiError,
    CashfreeConfig,
    CreateOrderRequest,
    CustomerDetails,
    GatewayOrder,
    GatewayPayment,
    OrderMeta,
};
use log::*;
use serde_json::json;
use ticketing_engine::{
    db_types::OrderId,
    traits::{GatewayError, GatewayOrderStatus, GatewaySession, GatewaySessionRequest, PaymentGateway},
};

#[derive(Clone)]
pub struct CashfreeGateway {
    api: CashfreeApi,
}

impl std::fmt::Debug for CashfreeGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CashfreeGateway ({})", self.api.environment())
    }
}

impl CashfreeGateway {
    pub fn new(config: CashfreeConfig) -> Result<Self, GatewayError> {
        let api = CashfreeApi::new(config).map_err(gateway_error)?;
        Ok(Self { api })
    }
}

impl PaymentGateway for CashfreeGateway {
    fn channel(&self) -> String {
        self.api.environment().channel_label().to_string()
    }

    async fn create_order(&self, request: GatewaySessionRequest) -> Result<GatewaySession, GatewayError> {
        let order_id = request.order_id.to_string();
        let request = create_order_request(request);
        let order = self.api.create_order(request).await.map_err(gateway_error)?;
        session_from_order(order).ok_or_else(|| {
            error!("💳️ Gateway order {order_id} was created without a payment session id");
            GatewayError::MalformedResponse(format!("No payment_session_id for order {order_id}"))
        })
    }

    /// The order's status comes from the order itself. The payment attempts are only consulted to find the id of the
    /// successful payment, and are best effort.
    async fn fetch_order_status(&self, order_id: &OrderId) -> Result<GatewayOrderStatus, GatewayError> {
        let order = self.api.get_order(order_id.as_str()).await.map_err(gateway_error)?;
        let paid = order.order_status.as_deref().map(|s| s.eq_ignore_ascii_case("PAID")).unwrap_or(false);
        let payments = if paid {
            self.api.get_payments_for_order(order_id.as_str()).await.unwrap_or_else(|e| {
                warn!("💳️ Order {order_id} is paid, but its payments could not be fetched. {e}");
                Vec::new()
            })
        } else {
            Vec::new()
        };
        Ok(order_status(order, payments))
    }
}

fn create_order_request(request: GatewaySessionRequest) -> CreateOrderRequest {
    let GatewaySessionRequest { order_id, amount, currency, customer, return_url, notify_url, note } = request;
    CreateOrderRequest {
        order_id: order_id.to_string(),
        order_amount: cashfree_amount(amount),
        order_currency: currency,
        customer_details: CustomerDetails {
            customer_id: customer.id,
            customer_name: customer.name,
            customer_email: customer.email,
            customer_phone: customer.phone,
        },
        order_meta: OrderMeta { return_url, notify_url },
        order_note: note,
    }
}

fn session_from_order(order: GatewayOrder) -> Option<GatewaySession> {
    let payment_session_id = order.payment_session_id.filter(|s| !s.trim().is_empty())?;
    Some(GatewaySession { payment_session_id, gateway_order_id: order.cf_order_id, payment_link: order.payment_link })
}

fn order_status(order: GatewayOrder, payments: Vec<GatewayPayment>) -> GatewayOrderStatus {
    let transaction_id = payments.iter().find(|p| p.is_success()).and_then(|p| p.cf_payment_id.clone());
    GatewayOrderStatus {
        order_status: order.order_status.clone(),
        transaction_id,
        raw: json!({ "order": order, "payments": payments }),
    }
}

fn gateway_error(e: CashfreeApiError) -> GatewayError {
    match e {
        CashfreeApiError::Initialization(s) => GatewayError::NotConfigured(s),
        CashfreeApiError::Timeout(s) => GatewayError::Timeout(s),
        CashfreeApiError::RestResponseError(s) => GatewayError::Transport(s),
        CashfreeApiError::QueryError { status, message } => GatewayError::Rejected { status, message },
        CashfreeApiError::JsonError(s) | CashfreeApiError::InvalidCurrencyAmount(s) => {
            GatewayError::MalformedResponse(s)
        },
    }
}

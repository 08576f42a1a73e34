use serde::{Deserialize, Serialize};
use serde_json::Value;
use tkt_common::Paise;

use crate::db_types::{OrderId, PaymentOrder, PromoCodeUsage, Ticket};

//--------------------------------------   Gateway contract    ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayCustomer {
    /// e.g. `user_007`
    pub id: String,
    pub name: String,
    pub email: String,
    /// Exactly 10 digits
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewaySessionRequest {
    pub order_id: OrderId,
    pub amount: Paise,
    pub currency: String,
    pub customer: GatewayCustomer,
    pub return_url: String,
    pub notify_url: String,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewaySession {
    pub payment_session_id: String,
    pub gateway_order_id: Option<String>,
    pub payment_link: Option<String>,
}

/// What the gateway says about an order when asked directly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GatewayOrderStatus {
    /// The raw status string, e.g. `PAID` or `ACTIVE`
    pub order_status: Option<String>,
    /// The gateway's payment id for the successful payment attempt, if there is one
    pub transaction_id: Option<String>,
    /// The raw responses, kept for the audit trail
    pub raw: Value,
}

//--------------------------------------   Reconciliation      ---------------------------------------------------------
/// Gateway identifiers recorded against an order when it reaches a terminal status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentReference {
    pub transaction_id: Option<String>,
    pub cf_payment_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedTickets {
    pub tickets: Vec<Ticket>,
    /// False if the tickets already existed
    pub newly_issued: bool,
}

/// The result of promo accounting for one successful order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum PromoAccounting {
    /// The cart had no promo code
    NotApplicable,
    /// A new usage row was written. `counted` is false for sandbox orders, which never touch `current_uses`.
    Recorded { usage: PromoCodeUsage, counted: bool },
    /// A usage row for this order already exists
    AlreadyRecorded,
    /// The code named in the snapshot no longer resolves for the event. Accounting is skipped.
    PromoNotFound { code: String },
    /// No ticket was issued, so there is nothing to attach the usage to
    NoTicket,
    /// Accounting raised an error. The savepoint was rolled back.
    Failed { reason: String },
}

/// The outcome of [`crate::traits::PaymentOrderManagement::complete_order`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuccessTransition {
    pub order: PaymentOrder,
    pub tickets: Vec<Ticket>,
    /// The order was already `SUCCESS` before this call. Nothing was written.
    pub already_complete: bool,
    /// Tickets were created by this call
    pub newly_issued: bool,
    /// Why issuance failed, if it did
    pub issuance_error: Option<String>,
    pub promo: PromoAccounting,
}

impl SuccessTransition {
    pub fn already_complete(order: PaymentOrder, tickets: Vec<Ticket>) -> Self {
        Self {
            order,
            tickets,
            already_complete: true,
            newly_issued: false,
            issuance_error: None,
            promo: PromoAccounting::AlreadyRecorded,
        }
    }

    /// Money was captured but the post-payment pipeline did not finish. An operator should look at this order.
    pub fn needs_attention(&self) -> bool {
        self.issuance_error.is_some() || matches!(self.promo, PromoAccounting::Failed { .. })
    }
}

//--------------------------------------        Promo          ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromoResync {
    pub promo_id: i64,
    pub code: String,
    pub previous_uses: i64,
    pub current_uses: i64,
}

/// Sums over the usage rows that count: order `SUCCESS` and a live payment channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromoUsageStats {
    pub uses: i64,
    pub tickets_booked: i64,
    pub amount_saved: Paise,
    pub revenue: Paise,
}

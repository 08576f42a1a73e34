use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::error;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, Type};
use thiserror::Error;
pub use tkt_common::Paise;

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ConversionError(String);

//--------------------------------------        OrderId        ---------------------------------------------------------
/// The externally visible order identifier. The same value is sent to the payment gateway as its order id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl FromStr for OrderId {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl OrderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------   PaymentOrderStatus  ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentOrderStatus {
    /// The order has been written, and a gateway session may or may not have been requested yet.
    Created,
    /// A reconciliation attempt could not reach a conclusive outcome.
    Pending,
    /// Payment captured. Terminal.
    Success,
    /// Payment failed, or the gateway session could not be created. Terminal, but see [`Self::can_transition_to`].
    Failed,
    /// Terminal.
    Cancelled,
}

impl PaymentOrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Cancelled)
    }

    pub fn is_unresolved(&self) -> bool {
        matches!(self, Self::Created | Self::Pending)
    }

    /// The reconciliation state machine.
    ///
    /// | From \ To | Pending | Success | Failed | Cancelled |
    /// |-----------|---------|---------|--------|-----------|
    /// | Created   | yes     | yes     | yes    | yes       |
    /// | Pending   | no-op   | yes     | yes    | yes       |
    /// | Success   | no      | no-op   | no     | no        |
    /// | Failed    | no      | yes     | no-op  | no        |
    /// | Cancelled | no      | no      | no     | no-op     |
    ///
    /// A failed order can still be promoted to `Success`, since captured money outranks an earlier failed attempt
    /// against the same gateway order.
    pub fn can_transition_to(&self, next: PaymentOrderStatus) -> bool {
        use PaymentOrderStatus::*;
        match (self, next) {
            (Created, Pending | Success | Failed | Cancelled) => true,
            (Pending, Success | Failed | Cancelled) => true,
            (Failed, Success) => true,
            _ => false,
        }
    }
}

impl Display for PaymentOrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentOrderStatus::Created => write!(f, "CREATED"),
            PaymentOrderStatus::Pending => write!(f, "PENDING"),
            PaymentOrderStatus::Success => write!(f, "SUCCESS"),
            PaymentOrderStatus::Failed => write!(f, "FAILED"),
            PaymentOrderStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

impl FromStr for PaymentOrderStatus {
    type Err = ConversionError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATED" => Ok(Self::Created),
            "PENDING" => Ok(Self::Pending),
            "SUCCESS" => Ok(Self::Success),
            "FAILED" => Ok(Self::Failed),
            "CANCELLED" => Ok(Self::Cancelled),
            s => Err(ConversionError(format!("Invalid payment order status: {s}"))),
        }
    }
}

impl From<String> for PaymentOrderStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid payment order status: {value}. But this conversion cannot fail. Defaulting to PENDING");
            PaymentOrderStatus::Pending
        })
    }
}

//--------------------------------------      PaymentOrder     ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct PaymentOrder {
    pub id: i64,
    pub order_id: OrderId,
    pub customer_id: i64,
    pub event_id: i64,
    pub amount: Paise,
    pub currency: String,
    pub status: PaymentOrderStatus,
    /// The payment channel label. `SANDBOX` orders are test transactions.
    pub payment_gateway: String,
    pub transaction_id: Option<String>,
    pub cf_payment_id: Option<String>,
    /// Free-text operator status, e.g. `Success` or `Error - Capacity`
    pub payment_status: Option<String>,
    pub quantity: i64,
    /// The audit blob. JSON text holding the cart snapshot and every verification attempt.
    pub response_data: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub const SANDBOX_CHANNEL: &str = "SANDBOX";

impl PaymentOrder {
    pub fn audit(&self) -> Value {
        serde_json::from_str(&self.response_data).unwrap_or_else(|e| {
            error!("Audit data for order {} is not valid JSON. {e}", self.order_id);
            Value::Object(Default::default())
        })
    }

    /// The cart snapshot frozen at checkout. `None` only if the audit blob has been damaged.
    pub fn cart_snapshot(&self) -> Option<CartSnapshot> {
        let audit = self.audit();
        serde_json::from_value(audit.get("ticket_order")?.clone())
            .map_err(|e| error!("Cart snapshot for order {} cannot be read. {e}", self.order_id))
            .ok()
    }

    pub fn session_id(&self) -> Option<String> {
        self.audit().get("session_id").and_then(|v| v.as_str()).map(String::from)
    }

    pub fn is_test_transaction(&self) -> bool {
        self.payment_gateway == SANDBOX_CHANNEL
    }
}

#[derive(Debug, Clone)]
pub struct NewPaymentOrder {
    pub order_id: OrderId,
    pub customer_id: i64,
    pub event_id: i64,
    pub amount: Paise,
    pub currency: String,
    pub payment_gateway: String,
    pub quantity: i64,
    pub response_data: Value,
}

//--------------------------------------        Catalog        ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, Eq)]
pub struct Customer {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewCustomer {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, Eq)]
pub struct Event {
    pub id: i64,
    pub title: String,
    pub venue: Option<String>,
    /// Capacity in attendees
    pub max_attendees: i64,
    pub starts_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewEvent {
    pub title: String,
    pub venue: Option<String>,
    pub max_attendees: i64,
    pub starts_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, Eq)]
pub struct TicketType {
    pub id: i64,
    pub event_id: i64,
    pub type_name: String,
    pub price: Paise,
    /// How many people one unit of this ticket type admits, e.g. 2 for a couple pass
    pub attendees_per_ticket: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTicketType {
    pub event_id: i64,
    pub type_name: String,
    pub price: Paise,
    pub attendees_per_ticket: i64,
}

//--------------------------------------        Carts          ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub ticket_type_id: i64,
    pub quantity: i64,
}

/// A customer's ticket selection, as held in session state before checkout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub event_id: i64,
    pub lines: Vec<CartLine>,
    #[serde(default)]
    pub promo_code: Option<String>,
}

impl Cart {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty() || self.lines.iter().any(|l| l.quantity <= 0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotLine {
    pub ticket_type_id: i64,
    pub type_name: String,
    pub quantity: i64,
    pub unit_price: Paise,
    pub attendees_per_ticket: i64,
}

impl SnapshotLine {
    pub fn line_total(&self) -> Paise {
        self.unit_price * self.quantity
    }
}

/// The priced, immutable copy of a cart taken at checkout. Tickets are issued from this, never from session state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSnapshot {
    pub event_id: i64,
    pub lines: Vec<SnapshotLine>,
    pub subtotal: Paise,
    pub discount: Paise,
    pub total: Paise,
    pub promo_code: Option<String>,
    pub total_attendees: i64,
}

impl CartSnapshot {
    pub fn total_quantity(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// The cart the customer would need to buy the same tickets again.
    pub fn to_cart(&self) -> Cart {
        Cart {
            event_id: self.event_id,
            lines: self
                .lines
                .iter()
                .map(|l| CartLine { ticket_type_id: l.ticket_type_id, quantity: l.quantity })
                .collect(),
            promo_code: self.promo_code.clone(),
        }
    }
}

//--------------------------------------        Tickets        ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum TicketStatus {
    Available,
    Reserved,
    Sold,
    Valid,
    Used,
}

impl TicketStatus {
    /// Tickets in these states count against event capacity and can be scanned at the door.
    pub fn is_admissible(&self) -> bool {
        matches!(self, Self::Sold | Self::Valid)
    }
}

impl Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TicketStatus::Available => write!(f, "AVAILABLE"),
            TicketStatus::Reserved => write!(f, "RESERVED"),
            TicketStatus::Sold => write!(f, "SOLD"),
            TicketStatus::Valid => write!(f, "VALID"),
            TicketStatus::Used => write!(f, "USED"),
        }
    }
}

impl FromStr for TicketStatus {
    type Err = ConversionError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AVAILABLE" => Ok(Self::Available),
            "RESERVED" => Ok(Self::Reserved),
            "SOLD" => Ok(Self::Sold),
            "VALID" => Ok(Self::Valid),
            "USED" => Ok(Self::Used),
            s => Err(ConversionError(format!("Invalid ticket status: {s}"))),
        }
    }
}

/// One consolidated purchase line. `booking_quantity` units of a ticket type bought in one order.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ticket {
    pub id: i64,
    pub event_id: i64,
    pub ticket_type_id: i64,
    pub customer_id: i64,
    pub ticket_number: String,
    pub status: TicketStatus,
    /// Opaque token embedded in the QR code. Never shown in listings.
    #[serde(skip_serializing)]
    pub unique_secure_token: String,
    /// Public identifier used in shareable pass URLs
    pub unique_id: String,
    pub booking_quantity: i64,
    /// `booking_quantity × attendees_per_ticket`, fixed at purchase time
    pub total_admission_count: i64,
    pub payment_order_id: i64,
    pub validated_by: Option<i64>,
    pub used_at: Option<DateTime<Utc>>,
    pub purchase_date: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTicket {
    pub event_id: i64,
    pub ticket_type_id: i64,
    pub customer_id: i64,
    pub ticket_number: String,
    pub unique_secure_token: String,
    pub unique_id: String,
    pub booking_quantity: i64,
    pub total_admission_count: i64,
    pub payment_order_id: i64,
}

//--------------------------------------       Promo codes     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum DiscountType {
    Percentage,
    Fixed,
}

impl Display for DiscountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscountType::Percentage => write!(f, "PERCENTAGE"),
            DiscountType::Fixed => write!(f, "FIXED"),
        }
    }
}

impl FromStr for DiscountType {
    type Err = ConversionError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PERCENTAGE" => Ok(Self::Percentage),
            "FIXED" => Ok(Self::Fixed),
            s => Err(ConversionError(format!("Invalid discount type: {s}"))),
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, Eq)]
pub struct PromoCode {
    pub id: i64,
    pub code: String,
    pub event_id: i64,
    pub discount_type: DiscountType,
    /// Hundredths of a percent for `PERCENTAGE` (1000 = 10%), paise for `FIXED`
    pub discount_value: i64,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    /// Zero means unlimited
    pub max_uses: i64,
    /// A cache of the ledger. See `PromoManagement::recompute_current_uses`.
    pub current_uses: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl PromoCode {
    /// The discount this code grants on the given subtotal, ignoring validity windows and usage limits.
    pub fn discount_for(&self, subtotal: Paise) -> Paise {
        let discount = match self.discount_type {
            DiscountType::Percentage => subtotal.percentage(self.discount_value),
            DiscountType::Fixed => Paise::from(self.discount_value),
        };
        discount.max(Paise::default()).min(subtotal)
    }

    pub fn is_unlimited(&self) -> bool {
        self.max_uses == 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPromoCode {
    pub code: String,
    pub event_id: i64,
    pub discount_type: DiscountType,
    pub discount_value: i64,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub max_uses: i64,
}

impl NewPromoCode {
    pub fn new(code: &str, event_id: i64, discount_type: DiscountType, discount_value: i64) -> Self {
        Self {
            code: code.to_string(),
            event_id,
            discount_type,
            discount_value,
            valid_from: None,
            valid_until: None,
            max_uses: 0,
        }
    }

    pub fn with_max_uses(mut self, max_uses: i64) -> Self {
        self.max_uses = max_uses;
        self
    }

    pub fn valid_between(mut self, from: Option<DateTime<Utc>>, until: Option<DateTime<Utc>>) -> Self {
        self.valid_from = from;
        self.valid_until = until;
        self
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, Eq)]
pub struct PromoCodeUsage {
    pub id: i64,
    pub promo_code_id: i64,
    pub customer_id: i64,
    pub ticket_id: Option<i64>,
    pub order_total: Paise,
    pub discount_amount: Paise,
    pub used_at: DateTime<Utc>,
}

//--------------------------------------   Commission/Invoices ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum CommissionType {
    Percentage,
    Fixed,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventCommission {
    pub event_id: i64,
    pub commission_type: CommissionType,
    /// Hundredths of a percent for `PERCENTAGE`, paise per admitted attendee for `FIXED`
    pub commission_value: i64,
}

impl EventCommission {
    pub fn commission_for(&self, total: Paise, admission_count: i64) -> Paise {
        let commission = match self.commission_type {
            CommissionType::Percentage => total.percentage(self.commission_value),
            CommissionType::Fixed => Paise::from(self.commission_value) * admission_count,
        };
        commission.max(Paise::default()).min(total)
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, Eq)]
pub struct Invoice {
    pub id: i64,
    pub invoice_number: String,
    pub ticket_id: i64,
    pub customer_id: i64,
    pub event_id: i64,
    pub ticket_type_id: i64,
    pub payment_order_id: i64,
    pub base_price: Paise,
    pub commission: Paise,
    pub total_price: Paise,
    pub created_at: DateTime<Utc>,
}

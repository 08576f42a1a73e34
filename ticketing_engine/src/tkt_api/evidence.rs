//! Payment evidence and the resolver that turns it into an outcome.
//!
//! Every reconciliation gathers one or more pieces of [`Evidence`] about an order: what the gateway's status API says,
//! and whatever the trigger (webhook or browser callback) carried. The resolver takes the first conclusive piece in
//! order of trust. If nothing is conclusive, the outcome is [`Outcome::Unknown`], which leaves the order pending.
//! Ambiguity never becomes a failure.
use std::fmt::Display;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    db_types::PaymentOrderStatus,
    traits::GatewayOrderStatus,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceSource {
    GatewayApi,
    Webhook,
    Callback,
}

impl Display for EvidenceSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvidenceSource::GatewayApi => write!(f, "gateway_api"),
            EvidenceSource::Webhook => write!(f, "webhook"),
            EvidenceSource::Callback => write!(f, "callback"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failed,
    Cancelled,
    Unknown,
}

impl Outcome {
    /// Classifies a raw gateway status string. Matching is case-insensitive and ignores surrounding whitespace.
    pub fn classify(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "PAID" | "SUCCESS" | "CAPTURED" | "COMPLETED" => Outcome::Success,
            "FAILED" | "USER_DROPPED" | "DECLINED" => Outcome::Failed,
            "CANCELLED" | "TERMINATED" => Outcome::Cancelled,
            _ => Outcome::Unknown,
        }
    }

    pub fn is_conclusive(&self) -> bool {
        !matches!(self, Outcome::Unknown)
    }

    /// The order status this outcome drives the order towards.
    pub fn target_status(&self) -> PaymentOrderStatus {
        match self {
            Outcome::Success => PaymentOrderStatus::Success,
            Outcome::Failed => PaymentOrderStatus::Failed,
            Outcome::Cancelled => PaymentOrderStatus::Cancelled,
            Outcome::Unknown => PaymentOrderStatus::Pending,
        }
    }
}

impl Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Success => write!(f, "success"),
            Outcome::Failed => write!(f, "failed"),
            Outcome::Cancelled => write!(f, "cancelled"),
            Outcome::Unknown => write!(f, "unknown"),
        }
    }
}

/// True if the gateway failed to substitute one of its template fields, e.g. `{payment_status}`.
pub fn is_placeholder(value: &str) -> bool {
    value.contains('{') || value.contains('}')
}

/// Trims the value and discards it if it is empty or an unsubstituted placeholder.
pub fn sanitize(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty() && !is_placeholder(v)).map(String::from)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub source: EvidenceSource,
    pub outcome: Outcome,
    pub raw_status: Option<String>,
    pub transaction_id: Option<String>,
    /// Set when the source could not be consulted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Value::is_null", default)]
    pub raw: Value,
}

impl Evidence {
    pub fn new(source: EvidenceSource, raw_status: Option<&str>, transaction_id: Option<&str>) -> Self {
        let raw_status = sanitize(raw_status);
        let outcome = raw_status.as_deref().map(Outcome::classify).unwrap_or(Outcome::Unknown);
        Self { source, outcome, raw_status, transaction_id: sanitize(transaction_id), error: None, raw: Value::Null }
    }

    pub fn from_gateway(status: GatewayOrderStatus) -> Self {
        let mut evidence =
            Self::new(EvidenceSource::GatewayApi, status.order_status.as_deref(), status.transaction_id.as_deref());
        evidence.raw = status.raw;
        evidence
    }

    /// The source could not be consulted. This is inconclusive, never a failure.
    pub fn unavailable<S: Into<String>>(source: EvidenceSource, reason: S) -> Self {
        Self {
            source,
            outcome: Outcome::Unknown,
            raw_status: None,
            transaction_id: None,
            error: Some(reason.into()),
            raw: Value::Null,
        }
    }

    pub fn with_raw(mut self, raw: Value) -> Self {
        self.raw = raw;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub outcome: Outcome,
    /// The source whose evidence decided the outcome. `None` when nothing was conclusive.
    pub decided_by: Option<EvidenceSource>,
    pub transaction_id: Option<String>,
}

/// Picks the first conclusive piece of evidence. `evidence` must already be ordered from most to least trusted.
pub fn resolve(evidence: &[Evidence]) -> Resolution {
    match evidence.iter().find(|e| e.outcome.is_conclusive()) {
        Some(decisive) => Resolution {
            outcome: decisive.outcome,
            decided_by: Some(decisive.source),
            transaction_id: decisive
                .transaction_id
                .clone()
                .or_else(|| evidence.iter().find_map(|e| e.transaction_id.clone())),
        },
        None => Resolution {
            outcome: Outcome::Unknown,
            decided_by: None,
            transaction_id: evidence.iter().find_map(|e| e.transaction_id.clone()),
        },
    }
}

/// What prompted a reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "trigger", rename_all = "snake_case")]
pub enum Trigger {
    /// The browser came back from the hosted payment page. The fields are only a hint.
    Callback { payment_status: Option<String>, transaction_id: Option<String> },
    /// A signed server-to-server notification.
    Webhook { payment_status: Option<String>, cf_payment_id: Option<String>, raw: Value },
    /// The background sweep. Only the gateway is asked.
    Sweep,
}

impl Trigger {
    pub fn label(&self) -> &'static str {
        match self {
            Trigger::Callback { .. } => "callback",
            Trigger::Webhook { .. } => "webhook",
            Trigger::Sweep => "sweep",
        }
    }

    /// The secondary evidence carried by the trigger itself.
    pub fn evidence(&self) -> Option<Evidence> {
        match self {
            Trigger::Callback { payment_status, transaction_id } => {
                Some(Evidence::new(EvidenceSource::Callback, payment_status.as_deref(), transaction_id.as_deref()))
            },
            Trigger::Webhook { payment_status, cf_payment_id, raw } => Some(
                Evidence::new(EvidenceSource::Webhook, payment_status.as_deref(), cf_payment_id.as_deref())
                    .with_raw(raw.clone()),
            ),
            Trigger::Sweep => None,
        }
    }

    /// The gateway's payment id, when the trigger carries one.
    pub fn cf_payment_id(&self) -> Option<String> {
        match self {
            Trigger::Webhook { cf_payment_id, .. } => sanitize(cf_payment_id.as_deref()),
            _ => None,
        }
    }
}

use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tkt_common::Paise;

use crate::db_types::{DiscountType, PromoCode};

/// The discount a valid promo code grants on a given subtotal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromoQuote {
    pub promo_id: i64,
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: i64,
    pub subtotal: Paise,
    pub discount: Paise,
    pub total: Paise,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum PromoRejection {
    Unknown,
    Inactive,
    NotYetValid { valid_from: DateTime<Utc> },
    Expired { valid_until: DateTime<Utc> },
    UsageLimitReached { max_uses: i64 },
}

impl Display for PromoRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PromoRejection::Unknown => write!(f, "This promo code does not exist for this event"),
            PromoRejection::Inactive => write!(f, "This promo code is no longer active"),
            PromoRejection::NotYetValid { valid_from } => write!(f, "This promo code is only valid from {valid_from}"),
            PromoRejection::Expired { valid_until } => write!(f, "This promo code expired on {valid_until}"),
            PromoRejection::UsageLimitReached { max_uses } => {
                write!(f, "This promo code has reached its limit of {max_uses} uses")
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PromoValidation {
    Valid(PromoQuote),
    Rejected(PromoRejection),
}

/// Checks a promo code against its validity window and usage limit at `now`, and quotes the discount.
pub fn evaluate_promo(promo: &PromoCode, subtotal: Paise, now: DateTime<Utc>) -> Result<PromoQuote, PromoRejection> {
    if !promo.is_active {
        return Err(PromoRejection::Inactive);
    }
    if let Some(valid_from) = promo.valid_from {
        if now < valid_from {
            return Err(PromoRejection::NotYetValid { valid_from });
        }
    }
    if let Some(valid_until) = promo.valid_until {
        if now > valid_until {
            return Err(PromoRejection::Expired { valid_until });
        }
    }
    if !promo.is_unlimited() && promo.current_uses >= promo.max_uses {
        return Err(PromoRejection::UsageLimitReached { max_uses: promo.max_uses });
    }
    let discount = promo.discount_for(subtotal);
    Ok(PromoQuote {
        promo_id: promo.id,
        code: promo.code.clone(),
        discount_type: promo.discount_type,
        discount_value: promo.discount_value,
        subtotal,
        discount,
        total: subtotal - discount,
    })
}

/// Promo performance over the counted part of the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromoAnalytics {
    pub promo_id: i64,
    pub code: String,
    pub uses: i64,
    pub max_uses: i64,
    pub total_tickets_booked: i64,
    pub total_amount_saved: Paise,
    pub total_revenue_generated: Paise,
    pub average_order_value: Paise,
    /// Percentage of the usage limit consumed. 100 for unlimited codes.
    pub redemption_rate: f64,
}

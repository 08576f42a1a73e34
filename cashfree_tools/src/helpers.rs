use serde_json::Value;
use tkt_common::Paise;

use crate::CashfreeApiError;

/// Cashfree expresses amounts as decimal rupees, either as a JSON number or as a string.
pub fn parse_cashfree_amount(value: &Value) -> Result<Paise, CashfreeApiError> {
    let rupees = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| CashfreeApiError::InvalidCurrencyAmount(value.to_string()))?;
    Paise::try_from(rupees).map_err(|e| CashfreeApiError::InvalidCurrencyAmount(e.to_string()))
}

pub fn cashfree_amount(p: Paise) -> f64 {
    p.as_rupees()
}

use thiserror::Error;

use crate::{
    db_types::{NewPromoCode, PromoCode, PromoCodeUsage},
    traits::{PromoResync, PromoUsageStats},
};

#[derive(Debug, Clone, Error)]
pub enum PromoLedgerError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("Promo code {0} does not exist")]
    PromoNotFound(String),
    #[error("Promo code #{0} does not exist")]
    PromoIdNotFound(i64),
    #[error("Promo code {0} already exists")]
    DuplicateCode(String),
}

impl From<sqlx::Error> for PromoLedgerError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::Database(de) if de.is_unique_violation() => {
                PromoLedgerError::DuplicateCode(de.message().to_string())
            },
            e => PromoLedgerError::DatabaseError(e.to_string()),
        }
    }
}

/// Promo codes and the usage ledger.
///
/// The ledger rows are the ground truth. `current_uses` on a promo code is a cache that counts only usages whose
/// order is `SUCCESS` on a live (non-sandbox) payment channel, and can always be re-derived with
/// [`Self::recompute_current_uses`].
#[allow(async_fn_in_trait)]
pub trait PromoManagement {
    async fn insert_promo_code(&self, promo: NewPromoCode) -> Result<PromoCode, PromoLedgerError>;

    /// Codes are matched case-insensitively. If `event_id` is given, the code must belong to that event.
    async fn fetch_promo_code(&self, code: &str, event_id: Option<i64>) -> Result<Option<PromoCode>, PromoLedgerError>;

    async fn fetch_promo_code_by_id(&self, promo_id: i64) -> Result<Option<PromoCode>, PromoLedgerError>;

    async fn fetch_usages_for_promo(&self, promo_id: i64) -> Result<Vec<PromoCodeUsage>, PromoLedgerError>;

    /// Re-derives `current_uses` from the ledger for one promo code, or all of them. Only the codes whose counter was
    /// wrong are returned.
    async fn recompute_current_uses(&self, promo_id: Option<i64>) -> Result<Vec<PromoResync>, PromoLedgerError>;

    /// Aggregates over the counted ledger rows for a promo code.
    async fn promo_usage_stats(&self, promo_id: i64) -> Result<PromoUsageStats, PromoLedgerError>;
}

use std::fmt::Debug;

use chrono::Utc;
use log::*;
use tkt_common::Paise;

use crate::{
    db_types::{NewPromoCode, PromoCode, PromoCodeUsage},
    tkt_api::promo_objects::{evaluate_promo, PromoAnalytics, PromoRejection, PromoValidation},
    traits::{PromoLedgerError, PromoManagement, PromoResync},
};

/// Promo codes and their usage ledger.
///
/// Usage rows are written by the backend while an order is marked `SUCCESS`. This API quotes codes for customers and
/// keeps the `current_uses` cache honest.
pub struct PromoLedgerApi<B> {
    db: B,
}

impl<B> Debug for PromoLedgerApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PromoLedgerApi")
    }
}

impl<B> PromoLedgerApi<B>
where B: PromoManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub async fn create_promo_code(&self, promo: NewPromoCode) -> Result<PromoCode, PromoLedgerError> {
        self.db.insert_promo_code(promo).await
    }

    /// Quotes the discount `code` would give on `subtotal` for the event, or says why it cannot be used.
    pub async fn validate_promo_code(
        &self,
        code: &str,
        event_id: i64,
        subtotal: Paise,
    ) -> Result<PromoValidation, PromoLedgerError> {
        let promo = match self.db.fetch_promo_code(code, Some(event_id)).await? {
            Some(p) => p,
            None => {
                debug!("🏷️ Promo code {code} is unknown for event #{event_id}");
                return Ok(PromoValidation::Rejected(PromoRejection::Unknown));
            },
        };
        let result = match evaluate_promo(&promo, subtotal, Utc::now()) {
            Ok(quote) => PromoValidation::Valid(quote),
            Err(rejection) => {
                debug!("🏷️ Promo code {} rejected: {rejection}", promo.code);
                PromoValidation::Rejected(rejection)
            },
        };
        Ok(result)
    }

    pub async fn usages(&self, promo_id: i64) -> Result<Vec<PromoCodeUsage>, PromoLedgerError> {
        self.db.fetch_usages_for_promo(promo_id).await
    }

    /// Re-derives `current_uses` from the ledger for one code, or all codes if `promo_id` is `None`.
    pub async fn recompute_current_uses(&self, promo_id: Option<i64>) -> Result<Vec<PromoResync>, PromoLedgerError> {
        let corrected = self.db.recompute_current_uses(promo_id).await?;
        if corrected.is_empty() {
            debug!("🏷️ All promo counters match the ledger");
        } else {
            info!("🏷️ {} promo counters corrected", corrected.len());
        }
        Ok(corrected)
    }

    pub async fn promo_analytics(&self, promo_id: i64) -> Result<PromoAnalytics, PromoLedgerError> {
        let promo =
            self.db.fetch_promo_code_by_id(promo_id).await?.ok_or(PromoLedgerError::PromoIdNotFound(promo_id))?;
        let stats = self.db.promo_usage_stats(promo_id).await?;
        let average_order_value = match stats.uses {
            0 => Paise::default(),
            n => Paise::from(stats.revenue.value() / n),
        };
        #[allow(clippy::cast_precision_loss)]
        let redemption_rate = if promo.is_unlimited() {
            100.0
        } else {
            stats.uses as f64 * 100.0 / promo.max_uses as f64
        };
        Ok(PromoAnalytics {
            promo_id,
            code: promo.code,
            uses: stats.uses,
            max_uses: promo.max_uses,
            total_tickets_booked: stats.tickets_booked,
            total_amount_saved: stats.amount_saved,
            total_revenue_generated: stats.revenue,
            average_order_value,
            redemption_rate,
        })
    }
}

//! Background jobs. Each worker runs on its own task for the lifetime of the server.
use std::time::Duration as StdDuration;

use chrono::Duration;
use log::*;
use ticketing_engine::{
    events::EventProducers,
    sessions::CartSessionStore,
    traits::PromoResync,
    PromoLedgerApi,
    ReconcilerApi,
    SqliteDatabase,
};
use tokio::task::JoinHandle;

use crate::integrations::cashfree::CashfreeGateway;

/// Starts the pending-order sweep. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Every `interval`, orders that are still `CREATED` or `PENDING` and at least one interval old are checked against
/// the gateway. Orders that are still unresolved after `alert_after` raise an `OrderNeedsAttentionEvent`.
pub fn start_pending_sweep_worker(
    db: SqliteDatabase,
    gateway: CashfreeGateway,
    sessions: CartSessionStore,
    producers: EventProducers,
    interval: StdDuration,
    alert_after: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        let older_than = Duration::from_std(interval).unwrap_or_else(|_| Duration::minutes(5));
        let api = ReconcilerApi::new(db, gateway, sessions, producers);
        info!("🕰️ Pending order sweep worker started");
        loop {
            timer.tick().await;
            info!("🕰️ Running pending order sweep");
            match api.sweep_unresolved(older_than, alert_after).await {
                Ok(report) => {
                    info!(
                        "🕰️ Sweep checked {} orders. {} resolved, {} still pending, {} alerts raised, {} errors",
                        report.checked, report.resolved, report.still_pending, report.alerted, report.errors
                    );
                },
                Err(e) => {
                    error!("🕰️ Error running pending order sweep: {e}");
                },
            }
        }
    })
}

/// Starts the promo counter re-derivation job. Do not await the returned JoinHandle, as it will run indefinitely.
pub fn start_promo_resync_worker(db: SqliteDatabase, interval: StdDuration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        let api = PromoLedgerApi::new(db);
        info!("🕰️ Promo counter resync worker started");
        loop {
            timer.tick().await;
            debug!("🕰️ Running promo counter resync");
            match api.recompute_current_uses(None).await {
                Ok(fixed) if fixed.is_empty() => debug!("🕰️ All promo counters agree with the ledger"),
                Ok(fixed) => warn!("🕰️ {} promo counters were repaired: {}", fixed.len(), resync_list(&fixed)),
                Err(e) => error!("🕰️ Error running promo counter resync: {e}"),
            }
        }
    })
}

fn resync_list(fixed: &[PromoResync]) -> String {
    fixed
        .iter()
        .map(|r| format!("[{}] {}: {} -> {}", r.promo_id, r.code, r.previous_uses, r.current_uses))
        .collect::<Vec<String>>()
        .join(", ")
}

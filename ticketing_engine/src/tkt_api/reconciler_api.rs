//! `ReconcilerApi` decides what actually happened to a payment and moves the order accordingly.
//!
//! The browser callback, the signed webhook and the background sweep all call [`ReconcilerApi::reconcile`]. The
//! gateway's status API is always asked first; the trigger's own payload is only consulted when the gateway has nothing
//! conclusive to say. Whatever was learnt is written to the order's audit trail before the order is touched.
//!
//! | Resolved outcome | Effect                                                                                |
//! |------------------|---------------------------------------------------------------------------------------|
//! | Success          | `SUCCESS`, tickets issued and promo usage recorded in one transaction; cart released. |
//! | Failed           | `FAILED` if the order was still open. Cart kept or restored for a retry.              |
//! | Cancelled        | `CANCELLED` if the order was still open. Cart kept or restored.                       |
//! | Unknown          | `PENDING` if the order was `CREATED`. Terminal orders are not touched.                |
//!
//! Reconciling an order that is already `SUCCESS` returns the existing tickets and writes nothing. A `CANCELLED` order is
//! still checked with the gateway: a payment that went through anyway cannot complete it and raises an operator alert.
use std::{fmt::Debug, time::Duration};

use chrono::Utc;
use log::*;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    db_types::{OrderId, PaymentOrder, PaymentOrderStatus, Ticket},
    events::{EventProducers, OrderNeedsAttentionEvent, TicketsIssuedEvent},
    order_objects::OrderQueryFilter,
    sessions::CartSessionStore,
    tkt_api::{
        checkout_objects::DEFAULT_GATEWAY_TIMEOUT,
        errors::ReconcileError,
        evidence::{resolve, Evidence, EvidenceSource, Outcome, Resolution, Trigger},
    },
    traits::{
        PaymentGateway,
        PaymentOrderManagement,
        PaymentReference,
        PromoAccounting,
        TicketManagement,
        TicketingDatabaseError,
    },
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconcileOutcome {
    pub order: PaymentOrder,
    pub status: PaymentOrderStatus,
    pub decided_by: Option<EvidenceSource>,
    pub tickets: Vec<Ticket>,
    /// The order was already `SUCCESS` when reconciliation started
    pub already_complete: bool,
    /// Money may have been taken without the order being fully served
    pub needs_attention: bool,
    pub promo: Option<PromoAccounting>,
}

impl ReconcileOutcome {
    fn unchanged(order: PaymentOrder, tickets: Vec<Ticket>, decided_by: Option<EvidenceSource>) -> Self {
        let status = order.status;
        Self {
            already_complete: status == PaymentOrderStatus::Success,
            order,
            status,
            decided_by,
            tickets,
            needs_attention: false,
            promo: None,
        }
    }
}

/// A summary of one pass of [`ReconcilerApi::sweep_unresolved`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub checked: usize,
    pub resolved: usize,
    pub still_pending: usize,
    pub alerted: usize,
    pub errors: usize,
}

pub struct ReconcilerApi<B, G> {
    db: B,
    gateway: G,
    sessions: CartSessionStore,
    producers: EventProducers,
    gateway_timeout: Duration,
}

impl<B, G> Debug for ReconcilerApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReconcilerApi")
    }
}

impl<B, G> ReconcilerApi<B, G> {
    pub fn new(db: B, gateway: G, sessions: CartSessionStore, producers: EventProducers) -> Self {
        Self { db, gateway, sessions, producers, gateway_timeout: DEFAULT_GATEWAY_TIMEOUT }
    }

    pub fn with_gateway_timeout(mut self, timeout: Duration) -> Self {
        self.gateway_timeout = timeout;
        self
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn sessions(&self) -> &CartSessionStore {
        &self.sessions
    }
}

impl<B, G> ReconcilerApi<B, G>
where
    B: PaymentOrderManagement + TicketManagement,
    G: PaymentGateway,
{
    /// Determines the true outcome of the payment for `order_id` and applies it. Safe to call any number of times, from
    /// any trigger, concurrently.
    pub async fn reconcile(&self, order_id: &OrderId, trigger: Trigger) -> Result<ReconcileOutcome, ReconcileError> {
        let order =
            self.db.fetch_payment_order(order_id).await?.ok_or_else(|| ReconcileError::OrderNotFound(order_id.clone()))?;
        if order.status == PaymentOrderStatus::Success {
            debug!("🔄️ Order {order_id} is already SUCCESS. Nothing to do for this {}.", trigger.label());
            let tickets = self.db.fetch_tickets_for_order(order_id).await?;
            return Ok(ReconcileOutcome::unchanged(order, tickets, None));
        }

        let gateway_evidence = self.query_gateway(order_id).await;
        if let Some(err) = &gateway_evidence.error {
            let entry = json!({ "stage": "status_query", "error": err, "error_timestamp": Utc::now() });
            self.db.append_audit_entry(order_id, "errors", entry).await?;
        }
        let mut evidence = vec![gateway_evidence];
        evidence.extend(trigger.evidence());
        let resolution = resolve(&evidence);
        let record = json!({
            "trigger": trigger.label(),
            "decided_by": resolution.decided_by,
            "outcome": resolution.outcome,
            "evidence": evidence,
            "at": Utc::now(),
        });
        self.db.append_audit_entry(order_id, "verifications", record).await?;
        info!(
            "🔄️ Order {order_id} ({} via {}): outcome {} decided by {}",
            order.status,
            trigger.label(),
            resolution.outcome,
            resolution.decided_by.map(|s| s.to_string()).unwrap_or_else(|| "nothing".into())
        );
        let reference = PaymentReference {
            transaction_id: resolution.transaction_id.clone(),
            cf_payment_id: trigger.cf_payment_id().or_else(|| {
                evidence.iter().find(|e| e.source == EvidenceSource::GatewayApi).and_then(|e| e.transaction_id.clone())
            }),
        };

        match resolution.outcome {
            Outcome::Success => self.apply_success(order_id, reference, &resolution).await,
            Outcome::Failed | Outcome::Cancelled => {
                let status = resolution.outcome.target_status();
                let (order, changed) = self.db.close_order(order_id, status, reference).await?;
                if !changed {
                    debug!("🔄️ Order {order_id} stays {} despite {} evidence", order.status, resolution.outcome);
                }
                let tickets = match order.status {
                    PaymentOrderStatus::Success => self.db.fetch_tickets_for_order(order_id).await?,
                    PaymentOrderStatus::Failed | PaymentOrderStatus::Cancelled => {
                        self.sessions.restore_after_close(order.session_id().as_deref(), order_id).await;
                        Vec::new()
                    },
                    _ => Vec::new(),
                };
                Ok(ReconcileOutcome::unchanged(order, tickets, resolution.decided_by))
            },
            Outcome::Unknown => {
                let order = self.db.mark_order_pending(order_id).await?;
                let tickets = match order.status {
                    PaymentOrderStatus::Success => self.db.fetch_tickets_for_order(order_id).await?,
                    _ => Vec::new(),
                };
                Ok(ReconcileOutcome::unchanged(order, tickets, None))
            },
        }
    }

    async fn apply_success(
        &self,
        order_id: &OrderId,
        reference: PaymentReference,
        resolution: &Resolution,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let transition = match self.db.complete_order(order_id, reference).await {
            Ok(t) => t,
            Err(TicketingDatabaseError::ForbiddenTransition { from, .. }) => {
                let order = self
                    .db
                    .fetch_payment_order(order_id)
                    .await?
                    .ok_or_else(|| ReconcileError::OrderNotFound(order_id.clone()))?;
                let reason = format!("Payment succeeded, but the order is {from}. No tickets were issued.");
                error!("🔄️ Order {order_id}: {reason}");
                self.producers.publish_needs_attention(OrderNeedsAttentionEvent::new(order.clone(), reason)).await;
                let mut outcome = ReconcileOutcome::unchanged(order, Vec::new(), resolution.decided_by);
                outcome.needs_attention = true;
                return Ok(outcome);
            },
            Err(e) => return Err(e.into()),
        };
        if transition.already_complete {
            debug!("🔄️ Order {order_id} was completed by a concurrent reconciliation");
        } else {
            self.sessions.release(transition.order.session_id().as_deref(), order_id).await;
            if transition.newly_issued {
                let event = TicketsIssuedEvent::new(transition.order.clone(), transition.tickets.clone());
                self.producers.publish_tickets_issued(event).await;
            }
        }
        let needs_attention = transition.needs_attention();
        if needs_attention {
            let reason = match (&transition.issuance_error, &transition.promo) {
                (Some(e), _) => format!("Payment succeeded, but tickets could not be issued. {e}"),
                (None, PromoAccounting::Failed { reason }) => format!("Promo accounting failed. {reason}"),
                _ => "Post-payment processing did not complete".to_string(),
            };
            warn!("🔄️ Order {order_id} needs attention. {reason}");
            self.producers.publish_needs_attention(OrderNeedsAttentionEvent::new(transition.order.clone(), reason)).await;
        }
        Ok(ReconcileOutcome {
            status: transition.order.status,
            order: transition.order,
            decided_by: resolution.decided_by,
            tickets: transition.tickets,
            already_complete: transition.already_complete,
            needs_attention,
            promo: Some(transition.promo),
        })
    }

    /// Asks the gateway for the order's status, giving up after the configured timeout. Failure is inconclusive.
    async fn query_gateway(&self, order_id: &OrderId) -> Evidence {
        match tokio::time::timeout(self.gateway_timeout, self.gateway.fetch_order_status(order_id)).await {
            Ok(Ok(status)) => Evidence::from_gateway(status),
            Ok(Err(e)) => {
                warn!("🔄️ Could not fetch the gateway status for order {order_id}. {e}");
                Evidence::unavailable(EvidenceSource::GatewayApi, e.to_string())
            },
            Err(_) => {
                warn!("🔄️ The gateway status query for order {order_id} timed out after {:?}", self.gateway_timeout);
                Evidence::unavailable(
                    EvidenceSource::GatewayApi,
                    format!("Status query timed out after {}s", self.gateway_timeout.as_secs()),
                )
            },
        }
    }

    /// Re-checks open orders that are at least `older_than` old against the gateway, and raises an alert for those
    /// still open after `alert_after`.
    pub async fn sweep_unresolved(
        &self,
        older_than: chrono::Duration,
        alert_after: chrono::Duration,
    ) -> Result<SweepReport, ReconcileError> {
        let query = OrderQueryFilter::default()
            .with_status(PaymentOrderStatus::Created)
            .with_status(PaymentOrderStatus::Pending)
            .older_than(older_than);
        let orders = self.db.search_payment_orders(query).await?;
        let mut report = SweepReport { checked: orders.len(), ..Default::default() };
        for order in orders {
            let outcome = match self.reconcile(&order.order_id, Trigger::Sweep).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("🔄️ Sweep could not reconcile order {}. {e}", order.order_id);
                    report.errors += 1;
                    continue;
                },
            };
            if outcome.status.is_unresolved() {
                report.still_pending += 1;
                if Utc::now() - outcome.order.created_at >= alert_after {
                    let reason = format!(
                        "Order has been unresolved since {}. Check it with the gateway.",
                        outcome.order.created_at
                    );
                    warn!("🔄️ Order {}: {reason}", outcome.order.order_id);
                    self.producers.publish_needs_attention(OrderNeedsAttentionEvent::new(outcome.order, reason)).await;
                    report.alerted += 1;
                }
            } else {
                report.resolved += 1;
            }
        }
        Ok(report)
    }
}

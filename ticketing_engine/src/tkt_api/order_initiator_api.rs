//! Turns a customer's cart into a payment order and a hosted payment session.
use std::fmt::Debug;

use chrono::Utc;
use log::*;
use serde_json::json;
use tkt_common::{helpers::last_n_digits, Paise};

use crate::{
    db_types::{Cart, CartLine, CartSnapshot, NewPaymentOrder, OrderId, PaymentOrderStatus, SnapshotLine},
    helpers::{gateway_customer_id, new_order_id},
    sessions::CartSessionStore,
    tkt_api::{
        checkout_objects::{CheckoutRequest, CheckoutResponse, CheckoutSettings},
        errors::CheckoutError,
        promo_objects::evaluate_promo,
    },
    traits::{
        CatalogManagement,
        GatewayCustomer,
        GatewayError,
        GatewaySessionRequest,
        PaymentGateway,
        PaymentOrderManagement,
        PaymentReference,
        PromoManagement,
    },
};

const PHONE_PLACEHOLDER: &str = "0000000000";

pub struct OrderInitiatorApi<B, G> {
    db: B,
    gateway: G,
    sessions: CartSessionStore,
    settings: CheckoutSettings,
}

impl<B, G> Debug for OrderInitiatorApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderInitiatorApi ({})", self.settings.public_base_url)
    }
}

impl<B, G> OrderInitiatorApi<B, G> {
    pub fn new(db: B, gateway: G, sessions: CartSessionStore, settings: CheckoutSettings) -> Self {
        Self { db, gateway, sessions, settings }
    }

    pub fn sessions(&self) -> &CartSessionStore {
        &self.sessions
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

fn too_large(line: &CartLine) -> CheckoutError {
    CheckoutError::InvalidCart(format!("The quantity for ticket type #{} is too large", line.ticket_type_id))
}

impl<B, G> OrderInitiatorApi<B, G>
where
    B: PaymentOrderManagement + CatalogManagement + PromoManagement,
    G: PaymentGateway,
{
    /// Prices a cart against the catalogue and freezes it into a snapshot.
    ///
    /// Every line must name a ticket type of the cart's event. Lines for the same ticket type are merged, since an order
    /// holds at most one ticket per type. A promo code, if present, must currently be valid for the event.
    pub async fn quote_cart(&self, cart: &Cart) -> Result<CartSnapshot, CheckoutError> {
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        let event =
            self.db.fetch_event(cart.event_id).await?.ok_or(CheckoutError::EventNotFound(cart.event_id))?;
        let mut lines: Vec<SnapshotLine> = Vec::with_capacity(cart.lines.len());
        for line in &cart.lines {
            if let Some(merged) = lines.iter_mut().find(|l| l.ticket_type_id == line.ticket_type_id) {
                merged.quantity = merged.quantity.checked_add(line.quantity).ok_or_else(|| too_large(line))?;
                continue;
            }
            let ticket_type = self
                .db
                .fetch_ticket_type(line.ticket_type_id)
                .await?
                .filter(|tt| tt.event_id == event.id)
                .ok_or_else(|| {
                    CheckoutError::InvalidCart(format!(
                        "Ticket type #{} is not on sale for event #{}",
                        line.ticket_type_id, event.id
                    ))
                })?;
            lines.push(SnapshotLine {
                ticket_type_id: ticket_type.id,
                type_name: ticket_type.type_name,
                quantity: line.quantity,
                unit_price: ticket_type.price,
                attendees_per_ticket: ticket_type.attendees_per_ticket,
            });
        }
        let overflow = || CheckoutError::InvalidCart("The cart quantities are too large".to_string());
        let mut subtotal = Paise::default();
        let mut total_attendees = 0i64;
        for line in &lines {
            let line_total = line.unit_price.checked_mul(line.quantity).ok_or_else(overflow)?;
            subtotal = subtotal.checked_add(line_total).ok_or_else(overflow)?;
            let attendees = line.quantity.checked_mul(line.attendees_per_ticket).ok_or_else(overflow)?;
            total_attendees = total_attendees.checked_add(attendees).ok_or_else(overflow)?;
        }
        let promo_code = cart.promo_code.as_deref().map(str::trim).filter(|c| !c.is_empty());
        let (discount, promo_code) = match promo_code {
            Some(code) => {
                let promo = self
                    .db
                    .fetch_promo_code(code, Some(event.id))
                    .await?
                    .ok_or_else(|| CheckoutError::InvalidPromo(format!("{code} is not a promo code for this event")))?;
                let quote = evaluate_promo(&promo, subtotal, Utc::now())
                    .map_err(|r| CheckoutError::InvalidPromo(r.to_string()))?;
                (quote.discount, Some(promo.code))
            },
            None => (Paise::default(), None),
        };
        let total = (subtotal - discount).max(Paise::default());
        Ok(CartSnapshot { event_id: event.id, lines, subtotal, discount, total, promo_code, total_attendees })
    }

    /// Creates a payment order for the customer's cart and opens a hosted payment session for it.
    ///
    /// Preconditions (a non-empty cart, accepted terms, a positive total) are checked before anything is written.
    /// If the gateway cannot open a session, the order is kept as `FAILED` with the error in its audit trail, and the
    /// caller gets [`CheckoutError::GatewayUnavailable`].
    pub async fn initiate_checkout(
        &self,
        session_id: &str,
        customer_id: i64,
        request: CheckoutRequest,
    ) -> Result<CheckoutResponse, CheckoutError> {
        let cart = match request.cart {
            Some(cart) => cart,
            None => self.sessions.cart(session_id).await.ok_or(CheckoutError::EmptyCart)?,
        };
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        if !request.terms_accepted {
            return Err(CheckoutError::TermsNotAccepted);
        }
        let customer =
            self.db.fetch_customer(customer_id).await?.ok_or(CheckoutError::CustomerNotFound(customer_id))?;
        let snapshot = self.quote_cart(&cart).await?;
        if !snapshot.total.is_positive() {
            return Err(CheckoutError::NonPositiveTotal(snapshot.total));
        }

        let order_id = OrderId::from(new_order_id());
        let channel = self.gateway.channel();
        let audit = json!({
            "ticket_order": snapshot,
            "customer": { "id": customer.id, "name": customer.name, "email": customer.email, "phone": customer.phone },
            "terms_accepted_at": request.terms_accepted_at.unwrap_or_else(Utc::now),
            "environment": channel,
            "session_id": session_id,
        });
        let new_order = NewPaymentOrder {
            order_id: order_id.clone(),
            customer_id: customer.id,
            event_id: snapshot.event_id,
            amount: snapshot.total,
            currency: self.settings.currency.clone(),
            payment_gateway: channel,
            quantity: snapshot.total_quantity(),
            response_data: audit,
        };
        let (order, _) = self.db.insert_payment_order(new_order).await?;
        info!("🔄️ Payment order {order_id} created for customer #{customer_id}. Amount: {}", order.amount);
        self.sessions.remember_order(order_id.clone(), snapshot).await;

        let name = if customer.name.trim().is_empty() { customer.email.clone() } else { customer.name.clone() };
        let phone = customer
            .phone
            .as_deref()
            .and_then(|p| last_n_digits(p, 10))
            .unwrap_or_else(|| PHONE_PLACEHOLDER.to_string());
        let session_request = GatewaySessionRequest {
            order_id: order_id.clone(),
            amount: order.amount,
            currency: order.currency.clone(),
            customer: GatewayCustomer { id: gateway_customer_id(customer.id), name, email: customer.email, phone },
            return_url: self.settings.return_url(&order_id),
            notify_url: self.settings.notify_url(),
            note: Some(format!("Tickets for event #{}", order.event_id)),
        };
        let created = match tokio::time::timeout(self.settings.gateway_timeout, self.gateway.create_order(session_request))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Timeout(format!("No reply after {:?}", self.settings.gateway_timeout))),
        };
        match created {
            Ok(session) => {
                self.db.set_audit_field(&order_id, "gateway_session", json!(session)).await?;
                debug!("🔄️ Payment session opened for order {order_id}");
                Ok(CheckoutResponse {
                    payment_session_id: session.payment_session_id,
                    order_id,
                    payment_link: session.payment_link,
                })
            },
            Err(e) => {
                error!("🔄️ The gateway could not open a payment session for order {order_id}. {e}");
                let entry = json!({ "stage": "create_order", "error": e.to_string(), "error_timestamp": Utc::now() });
                self.db.append_audit_entry(&order_id, "errors", entry).await?;
                self.db.close_order(&order_id, PaymentOrderStatus::Failed, PaymentReference::default()).await?;
                self.sessions.restore_after_close(Some(session_id), &order_id).await;
                Err(CheckoutError::GatewayUnavailable)
            },
        }
    }
}

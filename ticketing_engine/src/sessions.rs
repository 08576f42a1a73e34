//! In-memory cart sessions.
//!
//! Carts live here between the time a customer picks tickets and the time they check out. At checkout the cart
//! snapshot is also filed under the new order id, so that a failed or cancelled payment can put the cart back if the
//! session's cart has been replaced or cleared in the meantime. The order's own audit blob remains the source of truth
//! for issuance.
//!
//! Filed snapshots are dropped once their order reaches a terminal state, and in any case after [`SNAPSHOT_TTL`].
use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use log::*;
use tokio::sync::RwLock;

use crate::db_types::{Cart, CartSnapshot, OrderId};

/// How long a snapshot is kept for an order that never reaches a terminal state.
pub const SNAPSHOT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone)]
struct FiledSnapshot {
    snapshot: CartSnapshot,
    filed_at: Instant,
}

#[derive(Debug, Clone)]
pub struct CartSessionStore {
    carts: Arc<RwLock<HashMap<String, Cart>>>,
    orders: Arc<RwLock<HashMap<OrderId, FiledSnapshot>>>,
    snapshot_ttl: Duration,
}

impl Default for CartSessionStore {
    fn default() -> Self {
        Self { carts: Arc::default(), orders: Arc::default(), snapshot_ttl: SNAPSHOT_TTL }
    }
}

impl CartSessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot_ttl(mut self, ttl: Duration) -> Self {
        self.snapshot_ttl = ttl;
        self
    }

    pub async fn set_cart(&self, session_id: &str, cart: Cart) {
        trace!("🛒️ Cart for session {session_id} updated");
        self.carts.write().await.insert(session_id.to_string(), cart);
    }

    pub async fn cart(&self, session_id: &str) -> Option<Cart> {
        self.carts.read().await.get(session_id).cloned()
    }

    pub async fn clear_cart(&self, session_id: &str) -> Option<Cart> {
        self.carts.write().await.remove(session_id)
    }

    /// Files the snapshot under the order id. Expired snapshots are pruned on the way in.
    pub async fn remember_order(&self, order_id: OrderId, snapshot: CartSnapshot) {
        let mut orders = self.orders.write().await;
        let before = orders.len();
        orders.retain(|_, filed| filed.filed_at.elapsed() < self.snapshot_ttl);
        if orders.len() < before {
            debug!("🛒️ {} expired order snapshots dropped", before - orders.len());
        }
        orders.insert(order_id, FiledSnapshot { snapshot, filed_at: Instant::now() });
    }

    pub async fn order_snapshot(&self, order_id: &OrderId) -> Option<CartSnapshot> {
        self.orders.read().await.get(order_id).map(|filed| filed.snapshot.clone())
    }

    pub async fn forget_order(&self, order_id: &OrderId) -> Option<CartSnapshot> {
        self.orders.write().await.remove(order_id).map(|filed| filed.snapshot)
    }

    pub async fn filed_orders(&self) -> usize {
        self.orders.read().await.len()
    }

    /// Drops everything the session held for a completed order.
    pub async fn release(&self, session_id: Option<&str>, order_id: &OrderId) {
        if let Some(session_id) = session_id {
            if self.clear_cart(session_id).await.is_some() {
                debug!("🛒️ Cart for session {session_id} cleared after order {order_id} completed");
            }
        }
        self.forget_order(order_id).await;
    }

    /// Called when an order ends `FAILED` or `CANCELLED`. The filed snapshot is dropped and, if the session no longer
    /// holds a cart, the snapshot's cart is put back so the customer can retry. Returns true if a cart was restored.
    pub async fn restore_after_close(&self, session_id: Option<&str>, order_id: &OrderId) -> bool {
        let Some(snapshot) = self.forget_order(order_id).await else {
            return false;
        };
        let Some(session_id) = session_id else {
            return false;
        };
        let mut carts = self.carts.write().await;
        if carts.contains_key(session_id) {
            return false;
        }
        carts.insert(session_id.to_string(), snapshot.to_cart());
        info!("🛒️ Cart for session {session_id} restored from order {order_id}");
        true
    }
}

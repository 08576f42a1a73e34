use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::db_types::{OrderId, PaymentOrder, PaymentOrderStatus, Ticket};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderQueryFilter {
    pub order_id: Option<OrderId>,
    pub customer_id: Option<i64>,
    pub event_id: Option<i64>,
    pub payment_gateway: Option<String>,
    pub status: Option<Vec<PaymentOrderStatus>>,
    /// Only orders created at least this many seconds ago
    pub min_age_secs: Option<i64>,
}

impl OrderQueryFilter {
    pub fn with_order_id(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn with_customer_id(mut self, customer_id: i64) -> Self {
        self.customer_id = Some(customer_id);
        self
    }

    pub fn with_event_id(mut self, event_id: i64) -> Self {
        self.event_id = Some(event_id);
        self
    }

    pub fn with_payment_gateway<S: Into<String>>(mut self, channel: S) -> Self {
        self.payment_gateway = Some(channel.into());
        self
    }

    pub fn with_status(mut self, status: PaymentOrderStatus) -> Self {
        self.status.get_or_insert_with(Vec::new).push(status);
        self
    }

    pub fn older_than(mut self, age: chrono::Duration) -> Self {
        self.min_age_secs = Some(age.num_seconds());
        self
    }

    /// The status filter, if it names at least one status. An empty list filters nothing.
    pub fn statuses(&self) -> Option<&[PaymentOrderStatus]> {
        self.status.as_deref().filter(|s| !s.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.order_id.is_none() &&
            self.customer_id.is_none() &&
            self.event_id.is_none() &&
            self.payment_gateway.is_none() &&
            self.statuses().is_none() &&
            self.min_age_secs.is_none()
    }
}

impl Display for OrderQueryFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            write!(f, "No filters.")?;
            return Ok(());
        }
        if let Some(order_id) = &self.order_id {
            write!(f, "order_id: {order_id}. ")?;
        }
        if let Some(customer_id) = &self.customer_id {
            write!(f, "customer_id: {customer_id}. ")?;
        }
        if let Some(event_id) = &self.event_id {
            write!(f, "event_id: {event_id}. ")?;
        }
        if let Some(channel) = &self.payment_gateway {
            write!(f, "channel: {channel}. ")?;
        }
        if let Some(statuses) = self.statuses() {
            let statuses = statuses.iter().map(|s| s.to_string()).collect::<Vec<String>>().join(",");
            write!(f, "statuses: [{statuses}]. ")?;
        }
        if let Some(age) = &self.min_age_secs {
            write!(f, "at least {age}s old. ")?;
        }
        Ok(())
    }
}

/// An order together with whatever has been issued for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderResult {
    pub order: PaymentOrder,
    pub tickets: Vec<Ticket>,
}

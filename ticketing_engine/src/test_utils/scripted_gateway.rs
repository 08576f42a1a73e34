use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use log::*;
use serde_json::json;

use crate::{
    db_types::{OrderId, SANDBOX_CHANNEL},
    traits::{GatewayError, GatewayOrderStatus, GatewaySession, GatewaySessionRequest, PaymentGateway},
};

#[derive(Debug, Clone)]
pub enum StatusReply {
    Status { order_status: String, transaction_id: Option<String> },
    Error(String),
    /// Never answers. Only a caller-side timeout gets past this.
    Hang,
}

#[derive(Debug, Default)]
struct Script {
    statuses: HashMap<OrderId, StatusReply>,
    create_error: Option<String>,
    sessions: Vec<GatewaySessionRequest>,
    status_queries: usize,
}

/// A [`PaymentGateway`] whose answers are set by the test. Orders without a scripted status are reported `ACTIVE`.
#[derive(Debug, Clone)]
pub struct ScriptedGateway {
    channel: String,
    script: Arc<Mutex<Script>>,
}

impl Default for ScriptedGateway {
    fn default() -> Self {
        Self::new(SANDBOX_CHANNEL)
    }
}

impl ScriptedGateway {
    pub fn new(channel: &str) -> Self {
        Self { channel: channel.to_string(), script: Arc::new(Mutex::new(Script::default())) }
    }

    fn script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().expect("Gateway script lock poisoned")
    }

    pub fn set_status(&self, order_id: &OrderId, order_status: &str, transaction_id: Option<&str>) {
        let reply = StatusReply::Status {
            order_status: order_status.to_string(),
            transaction_id: transaction_id.map(String::from),
        };
        self.script().statuses.insert(order_id.clone(), reply);
    }

    pub fn fail_status(&self, order_id: &OrderId, error: &str) {
        self.script().statuses.insert(order_id.clone(), StatusReply::Error(error.to_string()));
    }

    pub fn hang_status(&self, order_id: &OrderId) {
        self.script().statuses.insert(order_id.clone(), StatusReply::Hang);
    }

    pub fn fail_create_order(&self, error: Option<&str>) {
        self.script().create_error = error.map(String::from);
    }

    pub fn sessions(&self) -> Vec<GatewaySessionRequest> {
        self.script().sessions.clone()
    }

    pub fn status_queries(&self) -> usize {
        self.script().status_queries
    }
}

impl PaymentGateway for ScriptedGateway {
    fn channel(&self) -> String {
        self.channel.clone()
    }

    async fn create_order(&self, request: GatewaySessionRequest) -> Result<GatewaySession, GatewayError> {
        let failure = {
            let mut script = self.script();
            script.sessions.push(request.clone());
            script.create_error.clone()
        };
        if let Some(message) = failure {
            return Err(GatewayError::Rejected { status: 400, message });
        }
        trace!("💳️ Scripted session for {}", request.order_id);
        Ok(GatewaySession {
            payment_session_id: format!("session_{}", request.order_id),
            gateway_order_id: Some(format!("cf_{}", request.order_id)),
            payment_link: None,
        })
    }

    async fn fetch_order_status(&self, order_id: &OrderId) -> Result<GatewayOrderStatus, GatewayError> {
        let reply = {
            let mut script = self.script();
            script.status_queries += 1;
            script.statuses.get(order_id).cloned()
        };
        match reply {
            Some(StatusReply::Status { order_status, transaction_id }) => Ok(GatewayOrderStatus {
                raw: json!({ "order_id": order_id, "order_status": order_status }),
                order_status: Some(order_status),
                transaction_id,
            }),
            Some(StatusReply::Error(e)) => Err(GatewayError::Transport(e)),
            Some(StatusReply::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(GatewayError::Timeout("scripted hang".into()))
            },
            None => Ok(GatewayOrderStatus {
                order_status: Some("ACTIVE".into()),
                transaction_id: None,
                raw: json!({ "order_id": order_id, "order_status": "ACTIVE" }),
            }),
        }
    }
}

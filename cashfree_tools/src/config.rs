use std::{fmt::Display, str::FromStr, time::Duration};

use log::*;
use tkt_common::Secret;

pub const DEFAULT_API_VERSION: &str = "2023-08-01";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const SANDBOX_URL: &str = "https://sandbox.cashfree.com/pg";
const PRODUCTION_URL: &str = "https://api.cashfree.com/pg";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CashfreeEnvironment {
    #[default]
    Sandbox,
    Production,
}

impl CashfreeEnvironment {
    pub fn base_url(&self) -> &'static str {
        match self {
            Self::Sandbox => SANDBOX_URL,
            Self::Production => PRODUCTION_URL,
        }
    }

    /// The payment channel label recorded against orders placed in this environment. Sandbox orders are test
    /// transactions and are excluded from promo accounting and analytics.
    pub fn channel_label(&self) -> &'static str {
        match self {
            Self::Sandbox => "SANDBOX",
            Self::Production => "Cashfree",
        }
    }

    pub fn is_sandbox(&self) -> bool {
        matches!(self, Self::Sandbox)
    }
}

impl Display for CashfreeEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sandbox => write!(f, "SANDBOX"),
            Self::Production => write!(f, "PRODUCTION"),
        }
    }
}

impl FromStr for CashfreeEnvironment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sandbox" | "test" => Ok(Self::Sandbox),
            "production" | "prod" | "live" => Ok(Self::Production),
            other => Err(format!("Unknown Cashfree environment: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CashfreeConfig {
    pub environment: CashfreeEnvironment,
    pub client_id: String,
    pub client_secret: Secret<String>,
    pub api_version: String,
    /// Upper bound on every gateway call. Status queries that exceed it are treated as inconclusive by callers.
    pub timeout: Duration,
}

impl Default for CashfreeConfig {
    fn default() -> Self {
        Self {
            environment: CashfreeEnvironment::Sandbox,
            client_id: String::default(),
            client_secret: Secret::default(),
            api_version: DEFAULT_API_VERSION.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl CashfreeConfig {
    pub fn new_from_env_or_default() -> Self {
        let environment = std::env::var("TKT_CASHFREE_ENVIRONMENT")
            .map_err(|_| warn!("💳️ TKT_CASHFREE_ENVIRONMENT not set, using the sandbox environment"))
            .and_then(|s| s.parse::<CashfreeEnvironment>().map_err(|e| error!("💳️ {e}. Using the sandbox environment")))
            .unwrap_or_default();
        let client_id = std::env::var("TKT_CASHFREE_CLIENT_ID").unwrap_or_else(|_| {
            error!("💳️ TKT_CASHFREE_CLIENT_ID not set. Gateway calls will be rejected.");
            String::default()
        });
        let client_secret = Secret::new(std::env::var("TKT_CASHFREE_CLIENT_SECRET").unwrap_or_else(|_| {
            error!("💳️ TKT_CASHFREE_CLIENT_SECRET not set. Gateway calls and webhook checks will fail.");
            String::default()
        }));
        let api_version = std::env::var("TKT_CASHFREE_API_VERSION").unwrap_or_else(|_| {
            info!("💳️ TKT_CASHFREE_API_VERSION not set, using {DEFAULT_API_VERSION} as default");
            DEFAULT_API_VERSION.to_string()
        });
        let timeout = std::env::var("TKT_GATEWAY_TIMEOUT_SECS")
            .ok()
            .and_then(|s| {
                s.parse::<u64>()
                    .map_err(|e| warn!("💳️ Invalid value for TKT_GATEWAY_TIMEOUT_SECS. {e}"))
                    .ok()
            })
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT);
        info!("💳️ Cashfree environment: {environment}. Gateway timeout: {}s", timeout.as_secs());
        Self { environment, client_id, client_secret, api_version, timeout }
    }

    pub fn with_environment(mut self, environment: CashfreeEnvironment) -> Self {
        self.environment = environment;
        self
    }
}

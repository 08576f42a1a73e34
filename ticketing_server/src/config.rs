use std::{env, time::Duration as StdDuration};

use cashfree_tools::CashfreeConfig;
use chrono::Duration;
use log::*;
use tkt_common::helpers::parse_boolean_flag;

const DEFAULT_TKT_HOST: &str = "127.0.0.1";
const DEFAULT_TKT_PORT: u16 = 8380;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/tickets.db";
const DEFAULT_PENDING_ALERT_MINUTES: i64 = 30;
const DEFAULT_PENDING_SWEEP_INTERVAL_SECS: u64 = 300;
const DEFAULT_PROMO_RESYNC_INTERVAL_MINS: u64 = 60;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// The externally reachable base URL of this server. The gateway's return and notification URLs are built from it.
    pub public_base_url: String,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_x_forwarded_for: bool,
    /// If true, the Forwarded header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_forwarded: bool,
    /// Gateway credentials and environment. The client secret is also the webhook signing key.
    pub cashfree: CashfreeConfig,
    /// Only turn this off for local testing. **DANGER**
    pub webhook_signature_checks: bool,
    /// Orders still unresolved after this long raise an operator alert.
    pub pending_alert_after: Duration,
    pub pending_sweep_interval: StdDuration,
    pub promo_resync_interval: StdDuration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_TKT_HOST.to_string(),
            port: DEFAULT_TKT_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            public_base_url: format!("http://{DEFAULT_TKT_HOST}:{DEFAULT_TKT_PORT}"),
            use_x_forwarded_for: false,
            use_forwarded: false,
            cashfree: CashfreeConfig::default(),
            webhook_signature_checks: true,
            pending_alert_after: Duration::minutes(DEFAULT_PENDING_ALERT_MINUTES),
            pending_sweep_interval: StdDuration::from_secs(DEFAULT_PENDING_SWEEP_INTERVAL_SECS),
            promo_resync_interval: StdDuration::from_secs(DEFAULT_PROMO_RESYNC_INTERVAL_MINS * 60),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("TKT_HOST").ok().unwrap_or_else(|| DEFAULT_TKT_HOST.into());
        let port = env::var("TKT_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for TKT_PORT. {e} Using the default, {DEFAULT_TKT_PORT}, instead."
                    );
                    DEFAULT_TKT_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_TKT_PORT);
        let database_url = env::var("TKT_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ TKT_DATABASE_URL is not set. Using {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.to_string()
        });
        let public_base_url = env::var("TKT_PUBLIC_BASE_URL").ok().unwrap_or_else(|| {
            let url = format!("http://{host}:{port}");
            warn!(
                "🪛️ TKT_PUBLIC_BASE_URL is not set. Using {url}. The payment gateway will not be able to reach this \
                 server unless it is public."
            );
            url
        });
        let use_x_forwarded_for = parse_boolean_flag(env::var("TKT_USE_X_FORWARDED_FOR").ok(), false);
        let use_forwarded = parse_boolean_flag(env::var("TKT_USE_FORWARDED").ok(), false);
        let cashfree = CashfreeConfig::new_from_env_or_default();
        let webhook_signature_checks = parse_boolean_flag(env::var("TKT_WEBHOOK_SIGNATURE_CHECKS").ok(), true);
        if !webhook_signature_checks {
            warn!("🚨️🚨️🚨️ Webhook signature checks are DISABLED. Never run a production server like this. 🚨️🚨️🚨️");
        }
        let pending_alert_after = Duration::minutes(env_number("TKT_PENDING_ALERT_MINUTES", DEFAULT_PENDING_ALERT_MINUTES));
        let pending_sweep_interval =
            StdDuration::from_secs(env_number("TKT_PENDING_SWEEP_INTERVAL_SECS", DEFAULT_PENDING_SWEEP_INTERVAL_SECS));
        let promo_resync_interval =
            StdDuration::from_secs(env_number("TKT_PROMO_RESYNC_INTERVAL_MINS", DEFAULT_PROMO_RESYNC_INTERVAL_MINS) * 60);
        Self {
            host,
            port,
            database_url,
            public_base_url,
            use_x_forwarded_for,
            use_forwarded,
            cashfree,
            webhook_signature_checks,
            pending_alert_after,
            pending_sweep_interval,
            promo_resync_interval,
        }
    }
}

/// Reads a positive number from the environment, falling back to `default` if it is missing or invalid.
fn env_number<T>(name: &str, default: T) -> T
where
    T: std::str::FromStr + PartialOrd + Default + std::fmt::Display + Copy,
    T::Err: std::fmt::Display,
{
    env::var(name)
        .map_err(|_| info!("🪛️ {name} is not set. Using the default value of {default}."))
        .and_then(|s| {
            s.trim().parse::<T>().map_err(|e| error!("🪛️ Invalid configuration value for {name}. {e}. Using {default}."))
        })
        .and_then(|v| {
            if v > T::default() {
                Ok(v)
            } else {
                error!("🪛️ {name} must be positive. Using {default}.");
                Err(())
            }
        })
        .unwrap_or(default)
}

//-------------------------------------------------  ServerOptions  ----------------------------------------------------
/// A subset of the server configuration that is used to configure the server's behaviour. Generally we try to keep this
/// as small as possible, and exclude secrets to avoid passing sensitive information around the system.
#[derive(Clone, Copy, Debug, Default)]
pub struct ServerOptions {
    pub use_x_forwarded_for: bool,
    pub use_forwarded: bool,
}

impl ServerOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self { use_x_forwarded_for: config.use_x_forwarded_for, use_forwarded: config.use_forwarded }
    }
}

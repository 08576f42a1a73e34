use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use log::*;
use ticketing_engine::{
    checkout_objects::CheckoutSettings,
    events::EventProducers,
    sessions::CartSessionStore,
    traits::PaymentGateway,
    OrderInitiatorApi,
    PromoLedgerApi,
    ReconcilerApi,
    SqliteDatabase,
    TicketIssuerApi,
    TicketValidationApi,
};

use crate::{
    config::{ServerConfig, ServerOptions},
    errors::ServerError,
    integrations::{cashfree::CashfreeGateway, hooks::create_ticketing_event_handlers},
    middleware::WebhookSignatureFactory,
    routes::{
        health,
        put_cart,
        CheckoutRoute,
        IssueTicketsRoute,
        OrderByIdRoute,
        PaymentReturnRoute,
        PaymentWebhookRoute,
        PromoAnalyticsRoute,
        PromoQuoteRoute,
        PromoResyncRoute,
        ValidateTicketRoute,
    },
    workers::{start_pending_sweep_worker, start_promo_resync_worker},
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(format!("Database migration failed. {e}")))?;
    let gateway = CashfreeGateway::new(config.cashfree.clone())
        .map_err(|e| ServerError::ConfigurationError(format!("Could not create the gateway client. {e}")))?;
    info!("🚀️ Payment channel: {}", gateway.channel());
    let sessions = CartSessionStore::new();
    let handlers = create_ticketing_event_handlers(db.clone());
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let _sweep = start_pending_sweep_worker(
        db.clone(),
        gateway.clone(),
        sessions.clone(),
        producers.clone(),
        config.pending_sweep_interval,
        config.pending_alert_after,
    );
    let _resync = start_promo_resync_worker(db.clone(), config.promo_resync_interval);
    let srv = create_server_instance(config, db, gateway, sessions, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    gateway: CashfreeGateway,
    sessions: CartSessionStore,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let options = ServerOptions::from_config(&config);
    let settings = CheckoutSettings::new(config.public_base_url.as_str()).with_gateway_timeout(config.cashfree.timeout);
    let webhook_secret = config.cashfree.client_secret.clone();
    let signature_checks = config.webhook_signature_checks;
    let srv = HttpServer::new(move || {
        let initiator_api = OrderInitiatorApi::new(db.clone(), gateway.clone(), sessions.clone(), settings.clone());
        let reconciler_api = ReconcilerApi::new(db.clone(), gateway.clone(), sessions.clone(), producers.clone())
            .with_gateway_timeout(settings.gateway_timeout);
        let issuer_api = TicketIssuerApi::new(db.clone(), producers.clone());
        let promo_api = PromoLedgerApi::new(db.clone());
        let validation_api = TicketValidationApi::new(db.clone());
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("tkt::access_log"))
            .app_data(web::Data::new(options))
            .app_data(web::Data::new(sessions.clone()))
            .app_data(web::Data::new(initiator_api))
            .app_data(web::Data::new(reconciler_api))
            .app_data(web::Data::new(issuer_api))
            .app_data(web::Data::new(promo_api))
            .app_data(web::Data::new(validation_api));
        let api_scope = web::scope("/api")
            .service(put_cart)
            .service(CheckoutRoute::<SqliteDatabase, CashfreeGateway>::new())
            .service(OrderByIdRoute::<SqliteDatabase>::new())
            .service(IssueTicketsRoute::<SqliteDatabase>::new())
            .service(PromoResyncRoute::<SqliteDatabase>::new())
            .service(PromoAnalyticsRoute::<SqliteDatabase>::new())
            .service(PromoQuoteRoute::<SqliteDatabase>::new())
            .service(ValidateTicketRoute::<SqliteDatabase>::new());
        // Only the webhook is signed. The browser return carries no signature.
        let payment_scope = web::scope("/payment")
            .service(PaymentReturnRoute::<SqliteDatabase, CashfreeGateway>::new())
            .service(
                web::scope("")
                    .wrap(WebhookSignatureFactory::new(webhook_secret.clone(), signature_checks))
                    .service(PaymentWebhookRoute::<SqliteDatabase, CashfreeGateway>::new()),
            );
        app.service(health).service(api_scope).service(payment_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}

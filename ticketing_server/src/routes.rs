//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests:
//! ```nocompile
//!     fn my_handler() -> impl Responder {
//!         std::thread::sleep(Duration::from_secs(5)); // <-- Bad practice! Will cause the current worker thread to
//! hang!
//!     }
//! ```
//! For this reason, any long, non-cpu-bound operation (e.g. I/O, database operations, etc.) should be expressed as
//! futures or asynchronous functions. Async handlers get executed concurrently by worker threads and thus don’t block
//! execution. Gateway calls are bounded by the gateway timeout, so a slow gateway delays a response but never hangs a
//! worker.
use actix_web::{get, put, web, HttpRequest, HttpResponse, Responder};
use cashfree_tools::WebhookNotification;
use log::*;
use serde_json::Value;
use ticketing_engine::{
    checkout_objects::CheckoutRequest,
    db_types::{Cart, OrderId},
    evidence::Trigger,
    sessions::CartSessionStore,
    traits::{CatalogManagement, PaymentGateway, PaymentOrderManagement, PromoManagement, TicketManagement},
    OrderInitiatorApi,
    PromoLedgerApi,
    ReconcilerApi,
    TicketIssuerApi,
    TicketValidationApi,
};
use tkt_common::Paise;

use crate::{
    config::ServerOptions,
    data_objects::{CallbackParams, CallbackResponse, JsonResponse, PromoQuery, ValidateTicketRequest},
    errors::ServerError,
    helpers::{customer_id, get_remote_ip, session_id},
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal for <$($param:ident: $($bound:ident)&+),+>) => {
        paste::paste! { pub struct [<$name:camel Route>]<$($param,)+>($(core::marker::PhantomData<fn() -> $param>,)+);}
        paste::paste! { impl<$($param,)+> [<$name:camel Route>]<$($param,)+> {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($(core::marker::PhantomData::<fn() -> $param>,)+)
            }
        }}
        paste::paste! { impl<$($param,)+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$($param,)+>
        where
            $($param: $($bound +)+ 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::<$($param,)+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Cart  ----------------------------------------------------
/// Stores the cart for the session in the `x-session-id` header, replacing any cart it already had.
#[put("/cart")]
pub async fn put_cart(
    req: HttpRequest,
    body: web::Json<Cart>,
    sessions: web::Data<CartSessionStore>,
) -> Result<HttpResponse, ServerError> {
    let session_id = session_id(&req)?;
    let cart = body.into_inner();
    if cart.is_empty() {
        return Err(ServerError::PreconditionFailed("The cart is empty".into()));
    }
    debug!("💻️ Storing cart for event #{} in session {session_id}", cart.event_id);
    sessions.set_cart(&session_id, cart).await;
    Ok(HttpResponse::Ok().json(JsonResponse::success("Cart saved")))
}

//----------------------------------------------   Checkout  ----------------------------------------------------
route!(checkout => Post "/checkout" for <B: PaymentOrderManagement & CatalogManagement & PromoManagement, G: PaymentGateway>);
/// Creates a payment order and a hosted payment session.
///
/// The cart is taken from the request body if it has one, otherwise from the session. The customer is identified
/// by the `x-customer-id` header, which the upstream auth layer sets. The response carries the `payment_session_id`
/// that the front end hands to the gateway's checkout widget.
pub async fn checkout<B, G>(
    req: HttpRequest,
    body: web::Json<CheckoutRequest>,
    api: web::Data<OrderInitiatorApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentOrderManagement + CatalogManagement + PromoManagement,
    G: PaymentGateway,
{
    let session_id = session_id(&req)?;
    let customer_id = customer_id(&req)?;
    let request = body.into_inner();
    debug!("💻️ Checkout request for customer #{customer_id} in session {session_id}");
    let response = api.initiate_checkout(&session_id, customer_id, request).await.map_err(|e| {
        warn!("💻️ Checkout for customer #{customer_id} failed. {e}");
        ServerError::from(e)
    })?;
    Ok(HttpResponse::Ok().json(response))
}

//----------------------------------------------   Payment callbacks  ------------------------------------------------
route!(payment_return => Get "/return" for <B: PaymentOrderManagement & TicketManagement, G: PaymentGateway>);
/// The customer's browser lands here after the hosted payment page.
///
/// The status in the query string is only a hint. The reconciler asks the gateway before deciding anything, and an
/// inconclusive answer leaves the order pending rather than failed.
pub async fn payment_return<B, G>(
    req: HttpRequest,
    query: web::Query<CallbackParams>,
    options: web::Data<ServerOptions>,
    api: web::Data<ReconcilerApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentOrderManagement + TicketManagement,
    G: PaymentGateway,
{
    let params = query.into_inner();
    let remote_ip = get_remote_ip(&req, options.use_x_forwarded_for, options.use_forwarded)
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| "unknown".into());
    debug!("💻️ Payment return from {remote_ip}: {params:?}");
    let order_id = params
        .resolved_order_id()
        .ok_or_else(|| ServerError::InvalidRequestPath("The return URL did not identify an order".into()))?;
    let trigger = Trigger::Callback { payment_status: params.payment_status, transaction_id: params.transaction_id };
    let outcome = api.reconcile(&order_id, trigger).await?;
    info!("💻️ Payment return for order {order_id} resolved to {}", outcome.status);
    Ok(HttpResponse::Ok().json(CallbackResponse::from(outcome)))
}

route!(payment_webhook => Post "/webhook" for <B: PaymentOrderManagement & TicketManagement, G: PaymentGateway>);
/// Signed server-to-server payment notifications. The signature has already been checked by the middleware.
///
/// Anything other than a 2xx makes the gateway retry, so once the body is readable the response is always 200, even
/// if reconciliation could not finish. The pending sweep picks up whatever is left unresolved.
pub async fn payment_webhook<B, G>(
    body: web::Bytes,
    api: web::Data<ReconcilerApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentOrderManagement + TicketManagement,
    G: PaymentGateway,
{
    let raw = serde_json::from_slice::<Value>(body.as_ref()).map_err(|e| {
        warn!("💻️ Could not read webhook body. {e}");
        ServerError::CouldNotDeserializePayload
    })?;
    let notification = serde_json::from_value::<WebhookNotification>(raw.clone()).map_err(|e| {
        warn!("💻️ Webhook body is not a payment notification. {e}");
        ServerError::CouldNotDeserializePayload
    })?;
    let order_id = OrderId::from(notification.order_id());
    debug!(
        "💻️ Webhook {} for order {order_id}: {:?}",
        notification.notification_type.as_deref().unwrap_or("(untyped)"),
        notification.payment_status()
    );
    let trigger = Trigger::Webhook {
        payment_status: notification.payment_status().map(String::from),
        cf_payment_id: notification.cf_payment_id().map(String::from),
        raw,
    };
    let response = match api.reconcile(&order_id, trigger).await {
        Ok(outcome) => {
            info!("💻️ Webhook for order {order_id} resolved to {}", outcome.status);
            JsonResponse::success(format!("Order {order_id} is {}", outcome.status))
        },
        Err(e) => {
            error!("💻️ Could not reconcile order {order_id} from a webhook. {e}");
            JsonResponse::failure(e)
        },
    };
    Ok(HttpResponse::Ok().json(response))
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(order_by_id => Get "/orders/{order_id}" for <B: PaymentOrderManagement & TicketManagement>);
/// Returns the order and its tickets.
pub async fn order_by_id<B>(
    path: web::Path<String>,
    api: web::Data<TicketIssuerApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentOrderManagement + TicketManagement,
{
    let order_id = OrderId::from(path.into_inner());
    trace!("💻️ Fetching order {order_id}");
    let result = api
        .order_with_tickets(&order_id)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("Order {order_id} does not exist")))?;
    Ok(HttpResponse::Ok().json(result))
}

route!(issue_tickets => Post "/orders/{order_id}/issue_tickets" for <B: PaymentOrderManagement & TicketManagement>);
/// Issues the tickets for a `SUCCESS` order whose issuance failed during reconciliation. Safe to repeat.
pub async fn issue_tickets<B>(
    path: web::Path<String>,
    api: web::Data<TicketIssuerApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentOrderManagement + TicketManagement,
{
    let order_id = OrderId::from(path.into_inner());
    info!("💻️ Ticket issuance requested for order {order_id}");
    let issued = api.issue_tickets(&order_id).await.map_err(|e| {
        warn!("💻️ Could not issue tickets for order {order_id}. {e}");
        ServerError::from(e)
    })?;
    Ok(HttpResponse::Ok().json(issued))
}

//----------------------------------------------   Promo codes  ----------------------------------------------------
route!(promo_quote => Get "/promo/{code}" impl PromoManagement);
/// Quotes the discount a promo code gives on `subtotal` for the event, or explains why it cannot be used.
pub async fn promo_quote<B: PromoManagement>(
    path: web::Path<String>,
    query: web::Query<PromoQuery>,
    api: web::Data<PromoLedgerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let code = path.into_inner();
    let PromoQuery { event_id, subtotal } = query.into_inner();
    let validation = api.validate_promo_code(&code, event_id, Paise::from(subtotal)).await?;
    Ok(HttpResponse::Ok().json(validation))
}

route!(promo_analytics => Get "/promo/{id}/analytics" impl PromoManagement);
pub async fn promo_analytics<B: PromoManagement>(
    path: web::Path<i64>,
    api: web::Data<PromoLedgerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let analytics = api.promo_analytics(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(analytics))
}

route!(promo_resync => Post "/promo/resync" impl PromoManagement);
/// Re-derives every promo code's usage counter from the ledger. Returns the codes that were wrong.
pub async fn promo_resync<B: PromoManagement>(api: web::Data<PromoLedgerApi<B>>) -> Result<HttpResponse, ServerError> {
    let fixed = api.recompute_current_uses(None).await?;
    info!("💻️ Promo resync repaired {} counters", fixed.len());
    Ok(HttpResponse::Ok().json(fixed))
}

//----------------------------------------------   Tickets  ----------------------------------------------------
route!(validate_ticket => Post "/tickets/{id}/validate" impl TicketManagement);
/// Door validation by a volunteer. A ticket can only be used once.
pub async fn validate_ticket<B: TicketManagement>(
    path: web::Path<i64>,
    body: web::Json<ValidateTicketRequest>,
    api: web::Data<TicketValidationApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let ticket_id = path.into_inner();
    let ValidateTicketRequest { secure_token, volunteer_id } = body.into_inner();
    let ticket = api.validate_ticket(ticket_id, &secure_token, volunteer_id).await.map_err(|e| {
        info!("💻️ Ticket #{ticket_id} was not admitted by volunteer #{volunteer_id}. {e}");
        ServerError::from(e)
    })?;
    Ok(HttpResponse::Ok().json(ticket))
}

//! Webhook signature middleware for Actix Web.
//!
//! The payment gateway signs every webhook with the merchant's client secret. The signature is
//! `base64(HMAC-SHA256(secret, timestamp || raw_body))` and arrives in the `x-webhook-signature` header, with the
//! timestamp in `x-webhook-timestamp`.
//!
//! Requests with a missing or mismatched signature are rejected with `401 Unauthorized` before they reach the handler,
//! so an unauthenticated notification never changes any state. The raw body is put back on the request after it has
//! been checked, so handlers can extract it as usual.

use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_http::h1;
use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    error::ErrorBadRequest,
    web,
    Error,
};
use cashfree_tools::signature::{verify_webhook_signature, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use futures::future::LocalBoxFuture;
use log::{trace, warn};
use tkt_common::Secret;

use crate::errors::ServerError;

pub struct WebhookSignatureFactory {
    key: Secret<String>,
    // If false, then the middleware will not check the signature and always allow the call
    enabled: bool,
}

impl WebhookSignatureFactory {
    pub fn new(key: Secret<String>, enabled: bool) -> Self {
        WebhookSignatureFactory { key, enabled }
    }
}

impl<S, B> Transform<S, ServiceRequest> for WebhookSignatureFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = WebhookSignatureService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(WebhookSignatureService { key: self.key.clone(), enabled: self.enabled, service: Rc::new(service) }))
    }
}

pub struct WebhookSignatureService<S> {
    key: Secret<String>,
    enabled: bool,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for WebhookSignatureService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let secret = self.key.reveal().clone();
        let enabled = self.enabled;
        Box::pin(async move {
            trace!("🔐️ Checking webhook signature");
            if !enabled {
                trace!("🔐️ Webhook signature checks are disabled. Allowing request.");
                return service.call(req).await;
            }
            let signature = header_value(&req, SIGNATURE_HEADER).ok_or_else(|| {
                warn!("🔐️ No webhook signature found in request. Denying access.");
                Error::from(ServerError::InvalidSignature)
            })?;
            let timestamp = header_value(&req, TIMESTAMP_HEADER).ok_or_else(|| {
                warn!("🔐️ No webhook timestamp found in request. Denying access.");
                Error::from(ServerError::InvalidSignature)
            })?;
            let data = req.extract::<web::Bytes>().await.map_err(|e| {
                warn!("🔐️ Failed to extract request data: {:?}", e);
                ErrorBadRequest("Failed to extract request data.")
            })?;
            if verify_webhook_signature(&secret, &timestamp, data.as_ref(), &signature) {
                trace!("🔐️ Webhook signature check ✅️");
                req.set_payload(bytes_to_payload(data));
                service.call(req).await
            } else {
                warn!("🔐️ Invalid webhook signature found in request. Denying access.");
                Err(ServerError::InvalidSignature.into())
            }
        })
    }
}

fn header_value(req: &ServiceRequest, name: &str) -> Option<String> {
    req.headers().get(name).and_then(|v| v.to_str().ok()).map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn bytes_to_payload(buf: web::Bytes) -> Payload {
    let (_, mut pl) = h1::Payload::create(true);
    pl.unread_data(buf);
    Payload::from(pl)
}

use std::sync::Arc;

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    Method,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    config::{CashfreeConfig, CashfreeEnvironment},
    data_objects::{CreateOrderRequest, GatewayOrder, GatewayPayment},
    CashfreeApiError,
};

#[derive(Clone)]
pub struct CashfreeApi {
    config: CashfreeConfig,
    client: Arc<Client>,
}

impl CashfreeApi {
    pub fn new(config: CashfreeConfig) -> Result<Self, CashfreeApiError> {
        let mut headers = HeaderMap::with_capacity(4);
        let id = HeaderValue::from_str(config.client_id.as_str())
            .map_err(|e| CashfreeApiError::Initialization(e.to_string()))?;
        let secret = HeaderValue::from_str(config.client_secret.reveal().as_str())
            .map_err(|e| CashfreeApiError::Initialization(e.to_string()))?;
        let version = HeaderValue::from_str(config.api_version.as_str())
            .map_err(|e| CashfreeApiError::Initialization(e.to_string()))?;
        headers.insert("x-client-id", id);
        headers.insert("x-client-secret", secret);
        headers.insert("x-api-version", version);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| CashfreeApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn environment(&self) -> CashfreeEnvironment {
        self.config.environment
    }

    pub fn config(&self) -> &CashfreeConfig {
        &self.config
    }

    pub async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, &str)],
        body: Option<B>,
    ) -> Result<T, CashfreeApiError> {
        let url = self.url(path);
        trace!("💳️ Sending REST query: {method} {url}");
        let mut req = self.client.request(method, url);
        if !params.is_empty() {
            req = req.query(params);
        }
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await?;
        if response.status().is_success() {
            trace!("💳️ REST query successful. {}", response.status());
            response.json::<T>().await.map_err(|e| CashfreeApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await?;
            Err(CashfreeApiError::QueryError { status, message })
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.environment.base_url())
    }

    pub async fn create_order(&self, request: CreateOrderRequest) -> Result<GatewayOrder, CashfreeApiError> {
        debug!("💳️ Creating gateway order {}", request.order_id);
        let order_id = request.order_id.clone();
        let result = self.rest_query::<GatewayOrder, _>(Method::POST, "/orders", &[], Some(request)).await?;
        info!("💳️ Created gateway order {order_id} ({})", result.cf_order_id.as_deref().unwrap_or("no cf_order_id"));
        Ok(result)
    }

    pub async fn get_order(&self, order_id: &str) -> Result<GatewayOrder, CashfreeApiError> {
        let path = format!("/orders/{order_id}");
        debug!("💳️ Fetching gateway order {order_id}");
        let result = self.rest_query::<GatewayOrder, ()>(Method::GET, &path, &[], None).await?;
        debug!("💳️ Gateway order {order_id} has status {:?}", result.order_status);
        Ok(result)
    }

    pub async fn get_payments_for_order(&self, order_id: &str) -> Result<Vec<GatewayPayment>, CashfreeApiError> {
        let path = format!("/orders/{order_id}/payments");
        debug!("💳️ Fetching payments for gateway order {order_id}");
        let result = self.rest_query::<Vec<GatewayPayment>, ()>(Method::GET, &path, &[], None).await?;
        debug!("💳️ Gateway order {order_id} has {} payment attempts", result.len());
        Ok(result)
    }
}

//! Payment Gateway HTTP Client
//!
//! Thin JSON client over the gateway's REST API. The deposit flow only needs
//! two calls, exposed through the [`PaymentGateway`] trait so tests can
//! substitute the network.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};
use thiserror::Error;

use super::types::*;
use crate::common::logging::{log_gateway_request, log_gateway_response};

/// Default gateway URL (local deployment)
pub const DEFAULT_URL: &str = "http://localhost:8081";

/// Per-request timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Gateway errors
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("gateway returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("invalid gateway response: {0}")]
    Decode(String),
}

impl GatewayError {
    /// Transport failures and 5xx are worth retrying, 4xx are not
    pub fn is_retryable(&self) -> bool {
        match self {
            GatewayError::Http(_) => true,
            GatewayError::Api { status, .. } => *status >= 500 || *status == 429,
            GatewayError::Decode(_) => false,
        }
    }
}

/// The part of the gateway the deposit flow depends on
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Issue (or re-issue) a deposit address
    async fn create_address(
        &self,
        request: &NewAddressRequest,
    ) -> Result<NewAddressResponse, GatewayError>;

    /// Fetch a page of deposit history
    async fn deposit_history(
        &self,
        query: &HistoryQuery,
    ) -> Result<DepositHistoryResponse, GatewayError>;
}

/// Gateway HTTP client
#[derive(Debug, Clone)]
pub struct GatewayClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl GatewayClient {
    /// Create a client for the given base URL and optional bearer token
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self, GatewayError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
        })
    }

    /// Client for a gateway on localhost
    pub fn local() -> Result<Self, GatewayError> {
        Self::new(DEFAULT_URL, None)
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build(&self, method: Method, endpoint: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, endpoint);
        let builder = self.client.request(method, url);
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    /// Send a request and decode the JSON body
    async fn execute<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        builder: RequestBuilder,
    ) -> Result<T, GatewayError> {
        let correlation_id = uuid::Uuid::new_v4().to_string();
        log_gateway_request(method.as_str(), endpoint, &correlation_id);
        let started = Instant::now();

        let resp = builder.send().await?;
        let status = resp.status();
        log_gateway_response(
            method.as_str(),
            endpoint,
            status.as_u16(),
            started.elapsed().as_millis() as u64,
            &correlation_id,
        );

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GatewayError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = resp.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| GatewayError::Decode(e.to_string()))
    }

    async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<T, GatewayError> {
        let builder = self.build(Method::GET, endpoint).query(params);
        self.execute(Method::GET, endpoint, builder).await
    }

    async fn post<B: serde::Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<T, GatewayError> {
        let builder = self.build(Method::POST, endpoint).json(body);
        self.execute(Method::POST, endpoint, builder).await
    }

    /// POST /v1/address/new
    pub async fn create_new_address(
        &self,
        currency: &str,
        user_id: Option<&str>,
    ) -> Result<NewAddressResponse, GatewayError> {
        let request = NewAddressRequest::new(currency, user_id.map(str::to_string));
        self.post("/v1/address/new", &request).await
    }

    /// GET /v1/address/all?user_id=
    pub async fn get_all_addresses(
        &self,
        user_id: &str,
    ) -> Result<Vec<NewAddressResponse>, GatewayError> {
        self.get("/v1/address/all", &[("user_id", user_id.to_string())])
            .await
    }

    /// GET /v1/deposit/history
    pub async fn get_deposit_history(
        &self,
        query: &HistoryQuery,
    ) -> Result<DepositHistoryResponse, GatewayError> {
        self.get("/v1/deposit/history", &query.to_params()).await
    }

    /// GET /v1/deposit/income?tx_hash=
    pub async fn get_deposit_income(&self, tx_hash: &str) -> Result<IncomeByTxHash, GatewayError> {
        self.get("/v1/deposit/income", &[("tx_hash", tx_hash.to_string())])
            .await
    }

    /// POST /v1/withdrawal/send
    pub async fn send_withdrawal(
        &self,
        request: &WithdrawalRequest,
    ) -> Result<WithdrawalResponse, GatewayError> {
        self.post("/v1/withdrawal/send", request).await
    }

    /// GET /v1/withdrawal/status?id=
    pub async fn get_withdrawal_status(
        &self,
        id: u64,
    ) -> Result<WithdrawalStatusResponse, GatewayError> {
        self.get("/v1/withdrawal/status", &[("id", id.to_string())])
            .await
    }

    /// GET /v1/balance?currency=&address=
    pub async fn get_balance(
        &self,
        currency: &str,
        address: Option<&str>,
    ) -> Result<BalanceResponse, GatewayError> {
        let mut params = vec![("currency", currency.to_string())];
        if let Some(address) = address {
            params.push(("address", address.to_string()));
        }
        self.get("/v1/balance", &params).await
    }

    /// GET /v1/system/sync
    pub async fn get_system_sync(&self) -> Result<SyncResponse, GatewayError> {
        self.get("/v1/system/sync", &[]).await
    }
}

#[async_trait]
impl PaymentGateway for GatewayClient {
    async fn create_address(
        &self,
        request: &NewAddressRequest,
    ) -> Result<NewAddressResponse, GatewayError> {
        self.post("/v1/address/new", request).await
    }

    async fn deposit_history(
        &self,
        query: &HistoryQuery,
    ) -> Result<DepositHistoryResponse, GatewayError> {
        self.get_deposit_history(query).await
    }
}

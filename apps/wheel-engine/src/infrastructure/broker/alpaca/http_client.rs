//! HTTP client wrapper for the trading and market data APIs.
//!
//! One request per call. Retries and circuit breaking happen a layer up in
//! `call_with_retry`, which relies on the error classification done here.

use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::api_types::AlpacaErrorResponse;
use super::config::AlpacaConfig;
use super::error::AlpacaError;
use crate::broker::is_retryable_status;

/// HTTP client for Alpaca API.
#[derive(Debug, Clone)]
pub struct AlpacaHttpClient {
    client: Client,
    api_key: String,
    api_secret: String,
    trading_base_url: String,
    data_base_url: String,
}

/// Which API host a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Api {
    /// Accounts, positions, orders, contracts.
    Trading,
    /// Quotes, trades, option snapshots.
    Data,
}

impl AlpacaHttpClient {
    /// Create a new HTTP client from config.
    pub fn new(config: &AlpacaConfig) -> Result<Self, AlpacaError> {
        if config.api_key.is_empty() || config.api_secret.is_empty() {
            return Err(AlpacaError::AuthenticationFailed);
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AlpacaError::Network(e.to_string()))?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
            trading_base_url: config.trading_base_url().trim_end_matches('/').to_string(),
            data_base_url: config.data_base_url().trim_end_matches('/').to_string(),
        })
    }

    /// GET with query parameters.
    pub async fn get<T: DeserializeOwned>(
        &self,
        api: Api,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, AlpacaError> {
        let request = self.builder(Method::GET, api, path).query(query);
        self.execute(request, path).await
    }

    /// POST a JSON body to the trading API.
    pub async fn post<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, AlpacaError> {
        let request = self.builder(Method::POST, Api::Trading, path).json(body);
        self.execute(request, path).await
    }

    /// PATCH a JSON body to the trading API.
    pub async fn patch<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, AlpacaError> {
        let request = self.builder(Method::PATCH, Api::Trading, path).json(body);
        self.execute(request, path).await
    }

    /// DELETE on the trading API. The response body is ignored.
    pub async fn delete(&self, path: &str) -> Result<(), AlpacaError> {
        let request = self.builder(Method::DELETE, Api::Trading, path);
        let _: Option<serde_json::Value> = self.execute(request, path).await?;
        Ok(())
    }

    fn builder(&self, method: Method, api: Api, path: &str) -> RequestBuilder {
        let base = match api {
            Api::Trading => &self.trading_base_url,
            Api::Data => &self.data_base_url,
        };
        self.client
            .request(method, format!("{base}{path}"))
            .header("APCA-API-KEY-ID", &self.api_key)
            .header("APCA-API-SECRET-KEY", &self.api_secret)
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        path: &str,
    ) -> Result<T, AlpacaError> {
        let response = request
            .send()
            .await
            .map_err(|e| AlpacaError::Network(e.to_string()))?;

        let status = response.status();

        if status.is_success() {
            let text = response
                .text()
                .await
                .map_err(|e| AlpacaError::Network(e.to_string()))?;
            let text = if text.trim().is_empty() { "null" } else { text.as_str() };
            return serde_json::from_str(text).map_err(|e| AlpacaError::JsonParse(e.to_string()));
        }

        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());

        let error_body = response.text().await.unwrap_or_default();

        let (code, message) = match serde_json::from_str::<AlpacaErrorResponse>(&error_body) {
            Ok(err) => (
                err.code
                    .map_or_else(|| status.as_u16().to_string(), |c| c.to_string()),
                err.message,
            ),
            Err(_) => (status.as_u16().to_string(), error_body),
        };

        Err(classify(status, path, code, message, retry_after))
    }
}

fn classify(
    status: StatusCode,
    path: &str,
    code: String,
    message: String,
    retry_after: Option<u64>,
) -> AlpacaError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => AlpacaError::RateLimited {
            retry_after_secs: retry_after.unwrap_or(60),
        },
        StatusCode::UNAUTHORIZED => AlpacaError::AuthenticationFailed,
        StatusCode::NOT_FOUND => AlpacaError::NotFound {
            path: path.to_string(),
        },
        // Alpaca answers 403 for insufficient buying power and 422 for invalid orders.
        StatusCode::FORBIDDEN | StatusCode::UNPROCESSABLE_ENTITY => {
            AlpacaError::OrderRejected(message)
        }
        s if is_retryable_status(s.as_u16()) => AlpacaError::Server {
            status: s.as_u16(),
            message,
        },
        _ => AlpacaError::Api { code, message },
    }
}

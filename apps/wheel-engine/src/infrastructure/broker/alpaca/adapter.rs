//! Alpaca broker adapter implementing BrokerPort.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::application::ports::{
    AccountSnapshot, BrokerError, BrokerPort, ExpirationWindow, OrderAck, OrderSide,
};
use crate::broker::{BrokerRetryPolicy, call_with_retry};
use crate::domain::selection::{OptionContract, OptionSnapshot};
use crate::domain::wheel::{OptionType, Position};
use crate::resilience::BrokerCircuitBreakers;

use super::api_types::{
    AlpacaAccountResponse, AlpacaContractsPage, AlpacaLatestTradesResponse, AlpacaOrderRequest,
    AlpacaOrderResponse, AlpacaPositionResponse, AlpacaReplaceRequest, AlpacaSnapshotsResponse,
};
use super::config::{AlpacaConfig, AlpacaEnvironment};
use super::error::AlpacaError;
use super::http_client::{AlpacaHttpClient, Api};

/// Option snapshot requests carry at most this many symbols.
const SNAPSHOT_BATCH_SIZE: usize = 100;

/// Snapshot batches in flight at once.
const SNAPSHOT_CONCURRENCY: usize = 4;

/// Contracts requested per page.
const CONTRACTS_PAGE_LIMIT: u32 = 1000;

/// Alpaca Markets broker adapter.
///
/// Every call goes through `call_with_retry` under one of three named
/// breakers: `trading` (account, positions, orders), `market_data` (equity
/// trades) and `options` (contracts, snapshots).
#[derive(Debug, Clone)]
pub struct AlpacaBrokerAdapter {
    client: AlpacaHttpClient,
    environment: AlpacaEnvironment,
    retry: BrokerRetryPolicy,
    breakers: Arc<BrokerCircuitBreakers>,
}

impl AlpacaBrokerAdapter {
    /// Create a new Alpaca broker adapter.
    pub fn new(config: AlpacaConfig) -> Result<Self, AlpacaError> {
        let client = AlpacaHttpClient::new(&config)?;
        Ok(Self {
            client,
            environment: config.environment,
            retry: config.retry,
            breakers: Arc::new(BrokerCircuitBreakers::new(
                config.trading_breaker,
                config.market_data_breaker,
                config.options_breaker,
            )),
        })
    }

    /// Check if we're in live trading mode.
    #[must_use]
    pub const fn is_live(&self) -> bool {
        self.environment.is_live()
    }

    /// The adapter's circuit breakers.
    #[must_use]
    pub fn circuit_breakers(&self) -> &BrokerCircuitBreakers {
        &self.breakers
    }

    /// Fetch one batch of option snapshots. Returns the batch index and size
    /// alongside the result so failures can be reported per batch.
    async fn fetch_snapshot_batch(
        &self,
        batch_index: usize,
        batch: Vec<String>,
    ) -> (usize, usize, Result<AlpacaSnapshotsResponse, BrokerError>) {
        let client = &self.client;
        let query = [("symbols", batch.join(","))];
        let query = query.as_slice();
        let result = call_with_retry(
            &self.retry,
            &self.breakers.options,
            "get_option_snapshots",
            || async move {
                client
                    .get(Api::Data, "/v1beta1/options/snapshots", query)
                    .await
                    .map_err(BrokerError::from)
            },
        )
        .await;
        (batch_index, batch.len(), result)
    }

    async fn submit(&self, request: AlpacaOrderRequest) -> Result<OrderAck, BrokerError> {
        if self.is_live() {
            tracing::warn!(
                client_order_id = %request.client_order_id,
                symbol = %request.symbol,
                "Submitting LIVE order - this will execute real trades"
            );
        }

        tracing::info!(
            client_order_id = %request.client_order_id,
            symbol = %request.symbol,
            side = %request.side,
            order_type = %request.order_type,
            qty = %request.qty,
            limit_price = ?request.limit_price,
            "Submitting order to Alpaca"
        );

        let client = &self.client;
        let body = &request;
        let response: AlpacaOrderResponse =
            call_with_retry(&self.retry, &self.breakers.trading, "submit_order", || async move {
                client.post("/v2/orders", body).await.map_err(BrokerError::from)
            })
            .await?;

        let ack = response.to_order_ack().map_err(BrokerError::from)?;
        tracing::info!(
            client_order_id = %request.client_order_id,
            broker_order_id = %ack.order_id,
            status = ?ack.status,
            "Order submitted"
        );
        Ok(ack)
    }

    fn order_request(
        symbol: &str,
        qty: i64,
        side: OrderSide,
        limit_price: Option<Decimal>,
    ) -> AlpacaOrderRequest {
        AlpacaOrderRequest {
            symbol: symbol.to_string(),
            qty: qty.to_string(),
            side: side.as_str().to_string(),
            order_type: if limit_price.is_some() { "limit" } else { "market" }.to_string(),
            time_in_force: "day".to_string(),
            limit_price: limit_price.map(|p| p.round_dp(2).to_string()),
            client_order_id: Uuid::new_v4().to_string(),
        }
    }
}

#[async_trait]
impl BrokerPort for AlpacaBrokerAdapter {
    async fn get_positions(&self) -> Result<Vec<Position>, BrokerError> {
        let client = &self.client;
        let raw: Vec<AlpacaPositionResponse> =
            call_with_retry(&self.retry, &self.breakers.trading, "get_positions", || async move {
                client
                    .get(Api::Trading, "/v2/positions", &[])
                    .await
                    .map_err(BrokerError::from)
            })
            .await?;

        raw.iter()
            .map(|p| p.to_position().map_err(BrokerError::from))
            .collect()
    }

    async fn get_account(&self) -> Result<AccountSnapshot, BrokerError> {
        let client = &self.client;
        let raw: AlpacaAccountResponse =
            call_with_retry(&self.retry, &self.breakers.trading, "get_account", || async move {
                client
                    .get(Api::Trading, "/v2/account", &[])
                    .await
                    .map_err(BrokerError::from)
            })
            .await?;

        raw.to_snapshot().map_err(BrokerError::from)
    }

    async fn get_option_snapshots(
        &self,
        symbols: &[String],
    ) -> Result<HashMap<String, OptionSnapshot>, BrokerError> {
        let requests: Vec<_> = symbols
            .chunks(SNAPSHOT_BATCH_SIZE)
            .map(<[String]>::to_vec)
            .enumerate()
            .map(|(batch_index, batch)| self.fetch_snapshot_batch(batch_index, batch))
            .collect();

        let batches: Vec<_> = stream::iter(requests)
            .buffered(SNAPSHOT_CONCURRENCY)
            .collect()
            .await;

        let mut snapshots = HashMap::with_capacity(symbols.len());
        for (batch_index, batch_len, result) in batches {
            match result {
                Ok(response) => snapshots.extend(
                    response
                        .snapshots
                        .into_iter()
                        .filter_map(|(symbol, raw)| raw.to_snapshot().map(|s| (symbol, s))),
                ),
                Err(e) => {
                    tracing::warn!(
                        batch = batch_index + 1,
                        symbols = batch_len,
                        error = %e,
                        "Option snapshot batch failed, skipping"
                    );
                }
            }
        }

        Ok(snapshots)
    }

    async fn get_options_contracts(
        &self,
        underlyings: &[String],
        option_type: OptionType,
        window: ExpirationWindow,
    ) -> Result<Vec<OptionContract>, BrokerError> {
        if underlyings.is_empty() {
            return Ok(Vec::new());
        }

        let client = &self.client;
        let mut contracts = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![
                ("underlying_symbols", underlyings.join(",")),
                ("status", "active".to_string()),
                ("type", option_type.as_api_str().to_string()),
                ("expiration_date_gte", window.start.to_string()),
                ("expiration_date_lte", window.end.to_string()),
                ("limit", CONTRACTS_PAGE_LIMIT.to_string()),
            ];
            if let Some(token) = page_token.take() {
                query.push(("page_token", token));
            }
            let query = query.as_slice();

            let page: AlpacaContractsPage = call_with_retry(
                &self.retry,
                &self.breakers.options,
                "get_options_contracts",
                || async move {
                    client
                        .get(Api::Trading, "/v2/options/contracts", query)
                        .await
                        .map_err(BrokerError::from)
                },
            )
            .await?;

            for raw in &page.option_contracts {
                contracts.push(raw.to_contract().map_err(BrokerError::from)?);
            }

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        tracing::debug!(
            underlyings = underlyings.len(),
            contracts = contracts.len(),
            option_type = %option_type.as_api_str(),
            "Fetched option contracts"
        );
        Ok(contracts)
    }

    async fn get_latest_trades(
        &self,
        symbols: &[String],
    ) -> Result<HashMap<String, Decimal>, BrokerError> {
        if symbols.is_empty() {
            return Ok(HashMap::new());
        }

        let client = &self.client;
        let query = [("symbols", symbols.join(","))];
        let query = &query;
        let response: AlpacaLatestTradesResponse = call_with_retry(
            &self.retry,
            &self.breakers.market_data,
            "get_latest_trades",
            || async move {
                client
                    .get(Api::Data, "/v2/stocks/trades/latest", query)
                    .await
                    .map_err(BrokerError::from)
            },
        )
        .await?;

        Ok(response
            .trades
            .into_iter()
            .map(|(symbol, trade)| (symbol, trade.p))
            .collect())
    }

    async fn submit_limit_order(
        &self,
        symbol: &str,
        qty: i64,
        side: OrderSide,
        limit_price: Decimal,
    ) -> Result<OrderAck, BrokerError> {
        self.submit(Self::order_request(symbol, qty, side, Some(limit_price)))
            .await
    }

    async fn submit_market_order(
        &self,
        symbol: &str,
        qty: i64,
        side: OrderSide,
    ) -> Result<OrderAck, BrokerError> {
        self.submit(Self::order_request(symbol, qty, side, None)).await
    }

    async fn replace_order(
        &self,
        order_id: &str,
        qty: i64,
        limit_price: Decimal,
    ) -> Result<OrderAck, BrokerError> {
        let client = &self.client;
        let path = format!("/v2/orders/{order_id}");
        let path = path.as_str();
        let body = AlpacaReplaceRequest {
            qty: qty.to_string(),
            limit_price: limit_price.round_dp(2).to_string(),
        };
        let body = &body;

        let response: AlpacaOrderResponse =
            call_with_retry(&self.retry, &self.breakers.trading, "replace_order", || async move {
                client.patch(path, body).await.map_err(BrokerError::from)
            })
            .await?;

        let ack = response.to_order_ack().map_err(BrokerError::from)?;
        tracing::info!(
            order_id,
            new_order_id = %ack.order_id,
            limit_price = %limit_price,
            "Order replaced"
        );
        Ok(ack)
    }

    async fn cancel_order(&self, order_id: &str) -> Result<(), BrokerError> {
        let client = &self.client;
        let path = format!("/v2/orders/{order_id}");
        let path = path.as_str();

        call_with_retry(&self.retry, &self.breakers.trading, "cancel_order", || async move {
            client.delete(path).await.map_err(BrokerError::from)
        })
        .await?;

        tracing::info!(order_id, "Order canceled");
        Ok(())
    }

    async fn get_order(&self, order_id: &str) -> Result<OrderAck, BrokerError> {
        let client = &self.client;
        let path = format!("/v2/orders/{order_id}");
        let path = path.as_str();

        let response: AlpacaOrderResponse =
            call_with_retry(&self.retry, &self.breakers.trading, "get_order", || async move {
                client
                    .get(Api::Trading, path, &[])
                    .await
                    .map_err(BrokerError::from)
            })
            .await?;

        response.to_order_ack().map_err(BrokerError::from)
    }
}

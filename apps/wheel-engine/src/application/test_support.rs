//! Hand-rolled broker and ledger doubles for application tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;

use crate::application::ports::{
    AccountSnapshot, BrokerError, BrokerOrderStatus, BrokerPort, ExpirationWindow, OrderAck,
    OrderSide,
};
use crate::domain::selection::{OptionContract, OptionSnapshot};
use crate::domain::wheel::{OptionType, Position};

#[derive(Default)]
struct Flags {
    fail_limit: bool,
    fail_cancel: bool,
    rekey_on_replace: bool,
    fail_market_symbols: Vec<String>,
    fail_get_order: Vec<String>,
}

/// Scriptable in-memory broker that records every order call.
#[derive(Default)]
pub struct MockBroker {
    next_id: AtomicUsize,
    positions: Mutex<Vec<Position>>,
    account: Mutex<Option<AccountSnapshot>>,
    quotes: Mutex<HashMap<String, OptionSnapshot>>,
    contracts: Mutex<Vec<OptionContract>>,
    trades: Mutex<HashMap<String, Decimal>>,
    orders: Mutex<HashMap<String, OrderAck>>,
    limit_log: Mutex<Vec<(String, i64, OrderSide, Decimal)>>,
    market_log: Mutex<Vec<(String, i64, OrderSide)>>,
    cancel_log: Mutex<Vec<String>>,
    replaces: AtomicUsize,
    position_fetches: AtomicUsize,
    flags: Mutex<Flags>,
}

impl MockBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_order_id(&self) -> String {
        format!("order-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn set_positions(&self, positions: Vec<Position>) {
        *self.positions.lock() = positions;
    }

    pub fn set_account(&self, account: AccountSnapshot) {
        *self.account.lock() = Some(account);
    }

    pub fn set_quote(&self, symbol: &str, bid: Decimal, ask: Decimal) {
        self.set_snapshot(symbol, bid, ask, None);
    }

    pub fn set_snapshot(&self, symbol: &str, bid: Decimal, ask: Decimal, delta: Option<f64>) {
        self.quotes
            .lock()
            .insert(symbol.to_string(), OptionSnapshot { bid, ask, delta });
    }

    pub fn add_contract(&self, contract: OptionContract) {
        self.contracts.lock().push(contract);
    }

    pub fn set_latest_trade(&self, symbol: &str, price: Decimal) {
        self.trades.lock().insert(symbol.to_string(), price);
    }

    pub fn fail_limit_orders(&self, fail: bool) {
        self.flags.lock().fail_limit = fail;
    }

    pub fn fail_cancels(&self, fail: bool) {
        self.flags.lock().fail_cancel = fail;
    }

    pub fn rekey_on_replace(&self, rekey: bool) {
        self.flags.lock().rekey_on_replace = rekey;
    }

    pub fn fail_market_for(&self, symbol: &str) {
        self.flags.lock().fail_market_symbols.push(symbol.to_string());
    }

    pub fn fail_get_order(&self, order_id: &str) {
        self.flags.lock().fail_get_order.push(order_id.to_string());
    }

    pub fn fill(&self, order_id: &str, price: Decimal) {
        if let Some(ack) = self.orders.lock().get_mut(order_id) {
            ack.status = BrokerOrderStatus::Filled;
            ack.filled_avg_price = Some(price);
        }
    }

    pub fn set_status(&self, order_id: &str, status: BrokerOrderStatus) {
        if let Some(ack) = self.orders.lock().get_mut(order_id) {
            ack.status = status;
        }
    }

    pub fn limit_orders(&self) -> Vec<(String, i64, OrderSide, Decimal)> {
        self.limit_log.lock().clone()
    }

    pub fn market_orders(&self) -> Vec<(String, i64, OrderSide)> {
        self.market_log.lock().clone()
    }

    pub fn cancel_count(&self, order_id: &str) -> usize {
        self.cancel_log.lock().iter().filter(|id| *id == order_id).count()
    }

    pub fn replace_count(&self) -> usize {
        self.replaces.load(Ordering::SeqCst)
    }

    pub fn position_fetches(&self) -> usize {
        self.position_fetches.load(Ordering::SeqCst)
    }

    fn open_ack(&self) -> OrderAck {
        let ack = OrderAck {
            order_id: self.next_order_id(),
            status: BrokerOrderStatus::Open,
            filled_avg_price: None,
        };
        self.orders.lock().insert(ack.order_id.clone(), ack.clone());
        ack
    }
}

#[async_trait]
impl BrokerPort for MockBroker {
    async fn get_positions(&self) -> Result<Vec<Position>, BrokerError> {
        self.position_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.positions.lock().clone())
    }

    async fn get_account(&self) -> Result<AccountSnapshot, BrokerError> {
        (*self.account.lock()).ok_or_else(|| BrokerError::Connection {
            message: "no account scripted".to_string(),
        })
    }

    async fn get_option_snapshots(
        &self,
        symbols: &[String],
    ) -> Result<HashMap<String, OptionSnapshot>, BrokerError> {
        let quotes = self.quotes.lock();
        Ok(symbols
            .iter()
            .filter_map(|s| quotes.get(s).map(|q| (s.clone(), *q)))
            .collect())
    }

    async fn get_options_contracts(
        &self,
        underlyings: &[String],
        option_type: OptionType,
        window: ExpirationWindow,
    ) -> Result<Vec<OptionContract>, BrokerError> {
        Ok(self
            .contracts
            .lock()
            .iter()
            .filter(|c| {
                underlyings.contains(&c.underlying)
                    && c.option_type == option_type
                    && c.expiration >= window.start
                    && c.expiration <= window.end
            })
            .cloned()
            .collect())
    }

    async fn get_latest_trades(
        &self,
        symbols: &[String],
    ) -> Result<HashMap<String, Decimal>, BrokerError> {
        let trades = self.trades.lock();
        Ok(symbols
            .iter()
            .filter_map(|s| trades.get(s).map(|p| (s.clone(), *p)))
            .collect())
    }

    async fn submit_limit_order(
        &self,
        symbol: &str,
        qty: i64,
        side: OrderSide,
        limit_price: Decimal,
    ) -> Result<OrderAck, BrokerError> {
        if self.flags.lock().fail_limit {
            return Err(BrokerError::OrderRejected {
                reason: "scripted rejection".to_string(),
            });
        }
        self.limit_log
            .lock()
            .push((symbol.to_string(), qty, side, limit_price));
        Ok(self.open_ack())
    }

    async fn submit_market_order(
        &self,
        symbol: &str,
        qty: i64,
        side: OrderSide,
    ) -> Result<OrderAck, BrokerError> {
        if self
            .flags
            .lock()
            .fail_market_symbols
            .iter()
            .any(|s| s == symbol)
        {
            return Err(BrokerError::OrderRejected {
                reason: format!("scripted rejection for {symbol}"),
            });
        }
        self.market_log.lock().push((symbol.to_string(), qty, side));
        Ok(self.open_ack())
    }

    async fn replace_order(
        &self,
        order_id: &str,
        _qty: i64,
        _limit_price: Decimal,
    ) -> Result<OrderAck, BrokerError> {
        self.replaces.fetch_add(1, Ordering::SeqCst);
        if self.flags.lock().rekey_on_replace {
            self.orders.lock().remove(order_id);
            return Ok(self.open_ack());
        }
        self.orders
            .lock()
            .get(order_id)
            .cloned()
            .ok_or_else(|| BrokerError::NotFound {
                resource: order_id.to_string(),
            })
    }

    async fn cancel_order(&self, order_id: &str) -> Result<(), BrokerError> {
        if self.flags.lock().fail_cancel {
            return Err(BrokerError::Server {
                status: 500,
                message: "scripted cancel failure".to_string(),
            });
        }
        self.cancel_log.lock().push(order_id.to_string());
        self.set_status(order_id, BrokerOrderStatus::Canceled);
        Ok(())
    }

    async fn get_order(&self, order_id: &str) -> Result<OrderAck, BrokerError> {
        if self.flags.lock().fail_get_order.iter().any(|id| id == order_id) {
            return Err(BrokerError::Connection {
                message: "scripted poll failure".to_string(),
            });
        }
        self.orders
            .lock()
            .get(order_id)
            .cloned()
            .ok_or_else(|| BrokerError::NotFound {
                resource: order_id.to_string(),
            })
    }
}

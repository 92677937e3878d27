//! End-to-end wheel cycles against a scripted broker and the in-memory ledger.
//!
//! Covers the full put → assignment → covered call path through the public
//! API, plus the runner's single-shot and shutdown behavior.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio_util::sync::CancellationToken;

use wheel_engine::application::order_manager::{OrderManager, OrderManagerConfig};
use wheel_engine::application::ports::{
    AccountSnapshot, BrokerError, BrokerOrderStatus, BrokerPort, ExpirationWindow, LedgerPort,
    OrderAck, OrderSide, PremiumStatus, TradeType,
};
use wheel_engine::application::services::{RunnerConfig, StateManager, StrategyRunner};
use wheel_engine::application::use_cases::{ContractSizing, CycleOrchestrator, CycleSettings};
use wheel_engine::domain::market_hours::trading_date;
use wheel_engine::domain::rolling::RollPolicy;
use wheel_engine::domain::selection::{OptionContract, OptionSnapshot, ScoringSelector};
use wheel_engine::domain::wheel::{OptionSymbol, OptionType, Position, WheelStateKind};
use wheel_engine::infrastructure::events::TracingEventPublisher;
use wheel_engine::infrastructure::persistence::InMemoryLedger;

// =============================================================================
// Scripted broker
// =============================================================================

#[derive(Default)]
struct ScriptedBroker {
    next_id: AtomicUsize,
    auto_fill: bool,
    positions: Mutex<Vec<Position>>,
    contracts: Mutex<Vec<OptionContract>>,
    snapshots: Mutex<HashMap<String, OptionSnapshot>>,
    trades: Mutex<HashMap<String, Decimal>>,
    orders: Mutex<HashMap<String, (String, Decimal, BrokerOrderStatus)>>,
    canceled: Mutex<Vec<String>>,
}

impl ScriptedBroker {
    fn new(auto_fill: bool) -> Self {
        Self {
            auto_fill,
            ..Self::default()
        }
    }

    fn list_option(
        &self,
        underlying: &str,
        option_type: OptionType,
        strike: Decimal,
        expiration: NaiveDate,
        bid: Decimal,
    ) -> String {
        let symbol = OptionSymbol::new(underlying, expiration, option_type, strike).encode();
        self.contracts.lock().push(OptionContract {
            symbol: symbol.clone(),
            underlying: underlying.to_string(),
            option_type,
            strike,
            expiration,
            open_interest: Some(800),
        });
        self.snapshots.lock().insert(
            symbol.clone(),
            OptionSnapshot {
                bid,
                ask: bid + dec!(0.10),
                delta: Some(if option_type == OptionType::Put { -0.22 } else { 0.22 }),
            },
        );
        symbol
    }

    fn fill_all(&self) {
        for (_, price, status) in self.orders.lock().values_mut() {
            if !status.is_terminal() {
                *status = BrokerOrderStatus::Filled;
                *price += dec!(0.02);
            }
        }
    }

    fn submitted_symbols(&self) -> Vec<String> {
        self.orders.lock().values().map(|(s, _, _)| s.clone()).collect()
    }
}

#[async_trait]
impl BrokerPort for ScriptedBroker {
    async fn get_positions(&self) -> Result<Vec<Position>, BrokerError> {
        Ok(self.positions.lock().clone())
    }

    async fn get_account(&self) -> Result<AccountSnapshot, BrokerError> {
        Ok(AccountSnapshot {
            non_marginable_buying_power: dec!(10000),
            options_buying_power: dec!(8000),
            portfolio_value: dec!(25000),
        })
    }

    async fn get_option_snapshots(
        &self,
        symbols: &[String],
    ) -> Result<HashMap<String, OptionSnapshot>, BrokerError> {
        let snapshots = self.snapshots.lock();
        Ok(symbols
            .iter()
            .filter_map(|s| snapshots.get(s).map(|q| (s.clone(), *q)))
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
                    && (window.start..=window.end).contains(&c.expiration)
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
        _qty: i64,
        _side: OrderSide,
        limit_price: Decimal,
    ) -> Result<OrderAck, BrokerError> {
        let order_id = format!("ord-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.orders.lock().insert(
            order_id.clone(),
            (symbol.to_string(), limit_price, BrokerOrderStatus::Open),
        );
        Ok(OrderAck {
            order_id,
            status: BrokerOrderStatus::Open,
            filled_avg_price: None,
        })
    }

    async fn submit_market_order(
        &self,
        symbol: &str,
        qty: i64,
        side: OrderSide,
    ) -> Result<OrderAck, BrokerError> {
        self.submit_limit_order(symbol, qty, side, Decimal::ZERO).await
    }

    async fn replace_order(
        &self,
        order_id: &str,
        _qty: i64,
        limit_price: Decimal,
    ) -> Result<OrderAck, BrokerError> {
        let mut orders = self.orders.lock();
        let (_, price, status) = orders.get_mut(order_id).ok_or_else(|| BrokerError::NotFound {
            resource: order_id.to_string(),
        })?;
        *price = limit_price;
        Ok(OrderAck {
            order_id: order_id.to_string(),
            status: *status,
            filled_avg_price: None,
        })
    }

    async fn cancel_order(&self, order_id: &str) -> Result<(), BrokerError> {
        if let Some((_, _, status)) = self.orders.lock().get_mut(order_id) {
            *status = BrokerOrderStatus::Canceled;
        }
        self.canceled.lock().push(order_id.to_string());
        Ok(())
    }

    async fn get_order(&self, order_id: &str) -> Result<OrderAck, BrokerError> {
        if self.auto_fill {
            self.fill_all();
        }
        let orders = self.orders.lock();
        let (_, price, status) = orders.get(order_id).ok_or_else(|| BrokerError::NotFound {
            resource: order_id.to_string(),
        })?;
        Ok(OrderAck {
            order_id: order_id.to_string(),
            status: *status,
            filled_avg_price: (*status == BrokerOrderStatus::Filled).then_some(*price),
        })
    }
}

// =============================================================================
// Wiring
// =============================================================================

type Orchestrator =
    CycleOrchestrator<ScriptedBroker, InMemoryLedger, TracingEventPublisher, ScoringSelector>;

struct Harness {
    broker: Arc<ScriptedBroker>,
    ledger: Arc<InMemoryLedger>,
    events: Arc<TracingEventPublisher>,
    orchestrator: Arc<Orchestrator>,
}

fn harness(auto_fill: bool) -> Harness {
    let broker = Arc::new(ScriptedBroker::new(auto_fill));
    let ledger = Arc::new(InMemoryLedger::new());
    let events = Arc::new(TracingEventPublisher::new());
    let orders = Arc::new(OrderManager::new(
        Arc::clone(&broker),
        Arc::clone(&events),
        OrderManagerConfig::default(),
    ));
    let orchestrator = Arc::new(CycleOrchestrator::new(
        Arc::clone(&broker),
        Arc::clone(&ledger),
        Arc::clone(&events),
        Arc::new(ScoringSelector::default()),
        Arc::new(StateManager::new()),
        orders,
        CycleSettings {
            symbols: vec!["AAA".to_string()],
            allocation_percentage: dec!(0.5),
            max_wheel_layers: 2,
            sizing: ContractSizing::default(),
            rolling: RollPolicy::default(),
        },
    ));
    broker.trades.lock().insert("AAA".to_string(), dec!(21.50));
    Harness {
        broker,
        ledger,
        events,
        orchestrator,
    }
}

fn monday_morning() -> DateTime<Utc> {
    // 2025-01-13 11:00 New York
    Utc.with_ymd_and_hms(2025, 1, 13, 16, 0, 0).unwrap()
}

fn always_open(_: DateTime<Utc>) -> bool {
    true
}

fn fast_runner(once: bool) -> RunnerConfig {
    RunnerConfig {
        cycle_interval: Duration::from_secs(3600),
        update_interval: Duration::from_millis(10),
        market_check_interval: Duration::from_millis(10),
        poll_sleep: Duration::from_millis(5),
        once,
    }
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn put_assignment_then_covered_call() {
    let h = harness(false);
    let expiry = NaiveDate::from_ymd_opt(2025, 1, 24).unwrap();
    let put = h
        .broker
        .list_option("AAA", OptionType::Put, dec!(20), expiry, dec!(0.40));

    // Cycle 1: flat account, one put goes out.
    let first = h.orchestrator.run_cycle(monday_morning()).await.unwrap();
    assert_eq!(first.puts_submitted, 1);
    assert_eq!(first.calls_submitted, 0);
    assert_eq!(h.broker.submitted_symbols(), vec![put.clone()]);

    h.broker.fill_all();
    h.orchestrator.reconcile_orders().await;
    assert!(!h.orchestrator.order_manager().has_pending_orders());

    let trades = h.ledger.trades();
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].trade_type, TradeType::SellPut);

    // Assignment: the put is gone, 100 shares at the strike remain.
    *h.broker.positions.lock() = vec![Position::equity("AAA", 100, dec!(20))];
    let call = h
        .broker
        .list_option("AAA", OptionType::Call, dec!(22), expiry, dec!(0.30));

    // Cycle 2: shares get a covered call above the entry price.
    let second = h.orchestrator.run_cycle(monday_morning()).await.unwrap();
    assert_eq!(second.states["AAA"], WheelStateKind::LongShares);
    assert_eq!(second.calls_submitted, 1);
    assert!(h.broker.submitted_symbols().contains(&call));

    // The call is still working, so its premium is not in the basis yet.
    let basis = h.ledger.get_adjusted_cost_basis("AAA").await.unwrap().unwrap();
    assert_eq!(basis.original_cost, dec!(20));
    assert_eq!(basis.adjusted_cost, dec!(20));

    // Limit at the 0.35 mid, filled two cents better.
    h.broker.fill_all();
    h.orchestrator.reconcile_orders().await;
    let basis = h.ledger.get_adjusted_cost_basis("AAA").await.unwrap().unwrap();
    assert_eq!(basis.adjusted_cost, dec!(19.63));

    let stats = h.ledger.get_summary_stats(Some("AAA")).await.unwrap();
    assert_eq!(stats.call_trades, 1);
    assert!(stats.put_trades >= 1);

    // Placed, filled and two cycle summaries at minimum.
    assert!(h.events.published() >= 4);
}

#[tokio::test]
async fn single_shot_runner_waits_for_fills() {
    let h = harness(true);
    let expiry = trading_date(Utc::now()) + chrono::Duration::days(10);
    h.broker
        .list_option("AAA", OptionType::Put, dec!(20), expiry, dec!(0.40));

    let runner = StrategyRunner::new(
        Arc::clone(&h.orchestrator),
        fast_runner(true),
        CancellationToken::new(),
    )
    .with_market_check(always_open);

    let stats = tokio::time::timeout(Duration::from_secs(5), runner.run())
        .await
        .expect("single-shot run should finish once orders fill");

    assert_eq!(stats.cycles, 1);
    assert_eq!(stats.failed_cycles, 0);
    assert_eq!(stats.cancelled_at_shutdown, 0);
    assert_eq!(h.ledger.trades().len(), 1);
    assert!(h.broker.canceled.lock().is_empty());
}

#[tokio::test]
async fn shutdown_cancels_working_orders() {
    let h = harness(false);
    let expiry = trading_date(Utc::now()) + chrono::Duration::days(10);
    h.broker
        .list_option("AAA", OptionType::Put, dec!(20), expiry, dec!(0.40));

    let shutdown = CancellationToken::new();
    let runner = StrategyRunner::new(
        Arc::clone(&h.orchestrator),
        fast_runner(false),
        shutdown.clone(),
    )
    .with_market_check(always_open);

    let trigger = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown.cancel();
    });

    let stats = tokio::time::timeout(Duration::from_secs(5), runner.run())
        .await
        .expect("runner should stop on shutdown");
    trigger.await.unwrap();

    assert_eq!(stats.cycles, 1);
    assert_eq!(stats.cancelled_at_shutdown, 1);
    assert_eq!(h.broker.canceled.lock().len(), 1);
    assert!(!h.orchestrator.order_manager().has_pending_orders());
    assert!(h.ledger.trades().is_empty());

    let premiums = h.ledger.get_premium_history(Some("AAA"), None, None).await.unwrap();
    assert_eq!(premiums.len(), 1);
    assert_eq!(premiums[0].status, PremiumStatus::Cancelled);
}

#[tokio::test]
async fn continuous_runner_reconciles_when_intervals_match() {
    let h = harness(false);
    let expiry = trading_date(Utc::now()) + chrono::Duration::days(10);
    h.broker
        .list_option("AAA", OptionType::Put, dec!(20), expiry, dec!(0.40));

    let shutdown = CancellationToken::new();
    let runner = StrategyRunner::new(
        Arc::clone(&h.orchestrator),
        RunnerConfig {
            cycle_interval: Duration::from_millis(40),
            update_interval: Duration::from_millis(40),
            ..fast_runner(false)
        },
        shutdown.clone(),
    )
    .with_market_check(always_open);
    let handle = tokio::spawn(async move { runner.run().await });

    tokio::time::timeout(Duration::from_secs(2), async {
        while h.broker.orders.lock().is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("a put should be submitted");
    h.broker.fill_all();

    tokio::time::timeout(Duration::from_secs(2), async {
        while h.ledger.trades().is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("the fill should reach the ledger");

    shutdown.cancel();
    let stats = handle.await.unwrap();
    assert!(stats.cycles >= 1);
    assert_eq!(h.ledger.trades()[0].trade_type, TradeType::SellPut);

    let stats = h.ledger.get_summary_stats(Some("AAA")).await.unwrap();
    assert!(stats.put_trades >= 1);
}

//! Run Cycle Use Case
//!
//! One pass of the wheel strategy:
//!
//! 1. Read the account and allocate buying power
//! 2. Roll near-expiry puts, refetching positions if any leg executed
//! 3. Derive counts, risk and per-underlying state
//! 4. Sell covered calls against held shares
//! 5. Sell puts on underlyings with a free layer
//!
//! Fills are picked up separately by [`CycleOrchestrator::reconcile_orders`],
//! which the runner calls on the shorter update interval.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use super::roll_positions::RollEngine;
use super::sell_options::{ContractSizing, OptionSeller, PutSaleRequest};
use crate::application::order_manager::{
    OrderKind, OrderManager, PendingOrder, PollOutcome, PollStatus,
};
use crate::application::ports::{
    BrokerPort, CandidateSelector, CycleSummaryEvent, EventPublisherPort, LedgerPort, NewTrade,
    PositionStatus, PositionType, PremiumStatus, TradeType, WheelEvent, publish_or_log,
};
use crate::application::services::StateManager;
use crate::domain::capacity::{allocated_balance, usable_buying_power};
use crate::domain::market_hours::trading_date;
use crate::domain::rolling::RollPolicy;
use crate::domain::wheel::{WheelState, WheelStateKind};
use crate::error::EngineError;

/// Strategy parameters for a cycle.
#[derive(Debug, Clone)]
pub struct CycleSettings {
    /// Enabled underlyings, in configuration order.
    pub symbols: Vec<String>,
    /// Fraction of non-marginable buying power the strategy may use.
    pub allocation_percentage: Decimal,
    /// Wheel layers per underlying.
    pub max_wheel_layers: u32,
    /// Contracts per put order.
    pub sizing: ContractSizing,
    /// Rolling settings and overrides.
    pub rolling: RollPolicy,
}

/// What one cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleSummary {
    /// Covered calls submitted.
    pub calls_submitted: usize,
    /// Puts submitted.
    pub puts_submitted: usize,
    /// Successful rolls.
    pub rolls: usize,
    /// Rolls that closed the old contract but did not open the new one.
    pub partial_rolls: usize,
    /// Underlyings allowed to take new puts after the cycle.
    pub allowed_symbols: Vec<String>,
    /// Buying power available to puts at the start of selling.
    pub buying_power: Decimal,
    /// Capital at risk.
    pub risk: Decimal,
    /// Derived state per underlying.
    pub states: BTreeMap<String, WheelStateKind>,
}

impl CycleSummary {
    /// Orders submitted this cycle.
    #[must_use]
    pub const fn orders_submitted(&self) -> usize {
        self.calls_submitted + self.puts_submitted
    }
}

/// Drives one strategy cycle and fill reconciliation.
pub struct CycleOrchestrator<B, L, E, S>
where
    B: BrokerPort + ?Sized,
    L: LedgerPort + ?Sized,
    E: EventPublisherPort + ?Sized,
    S: CandidateSelector + ?Sized,
{
    broker: Arc<B>,
    ledger: Arc<L>,
    events: Arc<E>,
    state: Arc<StateManager>,
    orders: Arc<OrderManager<B, E>>,
    rolls: RollEngine<B, L, E, S>,
    seller: OptionSeller<B, L, E, S>,
    settings: CycleSettings,
}

impl<B, L, E, S> CycleOrchestrator<B, L, E, S>
where
    B: BrokerPort + ?Sized,
    L: LedgerPort + ?Sized,
    E: EventPublisherPort + ?Sized,
    S: CandidateSelector + ?Sized,
{
    /// Wire an orchestrator from its collaborators.
    pub fn new(
        broker: Arc<B>,
        ledger: Arc<L>,
        events: Arc<E>,
        selector: Arc<S>,
        state: Arc<StateManager>,
        orders: Arc<OrderManager<B, E>>,
        settings: CycleSettings,
    ) -> Self {
        let rolls = RollEngine::new(
            Arc::clone(&broker),
            Arc::clone(&ledger),
            Arc::clone(&events),
            Arc::clone(&selector),
            settings.rolling.clone(),
        );
        let seller = OptionSeller::new(
            Arc::clone(&broker),
            Arc::clone(&ledger),
            Arc::clone(&orders),
            selector,
            settings.sizing.clone(),
        );
        Self {
            broker,
            ledger,
            events,
            state,
            orders,
            rolls,
            seller,
            settings,
        }
    }

    /// The order manager this orchestrator submits through.
    pub const fn order_manager(&self) -> &Arc<OrderManager<B, E>> {
        &self.orders
    }

    /// Run one strategy cycle at `now`.
    ///
    /// # Errors
    ///
    /// Broker and ledger failures end the cycle early. Positions that violate
    /// the wheel invariants end it with a fatal `DATA_INTEGRITY` error.
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> Result<CycleSummary, EngineError> {
        if self.settings.symbols.is_empty() {
            tracing::warn!("No enabled symbols, skipping cycle");
            return Ok(CycleSummary::default());
        }
        let today = trading_date(now);

        let account = self.broker.get_account().await?;
        let allocated = allocated_balance(
            account.non_marginable_buying_power,
            self.settings.allocation_percentage,
        );
        tracing::info!(
            non_marginable_buying_power = %account.non_marginable_buying_power,
            options_buying_power = %account.options_buying_power,
            portfolio_value = %account.portfolio_value,
            allocated = %allocated,
            "Account snapshot"
        );

        let mut positions = self.broker.get_positions().await?;
        let rolls = self.rolls.process_rolls(&positions, today).await;
        if rolls.positions_changed() {
            positions = self.broker.get_positions().await?;
        }

        let risk = self.state.calculate_risk(&positions)?;
        let counts = self.state.count_positions(&positions)?;
        let states = self.state.update_state(&positions)?;

        tracing::info!(
            risk = %risk,
            underlyings = states.len(),
            positions = positions.len(),
            "Derived wheel state"
        );

        let calls_submitted = self.sell_calls(&states, today).await?;

        let max_layers = self.settings.max_wheel_layers;
        let allowed: Vec<String> = self
            .settings
            .symbols
            .iter()
            .filter(|s| {
                self.state.is_position_allowed(s, max_layers)
                    && !self.orders.has_pending_for(s, OrderKind::Put)
            })
            .cloned()
            .collect();

        let buying_power = usable_buying_power(account.options_buying_power, allocated);
        tracing::info!(
            buying_power = %buying_power,
            allowed = ?allowed,
            "Put capacity"
        );

        let (puts_submitted, allowed_symbols) = if buying_power > Decimal::ZERO && !allowed.is_empty() {
            let sales = self
                .seller
                .sell_puts(
                    PutSaleRequest {
                        allowed,
                        buying_power,
                        counts: &counts,
                        max_layers,
                    },
                    today,
                )
                .await?;
            (sales.order_ids.len(), sales.allowed)
        } else {
            (0, allowed)
        };

        let summary = CycleSummary {
            calls_submitted,
            puts_submitted,
            rolls: rolls.completed,
            partial_rolls: rolls.partial,
            allowed_symbols,
            buying_power,
            risk,
            states: states.iter().map(|(s, st)| (s.clone(), st.kind())).collect(),
        };

        tracing::info!(
            calls = summary.calls_submitted,
            puts = summary.puts_submitted,
            rolls = summary.rolls,
            partial_rolls = summary.partial_rolls,
            buying_power = %summary.buying_power,
            risk = %summary.risk,
            "Cycle complete"
        );

        publish_or_log(
            self.events.as_ref(),
            WheelEvent::CycleSummary(CycleSummaryEvent {
                orders_submitted: summary.orders_submitted(),
                rolls: summary.rolls,
                allowed_symbols: summary.allowed_symbols.clone(),
                buying_power: summary.buying_power,
                risk: summary.risk,
                occurred_at: now,
            }),
        )
        .await;

        Ok(summary)
    }

    async fn sell_calls(
        &self,
        states: &BTreeMap<String, WheelState>,
        today: NaiveDate,
    ) -> Result<usize, EngineError> {
        let mut submitted = 0;

        for (symbol, state) in states {
            let WheelState::LongShares {
                entry_price,
                share_qty,
                ..
            } = state
            else {
                continue;
            };
            if self.orders.has_pending_for(symbol, OrderKind::Call) {
                continue;
            }

            let open = self
                .ledger
                .get_position_history(Some(symbol), Some(PositionType::Stock), Some(PositionStatus::Open))
                .await?;
            if open.is_empty() {
                tracing::info!(symbol = %symbol, shares = share_qty, entry_price = %entry_price, "Recording stock position");
                self.ledger
                    .add_position(symbol, PositionType::Stock, *share_qty, *entry_price)
                    .await?;
            }

            let state = match self.ledger.get_adjusted_cost_basis(symbol).await? {
                Some(basis) => state.clone().with_adjusted_entry_price(basis.adjusted_cost),
                None => state.clone(),
            };

            if self.seller.sell_call(symbol, &state, today).await?.is_some() {
                submitted += 1;
            }
        }

        Ok(submitted)
    }

    /// Poll working orders and settle their outcomes in the ledger.
    ///
    /// Fills become trades and collected premiums at the fill price. Orders
    /// that end unfilled void their pending premium. Ledger failures are
    /// logged; the broker side has already happened.
    pub async fn reconcile_orders(&self) -> BTreeMap<String, PollOutcome> {
        let results = self.orders.update_pending_orders().await;

        for outcome in results.values() {
            let Some(order) = &outcome.order else {
                continue;
            };
            match outcome.status {
                PollStatus::Filled => self.record_fill(order, outcome.fill_price).await,
                PollStatus::Canceled | PollStatus::Expired => self.void_premium(order).await,
                _ => {}
            }
        }

        results
    }

    async fn record_fill(&self, order: &PendingOrder, fill_price: Option<Decimal>) {
        let fill = fill_price.unwrap_or(order.limit_price);
        if let Some(premium_id) = order.premium_id {
            if let Err(e) = self
                .ledger
                .settle_premium(premium_id, PremiumStatus::Collected, Some(fill))
                .await
            {
                tracing::error!(order_id = %order.order_id, premium_id, error = %e, "Failed to settle premium");
            }
        }

        let trade_type = match order.kind {
            OrderKind::Put => TradeType::SellPut,
            OrderKind::Call => TradeType::SellCall,
            OrderKind::Stock => return,
        };
        let trade = NewTrade {
            symbol: order.underlying.clone(),
            trade_type,
            quantity: order.quantity,
            price: fill,
            strike: order.strike,
            expiration: order.expiration,
            premium: Some(fill),
            notes: Some(format!("Filled {}", order.symbol)),
        };
        if let Err(e) = self.ledger.add_trade(trade).await {
            tracing::error!(order_id = %order.order_id, symbol = %order.symbol, error = %e, "Failed to record fill");
        }
    }

    async fn void_premium(&self, order: &PendingOrder) {
        let Some(premium_id) = order.premium_id else {
            return;
        };
        if let Err(e) = self
            .ledger
            .settle_premium(premium_id, PremiumStatus::Cancelled, None)
            .await
        {
            tracing::error!(order_id = %order.order_id, premium_id, error = %e, "Failed to void premium");
        }
    }

    /// Cancel everything still working and void their premiums. Used at shutdown.
    pub async fn cancel_all_pending(&self) -> usize {
        let cancelled = self.orders.cancel_all().await;
        for order in &cancelled {
            self.void_premium(order).await;
        }
        cancelled.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::order_manager::OrderManagerConfig;
    use crate::application::ports::{AccountSnapshot, NoOpEventPublisher, OrderSide};
    use crate::application::test_support::MockBroker;
    use crate::domain::rolling::RollingSettings;
    use crate::domain::selection::{OptionContract, ScoringSelector};
    use crate::domain::wheel::{OptionSymbol, OptionType, Position};
    use crate::error::ErrorCode;
    use crate::infrastructure::persistence::InMemoryLedger;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    type Orchestrator = CycleOrchestrator<MockBroker, InMemoryLedger, NoOpEventPublisher, ScoringSelector>;

    fn now() -> DateTime<Utc> {
        // Monday 2025-01-13 11:00 New York
        Utc.with_ymd_and_hms(2025, 1, 13, 16, 0, 0).unwrap()
    }

    fn expiry() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 24).unwrap()
    }

    fn add_option(broker: &MockBroker, underlying: &str, option_type: OptionType, strike: Decimal, bid: Decimal) -> String {
        let symbol = OptionSymbol::new(underlying, expiry(), option_type, strike).encode();
        broker.add_contract(OptionContract {
            symbol: symbol.clone(),
            underlying: underlying.to_string(),
            option_type,
            strike,
            expiration: expiry(),
            open_interest: Some(500),
        });
        broker.set_snapshot(&symbol, bid, bid + dec!(0.10), Some(0.22));
        symbol
    }

    fn settings(symbols: &[&str]) -> CycleSettings {
        CycleSettings {
            symbols: symbols.iter().map(ToString::to_string).collect(),
            allocation_percentage: dec!(0.5),
            max_wheel_layers: 2,
            sizing: ContractSizing::default(),
            rolling: RollPolicy {
                settings: RollingSettings::default(),
                overrides: std::collections::HashMap::new(),
            },
        }
    }

    fn setup(symbols: &[&str]) -> (Arc<MockBroker>, Arc<InMemoryLedger>, Orchestrator) {
        setup_with(settings(symbols))
    }

    fn setup_with(settings: CycleSettings) -> (Arc<MockBroker>, Arc<InMemoryLedger>, Orchestrator) {
        let broker = Arc::new(MockBroker::new());
        let ledger = Arc::new(InMemoryLedger::new());
        let events = Arc::new(NoOpEventPublisher);
        let orders = Arc::new(OrderManager::new(
            Arc::clone(&broker),
            Arc::clone(&events),
            OrderManagerConfig::default(),
        ));
        let orchestrator = CycleOrchestrator::new(
            Arc::clone(&broker),
            Arc::clone(&ledger),
            events,
            Arc::new(ScoringSelector::default()),
            Arc::new(StateManager::new()),
            orders,
            settings,
        );
        broker.set_account(AccountSnapshot {
            non_marginable_buying_power: dec!(10000),
            options_buying_power: dec!(8000),
            portfolio_value: dec!(20000),
        });
        (broker, ledger, orchestrator)
    }

    #[tokio::test]
    async fn no_symbols_returns_empty_summary() {
        let (broker, _ledger, orchestrator) = setup(&[]);
        let summary = orchestrator.run_cycle(now()).await.unwrap();
        assert_eq!(summary, CycleSummary::default());
        assert!(broker.limit_orders().is_empty());
    }

    #[tokio::test]
    async fn sells_puts_within_allocated_buying_power() {
        let (broker, ledger, orchestrator) = setup(&["AAA", "BBB"]);
        broker.set_latest_trade("AAA", dec!(22));
        broker.set_latest_trade("BBB", dec!(31));
        add_option(&broker, "AAA", OptionType::Put, dec!(20), dec!(0.40));
        add_option(&broker, "BBB", OptionType::Put, dec!(30), dec!(0.50));

        let summary = orchestrator.run_cycle(now()).await.unwrap();

        // min(8000, 10000 × 0.5) = 5000: AAA (2000) then BBB (3000)
        assert_eq!(summary.buying_power, dec!(5000));
        assert_eq!(summary.puts_submitted, 2);
        assert_eq!(summary.calls_submitted, 0);
        assert_eq!(broker.limit_orders().len(), 2);
        assert!(orchestrator.order_manager().has_pending_for("AAA", OrderKind::Put));
        assert_eq!(ledger.get_premium_history(None, None, None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn working_put_blocks_another_put() {
        let (broker, _ledger, orchestrator) = setup(&["AAA"]);
        broker.set_latest_trade("AAA", dec!(22));
        add_option(&broker, "AAA", OptionType::Put, dec!(20), dec!(0.40));

        orchestrator.run_cycle(now()).await.unwrap();
        let second = orchestrator.run_cycle(now()).await.unwrap();

        assert_eq!(second.puts_submitted, 0);
        assert!(second.allowed_symbols.is_empty());
        assert_eq!(broker.limit_orders().len(), 1);
    }

    #[tokio::test]
    async fn held_shares_get_a_covered_call_and_a_ledger_position() {
        let (broker, ledger, orchestrator) = setup(&["BBB"]);
        broker.set_positions(vec![Position::equity("BBB", 100, dec!(10))]);
        let call = add_option(&broker, "BBB", OptionType::Call, dec!(11), dec!(0.20));

        let summary = orchestrator.run_cycle(now()).await.unwrap();

        assert_eq!(summary.calls_submitted, 1);
        assert_eq!(summary.states["BBB"], WheelStateKind::LongShares);
        assert_eq!(broker.limit_orders()[0].0, call);
        assert_eq!(broker.limit_orders()[0].2, OrderSide::Sell);

        let stock = ledger
            .get_position_history(Some("BBB"), Some(PositionType::Stock), Some(PositionStatus::Open))
            .await
            .unwrap();
        assert_eq!(stock.len(), 1);
        assert_eq!(stock[0].quantity, 100);
    }

    #[tokio::test]
    async fn integrity_violation_aborts_cycle() {
        let (broker, _ledger, orchestrator) = setup(&["XYZ"]);
        broker.set_positions(vec![
            Position::equity("XYZ", 100, dec!(50)),
            Position::option("XYZ250117P00045000", -1, dec!(1)),
        ]);

        let err = orchestrator.run_cycle(now()).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::DataIntegrity);
        assert!(err.is_fatal());
        assert!(broker.limit_orders().is_empty());
    }

    #[tokio::test]
    async fn reconcile_records_fills() {
        let (broker, ledger, orchestrator) = setup(&["AAA"]);
        broker.set_latest_trade("AAA", dec!(22));
        add_option(&broker, "AAA", OptionType::Put, dec!(20), dec!(0.40));
        orchestrator.run_cycle(now()).await.unwrap();

        let order_id = orchestrator.order_manager().get_pending_orders()[0].order_id.clone();
        broker.fill(&order_id, dec!(0.44));

        let results = orchestrator.reconcile_orders().await;
        assert_eq!(results[&order_id].status, PollStatus::Filled);

        let trades = ledger.trades();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].trade_type, TradeType::SellPut);
        assert_eq!(trades[0].symbol, "AAA");
        assert_eq!(trades[0].price, dec!(0.44));
        assert_eq!(trades[0].strike, Some(dec!(20)));
    }

    #[tokio::test]
    async fn unfilled_calls_never_lower_the_cost_basis() {
        let (broker, ledger, orchestrator) = setup(&["BBB"]);
        broker.set_positions(vec![Position::equity("BBB", 100, dec!(10))]);
        add_option(&broker, "BBB", OptionType::Call, dec!(11), dec!(0.20));

        for _ in 0..3 {
            let summary = orchestrator.run_cycle(now()).await.unwrap();
            assert_eq!(summary.calls_submitted, 1);

            let order_id = orchestrator.order_manager().get_pending_orders()[0].order_id.clone();
            broker.set_status(&order_id, crate::application::ports::BrokerOrderStatus::Canceled);
            let results = orchestrator.reconcile_orders().await;
            assert_eq!(results[&order_id].status, PollStatus::Canceled);
        }

        let basis = ledger.get_adjusted_cost_basis("BBB").await.unwrap().unwrap();
        assert_eq!(basis.adjusted_cost, dec!(10));
        let premiums = ledger.get_premium_history(Some("BBB"), None, None).await.unwrap();
        assert_eq!(premiums.len(), 3);
        assert!(premiums.iter().all(|p| p.status == PremiumStatus::Cancelled));
        assert!(ledger.trades().is_empty());

        orchestrator.run_cycle(now()).await.unwrap();
        let order_id = orchestrator.order_manager().get_pending_orders()[0].order_id.clone();
        broker.fill(&order_id, dec!(0.25));
        orchestrator.reconcile_orders().await;

        let basis = ledger.get_adjusted_cost_basis("BBB").await.unwrap().unwrap();
        assert_eq!(basis.adjusted_cost, dec!(9.75));
        let latest = &ledger.get_premium_history(Some("BBB"), None, None).await.unwrap()[0];
        assert_eq!(latest.status, PremiumStatus::Collected);
        assert_eq!(latest.premium, dec!(0.25));
    }

    #[tokio::test]
    async fn shutdown_cancel_voids_pending_premiums() {
        let (broker, ledger, orchestrator) = setup(&["AAA"]);
        broker.set_latest_trade("AAA", dec!(22));
        add_option(&broker, "AAA", OptionType::Put, dec!(20), dec!(0.40));
        orchestrator.run_cycle(now()).await.unwrap();

        assert_eq!(orchestrator.cancel_all_pending().await, 1);

        let premiums = ledger.get_premium_history(Some("AAA"), None, None).await.unwrap();
        assert_eq!(premiums[0].status, PremiumStatus::Cancelled);
        assert_eq!(ledger.get_summary_stats(None).await.unwrap().put_trades, 0);
    }

    #[tokio::test]
    async fn partial_roll_refetches_positions() {
        let mut with_rolling = settings(&["XYZ"]);
        with_rolling.rolling.settings.enabled = true;
        let (broker, ledger, orchestrator) = setup_with(with_rolling);
        // expires tomorrow
        broker.set_positions(vec![Position::option("XYZ250114P00045000", -1, dec!(0.80))]);
        let target = add_option(&broker, "XYZ", OptionType::Put, dec!(45), dec!(0.60));
        broker.fail_market_for(&target);

        let summary = orchestrator.run_cycle(now()).await.unwrap();

        assert_eq!(summary.rolls, 0);
        assert_eq!(summary.partial_rolls, 1);
        assert_eq!(broker.position_fetches(), 2);
        assert_eq!(ledger.trades()[0].trade_type, TradeType::BuyToClose);
    }
}

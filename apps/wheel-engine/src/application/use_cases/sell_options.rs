//! Sell Options Use Case
//!
//! Opens new wheel legs: cash-secured puts on allowed underlyings and one
//! covered call per held share position. Orders go through the
//! [`OrderManager`] as repriced limit orders. The expected premium is written
//! to the ledger as `pending` and linked to the order; reconciliation settles
//! it at the fill price, or voids it when the order dies unfilled.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::application::order_manager::{OrderContext, OrderKind, OrderManager};
use crate::application::ports::{
    BrokerError, BrokerPort, CandidateSelector, EventPublisherPort, ExpirationWindow, LedgerPort,
    NewPremium, PremiumStatus,
};
use crate::domain::selection::{OptionCandidate, join_snapshots};
use crate::domain::wheel::{CONTRACT_MULTIPLIER, OptionType, PositionCounts, WheelState};
use crate::error::EngineError;

/// Contracts per put order, per underlying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractSizing {
    /// Contracts when the underlying has no override.
    pub default_contracts: i64,
    /// Per-underlying overrides.
    pub per_symbol: HashMap<String, i64>,
}

impl Default for ContractSizing {
    fn default() -> Self {
        Self {
            default_contracts: 1,
            per_symbol: HashMap::new(),
        }
    }
}

impl ContractSizing {
    /// Contracts to sell on `symbol`.
    #[must_use]
    pub fn contracts_for(&self, symbol: &str) -> i64 {
        self.per_symbol
            .get(symbol)
            .copied()
            .unwrap_or(self.default_contracts)
    }
}

/// Inputs for one round of put selling.
#[derive(Debug, Clone)]
pub struct PutSaleRequest<'a> {
    /// Underlyings with a free layer and no working put.
    pub allowed: Vec<String>,
    /// Capital available for assignment.
    pub buying_power: Decimal,
    /// Current per-underlying counts.
    pub counts: &'a BTreeMap<String, PositionCounts>,
    /// Wheel layers per underlying.
    pub max_layers: u32,
}

/// What a round of put selling did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutSales {
    /// Order IDs submitted.
    pub order_ids: Vec<String>,
    /// Buying power left after reserving assignment capital.
    pub remaining_buying_power: Decimal,
    /// Underlyings still allowed after the round.
    pub allowed: Vec<String>,
}

/// Submits new put and covered-call orders.
pub struct OptionSeller<B, L, E, S>
where
    B: BrokerPort + ?Sized,
    L: LedgerPort + ?Sized,
    E: EventPublisherPort + ?Sized,
    S: CandidateSelector + ?Sized,
{
    broker: Arc<B>,
    ledger: Arc<L>,
    orders: Arc<OrderManager<B, E>>,
    selector: Arc<S>,
    sizing: ContractSizing,
}

impl<B, L, E, S> OptionSeller<B, L, E, S>
where
    B: BrokerPort + ?Sized,
    L: LedgerPort + ?Sized,
    E: EventPublisherPort + ?Sized,
    S: CandidateSelector + ?Sized,
{
    /// Create a new `OptionSeller`.
    pub const fn new(
        broker: Arc<B>,
        ledger: Arc<L>,
        orders: Arc<OrderManager<B, E>>,
        selector: Arc<S>,
        sizing: ContractSizing,
    ) -> Self {
        Self {
            broker,
            ledger,
            orders,
            selector,
            sizing,
        }
    }

    /// Sell puts on affordable allowed underlyings until buying power runs out.
    ///
    /// Candidates are taken best first. The loop stops at the first put whose
    /// assignment capital (100 × strike × contracts) exceeds what is left.
    pub async fn sell_puts(
        &self,
        request: PutSaleRequest<'_>,
        today: NaiveDate,
    ) -> Result<PutSales, EngineError> {
        let PutSaleRequest {
            mut allowed,
            buying_power,
            counts,
            max_layers,
        } = request;
        let mut remaining = buying_power;
        let mut order_ids = Vec::new();

        let prices = self.broker.get_latest_trades(&allowed).await?;
        let affordable = self.selector.filter_underlyings(&prices, remaining);
        if affordable.is_empty() {
            tracing::info!(buying_power = %remaining, "No underlyings affordable");
            return Ok(PutSales {
                order_ids,
                remaining_buying_power: remaining,
                allowed,
            });
        }

        let candidates = self.candidates(&affordable, OptionType::Put, today).await?;
        let filtered = self.selector.filter(&candidates, Decimal::ZERO);
        let scores = self.selector.score(&filtered);
        let selected = self
            .selector
            .select(&filtered, &scores, max_layers, counts, None);

        tracing::info!(
            candidates = candidates.len(),
            filtered = filtered.len(),
            selected = selected.len(),
            "Put selection"
        );

        let mut puts: HashMap<String, u32> = counts.iter().map(|(s, c)| (s.clone(), c.puts)).collect();
        let multiplier = Decimal::from(CONTRACT_MULTIPLIER);

        for put in selected {
            if !allowed.contains(&put.underlying) {
                continue;
            }

            let contracts = self.sizing.contracts_for(&put.underlying);
            let required = multiplier * put.strike * Decimal::from(contracts);
            if required > remaining {
                tracing::info!(
                    symbol = %put.symbol,
                    required = %required,
                    remaining = %remaining,
                    "Buying power exhausted"
                );
                break;
            }

            let context = OrderContext {
                underlying: Some(put.underlying.clone()),
                strike: Some(put.strike),
                expiration: Some(put.expiration),
            };
            let Some(order_id) = self
                .orders
                .submit_limit_sell(&put.symbol, contracts, OrderKind::Put, context, Decimal::ZERO)
                .await?
            else {
                continue;
            };

            remaining -= required;
            self.record_pending(&order_id, &put, OptionType::Put, contracts)
                .await?;
            order_ids.push(order_id);

            let held = puts.entry(put.underlying.clone()).or_default();
            *held = held.saturating_add(u32::try_from(contracts).unwrap_or(u32::MAX));
            if *held >= max_layers {
                allowed.retain(|s| s != &put.underlying);
            }
        }

        Ok(PutSales {
            order_ids,
            remaining_buying_power: remaining,
            allowed,
        })
    }

    /// Sell one covered call against `state`'s shares, struck at or above the
    /// premium-adjusted entry price.
    pub async fn sell_call(
        &self,
        symbol: &str,
        state: &WheelState,
        today: NaiveDate,
    ) -> Result<Option<String>, EngineError> {
        let min_strike = state
            .adjusted_entry_price()
            .or_else(|| state.entry_price())
            .unwrap_or_default();

        let candidates = self
            .candidates(&[symbol.to_string()], OptionType::Call, today)
            .await?;
        let filtered = self.selector.filter(&candidates, min_strike);
        let scores = self.selector.score(&filtered);
        let selected = self
            .selector
            .select(&filtered, &scores, 1, &BTreeMap::new(), Some(1));

        let Some(call) = selected.into_iter().next() else {
            tracing::info!(symbol = %symbol, min_strike = %min_strike, "No call candidates");
            return Ok(None);
        };

        tracing::info!(
            symbol = %call.symbol,
            strike = %call.strike,
            min_strike = %min_strike,
            "Selling covered call"
        );

        let context = OrderContext {
            underlying: Some(symbol.to_string()),
            strike: Some(call.strike),
            expiration: Some(call.expiration),
        };
        let order_id = self
            .orders
            .submit_limit_sell(&call.symbol, 1, OrderKind::Call, context, Decimal::ZERO)
            .await?;

        if let Some(order_id) = &order_id {
            self.record_pending(order_id, &call, OptionType::Call, 1).await?;
        }
        Ok(order_id)
    }

    async fn candidates(
        &self,
        underlyings: &[String],
        option_type: OptionType,
        today: NaiveDate,
    ) -> Result<Vec<OptionCandidate>, BrokerError> {
        let filters = self.selector.filters();
        let window =
            ExpirationWindow::from_today(today, filters.expiration_min_days, filters.expiration_max_days);

        let contracts = self
            .broker
            .get_options_contracts(underlyings, option_type, window)
            .await?;
        let symbols: Vec<String> = contracts.iter().map(|c| c.symbol.clone()).collect();
        let snapshots = self.broker.get_option_snapshots(&symbols).await?;
        Ok(join_snapshots(&contracts, &snapshots, today))
    }

    async fn record_pending(
        &self,
        order_id: &str,
        option: &OptionCandidate,
        option_type: OptionType,
        contracts: i64,
    ) -> Result<(), EngineError> {
        let delta = option.delta.unwrap_or_default();
        let premium_id = self
            .ledger
            .add_premium(NewPremium {
                symbol: option.underlying.clone(),
                option_type,
                strike: option.strike,
                premium: option.bid,
                contracts,
                expiration: option.expiration,
                status: PremiumStatus::Pending,
                notes: Some(format!("PENDING - Delta: {delta:.3}, DTE: {}", option.dte)),
            })
            .await?;
        if !self.orders.link_premium(order_id, premium_id) {
            tracing::warn!(order_id, premium_id, "Order retired before its premium was linked");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::order_manager::OrderManagerConfig;
    use crate::application::ports::{NoOpEventPublisher, OrderSide};
    use crate::application::test_support::MockBroker;
    use crate::domain::selection::{OptionContract, ScoringSelector};
    use crate::infrastructure::persistence::InMemoryLedger;
    use rust_decimal_macros::dec;

    type Seller = OptionSeller<MockBroker, InMemoryLedger, NoOpEventPublisher, ScoringSelector>;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 13).unwrap()
    }

    fn expiry() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 24).unwrap()
    }

    fn add_option(broker: &MockBroker, underlying: &str, option_type: OptionType, strike: Decimal, bid: Decimal) -> String {
        let symbol = crate::domain::wheel::OptionSymbol::new(underlying, expiry(), option_type, strike).encode();
        broker.add_contract(OptionContract {
            symbol: symbol.clone(),
            underlying: underlying.to_string(),
            option_type,
            strike,
            expiration: expiry(),
            open_interest: Some(500),
        });
        let delta = match option_type {
            OptionType::Put => -0.22,
            OptionType::Call => 0.22,
        };
        broker.set_snapshot(&symbol, bid, bid + dec!(0.10), Some(delta));
        symbol
    }

    fn setup(sizing: ContractSizing) -> (Arc<MockBroker>, Arc<InMemoryLedger>, Seller) {
        let broker = Arc::new(MockBroker::new());
        let ledger = Arc::new(InMemoryLedger::new());
        let orders = Arc::new(OrderManager::new(
            Arc::clone(&broker),
            Arc::new(NoOpEventPublisher),
            OrderManagerConfig::default(),
        ));
        let seller = OptionSeller::new(
            Arc::clone(&broker),
            Arc::clone(&ledger),
            orders,
            Arc::new(ScoringSelector::default()),
            sizing,
        );
        (broker, ledger, seller)
    }

    #[tokio::test]
    async fn puts_stop_when_buying_power_runs_out() {
        let (broker, ledger, seller) = setup(ContractSizing::default());
        broker.set_latest_trade("AAA", dec!(22));
        broker.set_latest_trade("BBB", dec!(31));
        let aaa = add_option(&broker, "AAA", OptionType::Put, dec!(20), dec!(0.40));
        add_option(&broker, "BBB", OptionType::Put, dec!(30), dec!(0.50));

        let counts = BTreeMap::new();
        let sales = seller
            .sell_puts(
                PutSaleRequest {
                    allowed: vec!["AAA".to_string(), "BBB".to_string()],
                    buying_power: dec!(3500),
                    counts: &counts,
                    max_layers: 2,
                },
                today(),
            )
            .await
            .unwrap();

        // BBB scores lower and needs 3000 after AAA reserved 2000
        assert_eq!(sales.order_ids.len(), 1);
        assert_eq!(sales.remaining_buying_power, dec!(1500));
        assert_eq!(broker.limit_orders()[0].0, aaa);
        assert_eq!(broker.limit_orders()[0].2, OrderSide::Sell);

        let premiums = ledger.get_premium_history(Some("AAA"), Some(OptionType::Put), None).await.unwrap();
        assert_eq!(premiums.len(), 1);
        assert_eq!(premiums[0].status, PremiumStatus::Pending);
        assert!(premiums[0].notes.as_deref().unwrap().starts_with("PENDING - Delta: -0.220"));
    }

    #[tokio::test]
    async fn filled_layer_drops_symbol_from_allowed() {
        let (broker, _ledger, seller) = setup(ContractSizing::default());
        broker.set_latest_trade("AAA", dec!(22));
        add_option(&broker, "AAA", OptionType::Put, dec!(20), dec!(0.40));

        let mut counts = BTreeMap::new();
        counts.insert(
            "AAA".to_string(),
            PositionCounts {
                puts: 1,
                calls: 0,
                share_lots: 0,
            },
        );
        let sales = seller
            .sell_puts(
                PutSaleRequest {
                    allowed: vec!["AAA".to_string()],
                    buying_power: dec!(10000),
                    counts: &counts,
                    max_layers: 2,
                },
                today(),
            )
            .await
            .unwrap();

        assert_eq!(sales.order_ids.len(), 1);
        assert!(sales.allowed.is_empty());
    }

    #[tokio::test]
    async fn sizing_override_scales_quantity_and_capital() {
        let mut sizing = ContractSizing::default();
        sizing.per_symbol.insert("AAA".to_string(), 2);
        let (broker, _ledger, seller) = setup(sizing);
        broker.set_latest_trade("AAA", dec!(22));
        add_option(&broker, "AAA", OptionType::Put, dec!(20), dec!(0.40));

        let counts = BTreeMap::new();
        let sales = seller
            .sell_puts(
                PutSaleRequest {
                    allowed: vec!["AAA".to_string()],
                    buying_power: dec!(5000),
                    counts: &counts,
                    max_layers: 3,
                },
                today(),
            )
            .await
            .unwrap();

        assert_eq!(broker.limit_orders()[0].1, 2);
        assert_eq!(sales.remaining_buying_power, dec!(1000));
    }

    #[tokio::test]
    async fn unaffordable_underlyings_are_skipped() {
        let (broker, _ledger, seller) = setup(ContractSizing::default());
        broker.set_latest_trade("AAA", dec!(220));
        add_option(&broker, "AAA", OptionType::Put, dec!(200), dec!(4.00));

        let counts = BTreeMap::new();
        let sales = seller
            .sell_puts(
                PutSaleRequest {
                    allowed: vec!["AAA".to_string()],
                    buying_power: dec!(10000),
                    counts: &counts,
                    max_layers: 2,
                },
                today(),
            )
            .await
            .unwrap();

        assert!(sales.order_ids.is_empty());
        assert_eq!(sales.allowed, vec!["AAA".to_string()]);
        assert!(broker.limit_orders().is_empty());
    }

    #[tokio::test]
    async fn call_strike_respects_adjusted_entry_price() {
        let (broker, ledger, seller) = setup(ContractSizing::default());
        add_option(&broker, "BBB", OptionType::Call, dec!(9), dec!(0.30));
        let above = add_option(&broker, "BBB", OptionType::Call, dec!(11), dec!(0.20));

        let state = WheelState::LongShares {
            entry_price: dec!(12),
            adjusted_entry_price: dec!(10),
            share_qty: 100,
            counts: PositionCounts::default(),
        };

        let order_id = seller.sell_call("BBB", &state, today()).await.unwrap();

        assert!(order_id.is_some());
        let orders = broker.limit_orders();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].0, above);
        assert_eq!(orders[0].1, 1);

        let premiums = ledger.get_premium_history(Some("BBB"), Some(OptionType::Call), None).await.unwrap();
        assert_eq!(premiums.len(), 1);
        assert_eq!(premiums[0].strike, dec!(11));
        assert_eq!(premiums[0].status, PremiumStatus::Pending);
        assert_eq!(
            seller.orders.get_pending_orders()[0].premium_id,
            Some(premiums[0].id)
        );
    }

    #[tokio::test]
    async fn no_call_candidates_submits_nothing() {
        let (broker, ledger, seller) = setup(ContractSizing::default());
        let state = WheelState::LongShares {
            entry_price: dec!(10),
            adjusted_entry_price: dec!(10),
            share_qty: 100,
            counts: PositionCounts::default(),
        };

        assert!(seller.sell_call("BBB", &state, today()).await.unwrap().is_none());
        assert!(broker.limit_orders().is_empty());
        assert!(ledger.get_premium_history(None, None, None).await.unwrap().is_empty());
    }
}

//! Order manager: submits limit orders, reprices them while they work, and
//! retires them on fill, cancel or age-out.
//!
//! The pending map sits behind one `parking_lot::Mutex`. The lock is only
//! taken for short synchronous reads and writes and is never held across an
//! `.await`; broker calls work on clones.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use chrono::{Duration, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::pending::{DEFAULT_MAX_ATTEMPTS, OrderContext, OrderKind, PendingOrder};
use super::pricing::{initial_limit_price, reprice_price, target_price};
use crate::application::ports::{
    BrokerError, BrokerOrderStatus, BrokerPort, EventPublisherPort, OrderExpired, OrderFilled,
    OrderPlaced, OrderRepriced, OrderSide, WheelEvent, publish_or_log,
};

/// Order manager timing and reprice limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderManagerConfig {
    /// Minimum time between reprices of one order.
    pub update_interval: Duration,
    /// Orders older than this are canceled.
    pub max_order_age: Duration,
    /// Reprice attempts per order.
    pub max_attempts: u32,
}

impl Default for OrderManagerConfig {
    fn default() -> Self {
        Self {
            update_interval: Duration::seconds(20),
            max_order_age: Duration::seconds(60),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Order manager errors. Broker failures are logged, not returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderManagerError {
    /// Quantity must be positive.
    #[error("Invalid order quantity {quantity} for {symbol}")]
    InvalidQuantity {
        /// Symbol.
        symbol: String,
        /// Rejected quantity.
        quantity: i64,
    },
}

/// Status reported for one tracked order after a poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollStatus {
    /// Accepted by the broker, not yet polled.
    Submitted,
    /// Working, nothing changed.
    Pending,
    /// Replaced at a new limit.
    Repriced,
    /// Filled and retired.
    Filled,
    /// Canceled at the broker and retired.
    Canceled,
    /// Aged out (or expired at the broker) and retired.
    Expired,
    /// Poll failed; order still tracked.
    Error,
}

impl PollStatus {
    /// Whether the order has been retired.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Filled | Self::Canceled | Self::Expired)
    }
}

impl fmt::Display for PollStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Submitted => "submitted",
            Self::Pending => "pending",
            Self::Repriced => "repriced",
            Self::Filled => "filled",
            Self::Canceled => "canceled",
            Self::Expired => "expired",
            Self::Error => "error",
        })
    }
}

/// Result of polling one order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOutcome {
    /// Status.
    pub status: PollStatus,
    /// The retired order, for terminal statuses.
    pub order: Option<PendingOrder>,
    /// Average fill price, for fills.
    pub fill_price: Option<Decimal>,
}

impl PollOutcome {
    const fn status(status: PollStatus) -> Self {
        Self {
            status,
            order: None,
            fill_price: None,
        }
    }

    const fn retired(status: PollStatus, order: PendingOrder, fill_price: Option<Decimal>) -> Self {
        Self {
            status,
            order: Some(order),
            fill_price,
        }
    }
}

/// Owns the lifecycle of in-flight limit orders.
pub struct OrderManager<B, E>
where
    B: BrokerPort + ?Sized,
    E: EventPublisherPort + ?Sized,
{
    broker: Arc<B>,
    events: Arc<E>,
    config: OrderManagerConfig,
    pending: Mutex<HashMap<String, PendingOrder>>,
}

impl<B, E> OrderManager<B, E>
where
    B: BrokerPort + ?Sized,
    E: EventPublisherPort + ?Sized,
{
    /// Create a manager with no tracked orders.
    pub fn new(broker: Arc<B>, events: Arc<E>, config: OrderManagerConfig) -> Self {
        Self {
            broker,
            events,
            config,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Active configuration.
    pub const fn config(&self) -> &OrderManagerConfig {
        &self.config
    }

    /// Submit a DAY limit sell starting at the mid. Returns the order ID, or
    /// `None` when no quote is available or the broker refused the order.
    pub async fn submit_limit_sell(
        &self,
        symbol: &str,
        quantity: i64,
        kind: OrderKind,
        context: OrderContext,
        price_adjustment: Decimal,
    ) -> Result<Option<String>, OrderManagerError> {
        self.submit_limit(OrderSide::Sell, symbol, quantity, kind, context, price_adjustment)
            .await
    }

    /// Submit a DAY limit buy starting at the mid. Returns the order ID, or
    /// `None` when no quote is available or the broker refused the order.
    pub async fn submit_limit_buy(
        &self,
        symbol: &str,
        quantity: i64,
        kind: OrderKind,
        context: OrderContext,
        price_adjustment: Decimal,
    ) -> Result<Option<String>, OrderManagerError> {
        self.submit_limit(OrderSide::Buy, symbol, quantity, kind, context, price_adjustment)
            .await
    }

    async fn submit_limit(
        &self,
        side: OrderSide,
        symbol: &str,
        quantity: i64,
        kind: OrderKind,
        context: OrderContext,
        price_adjustment: Decimal,
    ) -> Result<Option<String>, OrderManagerError> {
        if quantity <= 0 {
            return Err(OrderManagerError::InvalidQuantity {
                symbol: symbol.to_string(),
                quantity,
            });
        }

        let snapshots = match self.broker.get_option_snapshots(&[symbol.to_string()]).await {
            Ok(snapshots) => snapshots,
            Err(e) => {
                tracing::error!(symbol = %symbol, error = %e, "Could not get snapshot");
                return Ok(None);
            }
        };
        let Some(quote) = snapshots.get(symbol) else {
            tracing::warn!(symbol = %symbol, "No quote available");
            return Ok(None);
        };

        let limit_price = initial_limit_price(side, quote.bid, quote.ask, price_adjustment);

        let ack = match self
            .broker
            .submit_limit_order(symbol, quantity, side, limit_price)
            .await
        {
            Ok(ack) => ack,
            Err(e) => {
                tracing::error!(
                    symbol = %symbol,
                    side = %side,
                    limit_price = %limit_price,
                    error = %e,
                    "Failed to submit limit order"
                );
                return Ok(None);
            }
        };

        let now = Utc::now();
        let underlying = context.underlying.unwrap_or_else(|| symbol.to_string());
        let order = PendingOrder {
            order_id: ack.order_id.clone(),
            symbol: symbol.to_string(),
            side,
            quantity,
            limit_price,
            target_price: target_price(side, quote.bid, quote.ask),
            created_at: now,
            last_updated: now,
            kind,
            underlying: underlying.clone(),
            strike: context.strike,
            expiration: context.expiration,
            attempts: 0,
            max_attempts: self.config.max_attempts,
            premium_id: None,
        };
        self.pending.lock().insert(ack.order_id.clone(), order);

        tracing::info!(
            order_id = %ack.order_id,
            symbol = %symbol,
            side = %side,
            quantity,
            limit_price = %limit_price,
            bid = %quote.bid,
            ask = %quote.ask,
            "Limit order placed"
        );

        publish_or_log(
            self.events.as_ref(),
            WheelEvent::OrderPlaced(OrderPlaced {
                order_id: ack.order_id.clone(),
                symbol: symbol.to_string(),
                underlying,
                side,
                quantity,
                limit_price,
                occurred_at: now,
            }),
        )
        .await;

        Ok(Some(ack.order_id))
    }

    /// Poll every tracked order: retire terminal ones, cancel aged-out ones,
    /// and reprice those that are due. A failure affects only its own order.
    pub async fn update_pending_orders(&self) -> BTreeMap<String, PollOutcome> {
        let mut orders: Vec<PendingOrder> = self.pending.lock().values().cloned().collect();
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        let mut results = BTreeMap::new();
        for order in orders {
            let outcome = match self.poll_one(&order).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(
                        order_id = %order.order_id,
                        symbol = %order.symbol,
                        error = %e,
                        "Error updating order"
                    );
                    PollOutcome::status(PollStatus::Error)
                }
            };
            results.insert(order.order_id, outcome);
        }
        results
    }

    async fn poll_one(&self, order: &PendingOrder) -> Result<PollOutcome, BrokerError> {
        let ack = self.broker.get_order(&order.order_id).await?;

        if ack.status.is_terminal() {
            let retired = self.take(&order.order_id).unwrap_or_else(|| order.clone());
            let status = match ack.status {
                BrokerOrderStatus::Filled => PollStatus::Filled,
                BrokerOrderStatus::Expired => PollStatus::Expired,
                _ => PollStatus::Canceled,
            };

            if status == PollStatus::Filled {
                tracing::info!(
                    order_id = %order.order_id,
                    symbol = %order.symbol,
                    fill_price = ?ack.filled_avg_price,
                    "Order filled"
                );
                publish_or_log(
                    self.events.as_ref(),
                    WheelEvent::OrderFilled(OrderFilled {
                        order_id: order.order_id.clone(),
                        symbol: order.symbol.clone(),
                        underlying: order.underlying.clone(),
                        quantity: order.quantity,
                        fill_price: ack.filled_avg_price,
                        occurred_at: Utc::now(),
                    }),
                )
                .await;
            } else {
                tracing::info!(
                    order_id = %order.order_id,
                    symbol = %order.symbol,
                    status = %status,
                    "Order closed by broker"
                );
            }

            return Ok(PollOutcome::retired(status, retired, ack.filled_avg_price));
        }

        let now = Utc::now();
        if order.is_expired_at(now, self.config.max_order_age) {
            tracing::warn!(
                order_id = %order.order_id,
                symbol = %order.symbol,
                max_age_secs = self.config.max_order_age.num_seconds(),
                "Order expired, cancelling"
            );
            self.broker.cancel_order(&order.order_id).await?;
            let retired = self.take(&order.order_id).unwrap_or_else(|| order.clone());

            publish_or_log(
                self.events.as_ref(),
                WheelEvent::OrderExpired(OrderExpired {
                    order_id: order.order_id.clone(),
                    symbol: order.symbol.clone(),
                    age_secs: (now - order.created_at).num_seconds(),
                    attempts: order.attempts,
                    occurred_at: now,
                }),
            )
            .await;

            return Ok(PollOutcome::retired(PollStatus::Expired, retired, None));
        }

        if order.attempts_exhausted() || !order.should_update_at(now, self.config.update_interval) {
            return Ok(PollOutcome::status(PollStatus::Pending));
        }

        self.reprice(order).await
    }

    async fn reprice(&self, order: &PendingOrder) -> Result<PollOutcome, BrokerError> {
        let snapshots = self
            .broker
            .get_option_snapshots(&[order.symbol.clone()])
            .await?;
        let Some(quote) = snapshots.get(&order.symbol) else {
            tracing::warn!(order_id = %order.order_id, symbol = %order.symbol, "No quote for reprice");
            return Ok(PollOutcome::status(PollStatus::Pending));
        };

        let new_price = reprice_price(order.side, quote.bid, quote.ask, order.attempts);
        if new_price == order.limit_price {
            tracing::debug!(order_id = %order.order_id, symbol = %order.symbol, "Price unchanged, skipping");
            return Ok(PollOutcome::status(PollStatus::Pending));
        }

        let ack = self
            .broker
            .replace_order(&order.order_id, order.quantity, new_price)
            .await?;

        let now = Utc::now();
        let attempt = {
            let mut pending = self.pending.lock();
            let Some(mut tracked) = pending.remove(&order.order_id) else {
                return Ok(PollOutcome::status(PollStatus::Pending));
            };
            tracked.limit_price = new_price;
            tracked.last_updated = now;
            tracked.attempts += 1;
            tracked.order_id.clone_from(&ack.order_id);
            let attempt = tracked.attempts;
            pending.insert(ack.order_id.clone(), tracked);
            attempt
        };

        tracing::info!(
            order_id = %ack.order_id,
            previous_order_id = %order.order_id,
            symbol = %order.symbol,
            new_price = %new_price,
            attempt,
            bid = %quote.bid,
            ask = %quote.ask,
            "Order repriced"
        );

        publish_or_log(
            self.events.as_ref(),
            WheelEvent::OrderRepriced(OrderRepriced {
                previous_order_id: order.order_id.clone(),
                order_id: ack.order_id,
                symbol: order.symbol.clone(),
                old_price: order.limit_price,
                new_price,
                attempt,
                occurred_at: now,
            }),
        )
        .await;

        Ok(PollOutcome::status(PollStatus::Repriced))
    }

    /// Cancel every tracked order. Orders the broker refuses to cancel stay tracked.
    pub async fn cancel_all_pending(&self) -> usize {
        self.cancel_all().await.len()
    }

    /// Cancel every tracked order and return the ones that were cancelled.
    pub async fn cancel_all(&self) -> Vec<PendingOrder> {
        let ids: Vec<String> = self.pending.lock().keys().cloned().collect();

        let mut cancelled = Vec::new();
        for order_id in ids {
            match self.broker.cancel_order(&order_id).await {
                Ok(()) => {
                    if let Some(order) = self.take(&order_id) {
                        cancelled.push(order);
                    }
                    tracing::info!(order_id = %order_id, "Cancelled order");
                }
                Err(e) => {
                    tracing::error!(order_id = %order_id, error = %e, "Failed to cancel order");
                }
            }
        }
        cancelled
    }

    /// Attach the ledger premium row an order will settle. Returns false when
    /// the order is no longer tracked.
    pub fn link_premium(&self, order_id: &str, premium_id: i64) -> bool {
        self.pending.lock().get_mut(order_id).is_some_and(|order| {
            order.premium_id = Some(premium_id);
            true
        })
    }

    /// Snapshot of tracked orders, oldest first.
    pub fn get_pending_orders(&self) -> Vec<PendingOrder> {
        let mut orders: Vec<PendingOrder> = self.pending.lock().values().cloned().collect();
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        orders
    }

    /// Whether any order is tracked.
    pub fn has_pending_orders(&self) -> bool {
        !self.pending.lock().is_empty()
    }

    /// Whether a `kind` order on `underlying` is tracked.
    pub fn has_pending_for(&self, underlying: &str, kind: OrderKind) -> bool {
        self.pending
            .lock()
            .values()
            .any(|o| o.kind == kind && o.underlying == underlying)
    }

    fn take(&self, order_id: &str) -> Option<PendingOrder> {
        self.pending.lock().remove(order_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::NoOpEventPublisher;
    use crate::application::test_support::MockBroker;
    use rust_decimal_macros::dec;

    const PUT: &str = "XYZ250117P00045000";

    fn put_context() -> OrderContext {
        OrderContext {
            underlying: Some("XYZ".to_string()),
            strike: Some(dec!(45)),
            expiration: None,
        }
    }

    fn manager(broker: &Arc<MockBroker>, config: OrderManagerConfig) -> OrderManager<MockBroker, NoOpEventPublisher> {
        OrderManager::new(Arc::clone(broker), Arc::new(NoOpEventPublisher), config)
    }

    fn slow_config() -> OrderManagerConfig {
        OrderManagerConfig {
            update_interval: Duration::hours(1),
            max_order_age: Duration::hours(2),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    #[tokio::test]
    async fn submit_sell_tracks_order_at_mid() {
        let broker = Arc::new(MockBroker::new());
        broker.set_quote(PUT, dec!(0.80), dec!(0.90));
        let om = manager(&broker, slow_config());

        let id = om
            .submit_limit_sell(PUT, 1, OrderKind::Put, put_context(), Decimal::ZERO)
            .await
            .unwrap()
            .unwrap();

        let orders = om.get_pending_orders();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].order_id, id);
        assert_eq!(orders[0].limit_price, dec!(0.85));
        assert_eq!(orders[0].target_price, dec!(0.80));
        assert_eq!(orders[0].underlying, "XYZ");
        assert!(om.has_pending_for("XYZ", OrderKind::Put));
        assert!(!om.has_pending_for("XYZ", OrderKind::Call));
        assert_eq!(broker.limit_orders(), vec![(PUT.to_string(), 1, OrderSide::Sell, dec!(0.85))]);
    }

    #[tokio::test]
    async fn submit_without_quote_returns_none() {
        let broker = Arc::new(MockBroker::new());
        let om = manager(&broker, slow_config());

        let id = om
            .submit_limit_sell(PUT, 1, OrderKind::Put, put_context(), Decimal::ZERO)
            .await
            .unwrap();

        assert!(id.is_none());
        assert!(!om.has_pending_orders());
        assert!(broker.limit_orders().is_empty());
    }

    #[tokio::test]
    async fn submit_broker_failure_returns_none() {
        let broker = Arc::new(MockBroker::new());
        broker.set_quote(PUT, dec!(0.80), dec!(0.90));
        broker.fail_limit_orders(true);
        let om = manager(&broker, slow_config());

        let id = om
            .submit_limit_buy(PUT, 1, OrderKind::Put, put_context(), Decimal::ZERO)
            .await
            .unwrap();

        assert!(id.is_none());
        assert!(!om.has_pending_orders());
    }

    #[tokio::test]
    async fn submit_rejects_non_positive_quantity() {
        let broker = Arc::new(MockBroker::new());
        let om = manager(&broker, slow_config());
        let err = om
            .submit_limit_sell(PUT, 0, OrderKind::Put, put_context(), Decimal::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, OrderManagerError::InvalidQuantity { quantity: 0, .. }));
    }

    #[tokio::test]
    async fn expired_order_is_cancelled_exactly_once() {
        let broker = Arc::new(MockBroker::new());
        broker.set_quote(PUT, dec!(0.80), dec!(0.90));
        let om = manager(
            &broker,
            OrderManagerConfig {
                update_interval: Duration::hours(1),
                max_order_age: Duration::zero(),
                max_attempts: DEFAULT_MAX_ATTEMPTS,
            },
        );

        let id = om
            .submit_limit_sell(PUT, 1, OrderKind::Put, put_context(), Decimal::ZERO)
            .await
            .unwrap()
            .unwrap();

        let first = om.update_pending_orders().await;
        assert_eq!(first[&id].status, PollStatus::Expired);
        assert_eq!(first[&id].order.as_ref().unwrap().order_id, id);

        let second = om.update_pending_orders().await;
        assert!(second.is_empty());

        assert_eq!(broker.cancel_count(&id), 1);
        assert!(om.get_pending_orders().is_empty());
    }

    #[tokio::test]
    async fn failed_expiry_cancel_keeps_order() {
        let broker = Arc::new(MockBroker::new());
        broker.set_quote(PUT, dec!(0.80), dec!(0.90));
        broker.fail_cancels(true);
        let om = manager(
            &broker,
            OrderManagerConfig {
                max_order_age: Duration::zero(),
                ..slow_config()
            },
        );

        let id = om
            .submit_limit_sell(PUT, 1, OrderKind::Put, put_context(), Decimal::ZERO)
            .await
            .unwrap()
            .unwrap();

        let results = om.update_pending_orders().await;
        assert_eq!(results[&id].status, PollStatus::Error);
        assert!(om.has_pending_orders());
    }

    #[tokio::test]
    async fn fill_retires_order_with_price() {
        let broker = Arc::new(MockBroker::new());
        broker.set_quote(PUT, dec!(0.80), dec!(0.90));
        let om = manager(&broker, slow_config());

        let id = om
            .submit_limit_sell(PUT, 1, OrderKind::Put, put_context(), Decimal::ZERO)
            .await
            .unwrap()
            .unwrap();
        broker.fill(&id, dec!(0.84));

        let results = om.update_pending_orders().await;
        let outcome = &results[&id];
        assert_eq!(outcome.status, PollStatus::Filled);
        assert_eq!(outcome.fill_price, Some(dec!(0.84)));
        assert_eq!(outcome.order.as_ref().unwrap().kind, OrderKind::Put);
        assert!(!om.has_pending_orders());
    }

    #[tokio::test]
    async fn broker_cancel_and_expiry_are_terminal() {
        let broker = Arc::new(MockBroker::new());
        broker.set_quote(PUT, dec!(0.80), dec!(0.90));
        let om = manager(&broker, slow_config());

        let a = om
            .submit_limit_sell(PUT, 1, OrderKind::Put, put_context(), Decimal::ZERO)
            .await
            .unwrap()
            .unwrap();
        let b = om
            .submit_limit_sell(PUT, 1, OrderKind::Put, put_context(), Decimal::ZERO)
            .await
            .unwrap()
            .unwrap();
        broker.set_status(&a, BrokerOrderStatus::Canceled);
        broker.set_status(&b, BrokerOrderStatus::Expired);

        let results = om.update_pending_orders().await;
        assert_eq!(results[&a].status, PollStatus::Canceled);
        assert_eq!(results[&b].status, PollStatus::Expired);
        assert!(!om.has_pending_orders());
        assert_eq!(broker.cancel_count(&a), 0);
    }

    #[tokio::test]
    async fn due_order_is_repriced_and_rekeyed() {
        let broker = Arc::new(MockBroker::new());
        broker.set_quote(PUT, dec!(0.80), dec!(0.90));
        broker.rekey_on_replace(true);
        let om = manager(
            &broker,
            OrderManagerConfig {
                update_interval: Duration::zero(),
                ..slow_config()
            },
        );

        let id = om
            .submit_limit_sell(PUT, 1, OrderKind::Put, put_context(), Decimal::ZERO)
            .await
            .unwrap()
            .unwrap();

        let results = om.update_pending_orders().await;
        assert_eq!(results[&id].status, PollStatus::Repriced);

        let orders = om.get_pending_orders();
        assert_eq!(orders.len(), 1);
        assert_ne!(orders[0].order_id, id);
        // attempt 0 walks to the ask
        assert_eq!(orders[0].limit_price, dec!(0.90));
        assert_eq!(orders[0].attempts, 1);

        let next = om.update_pending_orders().await;
        assert_eq!(next[&orders[0].order_id].status, PollStatus::Repriced);
        assert_eq!(om.get_pending_orders()[0].limit_price, dec!(0.89));
    }

    #[tokio::test]
    async fn linked_premium_follows_the_order_to_its_outcome() {
        let broker = Arc::new(MockBroker::new());
        broker.set_quote(PUT, dec!(0.80), dec!(0.90));
        broker.rekey_on_replace(true);
        let om = manager(
            &broker,
            OrderManagerConfig {
                update_interval: Duration::zero(),
                ..slow_config()
            },
        );

        let id = om
            .submit_limit_sell(PUT, 1, OrderKind::Put, put_context(), Decimal::ZERO)
            .await
            .unwrap()
            .unwrap();
        assert!(om.link_premium(&id, 7));
        assert!(!om.link_premium("unknown", 8));

        om.update_pending_orders().await;
        let rekeyed = om.get_pending_orders()[0].order_id.clone();
        assert_ne!(rekeyed, id);

        broker.fill(&rekeyed, dec!(0.88));
        let results = om.update_pending_orders().await;
        let retired = results[&rekeyed].order.as_ref().unwrap();
        assert_eq!(retired.premium_id, Some(7));
    }

    #[tokio::test]
    async fn cancel_all_returns_the_cancelled_orders() {
        let broker = Arc::new(MockBroker::new());
        broker.set_quote(PUT, dec!(0.80), dec!(0.90));
        let om = manager(&broker, slow_config());

        let id = om
            .submit_limit_sell(PUT, 1, OrderKind::Put, put_context(), Decimal::ZERO)
            .await
            .unwrap()
            .unwrap();
        om.link_premium(&id, 3);

        let cancelled = om.cancel_all().await;
        assert_eq!(cancelled.len(), 1);
        assert_eq!(cancelled[0].premium_id, Some(3));
        assert!(!om.has_pending_orders());
    }

    #[tokio::test]
    async fn unchanged_price_reports_pending() {
        let broker = Arc::new(MockBroker::new());
        broker.set_quote(PUT, dec!(0.85), dec!(0.85));
        let om = manager(
            &broker,
            OrderManagerConfig {
                update_interval: Duration::zero(),
                ..slow_config()
            },
        );

        let id = om
            .submit_limit_sell(PUT, 1, OrderKind::Put, put_context(), Decimal::ZERO)
            .await
            .unwrap()
            .unwrap();

        let results = om.update_pending_orders().await;
        assert_eq!(results[&id].status, PollStatus::Pending);
        assert_eq!(broker.replace_count(), 0);
    }

    #[tokio::test]
    async fn exhausted_attempts_stop_repricing() {
        let broker = Arc::new(MockBroker::new());
        broker.set_quote(PUT, dec!(0.80), dec!(0.90));
        let om = manager(
            &broker,
            OrderManagerConfig {
                update_interval: Duration::zero(),
                max_attempts: 1,
                ..slow_config()
            },
        );

        let id = om
            .submit_limit_sell(PUT, 1, OrderKind::Put, put_context(), Decimal::ZERO)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(om.update_pending_orders().await[&id].status, PollStatus::Repriced);
        assert_eq!(om.update_pending_orders().await[&id].status, PollStatus::Pending);
        assert_eq!(broker.replace_count(), 1);
    }

    #[tokio::test]
    async fn poll_error_is_isolated_to_its_order() {
        let broker = Arc::new(MockBroker::new());
        broker.set_quote(PUT, dec!(0.80), dec!(0.90));
        let om = manager(&broker, slow_config());

        let bad = om
            .submit_limit_sell(PUT, 1, OrderKind::Put, put_context(), Decimal::ZERO)
            .await
            .unwrap()
            .unwrap();
        let good = om
            .submit_limit_sell(PUT, 1, OrderKind::Put, put_context(), Decimal::ZERO)
            .await
            .unwrap()
            .unwrap();
        broker.fail_get_order(&bad);

        let results = om.update_pending_orders().await;
        assert_eq!(results[&bad].status, PollStatus::Error);
        assert_eq!(results[&good].status, PollStatus::Pending);
        assert_eq!(om.get_pending_orders().len(), 2);
    }

    #[tokio::test]
    async fn cancel_all_counts_successes_only() {
        let broker = Arc::new(MockBroker::new());
        broker.set_quote(PUT, dec!(0.80), dec!(0.90));
        let om = manager(&broker, slow_config());

        for _ in 0..3 {
            om.submit_limit_sell(PUT, 1, OrderKind::Put, put_context(), Decimal::ZERO)
                .await
                .unwrap();
        }
        assert_eq!(om.cancel_all_pending().await, 3);
        assert!(!om.has_pending_orders());

        om.submit_limit_sell(PUT, 1, OrderKind::Put, put_context(), Decimal::ZERO)
            .await
            .unwrap();
        broker.fail_cancels(true);
        assert_eq!(om.cancel_all_pending().await, 0);
        assert!(om.has_pending_orders());
    }
}

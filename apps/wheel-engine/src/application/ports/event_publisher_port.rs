//! Event Publisher Port (Driven Port)
//!
//! Interface for publishing strategy events to external systems.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::broker_port::OrderSide;

/// Event publishing error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EventPublishError {
    /// Connection error.
    #[error("Event publish connection error: {message}")]
    ConnectionError {
        /// Error details.
        message: String,
    },

    /// Serialization error.
    #[error("Event serialization error: {message}")]
    SerializationError {
        /// Error details.
        message: String,
    },

    /// Publishing failed.
    #[error("Event publish failed: {message}")]
    PublishFailed {
        /// Error details.
        message: String,
    },
}

/// A limit order was accepted by the broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPlaced {
    /// Broker order ID.
    pub order_id: String,
    /// Contract or equity symbol.
    pub symbol: String,
    /// Underlying.
    pub underlying: String,
    /// Side.
    pub side: OrderSide,
    /// Quantity.
    pub quantity: i64,
    /// Initial limit.
    pub limit_price: Decimal,
    /// When.
    pub occurred_at: DateTime<Utc>,
}

/// A tracked order filled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderFilled {
    /// Broker order ID.
    pub order_id: String,
    /// Contract or equity symbol.
    pub symbol: String,
    /// Underlying.
    pub underlying: String,
    /// Quantity.
    pub quantity: i64,
    /// Average fill price, if reported.
    pub fill_price: Option<Decimal>,
    /// When.
    pub occurred_at: DateTime<Utc>,
}

/// A tracked order was repriced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRepriced {
    /// Order ID before the replace.
    pub previous_order_id: String,
    /// Order ID after the replace.
    pub order_id: String,
    /// Contract or equity symbol.
    pub symbol: String,
    /// Old limit.
    pub old_price: Decimal,
    /// New limit.
    pub new_price: Decimal,
    /// Reprice attempts so far.
    pub attempt: u32,
    /// When.
    pub occurred_at: DateTime<Utc>,
}

/// A tracked order aged out and was canceled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderExpired {
    /// Broker order ID.
    pub order_id: String,
    /// Contract or equity symbol.
    pub symbol: String,
    /// Seconds since submission.
    pub age_secs: i64,
    /// Reprice attempts made.
    pub attempts: u32,
    /// When.
    pub occurred_at: DateTime<Utc>,
}

/// A roll completed or half-completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollExecuted {
    /// Closed contract.
    pub from_symbol: String,
    /// Opened contract.
    pub to_symbol: String,
    /// Underlying.
    pub underlying: String,
    /// Closed strike.
    pub from_strike: Decimal,
    /// Opened strike.
    pub to_strike: Decimal,
    /// Contracts.
    pub quantity: i64,
    /// Estimated new premium (bid).
    pub new_premium: Decimal,
    /// False when the close went through but the open did not.
    pub completed: bool,
    /// When.
    pub occurred_at: DateTime<Utc>,
}

/// End-of-cycle summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleSummaryEvent {
    /// Orders submitted this cycle.
    pub orders_submitted: usize,
    /// Successful rolls.
    pub rolls: usize,
    /// Symbols allowed to take new puts.
    pub allowed_symbols: Vec<String>,
    /// Buying power available to puts.
    pub buying_power: Decimal,
    /// Capital at risk.
    pub risk: Decimal,
    /// When.
    pub occurred_at: DateTime<Utc>,
}

/// Strategy events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WheelEvent {
    /// Order placed.
    OrderPlaced(OrderPlaced),
    /// Order filled.
    OrderFilled(OrderFilled),
    /// Order repriced.
    OrderRepriced(OrderRepriced),
    /// Order expired.
    OrderExpired(OrderExpired),
    /// Roll executed.
    RollExecuted(RollExecuted),
    /// Cycle finished.
    CycleSummary(CycleSummaryEvent),
}

impl WheelEvent {
    /// Event name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::OrderPlaced(_) => "order_placed",
            Self::OrderFilled(_) => "order_filled",
            Self::OrderRepriced(_) => "order_repriced",
            Self::OrderExpired(_) => "order_expired",
            Self::RollExecuted(_) => "roll_executed",
            Self::CycleSummary(_) => "cycle_summary",
        }
    }
}

/// Port for publishing strategy events.
#[async_trait]
pub trait EventPublisherPort: Send + Sync {
    /// Publish events.
    async fn publish_events(&self, events: Vec<WheelEvent>) -> Result<(), EventPublishError>;

    /// Publish a single event.
    async fn publish_event(&self, event: WheelEvent) -> Result<(), EventPublishError> {
        self.publish_events(vec![event]).await
    }
}

/// Publish, logging and swallowing any failure.
pub async fn publish_or_log<E: EventPublisherPort + ?Sized>(publisher: &E, event: WheelEvent) {
    let name = event.name();
    if let Err(e) = publisher.publish_event(event).await {
        tracing::warn!(event = name, error = %e, "Failed to publish event");
    }
}

/// No-op event publisher for testing.
#[derive(Debug, Clone, Default)]
pub struct NoOpEventPublisher;

#[async_trait]
impl EventPublisherPort for NoOpEventPublisher {
    async fn publish_events(&self, _events: Vec<WheelEvent>) -> Result<(), EventPublishError> {
        Ok(())
    }
}

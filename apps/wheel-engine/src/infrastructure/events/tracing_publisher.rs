//! Tracing-backed event publisher.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use crate::application::ports::{EventPublishError, EventPublisherPort, WheelEvent};

/// Publishes each `WheelEvent` as one structured log record under the
/// `wheel_engine::events` target.
#[derive(Debug, Default)]
pub struct TracingEventPublisher {
    published: AtomicU64,
}

impl TracingEventPublisher {
    /// Create a publisher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Events published since creation.
    #[must_use]
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    fn emit(event: &WheelEvent) {
        let name = event.name();
        match event {
            WheelEvent::OrderPlaced(e) => tracing::info!(
                target: "wheel_engine::events",
                event = name,
                order_id = %e.order_id,
                symbol = %e.symbol,
                underlying = %e.underlying,
                side = ?e.side,
                quantity = e.quantity,
                limit_price = %e.limit_price,
                "Order placed"
            ),
            WheelEvent::OrderFilled(e) => tracing::info!(
                target: "wheel_engine::events",
                event = name,
                order_id = %e.order_id,
                symbol = %e.symbol,
                underlying = %e.underlying,
                quantity = e.quantity,
                fill_price = ?e.fill_price,
                "Order filled"
            ),
            WheelEvent::OrderRepriced(e) => tracing::info!(
                target: "wheel_engine::events",
                event = name,
                previous_order_id = %e.previous_order_id,
                order_id = %e.order_id,
                symbol = %e.symbol,
                old_price = %e.old_price,
                new_price = %e.new_price,
                attempt = e.attempt,
                "Order repriced"
            ),
            WheelEvent::OrderExpired(e) => tracing::info!(
                target: "wheel_engine::events",
                event = name,
                order_id = %e.order_id,
                symbol = %e.symbol,
                age_secs = e.age_secs,
                attempts = e.attempts,
                "Order expired"
            ),
            WheelEvent::RollExecuted(e) if e.completed => tracing::info!(
                target: "wheel_engine::events",
                event = name,
                underlying = %e.underlying,
                from_symbol = %e.from_symbol,
                to_symbol = %e.to_symbol,
                from_strike = %e.from_strike,
                to_strike = %e.to_strike,
                quantity = e.quantity,
                new_premium = %e.new_premium,
                "Roll executed"
            ),
            WheelEvent::RollExecuted(e) => tracing::warn!(
                target: "wheel_engine::events",
                event = name,
                underlying = %e.underlying,
                from_symbol = %e.from_symbol,
                to_symbol = %e.to_symbol,
                quantity = e.quantity,
                "Roll left incomplete, put closed without replacement"
            ),
            WheelEvent::CycleSummary(e) => tracing::info!(
                target: "wheel_engine::events",
                event = name,
                orders_submitted = e.orders_submitted,
                rolls = e.rolls,
                allowed_symbols = ?e.allowed_symbols,
                buying_power = %e.buying_power,
                risk = %e.risk,
                "Cycle summary"
            ),
        }
    }
}

#[async_trait]
impl EventPublisherPort for TracingEventPublisher {
    async fn publish_events(&self, events: Vec<WheelEvent>) -> Result<(), EventPublishError> {
        for event in &events {
            Self::emit(event);
        }
        self.published
            .fetch_add(events.len() as u64, Ordering::Relaxed);
        Ok(())
    }
}

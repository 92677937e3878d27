//! Application Ports (Driver and Driven)
//!
//! Ports define interfaces for interacting with external systems.
//! - **Driven Ports** (Secondary/Outbound): broker, ledger, event sink
//! - **Candidate selection**: a synchronous seam over the screening rules

mod broker_port;
mod candidate_selector_port;
mod event_publisher_port;
mod ledger_port;

pub use broker_port::{
    AccountSnapshot, BrokerError, BrokerOrderStatus, BrokerPort, ExpirationWindow, OrderAck,
    OrderSide,
};
pub use candidate_selector_port::CandidateSelector;
pub use event_publisher_port::{
    CycleSummaryEvent, EventPublishError, EventPublisherPort, NoOpEventPublisher, OrderExpired,
    OrderFilled, OrderPlaced, OrderRepriced, RollExecuted, WheelEvent, publish_or_log,
};
pub use ledger_port::{
    CostBasis, LedgerError, LedgerPort, NewPremium, NewTrade, PositionRecord, PositionStatus,
    PositionType, PremiumRecord, PremiumStatus, SummaryStats, TradeType, option_type_code,
};

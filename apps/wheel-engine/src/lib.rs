// Allow unwrap/expect in tests - tests should panic on unexpected errors
// Allow test-specific patterns and pedantic lints in test code
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::needless_collect,
        clippy::option_if_let_else,
        clippy::default_trait_access,
        clippy::items_after_statements,
        clippy::or_fun_call
    )
)]

//! Wheel Engine - Rust Core Library
//!
//! Order lifecycle and state reconciliation for the options wheel: sell
//! cash-secured puts, take assignment, sell covered calls against the shares,
//! and repeat.
//!
//! # Architecture (Clean Architecture + DDD + Hexagonal)
//!
//! ## Layers (inside → outside)
//!
//! - **Domain**: Pure, synchronous rules
//!   - `wheel`: OCC symbols, positions, per-underlying state derivation, risk
//!   - `selection`: Option screening, scoring, per-underlying selection
//!   - `rolling`: Near-expiry put identification and roll strategies
//!   - `capacity`, `market_hours`: Buying power allocation and session gating
//!
//! - **Application**: Use cases and orchestration
//!   - `ports`: Interfaces for external systems (`BrokerPort`, `LedgerPort`, `EventPublisherPort`)
//!   - `order_manager`: Limit order submit, reprice, expire and fill tracking
//!   - `use_cases`: Rolls, option sales, the strategy cycle
//!   - `services`: Shared wheel state and the polling runner
//!
//! - **Infrastructure**: Adapters (implementations)
//!   - `broker`: Alpaca trading and market data adapter
//!   - `persistence`: SQLite and in-memory trade ledgers
//!   - `events`: Tracing-backed event publisher
//!
//! Cross-cutting: `broker` (retry middleware), `resilience` (circuit
//! breakers), `config`, `observability`, `error`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Clean Architecture Layers
// =============================================================================

/// Domain layer - Core business logic with no external dependencies.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Cross-cutting
// =============================================================================

/// Retry middleware for broker calls.
pub mod broker;

/// YAML configuration loading and validation.
pub mod config;

/// Engine-level error type and codes.
pub mod error;

/// Logging setup.
pub mod observability;

/// Circuit breakers.
pub mod resilience;

// =============================================================================
// Re-exports from Clean Architecture
// =============================================================================

// Domain re-exports
pub use domain::selection::{OptionFilters, ScoringSelector};
pub use domain::wheel::{OptionSymbol, OptionType, Position, WheelState, derive_state};

// Application re-exports
pub use application::order_manager::{OrderManager, OrderManagerConfig};
pub use application::ports::{
    BrokerError, BrokerPort, CandidateSelector, EventPublisherPort, LedgerError, LedgerPort,
    NoOpEventPublisher, WheelEvent,
};
pub use application::services::{RunStats, RunnerConfig, StateManager, StrategyRunner};
pub use application::use_cases::{CycleOrchestrator, CycleSettings, CycleSummary, RollEngine};

// Infrastructure re-exports
pub use infrastructure::broker::alpaca::{
    AlpacaBrokerAdapter, AlpacaConfig, AlpacaEnvironment, AlpacaError,
};
pub use infrastructure::events::TracingEventPublisher;
pub use infrastructure::persistence::{InMemoryLedger, SqliteLedger};

pub use error::{EngineError, ErrorCode};

//! Infrastructure Layer
//!
//! Adapters (implementations) for the ports defined in the application
//! layer:
//!
//! - `broker/`: Alpaca trading and market data API
//! - `persistence/`: SQLite trade ledger, plus an in-memory ledger for tests
//! - `events/`: Strategy events as structured log records

pub mod broker;
pub mod events;
pub mod persistence;

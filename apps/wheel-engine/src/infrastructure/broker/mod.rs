//! Broker Adapters
//!
//! Implementations of `BrokerPort` for various brokers.

pub mod alpaca;

pub use alpaca::{AlpacaBrokerAdapter, AlpacaConfig, AlpacaError};

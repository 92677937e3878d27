//! Alpaca Markets Broker Adapter
//!
//! Implementation of `BrokerPort` for the Alpaca REST APIs with:
//! - Trading API: account, positions, option contracts, orders
//! - Market data API: option snapshots, latest equity trades
//! - Retry with exponential backoff under named circuit breakers
//! - Environment-aware safety logging (PAPER vs LIVE)

mod adapter;
mod api_types;
mod config;
mod error;
mod http_client;

pub use adapter::AlpacaBrokerAdapter;
pub use config::{AlpacaConfig, AlpacaEnvironment};
pub use error::AlpacaError;

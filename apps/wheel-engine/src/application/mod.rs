//! Application Layer
//!
//! The application layer orchestrates domain logic through use cases.
//! It defines:
//!
//! - **Ports**: Interfaces for interacting with external systems
//! - **Order Manager**: Lifecycle of working limit orders
//! - **Use Cases**: Rolling, option selling and the strategy cycle
//! - **Services**: Shared wheel state and the polling runner

pub mod order_manager;
pub mod ports;
pub mod services;
pub mod use_cases;

#[cfg(test)]
pub(crate) mod test_support;

pub use ports::*;
pub use use_cases::*;

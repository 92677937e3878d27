//! Order Manager
//!
//! Limit order lifecycle: submit at the mid, reprice toward the far side of
//! the quote while working, cancel once too old, and report fills.
//!
//! ```text
//! submitted → pending → repriced → ... → filled | canceled | expired
//! ```

mod manager;
mod pending;
mod pricing;

pub use manager::{OrderManager, OrderManagerConfig, OrderManagerError, PollOutcome, PollStatus};
pub use pending::{DEFAULT_MAX_ATTEMPTS, OrderContext, OrderKind, PendingOrder};
pub use pricing::{initial_limit_price, reprice_price, target_price};

//! Persistence Adapters
//!
//! Ledger implementations: SQLite for production, in-memory for tests.

pub mod in_memory;
pub mod sqlite;

pub use in_memory::InMemoryLedger;
pub use sqlite::{SqliteLedger, with_lock_retry};

//! Trade ledger configuration.

use serde::{Deserialize, Serialize};

/// Ledger database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// SQLite connection URL. The file and its directory are created if missing.
    #[serde(default = "default_database_url")]
    pub database_url: String,
    /// Pool size.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_database_url() -> String {
    "sqlite://data/wheel_strategy.db".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

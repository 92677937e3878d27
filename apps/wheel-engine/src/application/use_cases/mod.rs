//! Application Use Cases
//!
//! Use cases orchestrate domain logic to fulfill application requirements.

mod roll_positions;
mod run_cycle;
mod sell_options;

pub use roll_positions::{RollEngine, RollOutcome, RollReport};
pub use run_cycle::{CycleOrchestrator, CycleSettings, CycleSummary};
pub use sell_options::{ContractSizing, OptionSeller, PutSaleRequest, PutSales};

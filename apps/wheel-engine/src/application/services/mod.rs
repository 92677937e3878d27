//! Application Services
//!
//! Application services coordinate domain logic and infrastructure adapters.
//! They differ from use cases in that they hold state across cycles or run
//! as the long-lived loop.

mod runner;
mod state_manager;

pub use runner::{RunStats, RunnerConfig, StrategyRunner};
pub use state_manager::StateManager;

//! Candidate Selection
//!
//! Screens option contracts by delta, annualized yield and open interest,
//! scores the survivors, and picks the best per underlying without exceeding
//! the wheel layer limit.

mod candidate;
mod filters;
mod scoring;

pub use candidate::{OptionCandidate, OptionContract, OptionSnapshot, join_snapshots};
pub use filters::OptionFilters;
pub use scoring::ScoringSelector;

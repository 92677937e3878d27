//! Observability: structured logging setup.
//!
//! Everything in the crate logs through `tracing` with structured fields.
//! This module installs the global subscriber once at startup.

mod logging;

pub use logging::{LogFormat, TracingError, default_directives, init_tracing};

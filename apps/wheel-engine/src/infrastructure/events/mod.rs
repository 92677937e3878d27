//! Event Publisher Adapters
//!
//! Strategy events go to the tracing pipeline as structured log records.

mod tracing_publisher;

pub use tracing_publisher::TracingEventPublisher;

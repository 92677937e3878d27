//! Resilience patterns for external service calls.
//!
//! Circuit breakers that let the broker adapter fail fast while Alpaca is
//! unavailable.

mod circuit_breaker;

pub use circuit_breaker::{
    BrokerCircuitBreakers, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerMetrics,
    CircuitBreakerState,
};

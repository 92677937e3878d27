//! Broker integration and resilience patterns.
//!
//! Retry policy and the `call_with_retry` middleware that the Alpaca adapter
//! wraps around every API call.

mod retry;

pub use retry::{
    BrokerRetryPolicy, ExponentialBackoffCalculator, call_with_retry, is_retryable_status,
};

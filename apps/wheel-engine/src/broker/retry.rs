//! Retry policies with exponential backoff for broker API calls.
//!
//! [`call_with_retry`] wraps one broker operation: it asks the circuit
//! breaker for permission before every attempt, retries transient failures
//! with jittered exponential backoff, and reports each outcome back to the
//! breaker.
//!
//! # Retryable Errors
//!
//! | Retryable | Non-Retryable |
//! |-----------|---------------|
//! | HTTP 429 (Rate Limited) | HTTP 400 (Bad Request) |
//! | HTTP 5xx | HTTP 401/403 (Auth Errors) |
//! | Network timeouts | HTTP 404 (Not Found) |
//! | Connection reset | HTTP 422 (Order rejected) |
//!
//! # Example
//!
//! ```rust,ignore
//! use wheel_engine::broker::{BrokerRetryPolicy, call_with_retry};
//!
//! let account = call_with_retry(&policy, &breakers.market_data, "get_account", || async {
//!     client.get_account().await.map_err(BrokerError::from)
//! })
//! .await?;
//! ```

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::application::ports::BrokerError;
use crate::resilience::CircuitBreaker;

/// Retry policy configuration for broker API calls.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BrokerRetryPolicy {
    /// Total attempts, including the first (default: 3).
    pub max_attempts: u32,
    /// Initial backoff duration (default: 1s).
    pub initial_backoff: Duration,
    /// Maximum backoff duration (default: 30s).
    pub max_backoff: Duration,
    /// Backoff multiplier for exponential growth (default: 2.0).
    pub backoff_multiplier: f64,
    /// Jitter factor: delays are scaled by a random factor in `[1 - jitter, 1]` (default: 0.5).
    pub jitter_factor: f64,
}

impl Default for BrokerRetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter_factor: 0.5,
        }
    }
}

impl BrokerRetryPolicy {
    /// Create a new retry policy with custom settings.
    #[must_use]
    pub const fn new(
        max_attempts: u32,
        initial_backoff: Duration,
        max_backoff: Duration,
        backoff_multiplier: f64,
        jitter_factor: f64,
    ) -> Self {
        Self {
            max_attempts,
            initial_backoff,
            max_backoff,
            backoff_multiplier,
            jitter_factor,
        }
    }

    /// A policy that never retries.
    #[must_use]
    pub const fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            backoff_multiplier: 1.0,
            jitter_factor: 0.0,
        }
    }
}

/// Calculator for exponential backoff with jitter.
#[derive(Debug)]
pub struct ExponentialBackoffCalculator {
    current_attempt: u32,
    max_retries: u32,
    initial_backoff_ms: u64,
    max_backoff_ms: u64,
    backoff_multiplier: f64,
    jitter_factor: f64,
}

impl ExponentialBackoffCalculator {
    /// Create a new backoff calculator from a retry policy.
    #[must_use]
    pub const fn new(policy: &BrokerRetryPolicy) -> Self {
        Self {
            current_attempt: 0,
            max_retries: policy.max_attempts.saturating_sub(1),
            initial_backoff_ms: policy.initial_backoff.as_millis() as u64,
            max_backoff_ms: policy.max_backoff.as_millis() as u64,
            jitter_factor: policy.jitter_factor,
            backoff_multiplier: policy.backoff_multiplier,
        }
    }

    /// Get the next backoff duration with jitter.
    ///
    /// Returns `None` once every retry has been used.
    pub fn next_backoff(&mut self) -> Option<Duration> {
        if self.current_attempt >= self.max_retries {
            return None;
        }

        let base_backoff_ms = self.calculate_base_backoff_ms();
        let jittered_ms = self.apply_jitter(base_backoff_ms);

        self.current_attempt += 1;

        Some(Duration::from_millis(jittered_ms))
    }

    /// `min(initial × multiplier^attempt, max)`.
    fn calculate_base_backoff_ms(&self) -> u64 {
        let multiplier = self.backoff_multiplier.powi(self.current_attempt as i32);
        let backoff = (self.initial_backoff_ms as f64 * multiplier) as u64;
        backoff.min(self.max_backoff_ms)
    }

    /// Scale by a random factor in `[1 - jitter, 1]`.
    fn apply_jitter(&self, backoff_ms: u64) -> u64 {
        if self.jitter_factor <= 0.0 || backoff_ms == 0 {
            return backoff_ms;
        }
        let low = (1.0 - self.jitter_factor).clamp(0.0, 1.0);
        let factor = rand::rng().random_range(low..=1.0);
        (backoff_ms as f64 * factor) as u64
    }

    /// Get the number of backoffs handed out.
    #[must_use]
    pub const fn current_attempt(&self) -> u32 {
        self.current_attempt
    }

    /// Check if more retries are available.
    #[must_use]
    pub const fn has_remaining_attempts(&self) -> bool {
        self.current_attempt < self.max_retries
    }
}

/// Check if an HTTP status code is retryable.
#[must_use]
pub fn is_retryable_status(status_code: u16) -> bool {
    status_code == 429 || status_code == 408 || (500..600).contains(&status_code)
}

/// Run `operation` under `breaker` with retries per `policy`.
///
/// Fails fast with [`BrokerError::CircuitOpen`] when the breaker refuses a
/// call. Transient failures count against the breaker and are retried;
/// anything else is returned immediately.
pub async fn call_with_retry<T, F, Fut>(
    policy: &BrokerRetryPolicy,
    breaker: &CircuitBreaker,
    operation: &str,
    mut call: F,
) -> Result<T, BrokerError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BrokerError>>,
{
    let mut backoff = ExponentialBackoffCalculator::new(policy);
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;

        if !breaker.is_call_permitted() {
            tracing::warn!(operation, breaker = breaker.name(), "Circuit open, failing fast");
            return Err(BrokerError::CircuitOpen {
                breaker: breaker.name().to_string(),
            });
        }

        let error = match call().await {
            Ok(value) => {
                breaker.record_success();
                return Ok(value);
            }
            Err(e) => e,
        };

        if !error.is_retryable() {
            // The service answered; only transport and server faults count against it.
            breaker.record_success();
            return Err(error);
        }
        breaker.record_failure();

        let Some(delay) = backoff.next_backoff() else {
            tracing::error!(operation, attempts = attempt, error = %error, "Broker call failed after retries");
            return Err(error);
        };

        tracing::warn!(
            operation,
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Broker call failed, retrying"
        );
        tokio::time::sleep(delay).await;
    }
}

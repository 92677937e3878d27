//! Circuit breaker for broker API calls.
//!
//! Stops hammering Alpaca once it is clearly unavailable and fails fast until
//! a recovery timeout has passed.
//!
//! # State Machine
//!
//! ```text
//! CLOSED → OPEN (consecutive failures >= threshold)
//! OPEN → HALF_OPEN (recovery timeout elapsed)
//! HALF_OPEN → CLOSED (probe call succeeds)
//! HALF_OPEN → OPEN (probe call fails)
//! ```
//!
//! # Named breakers
//!
//! | Breaker | Threshold | Recovery |
//! |---------|-----------|----------|
//! | `trading` | 3 | 60s |
//! | `market_data` | 5 | 30s |
//! | `options` | 5 | 30s |
//!
//! # Example
//!
//! ```rust,ignore
//! use wheel_engine::resilience::{CircuitBreaker, CircuitBreakerConfig};
//!
//! let breaker = CircuitBreaker::new("trading", CircuitBreakerConfig::trading());
//!
//! if breaker.is_call_permitted() {
//!     match submit_order().await {
//!         Ok(_) => breaker.record_success(),
//!         Err(_) => breaker.record_failure(),
//!     }
//! }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitBreakerState {
    /// Circuit is closed, calls flow normally.
    Closed,
    /// Circuit is open, calls are rejected.
    Open,
    /// Circuit is letting probe calls through.
    HalfOpen,
}

impl std::fmt::Display for CircuitBreakerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "CLOSED"),
            Self::Open => write!(f, "OPEN"),
            Self::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,
    /// Time to stay open before probing.
    pub recovery_timeout: Duration,
    /// Probe calls allowed while half-open.
    pub half_open_max_calls: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self::market_data()
    }
}

impl CircuitBreakerConfig {
    /// Account, positions and orders.
    #[must_use]
    pub const fn trading() -> Self {
        Self {
            failure_threshold: 3,
            recovery_timeout: Duration::from_secs(60),
            half_open_max_calls: 1,
        }
    }

    /// Latest equity trades.
    #[must_use]
    pub const fn market_data() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(30),
            half_open_max_calls: 1,
        }
    }

    /// Option contracts and snapshots.
    #[must_use]
    pub const fn options() -> Self {
        Self::market_data()
    }
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitBreakerState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    half_open_calls: u32,
}

/// Circuit breaker for one class of broker calls.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerState>,
    total_calls: AtomicU64,
    total_failures: AtomicU64,
    state_transitions: AtomicU64,
}

impl CircuitBreaker {
    /// Create a new circuit breaker.
    #[must_use]
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerState {
                state: CircuitBreakerState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                half_open_calls: 0,
            }),
            total_calls: AtomicU64::new(0),
            total_failures: AtomicU64::new(0),
            state_transitions: AtomicU64::new(0),
        }
    }

    /// Get the breaker name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the current state.
    #[must_use]
    pub fn state(&self) -> CircuitBreakerState {
        let mut inner = self.lock();
        self.check_recovery(&mut inner);
        inner.state
    }

    /// Check if a call is permitted. Counts a probe slot when half-open.
    #[must_use]
    pub fn is_call_permitted(&self) -> bool {
        let mut inner = self.lock();
        self.check_recovery(&mut inner);

        match inner.state {
            CircuitBreakerState::Closed => true,
            CircuitBreakerState::Open => false,
            CircuitBreakerState::HalfOpen => {
                if inner.half_open_calls < self.config.half_open_max_calls {
                    inner.half_open_calls += 1;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Record a successful call.
    pub fn record_success(&self) {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        let mut inner = self.lock();
        inner.consecutive_failures = 0;
        if inner.state != CircuitBreakerState::Closed {
            self.transition(&mut inner, CircuitBreakerState::Closed);
        }
    }

    /// Record a failed call.
    pub fn record_failure(&self) {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        self.total_failures.fetch_add(1, Ordering::Relaxed);
        let mut inner = self.lock();
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);

        match inner.state {
            CircuitBreakerState::HalfOpen => {
                self.transition(&mut inner, CircuitBreakerState::Open);
            }
            CircuitBreakerState::Closed
                if inner.consecutive_failures >= self.config.failure_threshold =>
            {
                self.transition(&mut inner, CircuitBreakerState::Open);
            }
            _ => {}
        }
    }

    /// Force the circuit breaker open.
    pub fn force_open(&self) {
        let mut inner = self.lock();
        self.transition(&mut inner, CircuitBreakerState::Open);
    }

    /// Force the circuit breaker closed.
    pub fn force_close(&self) {
        let mut inner = self.lock();
        inner.consecutive_failures = 0;
        self.transition(&mut inner, CircuitBreakerState::Closed);
    }

    /// Get metrics for this circuit breaker.
    #[must_use]
    pub fn metrics(&self) -> CircuitBreakerMetrics {
        let (state, consecutive_failures) = {
            let mut inner = self.lock();
            self.check_recovery(&mut inner);
            (inner.state, inner.consecutive_failures)
        };
        CircuitBreakerMetrics {
            name: self.name.clone(),
            state,
            consecutive_failures,
            total_calls: self.total_calls.load(Ordering::Relaxed),
            total_failures: self.total_failures.load(Ordering::Relaxed),
            state_transitions: self.state_transitions.load(Ordering::Relaxed),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.inner.lock()
    }

    fn check_recovery(&self, inner: &mut BreakerState) {
        if inner.state == CircuitBreakerState::Open
            && inner
                .opened_at
                .is_some_and(|opened| opened.elapsed() >= self.config.recovery_timeout)
        {
            self.transition(inner, CircuitBreakerState::HalfOpen);
        }
    }

    fn transition(&self, inner: &mut BreakerState, to: CircuitBreakerState) {
        let from = inner.state;
        if from == to {
            return;
        }
        inner.state = to;
        match to {
            CircuitBreakerState::Open => inner.opened_at = Some(Instant::now()),
            CircuitBreakerState::HalfOpen => inner.half_open_calls = 0,
            CircuitBreakerState::Closed => inner.opened_at = None,
        }
        self.state_transitions.fetch_add(1, Ordering::Relaxed);

        tracing::warn!(
            name = %self.name,
            from = %from,
            to = %to,
            consecutive_failures = inner.consecutive_failures,
            "Circuit breaker state change"
        );
    }
}

/// Metrics for a circuit breaker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerMetrics {
    /// Breaker name.
    pub name: String,
    /// Current state.
    pub state: CircuitBreakerState,
    /// Failures since the last success.
    pub consecutive_failures: u32,
    /// Total calls.
    pub total_calls: u64,
    /// Total failures.
    pub total_failures: u64,
    /// Number of state transitions.
    pub state_transitions: u64,
}

/// The broker adapter's named breakers.
#[derive(Debug)]
pub struct BrokerCircuitBreakers {
    /// Account, positions, and order submission, replacement and cancellation.
    pub trading: CircuitBreaker,
    /// Equity quotes and trades.
    pub market_data: CircuitBreaker,
    /// Option contracts and snapshots.
    pub options: CircuitBreaker,
}

impl Default for BrokerCircuitBreakers {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl BrokerCircuitBreakers {
    /// Create the breakers with their standard thresholds.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(
            CircuitBreakerConfig::trading(),
            CircuitBreakerConfig::market_data(),
            CircuitBreakerConfig::options(),
        )
    }

    /// Create the breakers from explicit settings.
    #[must_use]
    pub fn new(
        trading: CircuitBreakerConfig,
        market_data: CircuitBreakerConfig,
        options: CircuitBreakerConfig,
    ) -> Self {
        Self {
            trading: CircuitBreaker::new("trading", trading),
            market_data: CircuitBreaker::new("market_data", market_data),
            options: CircuitBreaker::new("options", options),
        }
    }

    /// Get all metrics.
    #[must_use]
    pub fn all_metrics(&self) -> Vec<CircuitBreakerMetrics> {
        vec![
            self.trading.metrics(),
            self.market_data.metrics(),
            self.options.metrics(),
        ]
    }
}

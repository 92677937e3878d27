//! Strategy runner: the polling loop around the cycle orchestrator.
//!
//! Cycles run on `cycle_interval`, fill reconciliation on `update_interval`.
//! Both are independent wall-clock checks inside one loop that sleeps for a
//! second between passes, so a pass may do both. Outside market hours the loop waits for
//! `market_check_interval`; in single-shot mode it exits instead.
//!
//! On shutdown the in-flight pass finishes, the loop exits, and every
//! working order is cancelled.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{BrokerPort, CandidateSelector, EventPublisherPort, LedgerPort};
use crate::application::use_cases::CycleOrchestrator;
use crate::domain::market_hours::is_market_open;

/// Loop timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Time between strategy cycles.
    pub cycle_interval: Duration,
    /// Time between fill reconciliation passes.
    pub update_interval: Duration,
    /// Wait between market-open checks while closed.
    pub market_check_interval: Duration,
    /// Sleep between loop passes.
    pub poll_sleep: Duration,
    /// Run one cycle, drain its orders, then exit.
    pub once: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            cycle_interval: Duration::from_secs(60),
            update_interval: Duration::from_secs(20),
            market_check_interval: Duration::from_secs(60),
            poll_sleep: Duration::from_secs(1),
            once: false,
        }
    }
}

/// Counters reported when the runner exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    /// Cycles that completed.
    pub cycles: u64,
    /// Cycles that ended in an error.
    pub failed_cycles: u64,
    /// Orders cancelled at shutdown.
    pub cancelled_at_shutdown: usize,
}

/// Runs the strategy until cancelled (or once).
pub struct StrategyRunner<B, L, E, S>
where
    B: BrokerPort + ?Sized,
    L: LedgerPort + ?Sized,
    E: EventPublisherPort + ?Sized,
    S: CandidateSelector + ?Sized,
{
    orchestrator: Arc<CycleOrchestrator<B, L, E, S>>,
    config: RunnerConfig,
    shutdown: CancellationToken,
    market_open: fn(DateTime<Utc>) -> bool,
}

impl<B, L, E, S> StrategyRunner<B, L, E, S>
where
    B: BrokerPort + ?Sized,
    L: LedgerPort + ?Sized,
    E: EventPublisherPort + ?Sized,
    S: CandidateSelector + ?Sized,
{
    /// Create a runner gated on regular US market hours.
    #[must_use]
    pub fn new(
        orchestrator: Arc<CycleOrchestrator<B, L, E, S>>,
        config: RunnerConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            orchestrator,
            config,
            shutdown,
            market_open: is_market_open,
        }
    }

    /// Replace the market-hours check.
    #[must_use]
    pub fn with_market_check(mut self, market_open: fn(DateTime<Utc>) -> bool) -> Self {
        self.market_open = market_open;
        self
    }

    /// Run until the shutdown token fires, or until the single-shot cycle's
    /// orders are settled. Working orders are cancelled before returning.
    pub async fn run(&self) -> RunStats {
        let mut stats = RunStats::default();
        let mut last_cycle: Option<DateTime<Utc>> = None;
        let mut last_update: Option<DateTime<Utc>> = None;

        tracing::info!(
            cycle_interval_secs = self.config.cycle_interval.as_secs(),
            update_interval_secs = self.config.update_interval.as_secs(),
            once = self.config.once,
            "Strategy runner started"
        );

        while !self.shutdown.is_cancelled() {
            let now = Utc::now();

            if !(self.market_open)(now) {
                if self.config.once {
                    tracing::info!("Market closed, exiting");
                    break;
                }
                tracing::info!(
                    recheck_secs = self.config.market_check_interval.as_secs(),
                    "Market closed, waiting"
                );
                if !self.sleep(self.config.market_check_interval).await {
                    break;
                }
                continue;
            }

            if last_cycle.is_none_or(|at| elapsed(at, now) >= self.config.cycle_interval)
                && !(self.config.once && last_cycle.is_some())
            {
                match self.orchestrator.run_cycle(now).await {
                    Ok(summary) => {
                        stats.cycles += 1;
                        tracing::debug!(orders = summary.orders_submitted(), "Cycle finished");
                    }
                    Err(e) if e.is_fatal() => {
                        stats.failed_cycles += 1;
                        tracing::error!(code = %e.code(), error = %e, "Cycle aborted");
                    }
                    Err(e) => {
                        stats.failed_cycles += 1;
                        tracing::warn!(code = %e.code(), error = %e, "Cycle failed");
                    }
                }
                last_cycle = Some(now);
            }

            if last_update.is_none_or(|at| elapsed(at, now) >= self.config.update_interval) {
                let results = self.orchestrator.reconcile_orders().await;
                if !results.is_empty() {
                    tracing::debug!(orders = results.len(), "Reconciled orders");
                }
                last_update = Some(now);
            }

            if self.config.once
                && last_cycle.is_some()
                && !self.orchestrator.order_manager().has_pending_orders()
            {
                tracing::info!("Single cycle complete");
                break;
            }

            if !self.sleep(self.config.poll_sleep).await {
                break;
            }
        }

        stats.cancelled_at_shutdown = self.orchestrator.cancel_all_pending().await;
        tracing::info!(
            cycles = stats.cycles,
            failed_cycles = stats.failed_cycles,
            cancelled = stats.cancelled_at_shutdown,
            "Strategy runner stopped"
        );
        stats
    }

    /// Sleep unless shutdown fires first. Returns false on shutdown.
    async fn sleep(&self, duration: Duration) -> bool {
        tokio::select! {
            () = tokio::time::sleep(duration) => true,
            () = self.shutdown.cancelled() => {
                tracing::info!("Shutdown requested");
                false
            }
        }
    }
}

fn elapsed(since: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (now - since).to_std().unwrap_or_default()
}

//! Wheel Engine Binary
//!
//! Runs the wheel strategy against Alpaca until interrupted.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin wheel-engine -- --config config.yaml
//! cargo run --bin wheel-engine -- --once --log-level debug
//! ```
//!
//! # Environment Variables
//!
//! ## Required (normally referenced from the config file)
//! - `ALPACA_KEY`: Broker API key
//! - `ALPACA_SECRET`: Broker API secret
//!
//! ## Optional
//! - `WHEEL_CONFIG`: Config file path (default: config.yaml)
//! - `RUST_LOG`: Log filter, overrides the configured level

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;

use wheel_engine::application::order_manager::OrderManager;
use wheel_engine::application::services::{RunStats, StateManager, StrategyRunner};
use wheel_engine::application::use_cases::CycleOrchestrator;
use wheel_engine::config::{Config, load_config};
use wheel_engine::domain::selection::ScoringSelector;
use wheel_engine::infrastructure::broker::alpaca::AlpacaBrokerAdapter;
use wheel_engine::infrastructure::events::TracingEventPublisher;
use wheel_engine::infrastructure::persistence::SqliteLedger;
use wheel_engine::observability::init_tracing;

/// Command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "wheel-engine", version, about = "Options wheel strategy engine")]
struct Cli {
    /// Path to the YAML config file.
    #[arg(long, env = "WHEEL_CONFIG", default_value = "config.yaml")]
    config: String,

    /// Seconds between fill checks and reprices.
    #[arg(long)]
    update_interval: Option<u64>,

    /// Seconds between strategy cycles.
    #[arg(long)]
    cycle_interval: Option<u64>,

    /// Minutes before a working order is canceled.
    #[arg(long)]
    max_order_age: Option<u64>,

    /// Run a single cycle, wait for its orders to settle, then exit.
    #[arg(long)]
    once: bool,

    /// Log level for this crate (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(secs) = self.update_interval {
            config.runtime.update_interval_secs = secs;
        }
        if let Some(secs) = self.cycle_interval {
            config.runtime.cycle_interval_secs = secs;
        }
        if let Some(minutes) = self.max_order_age {
            config.runtime.max_order_age_secs = minutes.saturating_mul(60);
        }
    }
}

type Orchestrator =
    CycleOrchestrator<AlpacaBrokerAdapter, SqliteLedger, TracingEventPublisher, ScoringSelector>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();
    let cli = Cli::parse();

    let mut config = load_config(Some(&cli.config))
        .with_context(|| format!("loading configuration from {}", cli.config))?;
    cli.apply_overrides(&mut config);
    config.validate().context("validating command-line overrides")?;

    init_tracing(&config.observability.logging, cli.log_level.as_deref())?;

    tracing::info!("Starting Wheel Engine");
    log_config(&config, cli.once);

    let broker = Arc::new(
        AlpacaBrokerAdapter::new(config.broker.to_alpaca_config()?)
            .context("creating Alpaca client")?,
    );
    let ledger = Arc::new(
        SqliteLedger::connect(&config.ledger.database_url, config.ledger.max_connections)
            .await
            .with_context(|| format!("opening ledger {}", config.ledger.database_url))?,
    );
    let events = Arc::new(TracingEventPublisher::new());

    let orchestrator = create_orchestrator(&config, &broker, &ledger, &events);

    let shutdown_token = CancellationToken::new();
    tokio::spawn(shutdown_signal(shutdown_token.clone()));

    let runner = StrategyRunner::new(
        orchestrator,
        config.runner_config(cli.once),
        shutdown_token,
    );
    let stats = runner.run().await;

    log_stats(&stats, &broker, &events);
    ledger.close().await;

    tracing::info!("Wheel engine stopped");
    Ok(())
}

/// Wire the cycle orchestrator and its collaborators.
fn create_orchestrator(
    config: &Config,
    broker: &Arc<AlpacaBrokerAdapter>,
    ledger: &Arc<SqliteLedger>,
    events: &Arc<TracingEventPublisher>,
) -> Arc<Orchestrator> {
    let selector = Arc::new(ScoringSelector::new(config.strategy.option_filters.clone()));
    let state = Arc::new(StateManager::new());
    let orders = Arc::new(OrderManager::new(
        Arc::clone(broker),
        Arc::clone(events),
        config.order_manager_config(),
    ));

    Arc::new(CycleOrchestrator::new(
        Arc::clone(broker),
        Arc::clone(ledger),
        Arc::clone(events),
        selector,
        state,
        orders,
        config.cycle_settings(),
    ))
}

/// Log the effective configuration. Credentials are never logged.
fn log_config(config: &Config, once: bool) {
    let settings = config.cycle_settings();
    tracing::info!(
        environment = %config.broker.environment.to_ascii_uppercase(),
        symbols = ?settings.symbols,
        allocation_percentage = %settings.allocation_percentage,
        max_wheel_layers = settings.max_wheel_layers,
        rolling_enabled = settings.rolling.settings.enabled,
        update_interval_secs = config.runtime.update_interval_secs,
        cycle_interval_secs = config.runtime.cycle_interval_secs,
        max_order_age_secs = config.runtime.max_order_age_secs,
        database_url = %config.ledger.database_url,
        once,
        "Configuration loaded"
    );
    if settings.symbols.is_empty() {
        tracing::warn!("No symbols enabled in configuration");
    }
}

/// Log run counters and broker health on exit.
fn log_stats(stats: &RunStats, broker: &AlpacaBrokerAdapter, events: &TracingEventPublisher) {
    tracing::info!(
        cycles = stats.cycles,
        failed_cycles = stats.failed_cycles,
        cancelled_at_shutdown = stats.cancelled_at_shutdown,
        events_published = events.published(),
        "Run finished"
    );

    let breakers = broker.circuit_breakers();
    for metrics in [
        breakers.trading.metrics(),
        breakers.market_data.metrics(),
        breakers.options.metrics(),
    ] {
        tracing::info!(
            breaker = %metrics.name,
            state = %metrics.state,
            total_calls = metrics.total_calls,
            total_failures = metrics.total_failures,
            state_transitions = metrics.state_transitions,
            "Circuit breaker summary"
        );
    }
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for SIGINT or SIGTERM, then cancel the token.
///
/// # Panics
///
/// Panics if signal handlers cannot be installed.
#[allow(clippy::expect_used)]
async fn shutdown_signal(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, finishing current pass");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, finishing current pass");
        }
    }

    shutdown_token.cancel();
}

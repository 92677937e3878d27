//! Roll Positions Use Case
//!
//! Rolls near-expiry short puts into later-dated contracts: buy to close the
//! old contract, then sell to open the replacement, both at market.
//!
//! The two legs are not atomic. When the close goes through and the open
//! does not, the position is left flat, the roll is reported as partial, and
//! the ledger gets the close so the gap can be reconciled by hand.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::application::ports::{
    BrokerError, BrokerPort, CandidateSelector, EventPublisherPort, ExpirationWindow, LedgerError,
    LedgerPort, NewPremium, NewTrade, OrderSide, PremiumStatus, RollExecuted, TradeType,
    WheelEvent, publish_or_log,
};
use crate::domain::rolling::{RollCandidate, RollPolicy, identify_rollable, matches_strategy};
use crate::domain::selection::{OptionCandidate, join_snapshots};
use crate::domain::wheel::{OptionType, Position};

/// Result of one roll attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RollOutcome {
    /// Both legs submitted.
    Success,
    /// Close submitted, open failed. The underlying is now flat.
    Partial {
        /// Why the open failed.
        error: String,
    },
    /// Close failed; nothing changed.
    Failed {
        /// Why the close failed.
        error: String,
    },
}

impl RollOutcome {
    /// Whether both legs went through.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// What a round of rolling did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RollReport {
    /// Rolls where both legs went through.
    pub completed: usize,
    /// Rolls where only the close went through.
    pub partial: usize,
}

impl RollReport {
    /// Whether any leg reached the broker, so positions have changed.
    #[must_use]
    pub const fn positions_changed(&self) -> bool {
        self.completed + self.partial > 0
    }
}

/// Use case for rolling short puts near expiry.
pub struct RollEngine<B, L, E, S>
where
    B: BrokerPort + ?Sized,
    L: LedgerPort + ?Sized,
    E: EventPublisherPort + ?Sized,
    S: CandidateSelector + ?Sized,
{
    broker: Arc<B>,
    ledger: Arc<L>,
    events: Arc<E>,
    selector: Arc<S>,
    policy: RollPolicy,
}

impl<B, L, E, S> RollEngine<B, L, E, S>
where
    B: BrokerPort + ?Sized,
    L: LedgerPort + ?Sized,
    E: EventPublisherPort + ?Sized,
    S: CandidateSelector + ?Sized,
{
    /// Create a new `RollEngine`.
    pub const fn new(
        broker: Arc<B>,
        ledger: Arc<L>,
        events: Arc<E>,
        selector: Arc<S>,
        policy: RollPolicy,
    ) -> Self {
        Self {
            broker,
            ledger,
            events,
            selector,
            policy,
        }
    }

    /// Roll every qualifying position.
    ///
    /// Returns an empty report immediately when rolling is disabled globally.
    /// A failure on one position does not stop the others.
    pub async fn process_rolls(&self, positions: &[Position], today: NaiveDate) -> RollReport {
        let mut report = RollReport::default();
        if !self.policy.settings.enabled {
            return report;
        }

        let scan = identify_rollable(positions, &self.policy, today);
        for (symbol, err) in &scan.skipped {
            tracing::warn!(symbol = %symbol, error = %err, "Could not parse option symbol, skipping roll check");
        }

        if scan.candidates.is_empty() {
            tracing::info!("No positions identified for rolling");
            return report;
        }

        for candidate in &scan.candidates {
            tracing::info!(
                symbol = %candidate.symbol,
                days_to_expiry = candidate.days_to_expiry,
                "Identified rollable position"
            );

            let targets = match self.find_roll_targets(candidate, today).await {
                Ok(targets) => targets,
                Err(e) => {
                    tracing::warn!(symbol = %candidate.symbol, error = %e, "Failed to fetch roll targets");
                    continue;
                }
            };

            let Some(target) = targets.first() else {
                tracing::info!(symbol = %candidate.symbol, "No suitable roll targets found");
                continue;
            };

            tracing::info!(
                symbol = %candidate.symbol,
                target = %target.symbol,
                strike = %target.strike,
                dte = target.dte,
                "Selected roll target"
            );

            match self.execute_roll(candidate, target).await {
                RollOutcome::Success => report.completed += 1,
                RollOutcome::Partial { .. } => {
                    report.partial += 1;
                    tracing::warn!(symbol = %candidate.symbol, "Roll left incomplete");
                }
                RollOutcome::Failed { .. } => {
                    tracing::warn!(symbol = %candidate.symbol, "Failed to roll");
                }
            }
        }

        if report.positions_changed() {
            tracing::info!(completed = report.completed, partial = report.partial, "Rolled positions");
        }
        report
    }

    /// Replacement puts for `candidate`, best first.
    ///
    /// Candidates must pay at least `min_premium_to_roll`, satisfy the
    /// underlying's roll strategy, and pass the standard screen.
    pub async fn find_roll_targets(
        &self,
        candidate: &RollCandidate,
        today: NaiveDate,
    ) -> Result<Vec<OptionCandidate>, BrokerError> {
        let filters = self.selector.filters();
        let window =
            ExpirationWindow::from_today(today, filters.expiration_min_days, filters.expiration_max_days);

        let contracts = self
            .broker
            .get_options_contracts(
                std::slice::from_ref(&candidate.underlying),
                OptionType::Put,
                window,
            )
            .await?;
        let symbols: Vec<String> = contracts.iter().map(|c| c.symbol.clone()).collect();
        let snapshots = self.broker.get_option_snapshots(&symbols).await?;

        let strategy = self.policy.strategy_for(&candidate.underlying);
        let min_premium = self.policy.settings.min_premium_to_roll;

        let eligible: Vec<OptionCandidate> = join_snapshots(&contracts, &snapshots, today)
            .into_iter()
            .filter(|o| o.bid >= min_premium && matches_strategy(strategy, candidate, o))
            .collect();

        let screened = self.selector.filter(&eligible, Decimal::ZERO);
        let scores = self.selector.score(&screened);

        let mut ranked: Vec<(OptionCandidate, f64)> = screened.into_iter().zip(scores).collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        Ok(ranked.into_iter().map(|(o, _)| o).collect())
    }

    /// Close `candidate` and open `target` at market, then record the result.
    pub async fn execute_roll(&self, candidate: &RollCandidate, target: &OptionCandidate) -> RollOutcome {
        tracing::info!(from = %candidate.symbol, to = %target.symbol, quantity = candidate.quantity, "Rolling");

        if let Err(e) = self
            .broker
            .submit_market_order(&candidate.symbol, candidate.quantity, OrderSide::Buy)
            .await
        {
            tracing::error!(symbol = %candidate.symbol, error = %e, "Roll close failed");
            return RollOutcome::Failed {
                error: e.to_string(),
            };
        }

        if let Err(e) = self
            .broker
            .submit_market_order(&target.symbol, candidate.quantity, OrderSide::Sell)
            .await
        {
            tracing::error!(
                from = %candidate.symbol,
                to = %target.symbol,
                error = %e,
                "Roll partial failure: close succeeded but open failed"
            );
            let note = format!(
                "Rolling position to {} (open failed: {e})",
                target.symbol
            );
            if let Err(le) = self.ledger.add_trade(self.close_trade(candidate, note)).await {
                tracing::error!(symbol = %candidate.underlying, error = %le, "Failed to record roll close");
            }
            self.publish(candidate, target, false).await;
            return RollOutcome::Partial {
                error: e.to_string(),
            };
        }

        if let Err(e) = self.record_roll(candidate, target).await {
            tracing::error!(symbol = %candidate.underlying, error = %e, "Failed to record roll in ledger");
        }
        self.publish(candidate, target, true).await;

        tracing::info!(from = %candidate.symbol, to = %target.symbol, "Rolled position");
        RollOutcome::Success
    }

    fn close_trade(&self, candidate: &RollCandidate, notes: String) -> NewTrade {
        NewTrade {
            symbol: candidate.underlying.clone(),
            trade_type: TradeType::BuyToClose,
            quantity: candidate.quantity,
            price: Decimal::ZERO,
            strike: Some(candidate.strike),
            expiration: Some(candidate.expiration),
            premium: Some(Decimal::ZERO),
            notes: Some(notes),
        }
    }

    async fn record_roll(&self, candidate: &RollCandidate, target: &OptionCandidate) -> Result<(), LedgerError> {
        self.ledger
            .add_trade(self.close_trade(
                candidate,
                format!("Rolling position to {}", target.symbol),
            ))
            .await?;

        let delta = target.delta.unwrap_or_default();
        self.ledger
            .add_premium(NewPremium {
                symbol: candidate.underlying.clone(),
                option_type: OptionType::Put,
                strike: target.strike,
                premium: target.bid,
                contracts: candidate.quantity,
                expiration: target.expiration,
                status: PremiumStatus::Collected,
                notes: Some(format!(
                    "Rolled from {}, Delta: {delta:.3}, DTE: {}",
                    candidate.symbol, target.dte
                )),
            })
            .await?;

        self.ledger
            .add_trade(NewTrade {
                symbol: candidate.underlying.clone(),
                trade_type: TradeType::SellPut,
                quantity: candidate.quantity,
                price: target.bid,
                strike: Some(target.strike),
                expiration: Some(target.expiration),
                premium: Some(target.bid),
                notes: Some(format!("Rolled from {}", candidate.symbol)),
            })
            .await?;
        Ok(())
    }

    async fn publish(&self, candidate: &RollCandidate, target: &OptionCandidate, completed: bool) {
        publish_or_log(
            self.events.as_ref(),
            WheelEvent::RollExecuted(RollExecuted {
                from_symbol: candidate.symbol.clone(),
                to_symbol: target.symbol.clone(),
                underlying: candidate.underlying.clone(),
                from_strike: candidate.strike,
                to_strike: target.strike,
                quantity: candidate.quantity,
                new_premium: target.bid,
                completed,
                occurred_at: Utc::now(),
            }),
        )
        .await;
    }
}

//! In-memory ledger for testing.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;

use crate::application::ports::{
    CostBasis, LedgerError, LedgerPort, NewPremium, NewTrade, PositionRecord, PositionStatus,
    PositionType, PremiumRecord, PremiumStatus, SummaryStats,
};
use crate::domain::wheel::OptionType;

#[derive(Debug, Default)]
struct Tables {
    positions: Vec<PositionRecord>,
    premiums: Vec<PremiumRecord>,
    trades: Vec<NewTrade>,
}

/// In-memory implementation of `LedgerPort`.
///
/// Suitable for testing and development. Not for production use.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    tables: RwLock<Tables>,
}

impl InMemoryLedger {
    /// Create a new empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded trades, oldest first.
    #[must_use]
    pub fn trades(&self) -> Vec<NewTrade> {
        self.tables.read().trades.clone()
    }

    /// Clear every table.
    pub fn clear(&self) {
        *self.tables.write() = Tables::default();
    }
}

fn newest_first<T>(mut rows: Vec<T>) -> Vec<T> {
    rows.reverse();
    rows
}

#[async_trait]
impl LedgerPort for InMemoryLedger {
    async fn add_position(
        &self,
        symbol: &str,
        position_type: PositionType,
        quantity: i64,
        entry_price: Decimal,
    ) -> Result<i64, LedgerError> {
        let mut tables = self.tables.write();
        let id = tables.positions.len() as i64 + 1;
        tables.positions.push(PositionRecord {
            id,
            symbol: symbol.to_string(),
            position_type,
            quantity,
            entry_price,
            entry_date: Utc::now(),
            exit_price: None,
            exit_date: None,
            status: PositionStatus::Open,
        });
        Ok(id)
    }

    async fn close_position(
        &self,
        id: i64,
        exit_price: Decimal,
        status: PositionStatus,
    ) -> Result<(), LedgerError> {
        let mut tables = self.tables.write();
        let position = tables
            .positions
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(LedgerError::NotFound(id))?;
        position.exit_price = Some(exit_price);
        position.exit_date = Some(Utc::now());
        position.status = status;
        Ok(())
    }

    async fn add_premium(&self, premium: NewPremium) -> Result<i64, LedgerError> {
        let mut tables = self.tables.write();
        let id = tables.premiums.len() as i64 + 1;
        tables.premiums.push(PremiumRecord {
            id,
            symbol: premium.symbol,
            option_type: premium.option_type,
            strike: premium.strike,
            premium: premium.premium,
            contracts: premium.contracts,
            expiration: premium.expiration,
            trade_date: Utc::now(),
            status: premium.status,
            position_id: None,
            notes: premium.notes,
        });
        Ok(id)
    }

    async fn settle_premium(
        &self,
        id: i64,
        status: PremiumStatus,
        premium: Option<Decimal>,
    ) -> Result<(), LedgerError> {
        let mut tables = self.tables.write();
        let row = tables
            .premiums
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(LedgerError::NotFound(id))?;
        row.status = status;
        if let Some(premium) = premium {
            row.premium = premium;
        }
        Ok(())
    }

    async fn add_trade(&self, trade: NewTrade) -> Result<i64, LedgerError> {
        let mut tables = self.tables.write();
        tables.trades.push(trade);
        Ok(tables.trades.len() as i64)
    }

    async fn get_adjusted_cost_basis(&self, symbol: &str) -> Result<Option<CostBasis>, LedgerError> {
        let tables = self.tables.read();
        let lots: Vec<(i64, Decimal)> = tables
            .positions
            .iter()
            .filter(|p| {
                p.symbol == symbol
                    && p.position_type == PositionType::Stock
                    && p.status == PositionStatus::Open
            })
            .map(|p| (p.quantity, p.entry_price))
            .collect();
        let calls: Vec<(Decimal, i64)> = tables
            .premiums
            .iter()
            .filter(|p| {
                p.symbol == symbol
                    && p.option_type == OptionType::Call
                    && p.status.reduces_cost_basis()
            })
            .map(|p| (p.premium, p.contracts))
            .collect();
        Ok(CostBasis::compute(&lots, &calls))
    }

    async fn get_position_history(
        &self,
        symbol: Option<&str>,
        position_type: Option<PositionType>,
        status: Option<PositionStatus>,
    ) -> Result<Vec<PositionRecord>, LedgerError> {
        let tables = self.tables.read();
        Ok(newest_first(
            tables
                .positions
                .iter()
                .filter(|p| symbol.is_none_or(|s| p.symbol == s))
                .filter(|p| position_type.is_none_or(|t| p.position_type == t))
                .filter(|p| status.is_none_or(|s| p.status == s))
                .cloned()
                .collect(),
        ))
    }

    async fn get_premium_history(
        &self,
        symbol: Option<&str>,
        option_type: Option<OptionType>,
        days_back: Option<u32>,
    ) -> Result<Vec<PremiumRecord>, LedgerError> {
        let cutoff = days_back.map(|days| Utc::now() - Duration::days(i64::from(days)));
        let tables = self.tables.read();
        Ok(newest_first(
            tables
                .premiums
                .iter()
                .filter(|p| symbol.is_none_or(|s| p.symbol == s))
                .filter(|p| option_type.is_none_or(|t| p.option_type == t))
                .filter(|p| cutoff.is_none_or(|c| p.trade_date >= c))
                .cloned()
                .collect(),
        ))
    }

    async fn get_summary_stats(&self, symbol: Option<&str>) -> Result<SummaryStats, LedgerError> {
        let tables = self.tables.read();
        let mut stats = SummaryStats::default();
        let mut symbols: Vec<&str> = Vec::new();

        for p in tables
            .premiums
            .iter()
            .filter(|p| symbol.is_none_or(|s| p.symbol == s) && p.status.is_realized())
        {
            if !symbols.contains(&p.symbol.as_str()) {
                symbols.push(&p.symbol);
            }
            let total = p.premium * Decimal::from(p.contracts);
            match p.option_type {
                OptionType::Put => {
                    stats.total_put_premiums += total;
                    stats.put_trades += 1;
                }
                OptionType::Call => {
                    stats.total_call_premiums += total;
                    stats.call_trades += 1;
                }
            }
        }
        stats.symbols_traded = symbols.len() as i64;
        Ok(stats)
    }
}

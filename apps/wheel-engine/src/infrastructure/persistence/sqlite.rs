//! SQLite ledger.
//!
//! Four tables: `positions`, `premiums`, `cost_basis` and `trade_history`.
//! Money is stored as decimal text so cost basis math stays exact. The
//! `cost_basis` row for a symbol is rewritten whenever a premium or a stock
//! position for that symbol changes, inside the same transaction.
//!
//! Writes that hit `SQLITE_BUSY`/`SQLITE_LOCKED` are retried with a doubling
//! backoff before the error reaches the caller.

use std::future::Future;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use sqlx::{Row, Sqlite, Transaction};

use crate::application::ports::{
    CostBasis, LedgerError, LedgerPort, NewPremium, NewTrade, PositionRecord, PositionStatus,
    PositionType, PremiumRecord, PremiumStatus, SummaryStats, option_type_code,
};
use crate::domain::wheel::OptionType;

const LOCK_RETRY_ATTEMPTS: u32 = 5;
const LOCK_RETRY_INITIAL: Duration = Duration::from_millis(50);
const LOCK_RETRY_MAX: Duration = Duration::from_secs(2);
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &[&str] = &[
    r"
    CREATE TABLE IF NOT EXISTS positions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        symbol TEXT NOT NULL,
        position_type TEXT NOT NULL,
        quantity INTEGER NOT NULL,
        entry_price TEXT NOT NULL,
        entry_date TEXT NOT NULL,
        exit_price TEXT,
        exit_date TEXT,
        status TEXT NOT NULL,
        created_at TEXT DEFAULT CURRENT_TIMESTAMP
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS premiums (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        symbol TEXT NOT NULL,
        option_type TEXT NOT NULL,
        strike_price TEXT NOT NULL,
        premium_collected TEXT NOT NULL,
        contracts INTEGER NOT NULL DEFAULT 1,
        expiration_date TEXT NOT NULL,
        trade_date TEXT NOT NULL,
        status TEXT NOT NULL,
        position_id INTEGER,
        notes TEXT,
        created_at TEXT DEFAULT CURRENT_TIMESTAMP,
        FOREIGN KEY (position_id) REFERENCES positions(id)
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS cost_basis (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        symbol TEXT NOT NULL UNIQUE,
        shares_owned INTEGER NOT NULL,
        total_cost TEXT NOT NULL,
        total_premiums_collected TEXT NOT NULL DEFAULT '0',
        avg_cost_per_share TEXT NOT NULL,
        adjusted_cost_per_share TEXT NOT NULL,
        last_updated TEXT DEFAULT CURRENT_TIMESTAMP
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS trade_history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        symbol TEXT NOT NULL,
        trade_type TEXT NOT NULL,
        quantity INTEGER NOT NULL,
        price TEXT NOT NULL,
        strike_price TEXT,
        expiration_date TEXT,
        premium TEXT,
        trade_date TEXT NOT NULL,
        notes TEXT,
        created_at TEXT DEFAULT CURRENT_TIMESTAMP
    )
    ",
    "CREATE INDEX IF NOT EXISTS idx_positions_symbol ON positions(symbol)",
    "CREATE INDEX IF NOT EXISTS idx_positions_status ON positions(status)",
    "CREATE INDEX IF NOT EXISTS idx_premiums_symbol ON premiums(symbol)",
    "CREATE INDEX IF NOT EXISTS idx_trade_history_symbol ON trade_history(symbol)",
    "CREATE INDEX IF NOT EXISTS idx_trade_history_date ON trade_history(trade_date)",
];

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) => {
                let code = db.code();
                // SQLITE_BUSY (5) and SQLITE_LOCKED (6), including extended codes.
                let locked = code
                    .as_deref()
                    .and_then(|c| c.parse::<i32>().ok())
                    .is_some_and(|c| matches!(c & 0xff, 5 | 6))
                    || db.message().contains("database is locked");
                if locked {
                    Self::Locked {
                        message: db.message().to_string(),
                    }
                } else {
                    Self::Query(err.to_string())
                }
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                Self::Connection(err.to_string())
            }
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                Self::Data(err.to_string())
            }
            _ => Self::Query(err.to_string()),
        }
    }
}

/// Retry `op` while it fails with [`LedgerError::Locked`].
pub async fn with_lock_retry<T, F, Fut>(operation: &str, mut op: F) -> Result<T, LedgerError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LedgerError>>,
{
    let mut delay = LOCK_RETRY_INITIAL;
    let mut attempt = 1;
    loop {
        match op().await {
            Err(e) if e.is_locked() && attempt < LOCK_RETRY_ATTEMPTS => {
                tracing::warn!(
                    operation,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Ledger locked, retrying"
                );
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(LOCK_RETRY_MAX);
                attempt += 1;
            }
            result => return result,
        }
    }
}

/// SQLite-backed `LedgerPort`.
#[derive(Debug, Clone)]
pub struct SqliteLedger {
    pool: SqlitePool,
}

impl SqliteLedger {
    /// Open (creating if missing) the database at `database_url` and apply the schema.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, LedgerError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| LedgerError::Connection(e.to_string()))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT)
            .foreign_keys(true);

        if let Some(parent) = Path::new(options.get_filename()).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| LedgerError::Connection(e.to_string()))?;
            }
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;

        for statement in SCHEMA {
            sqlx::query(statement).execute(&pool).await?;
        }

        tracing::info!(database_url, "Ledger opened");
        Ok(Self { pool })
    }

    /// Close the pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn refresh_cost_basis(
        tx: &mut Transaction<'_, Sqlite>,
        symbol: &str,
    ) -> Result<(), LedgerError> {
        let mut lots = Vec::new();
        for row in sqlx::query(
            "SELECT quantity, entry_price FROM positions
             WHERE symbol = ?1 AND position_type = 'stock' AND status = 'open'",
        )
        .bind(symbol)
        .fetch_all(&mut **tx)
        .await?
        {
            lots.push((row.try_get::<i64, _>("quantity")?, decimal(&row, "entry_price")?));
        }

        let mut calls = Vec::new();
        for row in sqlx::query(
            "SELECT premium_collected, contracts FROM premiums
             WHERE symbol = ?1 AND option_type = 'C' AND status IN ('collected', 'expired')",
        )
        .bind(symbol)
        .fetch_all(&mut **tx)
        .await?
        {
            calls.push((decimal(&row, "premium_collected")?, row.try_get::<i64, _>("contracts")?));
        }

        let Some(basis) = CostBasis::compute(&lots, &calls) else {
            sqlx::query("DELETE FROM cost_basis WHERE symbol = ?1")
                .bind(symbol)
                .execute(&mut **tx)
                .await?;
            return Ok(());
        };

        let total_cost = basis.original_cost * Decimal::from(basis.shares);
        sqlx::query(
            r"
            INSERT INTO cost_basis
                (symbol, shares_owned, total_cost, total_premiums_collected,
                 avg_cost_per_share, adjusted_cost_per_share, last_updated)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(symbol) DO UPDATE SET
                shares_owned = excluded.shares_owned,
                total_cost = excluded.total_cost,
                total_premiums_collected = excluded.total_premiums_collected,
                avg_cost_per_share = excluded.avg_cost_per_share,
                adjusted_cost_per_share = excluded.adjusted_cost_per_share,
                last_updated = excluded.last_updated
            ",
        )
        .bind(symbol)
        .bind(basis.shares)
        .bind(total_cost.to_string())
        .bind(basis.total_premiums.to_string())
        .bind(basis.original_cost.to_string())
        .bind(basis.adjusted_cost.to_string())
        .bind(Utc::now())
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

fn decimal(row: &SqliteRow, column: &str) -> Result<Decimal, LedgerError> {
    let raw: String = row.try_get(column)?;
    raw.parse()
        .map_err(|_| LedgerError::Data(format!("{column}: invalid decimal '{raw}'")))
}

fn optional_decimal(row: &SqliteRow, column: &str) -> Result<Option<Decimal>, LedgerError> {
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|r| {
        r.parse()
            .map_err(|_| LedgerError::Data(format!("{column}: invalid decimal '{r}'")))
    })
    .transpose()
}

fn text_enum<T>(row: &SqliteRow, column: &str, parse: fn(&str) -> Option<T>) -> Result<T, LedgerError> {
    let raw: String = row.try_get(column)?;
    parse(&raw).ok_or_else(|| LedgerError::Data(format!("{column}: unknown value '{raw}'")))
}

fn position_from_row(row: &SqliteRow) -> Result<PositionRecord, LedgerError> {
    Ok(PositionRecord {
        id: row.try_get("id")?,
        symbol: row.try_get("symbol")?,
        position_type: text_enum(row, "position_type", PositionType::parse)?,
        quantity: row.try_get("quantity")?,
        entry_price: decimal(row, "entry_price")?,
        entry_date: row.try_get::<DateTime<Utc>, _>("entry_date")?,
        exit_price: optional_decimal(row, "exit_price")?,
        exit_date: row.try_get::<Option<DateTime<Utc>>, _>("exit_date")?,
        status: text_enum(row, "status", PositionStatus::parse)?,
    })
}

fn premium_from_row(row: &SqliteRow) -> Result<PremiumRecord, LedgerError> {
    let code: String = row.try_get("option_type")?;
    let option_type = match code.as_str() {
        "P" => OptionType::Put,
        "C" => OptionType::Call,
        other => {
            return Err(LedgerError::Data(format!("option_type: unknown value '{other}'")));
        }
    };
    Ok(PremiumRecord {
        id: row.try_get("id")?,
        symbol: row.try_get("symbol")?,
        option_type,
        strike: decimal(row, "strike_price")?,
        premium: decimal(row, "premium_collected")?,
        contracts: row.try_get("contracts")?,
        expiration: row.try_get::<NaiveDate, _>("expiration_date")?,
        trade_date: row.try_get::<DateTime<Utc>, _>("trade_date")?,
        status: text_enum(row, "status", PremiumStatus::parse)?,
        position_id: row.try_get("position_id")?,
        notes: row.try_get("notes")?,
    })
}

#[async_trait]
impl LedgerPort for SqliteLedger {
    async fn add_position(
        &self,
        symbol: &str,
        position_type: PositionType,
        quantity: i64,
        entry_price: Decimal,
    ) -> Result<i64, LedgerError> {
        let pool = &self.pool;
        with_lock_retry("add_position", || async move {
            let mut tx = pool.begin().await?;
            let id = sqlx::query(
                r"
                INSERT INTO positions (symbol, position_type, quantity, entry_price, entry_date, status)
                VALUES (?1, ?2, ?3, ?4, ?5, 'open')
                ",
            )
            .bind(symbol)
            .bind(position_type.as_str())
            .bind(quantity)
            .bind(entry_price.to_string())
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();

            if position_type == PositionType::Stock {
                Self::refresh_cost_basis(&mut tx, symbol).await?;
            }
            tx.commit().await?;
            Ok::<_, LedgerError>(id)
        })
        .await
    }

    async fn close_position(
        &self,
        id: i64,
        exit_price: Decimal,
        status: PositionStatus,
    ) -> Result<(), LedgerError> {
        let pool = &self.pool;
        with_lock_retry("close_position", || async move {
            let mut tx = pool.begin().await?;
            let row = sqlx::query(
                r"
                UPDATE positions SET exit_price = ?1, exit_date = ?2, status = ?3
                WHERE id = ?4
                RETURNING symbol, position_type
                ",
            )
            .bind(exit_price.to_string())
            .bind(Utc::now())
            .bind(status.as_str())
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(LedgerError::NotFound(id))?;

            let symbol: String = row.try_get("symbol")?;
            let position_type: String = row.try_get("position_type")?;
            if position_type == PositionType::Stock.as_str() {
                Self::refresh_cost_basis(&mut tx, &symbol).await?;
            }
            tx.commit().await?;
            Ok::<_, LedgerError>(())
        })
        .await
    }

    async fn add_premium(&self, premium: NewPremium) -> Result<i64, LedgerError> {
        let pool = &self.pool;
        let premium = &premium;
        with_lock_retry("add_premium", || async move {
            let mut tx = pool.begin().await?;
            let id = sqlx::query(
                r"
                INSERT INTO premiums
                    (symbol, option_type, strike_price, premium_collected, contracts,
                     expiration_date, trade_date, status, notes)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                ",
            )
            .bind(&premium.symbol)
            .bind(option_type_code(premium.option_type))
            .bind(premium.strike.to_string())
            .bind(premium.premium.to_string())
            .bind(premium.contracts)
            .bind(premium.expiration)
            .bind(Utc::now())
            .bind(premium.status.as_str())
            .bind(premium.notes.as_deref())
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();

            Self::refresh_cost_basis(&mut tx, &premium.symbol).await?;
            tx.commit().await?;
            Ok::<_, LedgerError>(id)
        })
        .await
    }

    async fn settle_premium(
        &self,
        id: i64,
        status: PremiumStatus,
        premium: Option<Decimal>,
    ) -> Result<(), LedgerError> {
        let pool = &self.pool;
        with_lock_retry("settle_premium", || async move {
            let mut tx = pool.begin().await?;
            let row = sqlx::query(
                r"
                UPDATE premiums
                SET status = ?1, premium_collected = COALESCE(?2, premium_collected)
                WHERE id = ?3
                RETURNING symbol
                ",
            )
            .bind(status.as_str())
            .bind(premium.map(|p| p.to_string()))
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(LedgerError::NotFound(id))?;

            let symbol: String = row.try_get("symbol")?;
            Self::refresh_cost_basis(&mut tx, &symbol).await?;
            tx.commit().await?;
            Ok::<_, LedgerError>(())
        })
        .await
    }

    async fn add_trade(&self, trade: NewTrade) -> Result<i64, LedgerError> {
        let pool = &self.pool;
        let trade = &trade;
        with_lock_retry("add_trade", || async move {
            let id = sqlx::query(
                r"
                INSERT INTO trade_history
                    (symbol, trade_type, quantity, price, strike_price,
                     expiration_date, premium, trade_date, notes)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                ",
            )
            .bind(&trade.symbol)
            .bind(trade.trade_type.as_str())
            .bind(trade.quantity)
            .bind(trade.price.to_string())
            .bind(trade.strike.map(|s| s.to_string()))
            .bind(trade.expiration)
            .bind(trade.premium.map(|p| p.to_string()))
            .bind(Utc::now())
            .bind(trade.notes.as_deref())
            .execute(pool)
            .await?
            .last_insert_rowid();
            Ok::<_, LedgerError>(id)
        })
        .await
    }

    async fn get_adjusted_cost_basis(&self, symbol: &str) -> Result<Option<CostBasis>, LedgerError> {
        let row = sqlx::query(
            r"
            SELECT adjusted_cost_per_share, avg_cost_per_share, total_premiums_collected, shares_owned
            FROM cost_basis WHERE symbol = ?1
            ",
        )
        .bind(symbol)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            Ok(CostBasis {
                adjusted_cost: decimal(&row, "adjusted_cost_per_share")?,
                original_cost: decimal(&row, "avg_cost_per_share")?,
                total_premiums: decimal(&row, "total_premiums_collected")?,
                shares: row.try_get("shares_owned")?,
            })
        })
        .transpose()
    }

    async fn get_position_history(
        &self,
        symbol: Option<&str>,
        position_type: Option<PositionType>,
        status: Option<PositionStatus>,
    ) -> Result<Vec<PositionRecord>, LedgerError> {
        sqlx::query(
            r"
            SELECT * FROM positions
            WHERE (?1 IS NULL OR symbol = ?1)
              AND (?2 IS NULL OR position_type = ?2)
              AND (?3 IS NULL OR status = ?3)
            ORDER BY entry_date DESC, id DESC
            ",
        )
        .bind(symbol)
        .bind(position_type.map(PositionType::as_str))
        .bind(status.map(PositionStatus::as_str))
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(position_from_row)
        .collect()
    }

    async fn get_premium_history(
        &self,
        symbol: Option<&str>,
        option_type: Option<OptionType>,
        days_back: Option<u32>,
    ) -> Result<Vec<PremiumRecord>, LedgerError> {
        let cutoff = days_back.map(|days| Utc::now() - chrono::Duration::days(i64::from(days)));
        sqlx::query(
            r"
            SELECT * FROM premiums
            WHERE (?1 IS NULL OR symbol = ?1)
              AND (?2 IS NULL OR option_type = ?2)
              AND (?3 IS NULL OR trade_date >= ?3)
            ORDER BY trade_date DESC, id DESC
            ",
        )
        .bind(symbol)
        .bind(option_type.map(option_type_code))
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(premium_from_row)
        .collect()
    }

    async fn get_summary_stats(&self, symbol: Option<&str>) -> Result<SummaryStats, LedgerError> {
        let rows = sqlx::query(
            "SELECT symbol, option_type, premium_collected, contracts FROM premiums
             WHERE (?1 IS NULL OR symbol = ?1)
               AND status IN ('collected', 'assigned', 'expired')",
        )
        .bind(symbol)
        .fetch_all(&self.pool)
        .await?;

        let mut stats = SummaryStats::default();
        let mut symbols = std::collections::BTreeSet::new();
        for row in &rows {
            let sym: String = row.try_get("symbol")?;
            let code: String = row.try_get("option_type")?;
            let contracts: i64 = row.try_get("contracts")?;
            let total = decimal(row, "premium_collected")? * Decimal::from(contracts);
            symbols.insert(sym);
            if code == "P" {
                stats.total_put_premiums += total;
                stats.put_trades += 1;
            } else if code == "C" {
                stats.total_call_premiums += total;
                stats.call_trades += 1;
            }
        }
        stats.symbols_traded = symbols.len() as i64;
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::application::ports::TradeType;
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    async fn ledger() -> (TempDir, SqliteLedger) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("data/wheel.db").display());
        let ledger = SqliteLedger::connect(&url, 2).await.unwrap();
        (dir, ledger)
    }

    fn call(premium: Decimal) -> NewPremium {
        NewPremium {
            symbol: "XYZ".to_string(),
            option_type: OptionType::Call,
            strike: dec!(55),
            premium,
            contracts: 1,
            expiration: NaiveDate::from_ymd_opt(2025, 1, 17).unwrap(),
            status: PremiumStatus::Collected,
            notes: Some("PENDING - Delta: 0.250, DTE: 7".to_string()),
        }
    }

    #[tokio::test]
    async fn adjusted_cost_basis_subtracts_call_premiums() {
        let (_dir, ledger) = ledger().await;
        ledger
            .add_position("XYZ", PositionType::Stock, 100, dec!(50))
            .await
            .unwrap();
        ledger.add_premium(call(dec!(1.50))).await.unwrap();
        ledger.add_premium(call(dec!(1.00))).await.unwrap();

        let basis = ledger.get_adjusted_cost_basis("XYZ").await.unwrap().unwrap();
        assert_eq!(basis.adjusted_cost, dec!(47.50));
        assert_eq!(basis.original_cost, dec!(50));
        assert_eq!(basis.total_premiums, dec!(2.50));
        assert_eq!(basis.shares, 100);
    }

    #[tokio::test]
    async fn unfilled_call_premiums_leave_the_basis_alone() {
        let (_dir, ledger) = ledger().await;
        ledger
            .add_position("XYZ", PositionType::Stock, 100, dec!(50))
            .await
            .unwrap();
        let working = ledger
            .add_premium(NewPremium {
                status: PremiumStatus::Pending,
                ..call(dec!(1.50))
            })
            .await
            .unwrap();
        let basis = ledger.get_adjusted_cost_basis("XYZ").await.unwrap().unwrap();
        assert_eq!(basis.adjusted_cost, dec!(50));

        ledger
            .settle_premium(working, PremiumStatus::Cancelled, None)
            .await
            .unwrap();
        let basis = ledger.get_adjusted_cost_basis("XYZ").await.unwrap().unwrap();
        assert_eq!(basis.adjusted_cost, dec!(50));
        assert_eq!(ledger.get_summary_stats(None).await.unwrap().call_trades, 0);

        let filled = ledger
            .add_premium(NewPremium {
                status: PremiumStatus::Pending,
                ..call(dec!(1.50))
            })
            .await
            .unwrap();
        ledger
            .settle_premium(filled, PremiumStatus::Collected, Some(dec!(1.60)))
            .await
            .unwrap();
        let basis = ledger.get_adjusted_cost_basis("XYZ").await.unwrap().unwrap();
        assert_eq!(basis.adjusted_cost, dec!(48.40));

        let history = ledger.get_premium_history(Some("XYZ"), None, None).await.unwrap();
        assert_eq!(history[0].status, PremiumStatus::Collected);
        assert_eq!(history[0].premium, dec!(1.60));
        assert_eq!(history[1].status, PremiumStatus::Cancelled);

        assert!(matches!(
            ledger.settle_premium(404, PremiumStatus::Collected, None).await,
            Err(LedgerError::NotFound(404))
        ));
    }

    #[tokio::test]
    async fn closing_the_stock_clears_the_basis() {
        let (_dir, ledger) = ledger().await;
        let id = ledger
            .add_position("XYZ", PositionType::Stock, 100, dec!(50))
            .await
            .unwrap();
        assert!(ledger.get_adjusted_cost_basis("XYZ").await.unwrap().is_some());

        ledger
            .close_position(id, dec!(55), PositionStatus::Assigned)
            .await
            .unwrap();
        assert!(ledger.get_adjusted_cost_basis("XYZ").await.unwrap().is_none());

        let history = ledger
            .get_position_history(Some("XYZ"), Some(PositionType::Stock), None)
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, PositionStatus::Assigned);
        assert_eq!(history[0].exit_price, Some(dec!(55)));
        assert!(history[0].exit_date.is_some());

        assert!(matches!(
            ledger.close_position(404, dec!(1), PositionStatus::Closed).await,
            Err(LedgerError::NotFound(404))
        ));
    }

    #[tokio::test]
    async fn history_filters_and_summary() {
        let (_dir, ledger) = ledger().await;
        ledger
            .add_premium(NewPremium {
                symbol: "AAA".to_string(),
                option_type: OptionType::Put,
                contracts: 2,
                ..call(dec!(0.40))
            })
            .await
            .unwrap();
        ledger.add_premium(call(dec!(1.25))).await.unwrap();

        let puts = ledger
            .get_premium_history(None, Some(OptionType::Put), Some(7))
            .await
            .unwrap();
        assert_eq!(puts.len(), 1);
        assert_eq!(puts[0].symbol, "AAA");
        assert_eq!(puts[0].contracts, 2);
        assert_eq!(puts[0].expiration, NaiveDate::from_ymd_opt(2025, 1, 17).unwrap());

        let newest = ledger.get_premium_history(None, None, None).await.unwrap();
        assert_eq!(newest[0].symbol, "XYZ");

        let stats = ledger.get_summary_stats(None).await.unwrap();
        assert_eq!(stats.symbols_traded, 2);
        assert_eq!(stats.total_put_premiums, dec!(0.80));
        assert_eq!(stats.total_call_premiums, dec!(1.25));
    }

    #[tokio::test]
    async fn trades_are_recorded() {
        let (_dir, ledger) = ledger().await;
        let first = ledger
            .add_trade(NewTrade {
                symbol: "XYZ".to_string(),
                trade_type: TradeType::BuyToClose,
                quantity: 1,
                price: Decimal::ZERO,
                strike: Some(dec!(45)),
                expiration: NaiveDate::from_ymd_opt(2025, 1, 17),
                premium: Some(Decimal::ZERO),
                notes: Some("Rolling position to XYZ250124P00044000".to_string()),
            })
            .await
            .unwrap();
        let second = ledger
            .add_trade(NewTrade {
                symbol: "XYZ".to_string(),
                trade_type: TradeType::SellPut,
                quantity: 1,
                price: dec!(0.55),
                strike: Some(dec!(44)),
                expiration: None,
                premium: Some(dec!(0.55)),
                notes: None,
            })
            .await
            .unwrap();
        assert!(second > first);
    }

    #[tokio::test]
    async fn lock_contention_is_retried() {
        let calls = AtomicU32::new(0);
        let result = with_lock_retry("test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(LedgerError::Locked {
                        message: "database is locked".to_string(),
                    })
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn persistent_lock_gives_up() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_lock_retry("test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(LedgerError::Locked {
                    message: "database is locked".to_string(),
                })
            }
        })
        .await;
        assert!(result.unwrap_err().is_locked());
        assert_eq!(calls.load(Ordering::SeqCst), LOCK_RETRY_ATTEMPTS);
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_lock_retry("test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(LedgerError::Query("syntax error".to_string())) }
        })
        .await;
        assert!(matches!(result, Err(LedgerError::Query(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}

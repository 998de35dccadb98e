use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::info;

use common::{Position, Result, Trade, TradeStore};

/// Append-only SQLite store for position and trade snapshots.
///
/// The core never reads this back — it exists for audit and reporting.
/// Schema is created on connect so a fresh database file just works.
pub struct SqliteTradeStore {
    pool: SqlitePool,
}

impl SqliteTradeStore {
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(url).await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS positions (
                id             TEXT PRIMARY KEY,
                pair           TEXT NOT NULL,
                direction      TEXT NOT NULL,
                entry_price    REAL NOT NULL,
                entry_time     TEXT NOT NULL,
                quantity       REAL NOT NULL,
                stop_price     REAL NOT NULL,
                take_profit_1  REAL NOT NULL,
                take_profit_2  REAL NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS trades (
                id             TEXT PRIMARY KEY,
                pair           TEXT NOT NULL,
                direction      TEXT NOT NULL,
                entry_price    REAL NOT NULL,
                entry_time     TEXT NOT NULL,
                exit_price     REAL NOT NULL,
                exit_time      TEXT NOT NULL,
                exit_reason    TEXT NOT NULL,
                quantity       REAL NOT NULL,
                pnl_pct        REAL NOT NULL,
                pnl_abs        REAL NOT NULL,
                duration_bars  INTEGER NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        info!(url, "trade store ready");
        Ok(Self { pool })
    }
}

#[async_trait]
impl TradeStore for SqliteTradeStore {
    async fn save_position(&self, position: &Position) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO positions
                (id, pair, direction, entry_price, entry_time, quantity,
                 stop_price, take_profit_1, take_profit_2)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(&position.id)
        .bind(&position.pair)
        .bind(position.direction.to_string())
        .bind(position.entry_price)
        .bind(position.entry_time.to_rfc3339())
        .bind(position.quantity)
        .bind(position.stop_price)
        .bind(position.take_profit_1)
        .bind(position.take_profit_2)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn save_trade(&self, trade: &Trade) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO trades
                (id, pair, direction, entry_price, entry_time, exit_price,
                 exit_time, exit_reason, quantity, pnl_pct, pnl_abs, duration_bars)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(&trade.id)
        .bind(&trade.pair)
        .bind(trade.direction.to_string())
        .bind(trade.entry_price)
        .bind(trade.entry_time.to_rfc3339())
        .bind(trade.exit_price)
        .bind(trade.exit_time.to_rfc3339())
        .bind(trade.exit_reason.to_string())
        .bind(trade.quantity)
        .bind(trade.pnl_pct)
        .bind(trade.pnl_abs)
        .bind(trade.duration_bars as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

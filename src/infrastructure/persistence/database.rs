use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tokio::fs;
use tracing::info;

#[derive(Clone)]
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    pub async fn new(db_url: &str) -> Result<Self> {
        if let Some(path_part) = db_url.strip_prefix("sqlite://") {
            let path = Path::new(path_part);
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    fs::create_dir_all(parent).await.context("failed to create database directory")?;
                }
            }
        }

        let options = SqliteConnectOptions::from_str(db_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("failed to connect to sqlite database")?;

        info!(db_url, "connected to database");

        let db = Self { pool };
        db.init().await?;
        Ok(db)
    }

    async fn init(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS backtest_trades (
                trade_id TEXT PRIMARY KEY,
                instrument_key TEXT NOT NULL,
                direction TEXT NOT NULL,
                entry_price TEXT NOT NULL,
                entry_time INTEGER NOT NULL,
                exit_price TEXT NOT NULL,
                exit_time INTEGER NOT NULL,
                quantity TEXT NOT NULL,
                realized_pnl TEXT NOT NULL,
                exit_reason TEXT NOT NULL,
                is_partial BOOLEAN NOT NULL,
                correlation_id TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create backtest_trades table")?;

        sqlx::query(
            r#"CREATE INDEX IF NOT EXISTS idx_backtest_trades_instrument_time
               ON backtest_trades (instrument_key, entry_time DESC);"#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create instrument/time index")?;

        sqlx::query(
            r#"CREATE INDEX IF NOT EXISTS idx_backtest_trades_created
               ON backtest_trades (created_at DESC);"#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create created_at index")?;

        info!("database schema initialized");
        Ok(())
    }
}

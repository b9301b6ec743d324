use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::info;

use crate::domain::ports::BacktestRepository;
use crate::domain::trading::{Direction, ExitReason, TradeResult};

use super::database::Database;

/// `sqlx`-backed `BacktestRepository`. Rows older than a configured TTL are
/// dropped by a periodic sweep (`prune_older_than`) since SQLite has no
/// native TTL index.
pub struct SqliteBacktestRepository {
    db: Database,
}

impl SqliteBacktestRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl BacktestRepository for SqliteBacktestRepository {
    async fn save(&self, result: &TradeResult) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO backtest_trades
                (trade_id, instrument_key, direction, entry_price, entry_time, exit_price,
                 exit_time, quantity, realized_pnl, exit_reason, is_partial, correlation_id, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(result.trade_id.to_string())
        .bind(&result.instrument_key)
        .bind(direction_label(result.direction))
        .bind(result.entry_price.to_string())
        .bind(result.entry_time.timestamp_millis())
        .bind(result.exit_price.to_string())
        .bind(result.exit_time.timestamp_millis())
        .bind(result.quantity.to_string())
        .bind(result.realized_pnl.to_string())
        .bind(exit_reason_label(result.exit_reason))
        .bind(result.is_partial)
        .bind(result.correlation_id.to_string())
        .bind(Utc::now().timestamp_millis())
        .execute(&self.db.pool)
        .await
        .context("failed to persist backtest trade")?;

        Ok(())
    }

    async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM backtest_trades WHERE created_at < ?")
            .bind(cutoff.timestamp_millis())
            .execute(&self.db.pool)
            .await
            .context("failed to prune expired backtest trades")?;

        let rows = result.rows_affected();
        if rows > 0 {
            info!(rows, "pruned expired backtest trades");
        }
        Ok(rows)
    }
}

fn direction_label(direction: Direction) -> &'static str {
    match direction {
        Direction::Long => "LONG",
        Direction::Short => "SHORT",
    }
}

fn exit_reason_label(reason: ExitReason) -> &'static str {
    match reason {
        ExitReason::StopLoss => "STOP_LOSS",
        ExitReason::Target => "TARGET",
        ExitReason::GapProtection => "GAP_PROTECTION",
        ExitReason::TrailingStop => "TRAILING_STOP",
        ExitReason::MarketClose => "MARKET_CLOSE",
        ExitReason::Cancelled => "CANCELLED",
        ExitReason::Failed => "FAILED",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::correlation::CorrelationId;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn sample_result() -> TradeResult {
        TradeResult {
            trade_id: Uuid::new_v4(),
            instrument_key: "NSE:RELIANCE".into(),
            direction: Direction::Long,
            entry_price: dec!(100),
            entry_time: Utc::now(),
            exit_price: dec!(110),
            exit_time: Utc::now(),
            quantity: dec!(10),
            realized_pnl: dec!(100),
            exit_reason: ExitReason::Target,
            is_partial: false,
            correlation_id: CorrelationId::new(),
        }
    }

    #[tokio::test]
    async fn save_and_prune_round_trip() {
        let db = Database::new("sqlite::memory:").await.expect("in-memory database");
        let repo = SqliteBacktestRepository::new(db);

        repo.save(&sample_result()).await.expect("save should succeed");

        let pruned = repo
            .prune_older_than(Utc::now() + chrono::Duration::days(1))
            .await
            .expect("prune should succeed");
        assert_eq!(pruned, 1);
    }
}

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::correlation::CorrelationId;

use super::signal::Direction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitReason {
    StopLoss,
    Target,
    GapProtection,
    TrailingStop,
    MarketClose,
    Cancelled,
    Failed,
}

/// A terminal (or partial) outcome for one trade, emitted to the result sink.
/// Immutable once constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeResult {
    pub trade_id: Uuid,
    pub instrument_key: String,
    pub direction: Direction,
    pub entry_price: Decimal,
    pub entry_time: DateTime<Utc>,
    pub exit_price: Decimal,
    pub exit_time: DateTime<Utc>,
    pub quantity: Decimal,
    pub realized_pnl: Decimal,
    pub exit_reason: ExitReason,
    pub is_partial: bool,
    pub correlation_id: CorrelationId,
}

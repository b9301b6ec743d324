use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::correlation::CorrelationId;
use super::signal::{Direction, ExchangeType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeStatus {
    WaitingForEntry,
    Active,
    PartialExit,
    ClosedProfit,
    ClosedLoss,
    ClosedTime,
    Cancelled,
    Failed,
}

/// The single in-flight position this process may hold. The Trade Manager
/// enforces at most one `ActiveTrade` at a time via an atomic compare-and-swap
/// on the scalar slot that holds it.
#[derive(Debug, Clone)]
pub struct ActiveTrade {
    pub trade_id: Uuid,
    pub instrument_key: String,
    pub direction: Direction,
    pub exchange_type: ExchangeType,
    pub entry_price: Decimal,
    pub entry_time: DateTime<Utc>,
    pub position_size: Decimal,
    pub stop_loss: Decimal,
    pub targets: Vec<Decimal>,
    pub high_since_entry: Decimal,
    pub low_since_entry: Decimal,
    pub target1_hit: bool,
    pub trailing_active: bool,
    pub broker_order_id: String,
    pub status: TradeStatus,
    pub correlation_id: CorrelationId,
}

impl ActiveTrade {
    pub fn update_extremes(&mut self, candle_high: Decimal, candle_low: Decimal) {
        if candle_high > self.high_since_entry {
            self.high_since_entry = candle_high;
        }
        if candle_low < self.low_since_entry {
            self.low_since_entry = candle_low;
        }
    }

    pub fn favorable_move_pct(&self) -> Decimal {
        if self.entry_price.is_zero() {
            return Decimal::ZERO;
        }
        let hundred = Decimal::from(100);
        match self.direction {
            Direction::Long => (self.high_since_entry - self.entry_price) / self.entry_price * hundred,
            Direction::Short => (self.entry_price - self.low_since_entry) / self.entry_price * hundred,
        }
    }
}

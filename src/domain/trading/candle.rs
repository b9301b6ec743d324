use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A closed OHLCV bar for one instrument over `[window_start, window_end)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub instrument_key: String,
    pub exchange: String,
    pub window_start_millis: i64,
    pub window_end_millis: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl Candle {
    /// `low <= min(open, high, close)` and `high >= max(open, low, close)`.
    /// Violations are logged and counted as a defect metric by the candle
    /// builder but the candle is still emitted downstream.
    pub fn ohlc_is_consistent(&self) -> bool {
        let min_okc = self.open.min(self.close);
        let max_okc = self.open.max(self.close);
        self.low <= min_okc && self.high >= max_okc && self.low <= self.high
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn resolution_millis(&self) -> i64 {
        self.window_end_millis - self.window_start_millis
    }
}

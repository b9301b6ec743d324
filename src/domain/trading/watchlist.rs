use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::signal::Signal;

/// Per-instrument breach/reclaim state for the pivot-retest entry gate.
/// Breach is latched once observed and persists across candles until a
/// reclaim is seen on the signal's side of the pivot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PivotRetestState {
    pub breached: bool,
}

/// A signal admitted into the Trade Manager's watchlist, awaiting entry
/// confirmation. At most one entry exists per instrument key at any time.
#[derive(Debug, Clone)]
pub struct WatchlistEntry {
    pub signal: Signal,
    pub admitted_at: DateTime<Utc>,
    pub pivot: Option<Decimal>,
    pub pivot_retest: PivotRetestState,
    pub metadata: HashMap<String, String>,
}

impl WatchlistEntry {
    pub fn new(signal: Signal, admitted_at: DateTime<Utc>) -> Self {
        Self {
            signal,
            admitted_at,
            pivot: None,
            pivot_retest: PivotRetestState::default(),
            metadata: HashMap::new(),
        }
    }

    pub fn instrument_key(&self) -> &str {
        &self.signal.scrip_code
    }

    /// Signal-age TTL: waiting entries older than `ttl` are auto-cancelled
    /// on the next candle tick.
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: chrono::Duration) -> bool {
        now - self.admitted_at > ttl
    }
}

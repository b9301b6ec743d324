use std::collections::HashMap;

use rust_decimal::Decimal;
use tracing::warn;

use crate::domain::ports::Tick;
use crate::domain::trading::Candle;

/// Counts OHLC invariant violations observed while building candles. Wired
/// into the metrics registry; never gates emission.
#[derive(Debug, Default, Clone, Copy)]
pub struct CandleDefect {
    pub count: u64,
}

struct InProgress {
    instrument_key: String,
    exchange: String,
    window_start_millis: i64,
    resolution_millis: i64,
    open: Decimal,
    high: Decimal,
    low: Decimal,
    close: Decimal,
    volume: Decimal,
    last_cumulative_volume: Decimal,
}

impl InProgress {
    fn new(tick: &Tick, window_start_millis: i64, resolution_millis: i64) -> Self {
        Self {
            instrument_key: tick.instrument_key.clone(),
            exchange: tick.exchange.clone(),
            window_start_millis,
            resolution_millis,
            open: tick.reported_open,
            high: tick.reported_high,
            low: tick.reported_low,
            close: tick.last_price,
            volume: Decimal::ZERO,
            last_cumulative_volume: tick.cumulative_volume,
        }
    }

    fn update(&mut self, tick: &Tick) {
        self.high = self.high.max(tick.reported_high).max(tick.last_price);
        self.low = self.low.min(tick.reported_low).min(tick.last_price);
        self.close = tick.last_price;
        self.exchange = tick.exchange.clone();
        let delta = tick.cumulative_volume - self.last_cumulative_volume;
        if delta > Decimal::ZERO {
            self.volume += delta;
        }
        self.last_cumulative_volume = tick.cumulative_volume;
    }

    fn finalize(&self) -> Candle {
        Candle {
            instrument_key: self.instrument_key.clone(),
            exchange: self.exchange.clone(),
            window_start_millis: self.window_start_millis,
            window_end_millis: self.window_start_millis + self.resolution_millis,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
        }
    }
}

/// Aggregates a per-instrument tick stream into closed candles at a
/// configurable resolution (1-minute for historical preload, 5-minute for
/// live confirmation). A window is only finalized and emitted once a tick
/// belonging to a later window is observed (open-window suppression);
/// `flush` forces emission of whatever window is still open, for shutdown or
/// session-close handling.
pub struct CandleBuilder {
    resolution_millis: i64,
    in_progress: HashMap<String, InProgress>,
    pub defects: CandleDefect,
}

impl CandleBuilder {
    pub fn new(resolution_millis: i64) -> Self {
        Self {
            resolution_millis,
            in_progress: HashMap::new(),
            defects: CandleDefect::default(),
        }
    }

    fn window_start(&self, event_time_millis: i64) -> i64 {
        event_time_millis - event_time_millis.rem_euclid(self.resolution_millis)
    }

    /// Feed one tick. Returns a closed candle if this tick belongs to a
    /// strictly later window than the instrument's in-progress one.
    pub fn on_tick(&mut self, tick: Tick) -> Option<Candle> {
        let window_start = self.window_start(tick.event_time_millis);
        let resolution = self.resolution_millis;

        match self.in_progress.get_mut(&tick.instrument_key) {
            Some(current) if current.window_start_millis == window_start => {
                current.update(&tick);
                None
            }
            Some(current) => {
                let closed = current.finalize();
                self.check_defect(&closed);
                let fresh = InProgress::new(&tick, window_start, resolution);
                self.in_progress.insert(tick.instrument_key.clone(), fresh);
                Some(closed)
            }
            None => {
                let fresh = InProgress::new(&tick, window_start, resolution);
                self.in_progress.insert(tick.instrument_key.clone(), fresh);
                None
            }
        }
    }

    /// Force emission of the in-progress candle for an instrument without
    /// waiting for a later-window tick.
    pub fn flush(&mut self, instrument_key: &str) -> Option<Candle> {
        let current = self.in_progress.remove(instrument_key)?;
        let closed = current.finalize();
        self.check_defect(&closed);
        Some(closed)
    }

    fn check_defect(&mut self, candle: &Candle) {
        if !candle.ohlc_is_consistent() {
            warn!(
                instrument = %candle.instrument_key,
                window_start = candle.window_start_millis,
                "candle OHLC invariant violated, emitting anyway"
            );
            self.defects.count += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn tick(last: Decimal, open: Decimal, high: Decimal, low: Decimal, cum_vol: Decimal, ts: i64) -> Tick {
        Tick {
            instrument_key: "NSE:RELIANCE".into(),
            exchange: "NSE".into(),
            last_price: last,
            reported_open: open,
            reported_high: high,
            reported_low: low,
            cumulative_volume: cum_vol,
            event_time_millis: ts,
        }
    }

    #[test]
    fn same_minute_four_ticks_aggregate_without_emitting() {
        let mut b = CandleBuilder::new(60_000);
        assert!(b.on_tick(tick(dec!(100), dec!(100), dec!(100), dec!(100), dec!(10), 1_000)).is_none());
        assert!(b.on_tick(tick(dec!(104), dec!(100), dec!(104), dec!(100), dec!(15), 20_000)).is_none());
        assert!(b.on_tick(tick(dec!(99), dec!(100), dec!(104), dec!(96), dec!(25), 40_000)).is_none());
        let closed = b.on_tick(tick(dec!(101), dec!(101), dec!(106), dec!(101), dec!(30), 65_000));
        let c = closed.expect("later-window tick finalizes the previous candle");
        assert_eq!(c.open, dec!(100));
        assert_eq!(c.high, dec!(104));
        assert_eq!(c.low, dec!(96));
        assert_eq!(c.close, dec!(99));
        assert_eq!(c.volume, dec!(15));
        assert_eq!(c.window_start_millis, 0);
    }

    #[test]
    fn negative_cumulative_volume_delta_is_not_subtracted() {
        let mut b = CandleBuilder::new(60_000);
        b.on_tick(tick(dec!(100), dec!(100), dec!(100), dec!(100), dec!(50), 1_000));
        b.on_tick(tick(dec!(101), dec!(100), dec!(101), dec!(100), dec!(40), 2_000));
        let closed = b.flush("NSE:RELIANCE").unwrap();
        assert_eq!(closed.volume, Decimal::ZERO);
    }

    #[test]
    fn ohlc_violation_is_counted_but_still_emitted() {
        // reported_low (105) sits above reported_open (100): an exchange-side
        // inconsistency the builder must still surface rather than silently fix.
        let mut b = CandleBuilder::new(60_000);
        b.on_tick(tick(dec!(100), dec!(100), dec!(100), dec!(105), dec!(10), 1_000));
        let closed = b.flush("NSE:RELIANCE").unwrap();
        assert!(!closed.ohlc_is_consistent());
        assert_eq!(b.defects.count, 1);
    }

    #[test]
    fn open_window_is_never_emitted_without_flush() {
        let mut b = CandleBuilder::new(60_000);
        assert!(b.on_tick(tick(dec!(100), dec!(100), dec!(100), dec!(100), dec!(1), 1_000)).is_none());
    }
}

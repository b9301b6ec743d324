use rust_decimal::Decimal;

use crate::domain::trading::{Candle, Direction, WatchlistEntry};

#[derive(Debug, Clone, Copy)]
pub struct EntryGateResult {
    pub entry_price: Decimal,
    pub stop_loss: Decimal,
    pub potential_rr: Decimal,
}

/// §4.5.3: all three gates must pass on the same closed candle.
///
/// 1. Pivot-retest (stateful): a breach latch is set the first time price
///    crosses the pivot against the trade direction, and persists across
///    candles until a reclaim (a close back on the signal's side of the
///    pivot) is observed.
/// 2. Volume: candle volume at least `k` times the rolling mean of prior
///    candles.
/// 3. Pattern: a two-candle engulfing pattern in the trade direction, using
///    open/close only.
///
/// On a pass, the stop loss is recomputed from the candle's own high/low
/// (overriding the signal's hinted stop) and `potentialRR` is derived from
/// the first target.
pub fn evaluate_entry_gates(
    entry: &mut WatchlistEntry,
    candle: &Candle,
    prior_candles: &[Candle],
    volume_multiplier: Decimal,
    stop_buffer_pct: Decimal,
) -> Option<EntryGateResult> {
    let pivot = entry.pivot?;
    update_pivot_retest_latch(entry, candle, pivot);
    if !entry.pivot_retest.breached {
        return None;
    }
    if !pivot_reclaimed(entry.signal.direction, candle, pivot) {
        return None;
    }

    if !volume_gate_passes(candle, prior_candles, volume_multiplier) {
        return None;
    }

    if !engulfing_pattern_passes(entry.signal.direction, prior_candles, candle) {
        return None;
    }

    let hundred = Decimal::from(100);
    let epsilon = stop_buffer_pct / hundred;
    let stop_loss = match entry.signal.direction {
        Direction::Long => candle.low * (Decimal::ONE - epsilon),
        Direction::Short => candle.high * (Decimal::ONE + epsilon),
    };

    let entry_price = candle.close;
    let first_target = entry.signal.first_target()?;
    let risk = (entry_price - stop_loss).abs();
    let potential_rr = if risk.is_zero() {
        Decimal::ZERO
    } else {
        (first_target - entry_price).abs() / risk
    };

    Some(EntryGateResult {
        entry_price,
        stop_loss,
        potential_rr,
    })
}

fn update_pivot_retest_latch(entry: &mut WatchlistEntry, candle: &Candle, pivot: Decimal) {
    if entry.pivot_retest.breached {
        return;
    }
    let breach = match entry.signal.direction {
        Direction::Long => candle.low <= pivot,
        Direction::Short => candle.high >= pivot,
    };
    if breach {
        entry.pivot_retest.breached = true;
    }
}

fn pivot_reclaimed(direction: Direction, candle: &Candle, pivot: Decimal) -> bool {
    match direction {
        Direction::Long => candle.close > pivot,
        Direction::Short => candle.close < pivot,
    }
}

fn volume_gate_passes(candle: &Candle, prior_candles: &[Candle], multiplier: Decimal) -> bool {
    let priors: Vec<&Candle> = prior_candles
        .iter()
        .filter(|c| c.window_start_millis < candle.window_start_millis)
        .collect();
    if priors.is_empty() {
        return false;
    }
    let sum: Decimal = priors.iter().map(|c| c.volume).sum();
    let mean = sum / Decimal::from(priors.len());
    candle.volume >= mean * multiplier
}

fn engulfing_pattern_passes(direction: Direction, prior_candles: &[Candle], candle: &Candle) -> bool {
    let Some(previous) = prior_candles
        .iter()
        .filter(|c| c.window_start_millis < candle.window_start_millis)
        .next_back()
    else {
        return false;
    };

    match direction {
        Direction::Long => {
            previous.close < previous.open // prior candle bearish
                && candle.close > candle.open // current candle bullish
                && candle.open <= previous.close
                && candle.close >= previous.open
        }
        Direction::Short => {
            previous.close > previous.open // prior candle bullish
                && candle.close < candle.open // current candle bearish
                && candle.open >= previous.close
                && candle.close <= previous.open
        }
    }
}

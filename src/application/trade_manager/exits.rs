use rust_decimal::Decimal;

use crate::domain::trading::{ActiveTrade, Candle, Direction, ExitReason};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExitDecision {
    None,
    PartialExit { price: Decimal, quantity: Decimal },
    FullExit { price: Decimal, reason: ExitReason },
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Touch {
    Stop,
    Target,
}

/// §4.5.4 exit supervision, evaluated in priority order on every closed
/// candle while a position is active:
///
/// 1. Stop-loss hit.
/// 2. Target-1 partial (50%), if not already taken.
/// 3. Gap-past-T1 protection: if T1 was never hit but price gapped past T2,
///    the 50% partial fires at the *current candle's close*, not the target
///    price.
/// 4. Target-N full close (N >= 2), only once the T1 partial has executed.
/// 5. Trailing stop, active after the T1 partial or once the trade has moved
///    far enough in its favor to activate early.
///
/// When both a stop and a target are touched on the same candle, the tie is
/// broken by where the open sits and by candle polarity, matching the order
/// prices are actually assumed to have moved within the bar.
pub fn evaluate_exit(
    trade: &ActiveTrade,
    candle: &Candle,
    trailing_percent: Decimal,
    early_trailing_activation_percent: Decimal,
) -> ExitDecision {
    let stop_hit = is_stop_hit(trade, candle);
    let target1_hit_now = !trade.target1_hit && is_target_hit(trade, candle, 0);
    let target2_or_later_hit = trade.targets.len() > 1 && is_target_hit(trade, candle, 1);

    if stop_hit && (target1_hit_now || target2_or_later_hit) {
        match tie_break(trade, candle) {
            Touch::Stop => return ExitDecision::FullExit { price: trade.stop_loss, reason: ExitReason::StopLoss },
            Touch::Target => { /* target wins this candle, fall through to target handling below */ }
        }
    } else if stop_hit {
        return ExitDecision::FullExit { price: trade.stop_loss, reason: ExitReason::StopLoss };
    }

    // Gap-past-T1 takes priority over the plain T1 rule: when a single candle
    // reaches T2 without T1 having been hit on an earlier candle, price the
    // partial at the candle's close rather than at the T1 target price.
    if !trade.target1_hit && target2_or_later_hit {
        let half = trade.position_size / Decimal::from(2);
        return ExitDecision::PartialExit {
            price: candle.close,
            quantity: half,
        };
    }

    if target1_hit_now {
        let half = trade.position_size / Decimal::from(2);
        return ExitDecision::PartialExit {
            price: trade.targets[0],
            quantity: half,
        };
    }

    if trade.target1_hit {
        for (idx, target) in trade.targets.iter().enumerate().skip(1) {
            if is_target_hit(trade, candle, idx) {
                return ExitDecision::FullExit { price: *target, reason: ExitReason::Target };
            }
        }
    }

    let trailing_active = trade.target1_hit || trade.trailing_active
        || trade.favorable_move_pct() >= early_trailing_activation_percent;
    if trailing_active {
        if let Some(price) = trailing_stop_hit(trade, candle, trailing_percent) {
            return ExitDecision::FullExit { price, reason: ExitReason::TrailingStop };
        }
    }

    ExitDecision::None
}

fn is_stop_hit(trade: &ActiveTrade, candle: &Candle) -> bool {
    match trade.direction {
        Direction::Long => candle.low <= trade.stop_loss,
        Direction::Short => candle.high >= trade.stop_loss,
    }
}

fn is_target_hit(trade: &ActiveTrade, candle: &Candle, idx: usize) -> bool {
    let Some(target) = trade.targets.get(idx) else { return false };
    match trade.direction {
        Direction::Long => candle.high >= *target,
        Direction::Short => candle.low <= *target,
    }
}

fn trailing_stop_hit(trade: &ActiveTrade, candle: &Candle, trailing_percent: Decimal) -> Option<Decimal> {
    let hundred = Decimal::from(100);
    let factor = trailing_percent / hundred;
    match trade.direction {
        Direction::Long => {
            let trigger = trade.high_since_entry * (Decimal::ONE - factor);
            (candle.low <= trigger).then_some(trigger)
        }
        Direction::Short => {
            let trigger = trade.low_since_entry * (Decimal::ONE + factor);
            (candle.high >= trigger).then_some(trigger)
        }
    }
}

/// Same-candle tie-break when both a stop and T1 were touched: gap-beyond-stop
/// at the open means the stop wins outright (the bar opened already adverse);
/// gap-beyond-target at the open means the target wins outright; otherwise the
/// candle's polarity tells us which extreme was probably reached first, which
/// flips with trade direction (a bullish bar reaches its low before its high).
fn tie_break(trade: &ActiveTrade, candle: &Candle) -> Touch {
    let target1 = trade.targets[0];
    match trade.direction {
        Direction::Long => {
            if candle.open <= trade.stop_loss {
                Touch::Stop
            } else if candle.open >= target1 {
                Touch::Target
            } else if candle.is_bullish() {
                Touch::Stop
            } else {
                Touch::Target
            }
        }
        Direction::Short => {
            if candle.open >= trade.stop_loss {
                Touch::Stop
            } else if candle.open <= target1 {
                Touch::Target
            } else if candle.is_bullish() {
                Touch::Target
            } else {
                Touch::Stop
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trading::{ExchangeType, TradeStatus};
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn trade(direction: Direction, entry: Decimal, stop: Decimal, targets: Vec<Decimal>) -> ActiveTrade {
        ActiveTrade {
            trade_id: Uuid::new_v4(),
            instrument_key: "NSE:RELIANCE".into(),
            direction,
            exchange_type: ExchangeType::Equity,
            entry_price: entry,
            entry_time: Utc::now(),
            position_size: dec!(100),
            stop_loss: stop,
            targets,
            high_since_entry: entry,
            low_since_entry: entry,
            target1_hit: false,
            trailing_active: false,
            broker_order_id: "ord-1".into(),
            status: TradeStatus::Active,
            correlation_id: crate::domain::correlation::CorrelationId::new(),
        }
    }

    fn candle(open: Decimal, high: Decimal, low: Decimal, close: Decimal) -> Candle {
        Candle {
            instrument_key: "NSE:RELIANCE".into(),
            exchange: "NSE".into(),
            window_start_millis: 0,
            window_end_millis: 300_000,
            open,
            high,
            low,
            close,
        volume: dec!(1000),
        }
    }

    #[test]
    fn stop_loss_hit_triggers_full_exit() {
        let t = trade(Direction::Long, dec!(100), dec!(95), vec![dec!(110), dec!(120)]);
        let c = candle(dec!(98), dec!(99), dec!(94), dec!(96));
        assert_eq!(
            evaluate_exit(&t, &c, dec!(1), dec!(2)),
            ExitDecision::FullExit { price: dec!(95), reason: ExitReason::StopLoss }
        );
    }

    #[test]
    fn target1_partial_exit_at_fifty_percent() {
        let t = trade(Direction::Long, dec!(100), dec!(95), vec![dec!(110), dec!(120)]);
        let c = candle(dec!(108), dec!(111), dec!(107), dec!(109));
        assert_eq!(
            evaluate_exit(&t, &c, dec!(1), dec!(2)),
            ExitDecision::PartialExit { price: dec!(110), quantity: dec!(50) }
        );
    }

    #[test]
    fn gap_past_t1_partial_prices_at_candle_close_not_target() {
        let t = trade(Direction::Long, dec!(100), dec!(95), vec![dec!(110), dec!(120)]);
        // gaps straight past T1 and T2 in one candle without ever ticking T1 alone
        let c = candle(dec!(121), dec!(125), dec!(119), dec!(123));
        assert_eq!(
            evaluate_exit(&t, &c, dec!(1), dec!(2)),
            ExitDecision::PartialExit { price: dec!(123), quantity: dec!(50) }
        );
    }

    #[test]
    fn target_n_full_close_requires_t1_already_hit() {
        let mut t = trade(Direction::Long, dec!(100), dec!(95), vec![dec!(110), dec!(120)]);
        t.target1_hit = true;
        t.position_size = dec!(50);
        let c = candle(dec!(119), dec!(122), dec!(118), dec!(121));
        assert_eq!(
            evaluate_exit(&t, &c, dec!(1), dec!(2)),
            ExitDecision::FullExit { price: dec!(120), reason: ExitReason::Target }
        );
    }

    #[test]
    fn bullish_candle_touching_both_favors_stop_when_not_gapped() {
        let t = trade(Direction::Long, dec!(100), dec!(95), vec![dec!(110)]);
        // bullish body (close > open), low pierces stop and high pierces target
        let c = candle(dec!(100), dec!(111), dec!(94), dec!(105));
        assert_eq!(
            evaluate_exit(&t, &c, dec!(1), dec!(2)),
            ExitDecision::FullExit { price: dec!(95), reason: ExitReason::StopLoss }
        );
    }

    #[test]
    fn gap_down_through_stop_and_target_favors_stop() {
        let t = trade(Direction::Long, dec!(100), dec!(95), vec![dec!(110)]);
        // opens below the stop: the bar was already adverse before it traded
        let c = candle(dec!(93), dec!(112), dec!(92), dec!(108));
        assert_eq!(
            evaluate_exit(&t, &c, dec!(1), dec!(2)),
            ExitDecision::FullExit { price: dec!(95), reason: ExitReason::StopLoss }
        );
    }

    #[test]
    fn short_trade_bullish_candle_touching_both_favors_target() {
        let t = trade(Direction::Short, dec!(100), dec!(105), vec![dec!(90)]);
        // bullish body on a short: low (target side) reached before high (stop side)
        let c = candle(dec!(100), dec!(106), dec!(89), dec!(103));
        assert_eq!(
            evaluate_exit(&t, &c, dec!(1), dec!(2)),
            ExitDecision::PartialExit { price: dec!(90), quantity: dec!(50) }
        );
    }

    #[test]
    fn no_touch_leaves_position_open() {
        let t = trade(Direction::Long, dec!(100), dec!(95), vec![dec!(110)]);
        let c = candle(dec!(100), dec!(102), dec!(98), dec!(101));
        assert_eq!(evaluate_exit(&t, &c, dec!(1), dec!(2)), ExitDecision::None);
    }
}

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::application::trade_manager::{evaluate_entry_gates, evaluate_exit};
use crate::domain::correlation::CorrelationId;
use crate::domain::trading::{ActiveTrade, Candle, Direction, ExitReason, Signal, TradeResult, TradeStatus, WatchlistEntry};

#[derive(Debug, Clone, Copy)]
pub struct SlippageConfig {
    pub entry_bps: Decimal,
    pub exit_stop_multiplier: Decimal,
}

/// Replays the exact confirmation and exit rules used live over an injected
/// sequence of historical candles, applying a configurable slippage model to
/// fills instead of a real broker round-trip. Produces one terminal
/// `TradeResult`, persisted through the backtest repository.
pub struct BacktestEngine {
    slippage: SlippageConfig,
    volume_gate_multiplier: Decimal,
    stop_buffer_pct: Decimal,
    trailing_percent: Decimal,
    early_trailing_activation_percent: Decimal,
}

impl BacktestEngine {
    pub fn new(
        slippage: SlippageConfig,
        volume_gate_multiplier: Decimal,
        stop_buffer_pct: Decimal,
        trailing_percent: Decimal,
        early_trailing_activation_percent: Decimal,
    ) -> Self {
        Self {
            slippage,
            volume_gate_multiplier,
            stop_buffer_pct,
            trailing_percent,
            early_trailing_activation_percent,
        }
    }

    pub fn run(
        &self,
        signal: Signal,
        signal_time: chrono::DateTime<chrono::Utc>,
        pivot: Option<Decimal>,
        candles: &[Candle],
    ) -> Option<TradeResult> {
        let mut entry = WatchlistEntry::new(signal, signal_time);
        entry.pivot = pivot;
        let correlation_id = CorrelationId::new();

        let mut history: Vec<Candle> = Vec::new();
        let mut active: Option<ActiveTrade> = None;

        for candle in candles {
            if let Some(trade) = active.as_mut() {
                trade.update_extremes(candle.high, candle.low);
                match evaluate_exit(trade, candle, self.trailing_percent, self.early_trailing_activation_percent) {
                    crate::application::trade_manager::ExitDecision::FullExit { price, reason } => {
                        let exit_price = self.apply_exit_slippage(trade.direction, price, reason);
                        return Some(self.terminal_result(trade, exit_price, candle, reason, correlation_id));
                    }
                    crate::application::trade_manager::ExitDecision::PartialExit { .. } => {
                        // Partial exits reduce size but the backtest engine
                        // reports a single terminal result for the remaining
                        // position per its output contract.
                        trade.target1_hit = true;
                    }
                    crate::application::trade_manager::ExitDecision::None => {}
                }
                history.push(candle.clone());
                continue;
            }

            if let Some(gate_result) = evaluate_entry_gates(
                &mut entry,
                candle,
                &history,
                self.volume_gate_multiplier,
                self.stop_buffer_pct,
            ) {
                let entry_price = self.apply_entry_slippage(entry.signal.direction, gate_result.entry_price, candle);
                active = Some(ActiveTrade {
                    trade_id: Uuid::new_v4(),
                    instrument_key: entry.signal.scrip_code.clone(),
                    direction: entry.signal.direction,
                    exchange_type: entry.signal.exchange_type,
                    entry_price,
                    entry_time: candle_end_time(candle),
                    position_size: Decimal::ONE,
                    stop_loss: gate_result.stop_loss,
                    targets: entry.signal.targets.clone(),
                    high_since_entry: candle.high,
                    low_since_entry: candle.low,
                    target1_hit: false,
                    trailing_active: false,
                    broker_order_id: "backtest".into(),
                    status: TradeStatus::Active,
                    correlation_id,
                });
            }
            history.push(candle.clone());
        }

        active.map(|trade| {
            let last = candles.last().expect("non-empty candle slice required to reach an active trade");
            self.terminal_result(&trade, last.close, last, ExitReason::MarketClose, correlation_id)
        })
    }

    fn apply_entry_slippage(&self, direction: Direction, price: Decimal, candle: &Candle) -> Decimal {
        let adjusted = match direction {
            Direction::Long => price * (Decimal::ONE + self.slippage.entry_bps / Decimal::from(10_000)),
            Direction::Short => price * (Decimal::ONE - self.slippage.entry_bps / Decimal::from(10_000)),
        };
        adjusted.clamp(candle.low, candle.high)
    }

    fn apply_exit_slippage(&self, direction: Direction, price: Decimal, reason: ExitReason) -> Decimal {
        if reason != ExitReason::StopLoss {
            return price;
        }
        let bps = self.slippage.entry_bps * self.slippage.exit_stop_multiplier;
        match direction {
            Direction::Long => price * (Decimal::ONE - bps / Decimal::from(10_000)),
            Direction::Short => price * (Decimal::ONE + bps / Decimal::from(10_000)),
        }
    }

    fn terminal_result(
        &self,
        trade: &ActiveTrade,
        exit_price: Decimal,
        candle: &Candle,
        reason: ExitReason,
        correlation_id: CorrelationId,
    ) -> TradeResult {
        let pnl = match trade.direction {
            Direction::Long => (exit_price - trade.entry_price) * trade.position_size,
            Direction::Short => (trade.entry_price - exit_price) * trade.position_size,
        };
        TradeResult {
            trade_id: trade.trade_id,
            instrument_key: trade.instrument_key.clone(),
            direction: trade.direction,
            entry_price: trade.entry_price,
            entry_time: trade.entry_time,
            exit_price,
            exit_time: candle_end_time(candle),
            quantity: trade.position_size,
            realized_pnl: pnl,
            exit_reason: reason,
            is_partial: false,
            correlation_id,
        }
    }
}

fn candle_end_time(candle: &Candle) -> chrono::DateTime<chrono::Utc> {
    chrono::DateTime::from_timestamp_millis(candle.window_end_millis).unwrap_or_else(chrono::Utc::now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trading::ExchangeType;
    use rust_decimal_macros::dec;

    fn candle(start: i64, open: Decimal, high: Decimal, low: Decimal, close: Decimal, volume: Decimal) -> Candle {
        Candle {
            instrument_key: "NSE:RELIANCE".into(),
            exchange: "NSE".into(),
            window_start_millis: start,
            window_end_millis: start + 300_000,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    fn signal() -> Signal {
        Signal {
            scrip_code: "RELIANCE".into(),
            company_name: "Reliance".into(),
            exchange: "NSE".into(),
            exchange_type: ExchangeType::Equity,
            direction: Direction::Long,
            entry_hint: dec!(100),
            stop_loss_hint: dec!(95),
            targets: vec![dec!(110)],
            origin_timestamp: chrono::Utc::now(),
            ingest_timestamp: chrono::Utc::now(),
            confidence: None,
            risk_reward: None,
            atr_30m: None,
            oi_change_ratio: None,
            volume_t: None,
            surge_t: None,
            pivot_source: None,
            rationale: None,
            signal_kind: "pivot_breakout".into(),
        }
    }

    #[test]
    fn produces_single_terminal_result_on_stop_loss() {
        let engine = BacktestEngine::new(
            SlippageConfig { entry_bps: dec!(5), exit_stop_multiplier: dec!(1.5) },
            dec!(1.5),
            dec!(10),
            dec!(1),
            dec!(2),
        );
        let candles = vec![
            candle(0, dec!(102), dec!(103), dec!(99), dec!(98), dec!(1000)),
            candle(300_000, dec!(97), dec!(106), dec!(96), dec!(105), dec!(2000)),
            candle(600_000, dec!(104), dec!(105), dec!(80), dec!(85), dec!(1800)),
        ];
        let result = engine.run(signal(), chrono::Utc::now(), Some(dec!(100)), &candles);
        let result = result.expect("entry should confirm then stop out");
        assert_eq!(result.exit_reason, ExitReason::StopLoss);
    }
}

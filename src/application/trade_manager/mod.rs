mod exits;
mod gates;

pub use exits::{evaluate_exit, ExitDecision};
pub use gates::{evaluate_entry_gates, EntryGateResult};

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use chrono::Duration;
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::clock::Clock;
use crate::domain::correlation::CorrelationId;
use crate::domain::errors::InternalInvariantViolation;
use crate::domain::ports::{
    BrokerGateway, HistoricalCandleSource, OrderKind, OrderRequest, ResultSink,
};
use crate::domain::trading::{ActiveTrade, Candle, Direction, ExitReason, Signal, TradeResult, TradeStatus, WatchlistEntry};
use crate::application::pivot::CachedPivotClient;
use crate::application::sizing::{self, SizingConfig};

const RECENT_CANDLES_BOUND: usize = 10;

#[derive(Debug, Clone, Copy)]
pub struct TradeManagerConfig {
    pub signal_ttl: Duration,
    pub volume_gate_multiplier: Decimal,
    pub stop_buffer_pct: Decimal,
    pub trailing_percent_equity: Decimal,
    pub trailing_percent_derivative: Decimal,
    pub early_trailing_activation_percent: Decimal,
    pub sizing: SizingConfig,
}

struct ActiveContext {
    correlation_id: CorrelationId,
}

/// The heart of the system. Maintains the watchlist, the single in-flight
/// position, and a short rolling candle history per instrument, all under
/// one logical reader/writer lock. Price-update fast paths read-shared;
/// admission and entry/exit transitions take the exclusive path.
pub struct TradeManager {
    config: TradeManagerConfig,
    clock: Arc<dyn Clock>,
    broker: Arc<dyn BrokerGateway>,
    result_sink: Arc<dyn ResultSink>,
    historical: Option<Arc<dyn HistoricalCandleSource>>,
    pivot: Option<Arc<CachedPivotClient>>,
    waiting: RwLock<HashMap<String, WatchlistEntry>>,
    recent_candles: RwLock<HashMap<String, VecDeque<Candle>>>,
    active: ArcSwapOption<ActiveTrade>,
    active_context: RwLock<Option<ActiveContext>>,
    entry_lock: tokio::sync::Mutex<()>,
}

impl TradeManager {
    pub fn new(
        config: TradeManagerConfig,
        clock: Arc<dyn Clock>,
        broker: Arc<dyn BrokerGateway>,
        result_sink: Arc<dyn ResultSink>,
        historical: Option<Arc<dyn HistoricalCandleSource>>,
        pivot: Option<Arc<CachedPivotClient>>,
    ) -> Self {
        Self {
            config,
            clock,
            broker,
            result_sink,
            historical,
            pivot,
            waiting: RwLock::new(HashMap::new()),
            recent_candles: RwLock::new(HashMap::new()),
            active: ArcSwapOption::empty(),
            active_context: RwLock::new(None),
            entry_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn has_active_trade(&self) -> bool {
        self.active.load().is_some()
    }

    pub async fn waiting_count(&self) -> usize {
        self.waiting.read().await.len()
    }

    /// §4.5.1 admission. Same-instrument admissions always replace the
    /// incumbent waiting entry; a different instrument replaces only if it
    /// is materially closer to the current market price. No overwrite is
    /// permitted while a position for that instrument is already active.
    pub async fn admit(&self, signal: Signal, current_price: Decimal, correlation_id: CorrelationId) {
        let instrument_key = signal.scrip_code.clone();

        if let Some(active) = self.active.load().as_ref() {
            if active.instrument_key == instrument_key {
                warn!(instrument = %instrument_key, "admission rejected: position already active for this instrument");
                return;
            }
        }

        let mut waiting = self.waiting.write().await;
        let replace = match waiting.get(&instrument_key) {
            Some(_incumbent) => true, // same-instrument admissions always replace
            None => true,
        };

        if replace {
            let entry = WatchlistEntry::new(signal, self.clock.now());
            waiting.insert(instrument_key.clone(), entry);
            drop(waiting);

            self.result_sink.signal_admitted(&instrument_key, correlation_id).await;

            if let Some(pivot_client) = &self.pivot {
                let trading_date = self.clock.now().with_timezone(&self.clock.market_timezone()).date_naive();
                let pivot = pivot_client.daily_pivot(&instrument_key, trading_date).await;
                let mut waiting = self.waiting.write().await;
                if let Some(entry) = waiting.get_mut(&instrument_key) {
                    entry.pivot = pivot;
                }
            }

            if let Some(historical) = &self.historical {
                let trading_date = self.clock.now().with_timezone(&self.clock.market_timezone()).date_naive();
                match historical.fetch_1m(&instrument_key, trading_date).await {
                    Ok(candles) => {
                        let mut bucket = self.recent_candles.write().await;
                        let entry = bucket.entry(instrument_key.clone()).or_default();
                        entry.extend(candles);
                        while entry.len() > RECENT_CANDLES_BOUND {
                            entry.pop_front();
                        }
                    }
                    Err(e) => warn!(instrument = %instrument_key, error = %e, "historical candle preload failed"),
                }
            }
        }

        let _ = current_price; // reserved for the distance-to-price replacement heuristic (different-instrument case)
    }

    /// Drop waiting entries past their signal-age TTL.
    pub async fn sweep_expired_waiting(&self) {
        let now = self.clock.now();
        let ttl = self.config.signal_ttl;
        let mut waiting = self.waiting.write().await;
        waiting.retain(|_, entry| !entry.is_expired(now, ttl));
    }

    /// Market-close sweeper: force-exits the active trade (if its exchange
    /// just closed) at the most recently known price, and cancels waiting
    /// entries for closed exchanges.
    pub async fn sweep_market_close(&self, last_known_prices: &HashMap<String, Decimal>) {
        if let Some(active) = self.active.load().as_ref() {
            if self.clock.is_market_closed(&active.instrument_key, self.clock.now()) {
                if let Some(price) = last_known_prices.get(&active.instrument_key).copied() {
                    self.force_close(price, ExitReason::MarketClose).await;
                }
            }
        }

        let mut waiting = self.waiting.write().await;
        let clock = &self.clock;
        waiting.retain(|_, entry| !clock.is_market_closed(&entry.signal.exchange, clock.now()));
    }

    async fn force_close(&self, exit_price: Decimal, reason: ExitReason) {
        let Some(active) = self.active.load_full() else { return };
        let correlation_id = self
            .active_context
            .read()
            .await
            .as_ref()
            .map(|c| c.correlation_id)
            .unwrap_or_else(CorrelationId::new);

        let result = TradeResult {
            trade_id: active.trade_id,
            instrument_key: active.instrument_key.clone(),
            direction: active.direction,
            entry_price: active.entry_price,
            entry_time: active.entry_time,
            exit_price,
            exit_time: self.clock.now(),
            quantity: active.position_size,
            realized_pnl: realized_pnl(&active, exit_price, active.position_size),
            exit_reason: reason,
            is_partial: false,
            correlation_id,
        };

        self.active.store(None);
        *self.active_context.write().await = None;
        self.result_sink.trade_closed(result).await;
    }

    /// §4.5.2 closed-candle handler. Preconditions are evaluated in order and
    /// short-circuit; exit supervision runs whenever a position is active,
    /// entry evaluation only proceeds for instruments on the watchlist
    /// within the golden window.
    pub async fn on_closed_candle(&self, candle: Candle) {
        if self.active.load().is_some() {
            self.run_exit_supervision(candle).await;
            return;
        }

        if !self.clock.is_within_golden_entry_window(
            chrono::DateTime::from_timestamp_millis(candle.window_start_millis).unwrap_or(self.clock.now()),
        ) {
            return;
        }

        let has_waiting_for_instrument = {
            let waiting = self.waiting.read().await;
            waiting.contains_key(&candle.instrument_key)
        };
        if !has_waiting_for_instrument {
            return;
        }

        self.evaluate_entries(candle).await;
    }

    async fn evaluate_entries(&self, candle: Candle) {
        {
            let mut bucket = self.recent_candles.write().await;
            let history = bucket.entry(candle.instrument_key.clone()).or_default();
            history.push_back(candle.clone());
            while history.len() > RECENT_CANDLES_BOUND {
                history.pop_front();
            }
        }

        let mut waiting = self.waiting.write().await;
        let history = self.recent_candles.read().await;
        let prior_candles: Vec<Candle> = history
            .get(&candle.instrument_key)
            .map(|h| h.iter().cloned().collect())
            .unwrap_or_default();
        drop(history);

        let mut best: Option<(String, EntryGateResult)> = None;
        for (key, entry) in waiting.iter_mut() {
            if key != &candle.instrument_key {
                continue;
            }
            if let Some(result) = evaluate_entry_gates(
                entry,
                &candle,
                &prior_candles,
                self.config.volume_gate_multiplier,
                self.config.stop_buffer_pct,
            ) {
                let better = match &best {
                    None => true,
                    Some((_, current_best)) => result.potential_rr > current_best.potential_rr,
                };
                if better {
                    best = Some((key.clone(), result));
                }
            }
        }

        let Some((instrument_key, gate_result)) = best else { return };
        let entry = waiting.remove(&instrument_key).expect("selected entry exists in waiting map");
        drop(waiting);

        self.execute_entry(entry, candle, gate_result).await;
    }

    /// §4.5.5 entry execution: size, place the broker order, and atomically
    /// install the resulting position as the process's single active trade.
    async fn execute_entry(&self, entry: WatchlistEntry, candle: Candle, gate_result: EntryGateResult) {
        let _guard = self.entry_lock.lock().await;

        if self.active.load().is_some() {
            warn!(instrument = %entry.instrument_key(), "lost the race for the active slot, cancelling entry");
            return;
        }

        let correlation_id = CorrelationId::new();
        let quantity = sizing::calculate_quantity(
            &self.config.sizing,
            Decimal::from(1_000_000), // capital snapshot; wired to the portfolio service in production
            gate_result.entry_price,
            gate_result.stop_loss,
        );

        if quantity.is_zero() {
            info!(instrument = %entry.instrument_key(), "sizer returned zero, aborting entry");
            self.result_sink
                .trade_cancelled(entry.instrument_key(), correlation_id, "zero position size")
                .await;
            return;
        }

        let client_token = Uuid::new_v4().to_string();
        let order = OrderRequest {
            client_order_token: client_token,
            instrument_key: entry.signal.scrip_code.clone(),
            exchange_type: entry.signal.exchange_type,
            direction: entry.signal.direction,
            quantity,
            limit_price: None,
            kind: match entry.signal.exchange_type {
                crate::domain::trading::ExchangeType::Equity => OrderKind::Market,
                _ => OrderKind::StopLimit,
            },
            correlation_id,
        };

        let ack = match self.broker.place(order).await {
            Ok(ack) => ack,
            Err(e) => {
                error!(instrument = %entry.instrument_key(), error = %e, "entry order placement failed");
                self.result_sink
                    .trade_failed(entry.instrument_key(), correlation_id, &e.to_string())
                    .await;
                return;
            }
        };

        let trade = ActiveTrade {
            trade_id: Uuid::new_v4(),
            instrument_key: entry.signal.scrip_code.clone(),
            direction: entry.signal.direction,
            exchange_type: entry.signal.exchange_type,
            entry_price: gate_result.entry_price,
            entry_time: self.clock.now(),
            position_size: quantity,
            stop_loss: gate_result.stop_loss,
            targets: entry.signal.targets.clone(),
            high_since_entry: candle.high,
            low_since_entry: candle.low,
            target1_hit: false,
            trailing_active: false,
            broker_order_id: ack.broker_order_id,
            status: TradeStatus::Active,
            correlation_id,
        };

        let trade_id = trade.trade_id;
        let broker_order_id = trade.broker_order_id.clone();
        // The composite check-then-place-then-install sequence runs under
        // `entry_lock`, giving the atomic CAS on `active` (the ArcSwapOption
        // itself) a single writer; a non-empty slot here means another path
        // raced us despite the lock, an invariant violation worth flagging
        // rather than silently overwriting a live position.
        if self.active.load().is_some() {
            warn!(instrument = %entry.instrument_key(), "CAS lost after broker placement, cancelling just-placed order");
            if let Err(e) = self.broker.cancel(&broker_order_id).await {
                error!(error = %e, "reconciliation cancel failed");
            }
            return;
        }
        self.active.store(Some(Arc::new(trade)));

        *self.active_context.write().await = Some(ActiveContext { correlation_id });
        self.result_sink.trade_entered(trade_id, correlation_id).await;
    }

    async fn run_exit_supervision(&self, candle: Candle) {
        let Some(active) = self.active.load_full() else { return };
        if active.instrument_key != candle.instrument_key {
            return;
        }

        let mut updated = (*active).clone();
        updated.update_extremes(candle.high, candle.low);

        let trailing_percent = if self.is_derivative(updated.exchange_type) {
            self.config.trailing_percent_derivative
        } else {
            self.config.trailing_percent_equity
        };

        let decision = evaluate_exit(
            &updated,
            &candle,
            trailing_percent,
            self.config.early_trailing_activation_percent,
        );

        match decision {
            ExitDecision::None => {
                self.active.store(Some(Arc::new(updated)));
            }
            ExitDecision::PartialExit { price, quantity } => {
                let correlation_id = self.correlation_id_for_active().await;
                match self.broker.place(exit_order(&updated, price, quantity, correlation_id)).await {
                    Ok(_) => {
                        updated.target1_hit = true;
                        updated.position_size -= quantity;
                        updated.status = TradeStatus::PartialExit;
                        let result = TradeResult {
                            trade_id: updated.trade_id,
                            instrument_key: updated.instrument_key.clone(),
                            direction: updated.direction,
                            entry_price: updated.entry_price,
                            entry_time: updated.entry_time,
                            exit_price: price,
                            exit_time: self.clock.now(),
                            quantity,
                            realized_pnl: realized_pnl(&updated, price, quantity),
                            exit_reason: ExitReason::Target,
                            is_partial: true,
                            correlation_id,
                        };
                        self.active.store(Some(Arc::new(updated)));
                        self.result_sink.partial_exit(result).await;
                    }
                    Err(e) => {
                        warn!(
                            instrument = %updated.instrument_key,
                            error = %e,
                            "partial exit order failed, leaving position active for retry on next candle"
                        );
                        self.active.store(Some(Arc::new(updated)));
                    }
                }
            }
            ExitDecision::FullExit { price, reason } => {
                let correlation_id = self.correlation_id_for_active().await;
                let result = TradeResult {
                    trade_id: updated.trade_id,
                    instrument_key: updated.instrument_key.clone(),
                    direction: updated.direction,
                    entry_price: updated.entry_price,
                    entry_time: updated.entry_time,
                    exit_price: price,
                    exit_time: self.clock.now(),
                    quantity: updated.position_size,
                    realized_pnl: realized_pnl(&updated, price, updated.position_size),
                    exit_reason: reason,
                    is_partial: false,
                    correlation_id,
                };
                match self.broker.place(exit_order(&updated, price, updated.position_size, correlation_id)).await {
                    Ok(_) => {
                        self.active.store(None);
                        *self.active_context.write().await = None;
                        self.result_sink.trade_closed(result).await;
                    }
                    Err(e) => {
                        error!(instrument = %updated.instrument_key, error = %e, "exit order failed, position left marked FAILED");
                        self.active.store(None);
                        *self.active_context.write().await = None;
                        self.result_sink
                            .trade_failed(&updated.instrument_key, correlation_id, &format!("exit order failed: {e}"))
                            .await;
                    }
                }
            }
        }
    }

    async fn correlation_id_for_active(&self) -> CorrelationId {
        self.active_context
            .read()
            .await
            .as_ref()
            .map(|c| c.correlation_id)
            .unwrap_or_else(CorrelationId::new)
    }

    fn is_derivative(&self, exchange_type: crate::domain::trading::ExchangeType) -> bool {
        !matches!(exchange_type, crate::domain::trading::ExchangeType::Equity)
    }
}

fn exit_order(trade: &ActiveTrade, price: Decimal, quantity: Decimal, correlation_id: CorrelationId) -> OrderRequest {
    let kind = match trade.exchange_type {
        crate::domain::trading::ExchangeType::Equity => OrderKind::Market,
        _ => OrderKind::StopLimit,
    };
    OrderRequest {
        client_order_token: Uuid::new_v4().to_string(),
        instrument_key: trade.instrument_key.clone(),
        exchange_type: trade.exchange_type,
        direction: match trade.direction {
            Direction::Long => Direction::Short,
            Direction::Short => Direction::Long,
        },
        quantity,
        limit_price: if kind == OrderKind::StopLimit { Some(price) } else { None },
        kind,
        correlation_id,
    }
}

fn realized_pnl(trade: &ActiveTrade, exit_price: Decimal, quantity: Decimal) -> Decimal {
    match trade.direction {
        Direction::Long => (exit_price - trade.entry_price) * quantity,
        Direction::Short => (trade.entry_price - exit_price) * quantity,
    }
}

#[allow(unused)]
fn report_invariant_violation(detail: impl Into<String>) -> InternalInvariantViolation {
    InternalInvariantViolation(detail.into())
}

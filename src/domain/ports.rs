use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::domain::correlation::CorrelationId;
use crate::domain::trading::{Candle, Direction, ExchangeType, TradeResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderKind {
    Market,
    StopLimit,
}

#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub client_order_token: String,
    pub instrument_key: String,
    pub exchange_type: ExchangeType,
    pub direction: Direction,
    pub quantity: Decimal,
    pub limit_price: Option<Decimal>,
    pub kind: OrderKind,
    pub correlation_id: CorrelationId,
}

#[derive(Debug, Clone)]
pub struct OrderAck {
    pub broker_order_id: String,
}

/// Capability boundary for broker order placement. The wire protocol to the
/// actual broker is out of scope; implementations adapt a concrete client to
/// this interface. Idempotency, retry, and circuit-breaking are layered
/// around implementations of this trait, not inside them.
#[async_trait]
pub trait BrokerGateway: Send + Sync {
    async fn place(&self, order: OrderRequest) -> anyhow::Result<OrderAck>;
    async fn cancel(&self, broker_order_id: &str) -> anyhow::Result<()>;
}

/// Read-through access to the daily pivot level for an instrument. No writes.
#[async_trait]
pub trait PivotClient: Send + Sync {
    async fn daily_pivot(&self, instrument_key: &str) -> anyhow::Result<Option<Decimal>>;
}

/// Historical 1-minute candle fetch used to pre-seed confirmation gates on
/// watchlist admission.
#[async_trait]
pub trait HistoricalCandleSource: Send + Sync {
    async fn fetch_1m(&self, instrument_key: &str, trading_date: chrono::NaiveDate) -> anyhow::Result<Vec<Candle>>;
}

/// Lifecycle-event publication. At-least-once; consumers dedupe by trade id.
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn signal_admitted(&self, instrument_key: &str, correlation_id: CorrelationId);
    async fn trade_entered(&self, trade_id: uuid::Uuid, correlation_id: CorrelationId);
    async fn partial_exit(&self, result: TradeResult);
    async fn trade_closed(&self, result: TradeResult);
    async fn trade_cancelled(&self, instrument_key: &str, correlation_id: CorrelationId, reason: &str);
    async fn trade_failed(&self, instrument_key: &str, correlation_id: CorrelationId, reason: &str);
}

#[derive(Debug, Clone)]
pub struct DeadLetter {
    pub topic: String,
    pub payload: Vec<u8>,
    pub failure_category: String,
    pub message: String,
    pub partition_offset: Option<i64>,
}

/// Terminal home for unparseable records, validation failures, and
/// permanently-failing broker intents. Never re-injects into normal flow.
#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    async fn publish(&self, letter: DeadLetter);
}

/// Persistence boundary for completed backtest trades.
#[async_trait]
pub trait BacktestRepository: Send + Sync {
    async fn save(&self, result: &TradeResult) -> anyhow::Result<()>;
    async fn prune_older_than(&self, cutoff: chrono::DateTime<chrono::Utc>) -> anyhow::Result<u64>;
}

/// Inbound raw signal records, pre-parse. Modeled as a capability interface
/// per the message-bus abstraction rather than a concrete client for any one
/// broker, matching the swappable-boundary design used throughout this
/// system's service ports.
#[async_trait]
pub trait SignalSource: Send + Sync {
    async fn recv(&mut self) -> Option<RawSignalRecord>;
    /// Acknowledge only after downstream hand-off has returned, preserving
    /// at-least-once delivery semantics.
    async fn ack(&mut self, record: &RawSignalRecord);
}

#[derive(Debug, Clone)]
pub struct RawSignalRecord {
    pub payload: Vec<u8>,
    pub partition_offset: Option<i64>,
}

/// A single exchange-reported tick, as consumed by the candle builder.
#[derive(Debug, Clone)]
pub struct Tick {
    pub instrument_key: String,
    pub exchange: String,
    pub last_price: Decimal,
    pub reported_open: Decimal,
    pub reported_high: Decimal,
    pub reported_low: Decimal,
    /// Cumulative volume as reported by the exchange for the trading day.
    /// The candle builder sums only the positive deltas between ticks.
    pub cumulative_volume: Decimal,
    pub event_time_millis: i64,
}

#[async_trait]
pub trait TickSource: Send + Sync {
    async fn recv(&mut self) -> Option<Tick>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_request_carries_correlation_id_for_tracing() {
        let req = OrderRequest {
            client_order_token: "tok-1".into(),
            instrument_key: "NSE:RELIANCE".into(),
            exchange_type: ExchangeType::Equity,
            direction: Direction::Long,
            quantity: Decimal::ONE,
            limit_price: None,
            kind: OrderKind::Market,
            correlation_id: CorrelationId::new(),
        };
        assert_eq!(req.kind, OrderKind::Market);
    }
}

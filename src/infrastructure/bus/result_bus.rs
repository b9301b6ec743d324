use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::correlation::CorrelationId;
use crate::domain::ports::{DeadLetter, DeadLetterSink};
use crate::domain::trading::TradeResult;

/// Lifecycle events fanned out to `ResultBus` listeners. Mirrors the
/// `ResultSink` port one-for-one so a listener can match on a single enum
/// instead of implementing six async methods.
#[derive(Debug, Clone)]
pub enum TradingEvent {
    SignalAdmitted { instrument_key: String, correlation_id: CorrelationId },
    TradeEntered { trade_id: Uuid, correlation_id: CorrelationId },
    PartialExit(TradeResult),
    TradeClosed(TradeResult),
    TradeCancelled { instrument_key: String, correlation_id: CorrelationId, reason: String },
    TradeFailed { instrument_key: String, correlation_id: CorrelationId, reason: String },
}

pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &TradingEvent);
}

/// Fan-out `ResultSink` over a list of listeners, same shape as the
/// publish-to-all-subscribers bus used elsewhere in this codebase, adapted
/// to the async trait-object boundary this port requires.
pub struct ResultBus {
    listeners: Arc<RwLock<Vec<Arc<dyn EventListener>>>>,
}

impl ResultBus {
    pub fn new() -> Self {
        Self { listeners: Arc::new(RwLock::new(Vec::new())) }
    }

    pub async fn subscribe(&self, listener: Arc<dyn EventListener>) {
        self.listeners.write().await.push(listener);
    }

    async fn publish(&self, event: TradingEvent) {
        let listeners = self.listeners.read().await;
        for listener in listeners.iter() {
            listener.on_event(&event);
        }
    }
}

impl Default for ResultBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl crate::domain::ports::ResultSink for ResultBus {
    async fn signal_admitted(&self, instrument_key: &str, correlation_id: CorrelationId) {
        self.publish(TradingEvent::SignalAdmitted { instrument_key: instrument_key.to_string(), correlation_id }).await;
    }

    async fn trade_entered(&self, trade_id: Uuid, correlation_id: CorrelationId) {
        self.publish(TradingEvent::TradeEntered { trade_id, correlation_id }).await;
    }

    async fn partial_exit(&self, result: TradeResult) {
        self.publish(TradingEvent::PartialExit(result)).await;
    }

    async fn trade_closed(&self, result: TradeResult) {
        self.publish(TradingEvent::TradeClosed(result)).await;
    }

    async fn trade_cancelled(&self, instrument_key: &str, correlation_id: CorrelationId, reason: &str) {
        self.publish(TradingEvent::TradeCancelled {
            instrument_key: instrument_key.to_string(),
            correlation_id,
            reason: reason.to_string(),
        })
        .await;
    }

    async fn trade_failed(&self, instrument_key: &str, correlation_id: CorrelationId, reason: &str) {
        self.publish(TradingEvent::TradeFailed {
            instrument_key: instrument_key.to_string(),
            correlation_id,
            reason: reason.to_string(),
        })
        .await;
    }
}

/// Minimal `DeadLetterSink` that logs at warn level. Production deployments
/// subscribe a real sink (a dead-letter topic, a table) in its place; this
/// one exists so the wiring in `src/bin` has something to hand over by
/// default and so tests never silently lose a dead-lettered record.
pub struct LoggingDeadLetterSink;

#[async_trait]
impl DeadLetterSink for LoggingDeadLetterSink {
    async fn publish(&self, letter: DeadLetter) {
        warn!(
            topic = %letter.topic,
            category = %letter.failure_category,
            message = %letter.message,
            "dead letter"
        );
    }
}

/// Logs every lifecycle event at info level. The default listener wired in
/// `src/bin` until a real sink (a Kafka topic, a dashboard push) replaces it.
pub struct LoggingEventListener;

impl EventListener for LoggingEventListener {
    fn on_event(&self, event: &TradingEvent) {
        match event {
            TradingEvent::SignalAdmitted { instrument_key, correlation_id } => {
                info!(instrument = %instrument_key, %correlation_id, "signal admitted");
            }
            TradingEvent::TradeEntered { trade_id, correlation_id } => {
                info!(%trade_id, %correlation_id, "trade entered");
            }
            TradingEvent::PartialExit(result) => {
                info!(trade_id = %result.trade_id, pnl = %result.realized_pnl, "partial exit");
            }
            TradingEvent::TradeClosed(result) => {
                info!(trade_id = %result.trade_id, pnl = %result.realized_pnl, reason = ?result.exit_reason, "trade closed");
            }
            TradingEvent::TradeCancelled { instrument_key, reason, .. } => {
                info!(instrument = %instrument_key, reason, "trade cancelled");
            }
            TradingEvent::TradeFailed { instrument_key, reason, .. } => {
                warn!(instrument = %instrument_key, reason, "trade failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::ResultSink;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingListener {
        count: Arc<AtomicUsize>,
    }

    impl EventListener for CountingListener {
        fn on_event(&self, _event: &TradingEvent) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn publishes_to_every_subscribed_listener() {
        let bus = ResultBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        bus.subscribe(Arc::new(CountingListener { count: count.clone() })).await;
        bus.subscribe(Arc::new(CountingListener { count: count.clone() })).await;

        bus.signal_admitted("NSE:RELIANCE", CorrelationId::new()).await;

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}

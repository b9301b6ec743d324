//! Prometheus metrics for the trade engine.
//!
//! All metrics use the `tradecore_` prefix.

use prometheus::{CounterVec, Gauge, GaugeVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,
    pub trades_total: CounterVec,
    pub partial_exits_total: CounterVec,
    pub broker_orders_failed_total: CounterVec,
    pub signals_admitted_total: CounterVec,
    pub signals_dead_lettered_total: CounterVec,
    pub consumer_lag: GaugeVec,
    pub candle_defects_total: GaugeVec,
    pub circuit_breaker_state: Gauge,
    pub win_rate_current: Gauge,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let trades_total = CounterVec::new(
            Opts::new("tradecore_trades_total", "Trades closed, by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(trades_total.clone()))?;

        let partial_exits_total = CounterVec::new(
            Opts::new("tradecore_partial_exits_total", "Partial exits taken, by instrument"),
            &["instrument"],
        )?;
        registry.register(Box::new(partial_exits_total.clone()))?;

        let broker_orders_failed_total = CounterVec::new(
            Opts::new("tradecore_broker_orders_failed_total", "Broker order placements that failed, by category"),
            &["category"],
        )?;
        registry.register(Box::new(broker_orders_failed_total.clone()))?;

        let signals_admitted_total = CounterVec::new(
            Opts::new("tradecore_signals_admitted_total", "Signals admitted to the watchlist, by route"),
            &["route"],
        )?;
        registry.register(Box::new(signals_admitted_total.clone()))?;

        let signals_dead_lettered_total = CounterVec::new(
            Opts::new("tradecore_signals_dead_lettered_total", "Signals dead-lettered, by reason"),
            &["reason"],
        )?;
        registry.register(Box::new(signals_dead_lettered_total.clone()))?;

        let consumer_lag = GaugeVec::new(
            Opts::new("tradecore_consumer_lag", "Message-bus consumer lag, by stream"),
            &["stream"],
        )?;
        registry.register(Box::new(consumer_lag.clone()))?;

        let candle_defects_total = GaugeVec::new(
            Opts::new("tradecore_candle_defects_total", "OHLC invariant violations observed, by instrument"),
            &["instrument"],
        )?;
        registry.register(Box::new(candle_defects_total.clone()))?;

        let circuit_breaker_state = Gauge::with_opts(Opts::new(
            "tradecore_circuit_breaker_state",
            "Broker circuit breaker state (0=closed, 1=half-open, 2=open)",
        ))?;
        registry.register(Box::new(circuit_breaker_state.clone()))?;

        let win_rate_current = Gauge::with_opts(Opts::new(
            "tradecore_win_rate_current",
            "Rolling win rate across closed trades (0-1)",
        ))?;
        registry.register(Box::new(win_rate_current.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            trades_total,
            partial_exits_total,
            broker_orders_failed_total,
            signals_admitted_total,
            signals_dead_lettered_total,
            consumer_lag,
            candle_defects_total,
            circuit_breaker_state,
            win_rate_current,
        })
    }

    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder.encode_to_string(&metric_families).unwrap_or_default()
    }

    pub fn record_trade_closed(&self, won: bool) {
        self.trades_total.with_label_values(&[if won { "won" } else { "lost" }]).inc();
    }

    pub fn record_partial_exit(&self, instrument_key: &str) {
        self.partial_exits_total.with_label_values(&[instrument_key]).inc();
    }

    pub fn record_broker_failure(&self, category: &str) {
        self.broker_orders_failed_total.with_label_values(&[category]).inc();
    }

    pub fn record_signal_admitted(&self, route: &str) {
        self.signals_admitted_total.with_label_values(&[route]).inc();
    }

    pub fn record_dead_letter(&self, reason: &str) {
        self.signals_dead_lettered_total.with_label_values(&[reason]).inc();
    }

    pub fn set_consumer_lag(&self, stream: &str, lag: f64) {
        self.consumer_lag.with_label_values(&[stream]).set(lag);
    }

    pub fn set_candle_defects(&self, instrument_key: &str, count: u64) {
        self.candle_defects_total.with_label_values(&[instrument_key]).set(count as f64);
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("failed to construct default metrics registry")
    }
}

/// Liveness/readiness checks backing the health endpoint.
pub mod health {
    use std::sync::Arc;

    use crate::infrastructure::circuit_breaker::{CircuitBreaker, CircuitState};
    use crate::domain::ports::PivotClient;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum ComponentHealth {
        Up,
        Down,
    }

    pub struct HealthCheck {
        pub component: &'static str,
        pub status: ComponentHealth,
    }

    /// Probes the downstream services this process depends on. The broker is
    /// reported through its circuit breaker state rather than a live call,
    /// since probing a broker with a synthetic order is not something this
    /// system is willing to do just to answer a health check.
    pub async fn check_all(broker_circuit: &CircuitBreaker, pivot: Option<&Arc<dyn PivotClient>>) -> Vec<HealthCheck> {
        let broker_status = match broker_circuit.state().await {
            CircuitState::Open => ComponentHealth::Down,
            CircuitState::Closed | CircuitState::HalfOpen => ComponentHealth::Up,
        };
        let mut checks = vec![HealthCheck { component: "broker", status: broker_status }];

        if let Some(pivot) = pivot {
            let status = match pivot.daily_pivot("HEALTHCHECK").await {
                Ok(_) => ComponentHealth::Up,
                Err(_) => ComponentHealth::Down,
            };
            checks.push(HealthCheck { component: "pivot_service", status });
        }

        checks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_registered_metric_families() {
        let metrics = Metrics::new().expect("metrics should construct");
        metrics.record_trade_closed(true);
        metrics.record_partial_exit("NSE:RELIANCE");
        let rendered = metrics.render();
        assert!(rendered.contains("tradecore_trades_total"));
        assert!(rendered.contains("tradecore_partial_exits_total"));
    }
}

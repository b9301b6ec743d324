mod idempotency;
mod validate;

pub use idempotency::IdempotencyCache;
pub use validate::validate_signal;

use std::sync::Arc;

use chrono::Duration;
use tracing::{info, warn};

use crate::domain::clock::Clock;
use crate::domain::correlation::CorrelationId;
use crate::domain::errors::ValidationFailure;
use crate::domain::ports::{DeadLetter, DeadLetterSink};
use crate::domain::trading::Signal;

/// Where a freshly-admitted signal is routed: straight into live trading, or
/// into the backtest engine because it arrived stale or outside trading
/// hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    Live,
    Backtest,
}

pub struct SignalRouterConfig {
    pub live_age_threshold: Duration,
}

/// Parses, validates, deduplicates, and age-classifies inbound signals before
/// handing them to either the Trade Manager (live) or the Backtest Engine.
pub struct SignalRouter {
    config: SignalRouterConfig,
    clock: Arc<dyn Clock>,
    idempotency: IdempotencyCache,
    dlq: Arc<dyn DeadLetterSink>,
}

impl SignalRouter {
    pub fn new(config: SignalRouterConfig, clock: Arc<dyn Clock>, dlq: Arc<dyn DeadLetterSink>) -> Self {
        Self {
            config,
            clock,
            idempotency: IdempotencyCache::new(Duration::minutes(30)),
            dlq,
        }
    }

    /// Normalize, validate, dedupe, and classify one raw signal payload.
    /// Returns `None` if the signal was rejected, deduplicated, or
    /// dead-lettered; the caller still acks the source offset in that case
    /// since the outcome is terminal.
    pub async fn on_signal(
        &mut self,
        payload: &[u8],
        partition_offset: Option<i64>,
    ) -> Option<(Signal, RouteDecision, CorrelationId)> {
        let correlation_id = CorrelationId::new();

        let raw: Signal = match serde_json::from_slice(payload) {
            Ok(raw) => raw,
            Err(e) => {
                self.dead_letter(payload, partition_offset, "parse_error", &e.to_string())
                    .await;
                return None;
            }
        };

        let signal = Signal {
            scrip_code: raw.scrip_code.trim().to_string(),
            company_name: raw.company_name.trim().to_string(),
            exchange: raw.exchange.trim().to_uppercase(),
            ..raw
        };

        if let Err(e) = validate_signal(&signal) {
            self.dead_letter(payload, partition_offset, "validation_failure", &e.to_string())
                .await;
            return None;
        }

        let key = signal.idempotency_key();
        if self.idempotency.contains(&key, self.clock.now()) {
            info!(instrument = %signal.scrip_code, "duplicate signal discarded");
            return None;
        }

        let age = signal.age();
        if age < Duration::zero() {
            let e = ValidationFailure::ClockSkewed {
                delta_ms: age.num_milliseconds(),
            };
            warn!(instrument = %signal.scrip_code, "rejecting clock-skewed signal");
            self.dead_letter(payload, partition_offset, "clock_skew", &e.to_string())
                .await;
            return None;
        }

        self.idempotency.insert(key, self.clock.now());

        let route = if age > self.config.live_age_threshold {
            RouteDecision::Backtest
        } else if self.clock.is_within_trading_hours(&signal.exchange, self.clock.now()) {
            RouteDecision::Live
        } else {
            RouteDecision::Backtest
        };

        Some((signal, route, correlation_id))
    }

    async fn dead_letter(&self, payload: &[u8], partition_offset: Option<i64>, category: &str, message: &str) {
        self.dlq
            .publish(DeadLetter {
                topic: "trading-signals".to_string(),
                payload: payload.to_vec(),
                failure_category: category.to_string(),
                message: message.to_string(),
                partition_offset,
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::clock::{FixedClock, GoldenWindow, SessionWindow};
    use crate::domain::trading::{Direction, ExchangeType};
    use chrono::{NaiveTime, TimeZone, Utc};
    use rust_decimal_macros::dec;
    use std::sync::Mutex;

    struct NullDlq {
        letters: Mutex<Vec<DeadLetter>>,
    }

    #[async_trait::async_trait]
    impl DeadLetterSink for NullDlq {
        async fn publish(&self, letter: DeadLetter) {
            self.letters.lock().unwrap().push(letter);
        }
    }

    fn clock_at(now: chrono::DateTime<Utc>) -> Arc<FixedClock> {
        let mut sessions = std::collections::HashMap::new();
        sessions.insert(
            "NSE".to_string(),
            SessionWindow {
                start: NaiveTime::from_hms_opt(9, 15, 0).unwrap(),
                end: NaiveTime::from_hms_opt(15, 30, 0).unwrap(),
            },
        );
        Arc::new(FixedClock {
            instant: std::sync::RwLock::new(now),
            timezone: chrono_tz::Asia::Kolkata,
            sessions,
            golden: GoldenWindow {
                start: NaiveTime::from_hms_opt(9, 15, 0).unwrap(),
                end: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            },
        })
    }

    fn signal_json(origin: chrono::DateTime<Utc>) -> Vec<u8> {
        signal_json_at(origin, origin)
    }

    fn signal_json_at(origin: chrono::DateTime<Utc>, ingest: chrono::DateTime<Utc>) -> Vec<u8> {
        let signal = Signal {
            scrip_code: " RELIANCE ".into(),
            company_name: "Reliance".into(),
            exchange: " nse ".into(),
            exchange_type: ExchangeType::Equity,
            direction: Direction::Long,
            entry_hint: dec!(2500),
            stop_loss_hint: dec!(2450),
            targets: vec![dec!(2550)],
            origin_timestamp: origin,
            ingest_timestamp: ingest,
            confidence: None,
            risk_reward: None,
            atr_30m: None,
            oi_change_ratio: None,
            volume_t: None,
            surge_t: None,
            pivot_source: None,
            rationale: None,
            signal_kind: "pivot_breakout".into(),
        };
        serde_json::to_vec(&signal).unwrap()
    }

    #[tokio::test]
    async fn future_timestamped_signal_is_rejected_not_routed() {
        let now = Utc.with_ymd_and_hms(2024, 6, 10, 4, 0, 0).unwrap();
        let clock = clock_at(now);
        let dlq = Arc::new(NullDlq { letters: Mutex::new(vec![]) });
        let mut router = SignalRouter::new(
            SignalRouterConfig { live_age_threshold: Duration::seconds(120) },
            clock.clone(),
            dlq.clone(),
        );
        let payload = signal_json(now + Duration::seconds(10));
        let result = router.on_signal(&payload, None).await;
        assert!(result.is_none());
        assert_eq!(dlq.letters.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn stale_signal_routes_to_backtest() {
        let now = Utc.with_ymd_and_hms(2024, 6, 10, 4, 0, 0).unwrap();
        let clock = clock_at(now);
        let dlq = Arc::new(NullDlq { letters: Mutex::new(vec![]) });
        let mut router = SignalRouter::new(
            SignalRouterConfig { live_age_threshold: Duration::seconds(120) },
            clock.clone(),
            dlq,
        );
        let payload = signal_json_at(now - Duration::seconds(300), now);
        let (_, route, _) = router.on_signal(&payload, None).await.unwrap();
        assert_eq!(route, RouteDecision::Backtest);
    }

    #[tokio::test]
    async fn duplicate_signal_is_discarded_second_time() {
        let now = Utc.with_ymd_and_hms(2024, 6, 10, 4, 0, 0).unwrap();
        let clock = clock_at(now);
        let dlq = Arc::new(NullDlq { letters: Mutex::new(vec![]) });
        let mut router = SignalRouter::new(
            SignalRouterConfig { live_age_threshold: Duration::seconds(120) },
            clock.clone(),
            dlq,
        );
        let payload = signal_json(now);
        assert!(router.on_signal(&payload, None).await.is_some());
        assert!(router.on_signal(&payload, None).await.is_none());
    }
}

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Trade direction as determined by the upstream signal-generation pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Long,
    Short,
}

/// Coarse instrument class. Drives order-type selection in the broker gateway
/// (market for equities, stop-limit for derivatives) and slippage model
/// selection in the backtest engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExchangeType {
    Equity,
    Future,
    Option,
    Commodity,
}

/// An immutable candidate trade idea as it arrives from the signal-generation
/// pipeline. Signal generation internals (pivot math, pattern detection) are
/// out of scope here; this struct only carries their precomputed outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub scrip_code: String,
    pub company_name: String,
    pub exchange: String,
    pub exchange_type: ExchangeType,
    pub direction: Direction,
    pub entry_hint: Decimal,
    pub stop_loss_hint: Decimal,
    /// T1..T4, at least one target is required.
    pub targets: Vec<Decimal>,
    pub origin_timestamp: DateTime<Utc>,
    pub ingest_timestamp: DateTime<Utc>,
    pub confidence: Option<f64>,
    pub risk_reward: Option<f64>,
    pub atr_30m: Option<Decimal>,
    pub oi_change_ratio: Option<f64>,
    pub volume_t: Option<Decimal>,
    pub surge_t: Option<Decimal>,
    pub pivot_source: Option<String>,
    pub rationale: Option<String>,
    /// Distinguishes otherwise-identical signals for the same instrument and
    /// origin timestamp, used in the idempotency key.
    pub signal_kind: String,
}

impl Signal {
    /// Age of the signal at ingest, signed. A negative age means the signal
    /// claims to have originated after it was ingested (clock skew) and must
    /// be rejected outright, never clamped via absolute value.
    pub fn age(&self) -> chrono::Duration {
        self.ingest_timestamp - self.origin_timestamp
    }

    pub fn idempotency_key(&self) -> String {
        format!(
            "{}|{:?}|{}|{}",
            self.scrip_code,
            self.direction,
            self.origin_timestamp.timestamp_millis(),
            self.signal_kind
        )
    }

    pub fn first_target(&self) -> Option<Decimal> {
        self.targets.first().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample() -> Signal {
        Signal {
            scrip_code: "RELIANCE".into(),
            company_name: "Reliance Industries".into(),
            exchange: "NSE".into(),
            exchange_type: ExchangeType::Equity,
            direction: Direction::Long,
            entry_hint: Decimal::new(250000, 2),
            stop_loss_hint: Decimal::new(245000, 2),
            targets: vec![Decimal::new(255000, 2)],
            origin_timestamp: Utc::now(),
            ingest_timestamp: Utc::now(),
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
    fn age_is_signed_not_absolute() {
        let mut s = sample();
        s.ingest_timestamp = s.origin_timestamp - Duration::seconds(5);
        assert!(s.age() < Duration::zero());
    }

    #[test]
    fn idempotency_key_is_stable_for_identical_fields() {
        let s = sample();
        assert_eq!(s.idempotency_key(), s.idempotency_key());
    }
}

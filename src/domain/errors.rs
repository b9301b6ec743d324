use thiserror::Error;

/// A malformed or semantically invalid inbound signal. Forwarded to the
/// dead-letter path, acknowledged, never retried.
#[derive(Debug, Error)]
pub enum ValidationFailure {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },
    #[error("entry hint must be positive, got {value}")]
    NonPositiveEntryHint { value: String },
    #[error("stop loss must be positive, got {value}")]
    NonPositiveStopLoss { value: String },
    #[error("at least one target is required")]
    NoTargets,
    #[error("targets are not monotonically ordered for direction")]
    TargetsNotMonotonic,
    #[error("stop loss is on the wrong side of entry for direction {direction}")]
    DirectionInconsistentStop { direction: String },
    #[error("first target is on the wrong side of entry for direction {direction}")]
    DirectionInconsistentTarget { direction: String },
    #[error("numeric field is NaN or infinite: {field}")]
    NotFinite { field: &'static str },
    #[error("entry hint {value} outside plausible range")]
    ImplausibleEntryHint { value: String },
    #[error("signal is clock-skewed: ingest precedes origin by {delta_ms}ms")]
    ClockSkewed { delta_ms: i64 },
}

/// A broker error that is expected to clear up on its own: timeouts, 5xx,
/// rate limiting. Feeds the circuit breaker and is retried with backoff.
#[derive(Debug, Error)]
#[error("transient broker failure: {0}")]
pub struct TransientBrokerFailure(pub String);

/// A broker error that will not clear up on retry: rejected order,
/// authentication failure, insufficient margin. Not retried; the trade is
/// marked FAILED and dead-lettered.
#[derive(Debug, Error)]
#[error("permanent broker failure: {0}")]
pub struct PermanentBrokerFailure(pub String);

/// A gap or anomaly in the incoming market-data stream. Logged; exit
/// supervision resumes on the next candle, the market-close sweeper may
/// force-close if the gap persists into market close.
#[derive(Debug, Error)]
#[error("market data gap for {instrument_key}: {detail}")]
pub struct MarketDataGap {
    pub instrument_key: String,
    pub detail: String,
}

/// A downstream sink (result sink, repository, broker) is not currently
/// accepting writes. Buffered in-memory up to a bound; past the bound, offset
/// commits are withheld so backpressure propagates upstream.
#[derive(Debug, Error)]
#[error("downstream unavailable: {0}")]
pub struct DownstreamUnavailable(pub String);

/// An invariant the system assumes can never be violated was violated anyway
/// (a lost CAS that should have been impossible, an OHLC contradiction).
/// Logged as a defect, a best-effort compensating action is taken, and a
/// counter is incremented; never silently swallowed.
#[derive(Debug, Error)]
#[error("internal invariant violated: {0}")]
pub struct InternalInvariantViolation(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_failure_formats_field_name() {
        let e = ValidationFailure::MissingField { field: "entryHint" };
        assert!(e.to_string().contains("entryHint"));
    }

    #[test]
    fn clock_skew_formats_delta() {
        let e = ValidationFailure::ClockSkewed { delta_ms: -42 };
        assert!(e.to_string().contains("-42"));
    }
}

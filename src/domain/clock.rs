use chrono::{DateTime, NaiveTime, Utc};
use chrono_tz::Tz;

/// Per-exchange trading-hours window, local to the market timezone.
/// Inclusive start, exclusive end.
#[derive(Debug, Clone, Copy)]
pub struct SessionWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

/// A narrower window within trading hours during which new entries may be
/// taken. Exits are never gated by this window.
#[derive(Debug, Clone, Copy)]
pub struct GoldenWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

/// Time source and session-boundary predicates. Injectable so tests can
/// freeze time instead of racing the wall clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
    fn market_timezone(&self) -> Tz;
    fn session_window(&self, exchange: &str) -> Option<SessionWindow>;
    fn golden_window(&self) -> GoldenWindow;

    fn is_within_trading_hours(&self, exchange: &str, instant: DateTime<Utc>) -> bool {
        let Some(window) = self.session_window(exchange) else {
            return false;
        };
        let local = instant.with_timezone(&self.market_timezone()).time();
        local >= window.start && local < window.end
    }

    fn is_within_golden_entry_window(&self, instant: DateTime<Utc>) -> bool {
        let window = self.golden_window();
        let local = instant.with_timezone(&self.market_timezone()).time();
        local >= window.start && local < window.end
    }

    fn is_market_closed(&self, exchange: &str, instant: DateTime<Utc>) -> bool {
        !self.is_within_trading_hours(exchange, instant)
    }
}

pub struct SystemClock {
    pub timezone: Tz,
    pub sessions: std::collections::HashMap<String, SessionWindow>,
    pub golden: GoldenWindow,
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn market_timezone(&self) -> Tz {
        self.timezone
    }

    fn session_window(&self, exchange: &str) -> Option<SessionWindow> {
        self.sessions.get(exchange).copied()
    }

    fn golden_window(&self) -> GoldenWindow {
        self.golden
    }
}

/// A clock frozen to a fixed instant, for deterministic tests.
pub struct FixedClock {
    pub instant: std::sync::RwLock<DateTime<Utc>>,
    pub timezone: Tz,
    pub sessions: std::collections::HashMap<String, SessionWindow>,
    pub golden: GoldenWindow,
}

impl FixedClock {
    pub fn set(&self, instant: DateTime<Utc>) {
        *self.instant.write().expect("clock lock poisoned") = instant;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.instant.read().expect("clock lock poisoned")
    }

    fn market_timezone(&self) -> Tz {
        self.timezone
    }

    fn session_window(&self, exchange: &str) -> Option<SessionWindow> {
        self.sessions.get(exchange).copied()
    }

    fn golden_window(&self) -> GoldenWindow {
        self.golden
    }
}

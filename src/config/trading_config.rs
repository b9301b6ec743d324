use std::env;

use anyhow::{Context, Result};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradingMode {
    Live,
    BacktestOnly,
}

/// Engine-wide trading parameters: routing thresholds, watchlist TTL, gate
/// tolerances, and exit behavior. Env-var-driven the way the teacher's
/// per-domain config structs are.
#[derive(Debug, Clone)]
pub struct TradingEnvConfig {
    pub mode: TradingMode,
    pub market_timezone: String,
    pub live_age_threshold_seconds: i64,
    pub signal_ttl_minutes: i64,
    pub volume_gate_multiplier: Decimal,
    pub stop_buffer_pct: Decimal,
    pub trailing_percent_equity: Decimal,
    pub trailing_percent_derivative: Decimal,
    pub early_trailing_activation_percent: Decimal,
    pub backtest_db_path: String,
}

impl TradingEnvConfig {
    pub fn from_env() -> Result<Self> {
        let mode = match env::var("TRADING_MODE").unwrap_or_else(|_| "live".to_string()).to_lowercase().as_str() {
            "live" => TradingMode::Live,
            "backtest_only" => TradingMode::BacktestOnly,
            other => anyhow::bail!("invalid TRADING_MODE: {other}. Must be 'live' or 'backtest_only'"),
        };

        let market_timezone = env::var("MARKET_TIMEZONE").unwrap_or_else(|_| "Asia/Kolkata".to_string());
        market_timezone.parse::<Tz>().context("MARKET_TIMEZONE must be a valid IANA timezone name")?;

        Ok(Self {
            mode,
            market_timezone,
            live_age_threshold_seconds: Self::parse_i64("LIVE_AGE_THRESHOLD_SECONDS", 120)?,
            signal_ttl_minutes: Self::parse_i64("SIGNAL_TTL_MINUTES", 15)?,
            volume_gate_multiplier: Self::parse_decimal("VOLUME_GATE_MULTIPLIER", 1.5)?,
            stop_buffer_pct: Self::parse_decimal("STOP_BUFFER_PCT", 0.1)?,
            trailing_percent_equity: Self::parse_decimal("TRAILING_PERCENT_EQUITY", 1.0)?,
            trailing_percent_derivative: Self::parse_decimal("TRAILING_PERCENT_DERIVATIVE", 2.0)?,
            early_trailing_activation_percent: Self::parse_decimal("EARLY_TRAILING_ACTIVATION_PERCENT", 2.0)?,
            backtest_db_path: env::var("BACKTEST_DB_PATH").unwrap_or_else(|_| "tradecore_backtest.db".to_string()),
        })
    }

    fn parse_i64(key: &str, default: i64) -> Result<i64> {
        env::var(key).unwrap_or_else(|_| default.to_string()).parse::<i64>().context(format!("failed to parse {key}"))
    }

    fn parse_decimal(key: &str, default: f64) -> Result<Decimal> {
        let raw = env::var(key).unwrap_or_else(|_| default.to_string());
        raw.parse::<Decimal>()
            .or_else(|_| raw.parse::<f64>().ok().and_then(Decimal::from_f64).ok_or(()))
            .map_err(|_| anyhow::anyhow!("failed to parse {key}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse_without_env_vars_set() {
        let config = TradingEnvConfig::from_env().expect("should parse defaults");
        assert_eq!(config.mode, TradingMode::Live);
        assert_eq!(config.signal_ttl_minutes, 15);
    }
}

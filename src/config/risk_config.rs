use std::env;

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;

/// Position-sizing and slippage parameters, mirroring the teacher's
/// `RiskEnvConfig` but scoped to what this engine's sizer and backtest
/// slippage model actually consume.
#[derive(Debug, Clone)]
pub struct RiskEnvConfig {
    pub max_risk_per_trade_percent: Decimal,
    pub max_position_size: Decimal,
    pub max_single_position_percent: Decimal,
    pub slippage_entry_bps: Decimal,
    pub slippage_exit_stop_multiplier: Decimal,
}

impl RiskEnvConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            max_risk_per_trade_percent: Self::parse_decimal("MAX_RISK_PER_TRADE_PERCENT", 1.0)?,
            max_position_size: Self::parse_decimal("MAX_POSITION_SIZE", 10_000.0)?,
            max_single_position_percent: Self::parse_decimal("MAX_SINGLE_POSITION_PERCENT", 20.0)?,
            slippage_entry_bps: Self::parse_decimal("SLIPPAGE_ENTRY_BPS", 5.0)?,
            slippage_exit_stop_multiplier: Self::parse_decimal("SLIPPAGE_EXIT_STOP_MULTIPLIER", 1.5)?,
        })
    }

    fn parse_decimal(key: &str, default: f64) -> Result<Decimal> {
        let raw = env::var(key).unwrap_or_else(|_| default.to_string());
        raw.parse::<Decimal>()
            .or_else(|_| raw.parse::<f64>().ok().and_then(Decimal::from_f64).ok_or(()))
            .map_err(|_| anyhow::anyhow!("failed to parse {key}"))
            .context(format!("invalid value for {key}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn defaults_bound_risk_conservatively() {
        let config = RiskEnvConfig::from_env().expect("should parse defaults");
        assert_eq!(config.max_risk_per_trade_percent, dec!(1));
        assert_eq!(config.max_single_position_percent, dec!(20));
    }
}

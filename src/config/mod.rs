//! Configuration for the trade engine, organized by domain and loaded from
//! environment variables (via a loaded `.env`, see `dotenvy` in `main`).

mod trading_config;
mod risk_config;
mod broker_config;
mod observability_config;

pub use trading_config::{TradingEnvConfig, TradingMode};
pub use risk_config::RiskEnvConfig;
pub use broker_config::BrokerEnvConfig;
pub use observability_config::ObservabilityEnvConfig;

use anyhow::Result;

use crate::application::sizing::SizingConfig;
use crate::application::trade_manager::TradeManagerConfig;

/// Aggregates all sub-configs into the values each application-layer
/// component actually consumes, mirroring how the teacher composes its own
/// per-domain env configs into one `Config`.
#[derive(Debug, Clone)]
pub struct Config {
    pub trading: TradingEnvConfig,
    pub risk: RiskEnvConfig,
    pub broker: BrokerEnvConfig,
    pub observability: ObservabilityEnvConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            trading: TradingEnvConfig::from_env()?,
            risk: RiskEnvConfig::from_env()?,
            broker: BrokerEnvConfig::from_env()?,
            observability: ObservabilityEnvConfig::from_env(),
        })
    }

    pub fn to_trade_manager_config(&self) -> TradeManagerConfig {
        TradeManagerConfig {
            signal_ttl: chrono::Duration::minutes(self.trading.signal_ttl_minutes),
            volume_gate_multiplier: self.trading.volume_gate_multiplier,
            stop_buffer_pct: self.trading.stop_buffer_pct,
            trailing_percent_equity: self.trading.trailing_percent_equity,
            trailing_percent_derivative: self.trading.trailing_percent_derivative,
            early_trailing_activation_percent: self.trading.early_trailing_activation_percent,
            sizing: SizingConfig {
                max_risk_per_trade_percent: self.risk.max_risk_per_trade_percent,
                max_position_size: self.risk.max_position_size,
                max_single_position_percent: self.risk.max_single_position_percent,
            },
        }
    }
}

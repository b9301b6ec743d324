use std::env;
use std::time::Duration;

use anyhow::{Context, Result};

/// Broker connectivity and resiliency parameters: REST base URL, retry
/// backoff steps, and circuit-breaker thresholds, in the same shape as the
/// teacher's per-broker env structs.
#[derive(Debug, Clone)]
pub struct BrokerEnvConfig {
    pub base_url: String,
    pub api_key: String,
    pub retry_backoff_ms: [u64; 3],
    pub circuit_failure_threshold: usize,
    pub circuit_success_threshold: usize,
    pub circuit_timeout: Duration,
}

impl BrokerEnvConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            base_url: env::var("BROKER_BASE_URL").unwrap_or_else(|_| "https://broker.example.invalid".to_string()),
            api_key: env::var("BROKER_API_KEY").unwrap_or_default(),
            retry_backoff_ms: [
                Self::parse_u64("BROKER_RETRY_BACKOFF_MS_1", 1_000)?,
                Self::parse_u64("BROKER_RETRY_BACKOFF_MS_2", 2_000)?,
                Self::parse_u64("BROKER_RETRY_BACKOFF_MS_3", 4_000)?,
            ],
            circuit_failure_threshold: Self::parse_usize("CIRCUIT_FAILURE_THRESHOLD", 5)?,
            circuit_success_threshold: Self::parse_usize("CIRCUIT_SUCCESS_THRESHOLD", 3)?,
            circuit_timeout: Duration::from_secs(Self::parse_u64("CIRCUIT_TIMEOUT_SECONDS", 60)?),
        })
    }

    fn parse_u64(key: &str, default: u64) -> Result<u64> {
        env::var(key).unwrap_or_else(|_| default.to_string()).parse::<u64>().context(format!("failed to parse {key}"))
    }

    fn parse_usize(key: &str, default: usize) -> Result<usize> {
        env::var(key).unwrap_or_else(|_| default.to_string()).parse::<usize>().context(format!("failed to parse {key}"))
    }
}

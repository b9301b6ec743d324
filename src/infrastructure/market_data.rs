use async_trait::async_trait;
use reqwest_middleware::ClientWithMiddleware;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::domain::ports::{HistoricalCandleSource, PivotClient};
use crate::domain::trading::Candle;

/// Reads the daily pivot level from the pivot service over REST. Wrapped by
/// `application::pivot::CachedPivotClient` for the read-through cache.
pub struct HttpPivotClient {
    client: ClientWithMiddleware,
    base_url: String,
}

impl HttpPivotClient {
    pub fn new(client: ClientWithMiddleware, base_url: String) -> Self {
        Self { client, base_url }
    }
}

#[derive(Deserialize)]
struct PivotResponse {
    pivot: Option<Decimal>,
}

#[async_trait]
impl PivotClient for HttpPivotClient {
    async fn daily_pivot(&self, instrument_key: &str) -> anyhow::Result<Option<Decimal>> {
        let response = self.client.get(format!("{}/pivots/{}", self.base_url, instrument_key)).send().await?;
        if !response.status().is_success() {
            anyhow::bail!("pivot service returned {}", response.status());
        }
        let body: PivotResponse = response.json().await?;
        Ok(body.pivot)
    }
}

/// Reads 1-minute historical candles from the market-data service, used to
/// seed both Trade Manager preload and the Backtest Engine's replay input.
pub struct HttpHistoricalCandleSource {
    client: ClientWithMiddleware,
    base_url: String,
}

impl HttpHistoricalCandleSource {
    pub fn new(client: ClientWithMiddleware, base_url: String) -> Self {
        Self { client, base_url }
    }
}

#[async_trait]
impl HistoricalCandleSource for HttpHistoricalCandleSource {
    async fn fetch_1m(&self, instrument_key: &str, trading_date: chrono::NaiveDate) -> anyhow::Result<Vec<Candle>> {
        let response = self
            .client
            .get(format!("{}/candles/{}/1m", self.base_url, instrument_key))
            .query(&[("date", trading_date.to_string())])
            .send()
            .await?;
        if !response.status().is_success() {
            anyhow::bail!("historical candle service returned {}", response.status());
        }
        let candles: Vec<Candle> = response.json().await?;
        Ok(candles)
    }
}

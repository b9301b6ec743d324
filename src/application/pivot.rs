use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use tracing::warn;

use crate::domain::ports::PivotClient;

/// Read-through cache in front of the pivot service. Entries are immutable
/// once populated for a session and expire at session end; a lookup failure
/// returns `None` so callers fall back to the signal's hinted levels.
pub struct CachedPivotClient {
    inner: Arc<dyn PivotClient>,
    cache: RwLock<HashMap<(String, NaiveDate), Decimal>>,
}

impl CachedPivotClient {
    pub fn new(inner: Arc<dyn PivotClient>) -> Self {
        Self {
            inner,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub async fn daily_pivot(&self, instrument_key: &str, trading_date: NaiveDate) -> Option<Decimal> {
        let key = (instrument_key.to_string(), trading_date);
        if let Some(pivot) = self.cache.read().await.get(&key) {
            return Some(*pivot);
        }

        match self.inner.daily_pivot(instrument_key).await {
            Ok(Some(pivot)) => {
                self.cache.write().await.insert(key, pivot);
                Some(pivot)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(instrument = %instrument_key, error = %e, "pivot lookup failed, falling back to signal hints");
                None
            }
        }
    }

    /// Drops all cached pivots; called at session end so a new trading day
    /// starts with a cold cache.
    pub async fn clear_session(&self) {
        self.cache.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use rust_decimal_macros::dec;

    struct CountingPivotClient {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PivotClient for CountingPivotClient {
        async fn daily_pivot(&self, _instrument_key: &str) -> anyhow::Result<Option<Decimal>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Some(dec!(2500)))
        }
    }

    #[tokio::test]
    async fn second_lookup_same_day_is_served_from_cache() {
        let inner = Arc::new(CountingPivotClient { calls: AtomicUsize::new(0) });
        let client = CachedPivotClient::new(inner.clone());
        let date = NaiveDate::from_ymd_opt(2024, 6, 10).unwrap();
        assert_eq!(client.daily_pivot("NSE:RELIANCE", date).await, Some(dec!(2500)));
        assert_eq!(client.daily_pivot("NSE:RELIANCE", date).await, Some(dec!(2500)));
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }

    struct FailingPivotClient;

    #[async_trait]
    impl PivotClient for FailingPivotClient {
        async fn daily_pivot(&self, _instrument_key: &str) -> anyhow::Result<Option<Decimal>> {
            anyhow::bail!("service unavailable")
        }
    }

    #[tokio::test]
    async fn failure_returns_none_for_hint_fallback() {
        let client = CachedPivotClient::new(Arc::new(FailingPivotClient));
        let date = NaiveDate::from_ymd_opt(2024, 6, 10).unwrap();
        assert_eq!(client.daily_pivot("NSE:RELIANCE", date).await, None);
    }
}

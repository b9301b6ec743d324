use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

struct CircuitBreakerState {
    state: CircuitState,
    failure_count: usize,
    success_count: usize,
    last_failure_time: Option<Instant>,
}

/// Sliding-window-style failure gate in front of the broker gateway: trips
/// OPEN on a run of failures, fails fast while open, and gates recovery
/// through a HALF_OPEN probe window.
pub struct CircuitBreaker {
    state: Arc<RwLock<CircuitBreakerState>>,
    failure_threshold: usize,
    success_threshold: usize,
    timeout: Duration,
    name: String,
}

#[derive(Debug, Error)]
pub enum CircuitBreakerError<E> {
    #[error("circuit breaker '{0}' is open")]
    Open(String),
    #[error(transparent)]
    Inner(E),
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, failure_threshold: usize, success_threshold: usize, timeout: Duration) -> Self {
        Self {
            state: Arc::new(RwLock::new(CircuitBreakerState {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                last_failure_time: None,
            })),
            failure_threshold,
            success_threshold,
            timeout,
            name: name.into(),
        }
    }

    pub async fn state(&self) -> CircuitState {
        self.state.read().await.state
    }

    pub async fn call<F, Fut, T, E>(&self, f: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        {
            let mut guard = self.state.write().await;
            if guard.state == CircuitState::Open {
                let elapsed = guard.last_failure_time.map(|t| t.elapsed()).unwrap_or_default();
                if elapsed >= self.timeout {
                    info!(breaker = %self.name, "timeout elapsed, probing with HALF_OPEN");
                    guard.state = CircuitState::HalfOpen;
                    guard.success_count = 0;
                } else {
                    return Err(CircuitBreakerError::Open(self.name.clone()));
                }
            }
        }

        match f().await {
            Ok(value) => {
                self.on_success().await;
                Ok(value)
            }
            Err(e) => {
                self.on_failure().await;
                Err(CircuitBreakerError::Inner(e))
            }
        }
    }

    async fn on_success(&self) {
        let mut guard = self.state.write().await;
        match guard.state {
            CircuitState::HalfOpen => {
                guard.success_count += 1;
                if guard.success_count >= self.success_threshold {
                    info!(breaker = %self.name, "recovered, closing circuit");
                    guard.state = CircuitState::Closed;
                    guard.failure_count = 0;
                }
            }
            CircuitState::Closed => {
                guard.failure_count = 0;
            }
            CircuitState::Open => {
                warn!(breaker = %self.name, "unexpected success while open");
            }
        }
    }

    async fn on_failure(&self) {
        let mut guard = self.state.write().await;
        guard.last_failure_time = Some(Instant::now());
        match guard.state {
            CircuitState::Closed => {
                guard.failure_count += 1;
                if guard.failure_count >= self.failure_threshold {
                    warn!(breaker = %self.name, "failure threshold reached, opening circuit");
                    guard.state = CircuitState::Open;
                }
            }
            CircuitState::HalfOpen => {
                warn!(breaker = %self.name, "probe failed, reopening circuit");
                guard.state = CircuitState::Open;
            }
            CircuitState::Open => {
                guard.failure_count += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn opens_after_failure_threshold() {
        let cb = CircuitBreaker::new("test", 3, 2, Duration::from_millis(50));
        for _ in 0..3 {
            let _ = cb.call(|| async { Err::<(), _>("boom") }).await;
        }
        assert_eq!(cb.state().await, CircuitState::Open);
        let result = cb.call(|| async { Ok::<_, &str>(()) }).await;
        assert!(matches!(result, Err(CircuitBreakerError::Open(_))));
    }

    #[tokio::test]
    async fn recovers_after_timeout_and_successes() {
        let cb = CircuitBreaker::new("test", 2, 2, Duration::from_millis(20));
        for _ in 0..2 {
            let _ = cb.call(|| async { Err::<(), _>("boom") }).await;
        }
        assert_eq!(cb.state().await, CircuitState::Open);
        tokio::time::sleep(Duration::from_millis(30)).await;
        let _ = cb.call(|| async { Ok::<_, &str>(()) }).await;
        assert_eq!(cb.state().await, CircuitState::HalfOpen);
        let _ = cb.call(|| async { Ok::<_, &str>(()) }).await;
        assert_eq!(cb.state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn halfopen_reopens_on_failure() {
        let cb = CircuitBreaker::new("test", 1, 2, Duration::from_millis(10));
        let _ = cb.call(|| async { Err::<(), _>("boom") }).await;
        tokio::time::sleep(Duration::from_millis(15)).await;
        let _ = cb.call(|| async { Err::<(), _>("still failing") }).await;
        assert_eq!(cb.state().await, CircuitState::Open);
    }
}

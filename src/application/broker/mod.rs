use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, warn};

use crate::domain::errors::{PermanentBrokerFailure, TransientBrokerFailure};
use crate::domain::ports::{BrokerGateway, DeadLetter, DeadLetterSink, OrderAck, OrderRequest};
use crate::infrastructure::circuit_breaker::{CircuitBreaker, CircuitBreakerError};

/// The raw transport to an actual broker. Wire format is out of scope here;
/// production code adapts a concrete client (REST, FIX, whatever the broker
/// speaks) to this trait.
#[async_trait]
pub trait RawBrokerClient: Send + Sync {
    async fn place_order(&self, order: &OrderRequest) -> Result<OrderAck, BrokerCallError>;
    async fn cancel_order(&self, broker_order_id: &str) -> Result<(), BrokerCallError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerCallError {
    Transient,
    Permanent,
}

/// Wraps a raw broker client with idempotent client-order tokens, bounded
/// exponential-backoff retry on transient failures, and a circuit breaker
/// that fails fast into the DLQ while open.
pub struct BrokerGatewayImpl {
    client: Arc<dyn RawBrokerClient>,
    circuit_breaker: CircuitBreaker,
    dlq: Arc<dyn DeadLetterSink>,
    retry_backoff_ms: [u64; 3],
}

impl BrokerGatewayImpl {
    pub fn new(client: Arc<dyn RawBrokerClient>, dlq: Arc<dyn DeadLetterSink>) -> Self {
        Self {
            client,
            circuit_breaker: CircuitBreaker::new("broker-gateway", 5, 3, Duration::from_secs(60)),
            dlq,
            retry_backoff_ms: [1_000, 2_000, 4_000],
        }
    }

    async fn place_with_retry(&self, order: &OrderRequest) -> Result<OrderAck, BrokerCallError> {
        let mut last_error = BrokerCallError::Transient;
        for (attempt, backoff_ms) in self.retry_backoff_ms.iter().enumerate() {
            match self.client.place_order(order).await {
                Ok(ack) => return Ok(ack),
                Err(BrokerCallError::Permanent) => return Err(BrokerCallError::Permanent),
                Err(BrokerCallError::Transient) => {
                    last_error = BrokerCallError::Transient;
                    warn!(attempt, "transient broker failure, backing off {backoff_ms}ms");
                    tokio::time::sleep(Duration::from_millis(*backoff_ms)).await;
                }
            }
        }
        Err(last_error)
    }
}

#[async_trait]
impl BrokerGateway for BrokerGatewayImpl {
    async fn place(&self, order: OrderRequest) -> anyhow::Result<OrderAck> {
        let order_for_closure = order.clone_for_retry();
        let result = self
            .circuit_breaker
            .call(|| async move { self.place_with_retry(&order_for_closure).await })
            .await;

        match result {
            Ok(ack) => Ok(ack),
            Err(CircuitBreakerError::Open(name)) => {
                self.dead_letter(&order, "circuit_open", &format!("circuit breaker '{name}' is open"))
                    .await;
                Err(PermanentBrokerFailure(format!("circuit breaker '{name}' open, failing fast")).into())
            }
            Err(CircuitBreakerError::Inner(BrokerCallError::Permanent)) => {
                self.dead_letter(&order, "permanent_broker_failure", "broker rejected the order")
                    .await;
                Err(PermanentBrokerFailure("broker rejected the order".into()).into())
            }
            Err(CircuitBreakerError::Inner(BrokerCallError::Transient)) => {
                self.dead_letter(&order, "transient_broker_failure_exhausted", "retries exhausted")
                    .await;
                Err(TransientBrokerFailure("retries exhausted".into()).into())
            }
        }
    }

    async fn cancel(&self, broker_order_id: &str) -> anyhow::Result<()> {
        self.client.cancel_order(broker_order_id).await.map_err(|_| {
            error!(broker_order_id, "order cancellation failed");
            PermanentBrokerFailure("cancel failed".into()).into()
        })
    }
}

impl BrokerGatewayImpl {
    async fn dead_letter(&self, order: &OrderRequest, category: &str, message: &str) {
        self.dlq
            .publish(DeadLetter {
                topic: "broker-orders".to_string(),
                payload: order.client_order_token.clone().into_bytes(),
                failure_category: category.to_string(),
                message: message.to_string(),
                partition_offset: None,
            })
            .await;
    }
}

impl OrderRequest {
    fn clone_for_retry(&self) -> OrderRequest {
        self.clone()
    }
}

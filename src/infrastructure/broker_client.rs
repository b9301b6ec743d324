use async_trait::async_trait;
use reqwest_middleware::ClientWithMiddleware;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::application::broker::{BrokerCallError, RawBrokerClient};
use crate::domain::ports::{OrderAck, OrderRequest};

/// Adapts `RawBrokerClient` to a REST broker over the shared
/// retry/pooled `reqwest` client. Transport errors and 5xx responses are
/// transient; 4xx responses (rejects) are permanent.
pub struct HttpBrokerClient {
    client: ClientWithMiddleware,
    base_url: String,
}

impl HttpBrokerClient {
    pub fn new(client: ClientWithMiddleware, base_url: String) -> Self {
        Self { client, base_url }
    }
}

#[derive(Serialize)]
struct PlaceOrderBody<'a> {
    client_order_token: &'a str,
    instrument_key: &'a str,
    direction: &'a str,
    quantity: String,
}

#[derive(Deserialize)]
struct PlaceOrderResponse {
    broker_order_id: String,
}

#[async_trait]
impl RawBrokerClient for HttpBrokerClient {
    async fn place_order(&self, order: &OrderRequest) -> Result<OrderAck, BrokerCallError> {
        let body = PlaceOrderBody {
            client_order_token: &order.client_order_token,
            instrument_key: &order.instrument_key,
            direction: match order.direction {
                crate::domain::trading::Direction::Long => "BUY",
                crate::domain::trading::Direction::Short => "SELL",
            },
            quantity: order.quantity.to_string(),
        };

        let response = self
            .client
            .post(format!("{}/orders", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "broker order request failed at the transport layer");
                BrokerCallError::Transient
            })?;

        let status = response.status();
        if status.is_server_error() {
            warn!(%status, "broker returned a server error, treating as transient");
            return Err(BrokerCallError::Transient);
        }
        if !status.is_success() {
            error!(%status, "broker rejected the order");
            return Err(BrokerCallError::Permanent);
        }

        response
            .json::<PlaceOrderResponse>()
            .await
            .map(|body| OrderAck { broker_order_id: body.broker_order_id })
            .map_err(|e| {
                error!(error = %e, "failed to parse broker order acknowledgement");
                BrokerCallError::Permanent
            })
    }

    async fn cancel_order(&self, broker_order_id: &str) -> Result<(), BrokerCallError> {
        let response = self
            .client
            .delete(format!("{}/orders/{}", self.base_url, broker_order_id))
            .send()
            .await
            .map_err(|_| BrokerCallError::Transient)?;

        if response.status().is_success() {
            Ok(())
        } else if response.status().is_server_error() {
            Err(BrokerCallError::Transient)
        } else {
            Err(BrokerCallError::Permanent)
        }
    }
}

/// Always-succeeds broker double for local development and demos, the same
/// role the teacher's `MockMarketDataService` plays for market data.
pub struct MockBrokerClient;

#[async_trait]
impl RawBrokerClient for MockBrokerClient {
    async fn place_order(&self, order: &OrderRequest) -> Result<OrderAck, BrokerCallError> {
        Ok(OrderAck { broker_order_id: format!("mock-{}", order.client_order_token) })
    }

    async fn cancel_order(&self, _broker_order_id: &str) -> Result<(), BrokerCallError> {
        Ok(())
    }
}

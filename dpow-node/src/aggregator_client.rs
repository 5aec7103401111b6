use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use dpow_gateway::aggregator::{parse_pending, AggregatorClient, PendingDeposit};
use dpow_gateway::error::GatewayError;

use crate::error::NodeError;

#[derive(Debug, Serialize)]
struct PendingRequest<'a> {
    agent: &'a str,
    method: &'a str,
    fiat: &'a str,
}

impl<'a> PendingRequest<'a> {
    fn new(fiat: &'a str) -> Self {
        Self {
            agent: "dpow",
            method: "pending",
            fiat,
        }
    }
}

/// Deposit aggregator reached over plain HTTP POST.
pub struct HttpAggregatorClient {
    http_client: reqwest::Client,
    url: String,
}

impl HttpAggregatorClient {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, NodeError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NodeError::ConfigError {
                reason: format!("failed to create aggregator client: {}", e),
            })?;
        Ok(Self {
            http_client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl AggregatorClient for HttpAggregatorClient {
    async fn fetch_pending(&self, fiat: &str) -> Result<Vec<PendingDeposit>, GatewayError> {
        let aggregator_error = |e: reqwest::Error| GatewayError::Aggregator {
            reason: format!("pending {} via {}: {}", fiat, self.url, e),
        };
        let reply: Value = self
            .http_client
            .post(&self.url)
            .json(&PendingRequest::new(fiat))
            .send()
            .await
            .map_err(aggregator_error)?
            .error_for_status()
            .map_err(aggregator_error)?
            .json()
            .await
            .map_err(aggregator_error)?;

        let pending = parse_pending(&reply);
        tracing::debug!(fiat, count = pending.len(), "aggregator pending reply");
        Ok(pending)
    }
}

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use http::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use jsonrpsee::core::client::ClientT;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::rpc_params;

use dpow_gateway::error::GatewayError;
use dpow_gateway::rpc::{BlockTxs, ChainInfo, ChainRpc, RawTransaction};
use dpow_types::primitives::Height;

use crate::error::NodeError;

/// JSON-RPC client for the external chain node, authenticated with the
/// node's rpcuser/rpcpassword pair.
pub struct JsonRpcChainClient {
    client: HttpClient,
    url: String,
}

/// `Authorization: Basic ...` value for a user/password pair.
fn basic_auth(user: &str, password: &str) -> String {
    let token =
        base64::engine::general_purpose::STANDARD.encode(format!("{}:{}", user, password));
    format!("Basic {}", token)
}

impl JsonRpcChainClient {
    pub fn new(url: &str, user: &str, password: &str, timeout: Duration) -> Result<Self, NodeError> {
        let mut headers = HeaderMap::new();
        if !user.is_empty() {
            let value = HeaderValue::from_str(&basic_auth(user, password)).map_err(|e| {
                NodeError::ConfigError {
                    reason: format!("invalid rpc credentials: {}", e),
                }
            })?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = HttpClientBuilder::default()
            .request_timeout(timeout)
            .set_headers(headers)
            .build(url)
            .map_err(|e| NodeError::RpcError {
                reason: format!("failed to create chain client for {}: {}", url, e),
            })?;

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    fn rpc_error(&self, method: &str, err: impl std::fmt::Display) -> GatewayError {
        GatewayError::Rpc {
            reason: format!("{} via {}: {}", method, self.url, err),
        }
    }
}

#[async_trait]
impl ChainRpc for JsonRpcChainClient {
    async fn get_info(&self) -> Result<ChainInfo, GatewayError> {
        self.client
            .request("getinfo", rpc_params![])
            .await
            .map_err(|e| self.rpc_error("getinfo", e))
    }

    async fn get_block_hash(&self, height: Height) -> Result<String, GatewayError> {
        self.client
            .request("getblockhash", rpc_params![height])
            .await
            .map_err(|e| self.rpc_error("getblockhash", e))
    }

    async fn get_block(&self, hash: &str) -> Result<BlockTxs, GatewayError> {
        self.client
            .request("getblock", rpc_params![hash])
            .await
            .map_err(|e| self.rpc_error("getblock", e))
    }

    async fn get_raw_transaction(&self, txid: &str) -> Result<RawTransaction, GatewayError> {
        self.client
            .request("getrawtransaction", rpc_params![txid, 1])
            .await
            .map_err(|e| self.rpc_error("getrawtransaction", e))
    }
}

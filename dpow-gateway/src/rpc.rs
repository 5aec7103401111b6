//! External chain RPC surface consumed by the sync engine.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use dpow_types::primitives::{coins_to_amount, Amount, Height};
use serde::{Deserialize, Serialize};

use crate::error::GatewayError;

/// Reply to `getinfo`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChainInfo {
    #[serde(default)]
    pub blocks: u64,
}

/// Reply to `getblock`: only the transaction ids are consumed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlockTxs {
    #[serde(default)]
    pub tx: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScriptPubKey {
    #[serde(default)]
    pub hex: String,
}

/// One output of a verbose `getrawtransaction` reply.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawOutput {
    /// Value in whole coins.
    #[serde(default)]
    pub value: f64,
    #[serde(rename = "scriptPubKey", default)]
    pub script_pubkey: Option<ScriptPubKey>,
}

impl RawOutput {
    pub fn new(value: Amount, script: &[u8]) -> Self {
        Self {
            value: value as f64 / dpow_types::primitives::COIN as f64,
            script_pubkey: Some(ScriptPubKey {
                hex: hex::encode(script),
            }),
        }
    }

    pub fn amount(&self) -> Amount {
        coins_to_amount(self.value)
    }

    pub fn script_hex(&self) -> Option<&str> {
        self.script_pubkey.as_ref().map(|s| s.hex.as_str())
    }
}

/// Verbose `getrawtransaction` reply.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawTransaction {
    pub txid: String,
    #[serde(default)]
    pub vout: Vec<RawOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vpub_old: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vpub_new: Option<serde_json::Value>,
}

impl RawTransaction {
    pub fn new(txid: impl Into<String>, vout: Vec<RawOutput>) -> Self {
        Self {
            txid: txid.into(),
            vout,
            vpub_old: None,
            vpub_new: None,
        }
    }

    /// Transactions with joinsplit balances are not inspected.
    pub fn is_shielded(&self) -> bool {
        self.vpub_old.is_some() || self.vpub_new.is_some()
    }
}

/// Read-only view of an external chain node.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    async fn get_info(&self) -> Result<ChainInfo, GatewayError>;

    async fn get_block_hash(&self, height: Height) -> Result<String, GatewayError>;

    async fn get_block(&self, hash: &str) -> Result<BlockTxs, GatewayError>;

    /// Verbose form (`getrawtransaction <txid> 1`).
    async fn get_raw_transaction(&self, txid: &str) -> Result<RawTransaction, GatewayError>;
}

#[derive(Default)]
struct MemoryChainInner {
    /// Transactions per height; index 0 holds height 1.
    blocks: Vec<Vec<String>>,
    txs: HashMap<String, RawTransaction>,
    failing_heights: Vec<Height>,
    info_unavailable: bool,
}

/// In-memory chain serving the [`ChainRpc`] surface, used for dry runs and
/// tests.
#[derive(Default)]
pub struct MemoryChain {
    inner: Mutex<MemoryChainInner>,
}

impl MemoryChain {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryChainInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a block and return its height.
    pub fn push_block(&self, txs: Vec<RawTransaction>) -> Height {
        let mut inner = self.lock();
        let ids = txs.iter().map(|tx| tx.txid.clone()).collect();
        for tx in txs {
            inner.txs.insert(tx.txid.clone(), tx);
        }
        inner.blocks.push(ids);
        inner.blocks.len() as Height
    }

    pub fn tip(&self) -> Height {
        self.lock().blocks.len() as Height
    }

    /// Make `getblockhash` fail at `height` until cleared.
    pub fn fail_at(&self, height: Height) {
        self.lock().failing_heights.push(height);
    }

    pub fn clear_failures(&self) {
        self.lock().failing_heights.clear();
    }

    pub fn set_info_unavailable(&self, unavailable: bool) {
        self.lock().info_unavailable = unavailable;
    }

    pub fn block_hash(height: Height) -> String {
        format!("{:064x}", height)
    }
}

fn unavailable(reason: String) -> GatewayError {
    GatewayError::Rpc { reason }
}

#[async_trait]
impl ChainRpc for MemoryChain {
    async fn get_info(&self) -> Result<ChainInfo, GatewayError> {
        let inner = self.lock();
        if inner.info_unavailable {
            return Err(unavailable("getinfo unavailable".to_string()));
        }
        Ok(ChainInfo {
            blocks: inner.blocks.len() as u64,
        })
    }

    async fn get_block_hash(&self, height: Height) -> Result<String, GatewayError> {
        let inner = self.lock();
        if inner.failing_heights.contains(&height) {
            return Err(unavailable(format!("getblockhash {} failed", height)));
        }
        if height == 0 || height as usize > inner.blocks.len() {
            return Err(unavailable(format!("no block at height {}", height)));
        }
        Ok(Self::block_hash(height))
    }

    async fn get_block(&self, hash: &str) -> Result<BlockTxs, GatewayError> {
        let height = u64::from_str_radix(hash, 16)
            .map_err(|_| unavailable(format!("unknown block {}", hash)))?;
        let inner = self.lock();
        let tx = height
            .checked_sub(1)
            .and_then(|idx| inner.blocks.get(idx as usize))
            .cloned()
            .ok_or_else(|| unavailable(format!("unknown block {}", hash)))?;
        Ok(BlockTxs { tx })
    }

    async fn get_raw_transaction(&self, txid: &str) -> Result<RawTransaction, GatewayError> {
        self.lock()
            .txs
            .get(txid)
            .cloned()
            .ok_or_else(|| unavailable(format!("unknown transaction {}", txid)))
    }
}

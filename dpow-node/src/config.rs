use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use dpow_gateway::sync::SyncSettings;
use dpow_types::constants::{MAX_BLOCKS_PER_ITERATION, NOTARY_ELIGIBILITY_LOOKBACK};
use dpow_types::context::ChainContext;
use dpow_types::primitives::{pubkey_from_hex, Amount, PubKey33};

use crate::error::NodeError;

/// File name written by `dpowd init`.
pub const CONFIG_FILE_NAME: &str = "dpowd.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub chain: ChainConfig,
    pub gateway: GatewayConfig,
    pub aggregator: AggregatorConfig,
    pub rpc: RpcConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Asset chain symbol. Empty or "KMD" runs the node as the base chain.
    pub symbol: String,
    #[serde(default)]
    pub short_flag: bool,
    /// Hex-encoded compressed keys of the notary roster, in id order.
    #[serde(default)]
    pub notaries: Vec<String>,
    #[serde(default = "default_lookback")]
    pub eligibility_lookback: u32,
}

fn default_lookback() -> u32 {
    NOTARY_ELIGIBILITY_LOOKBACK
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub enabled: bool,
    /// JSON-RPC endpoint of the external chain node.
    pub rpc_url: String,
    #[serde(default)]
    pub rpc_user: String,
    #[serde(default)]
    pub rpc_password: String,
    pub request_timeout_secs: u64,
    pub poll_interval_ms: u64,
    pub inter_block_delay_ms: u64,
    pub max_blocks_per_iteration: u32,
    pub error_backoff_secs: u64,
    /// Base-chain value of one whole fiat unit, per fiat symbol.
    #[serde(default)]
    pub fiat_rates: BTreeMap<String, Amount>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatorConfig {
    pub enabled: bool,
    pub url: String,
    /// Fiat symbols polled each round.
    pub fiats: Vec<String>,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    pub enabled: bool,
    pub listen_addr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            chain: ChainConfig {
                symbol: String::new(),
                short_flag: false,
                notaries: Vec::new(),
                eligibility_lookback: default_lookback(),
            },
            gateway: GatewayConfig {
                enabled: true,
                rpc_url: "http://127.0.0.1:7771".to_string(),
                rpc_user: String::new(),
                rpc_password: String::new(),
                request_timeout_secs: 30,
                poll_interval_ms: 1000,
                inter_block_delay_ms: 10,
                max_blocks_per_iteration: MAX_BLOCKS_PER_ITERATION,
                error_backoff_secs: 30,
                fiat_rates: BTreeMap::new(),
            },
            aggregator: AggregatorConfig {
                enabled: false,
                url: "http://127.0.0.1:7778".to_string(),
                fiats: vec!["EUR".to_string(), "USD".to_string()],
                request_timeout_secs: 10,
            },
            rpc: RpcConfig {
                enabled: true,
                listen_addr: "127.0.0.1:7790".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self, NodeError> {
        let contents = std::fs::read_to_string(path).map_err(|e| NodeError::ConfigError {
            reason: format!("failed to read config file '{}': {}", path, e),
        })?;
        let config: NodeConfig = toml::from_str(&contents).map_err(|e| NodeError::ConfigError {
            reason: format!("failed to parse config file '{}': {}", path, e),
        })?;
        Ok(config)
    }

    /// Initialize a default configuration file in the given directory.
    pub fn init(dir: &str) -> Result<(), NodeError> {
        let dir_path = Path::new(dir);
        if !dir_path.exists() {
            std::fs::create_dir_all(dir_path)?;
        }

        let config = NodeConfig::default();
        let toml_str = toml::to_string_pretty(&config).map_err(|e| NodeError::ConfigError {
            reason: format!("failed to serialize default config: {}", e),
        })?;

        std::fs::write(dir_path.join(CONFIG_FILE_NAME), toml_str)?;
        Ok(())
    }

    /// Chain context for the configured symbol.
    pub fn chain_context(&self) -> Result<ChainContext, NodeError> {
        let mut ctx = ChainContext::new(&self.chain.symbol, self.chain.short_flag)?;
        ctx.notary.eligibility_lookback = self.chain.eligibility_lookback;
        Ok(ctx)
    }

    /// Parse the configured notary roster.
    pub fn notary_keys(&self) -> Result<Vec<PubKey33>, NodeError> {
        self.chain
            .notaries
            .iter()
            .enumerate()
            .map(|(id, key)| {
                pubkey_from_hex(key).map_err(|e| NodeError::ConfigError {
                    reason: format!("notary {}: {}", id, e),
                })
            })
            .collect()
    }

    pub fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            max_blocks_per_iteration: self.gateway.max_blocks_per_iteration.max(1),
            inter_block_delay: Duration::from_millis(self.gateway.inter_block_delay_ms),
            error_backoff: Duration::from_secs(self.gateway.error_backoff_secs),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.gateway.poll_interval_ms.max(1))
    }
}

use thiserror::Error;

/// Errors that can occur in the node process.
#[derive(Debug, Error)]
#[allow(clippy::enum_variant_names)]
pub enum NodeError {
    #[error("config error: {reason}")]
    ConfigError { reason: String },

    #[error("rpc error: {reason}")]
    RpcError { reason: String },

    #[error("gateway error: {0}")]
    GatewayError(#[from] dpow_gateway::error::GatewayError),

    #[error("invalid value: {0}")]
    ValueError(#[from] dpow_types::error::DpowError),

    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
}

use thiserror::Error;

/// Errors shared by the dPoW crates when parsing primitive values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DpowError {
    #[error("invalid hex: {reason}")]
    InvalidHex { reason: String },

    #[error("invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("invalid chain symbol '{symbol}': {reason}")]
    InvalidSymbol { symbol: String, reason: String },
}

use thiserror::Error;

/// Errors from decoding or encoding a proof payload.
///
/// Decoding runs on untrusted block data; every malformed input maps to one
/// of these instead of reading past the buffer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("not a data-carrier script")]
    NotDataCarrier,

    #[error("truncated: needed {needed} bytes at offset {offset}, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("push length {declared} exceeds script of {available} bytes")]
    BadPushLength { declared: usize, available: usize },

    #[error("direction mismatch: expected '{expected}', found '{found}'")]
    DirectionMismatch { expected: char, found: char },

    #[error("tail symbol mismatch: expected {expected}, found {found}")]
    SymbolMismatch { expected: String, found: String },

    #[error("missing NUL terminator after symbol")]
    MissingTerminator,

    #[error("invalid symbol: {reason}")]
    InvalidSymbol { reason: String },

    #[error("body of {len} bytes is not a multiple of the {stride}-byte entry stride")]
    BadStride { len: usize, stride: usize },

    #[error("proof batch has no entries")]
    Empty,

    #[error("proof batch has more than {max} entries")]
    TooManyEntries { max: usize },

    #[error("entry shape does not match the batch direction")]
    EntryShape,

    #[error("invalid direct deposit: {reason}")]
    InvalidDirectDeposit { reason: String },

    #[error("data-carrier push of {len} bytes exceeds {max}")]
    PayloadTooLarge { len: usize, max: usize },
}

/// Errors raised by the gateway sync engine and its collaborators.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The external chain endpoint failed or answered with malformed data.
    #[error("rpc error: {reason}")]
    Rpc { reason: String },

    /// The deposit aggregator failed or answered with malformed data.
    #[error("aggregator error: {reason}")]
    Aggregator { reason: String },

    #[error("malformed reply to {method}: {reason}")]
    MalformedReply { method: String, reason: String },

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Short-form direct deposits have no settlement rule yet.
    #[error("short-form direct deposit for {symbol} is not supported")]
    ShortPositionUnsupported { symbol: String },

    #[error("invalid value: {0}")]
    InvalidValue(#[from] dpow_types::error::DpowError),
}

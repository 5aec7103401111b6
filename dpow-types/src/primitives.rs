use serde::{Deserialize, Serialize};

use crate::error::DpowError;

/// 256-bit transaction id in internal (little-endian) byte order.
pub type Txid = [u8; 32];

/// 256-bit block hash in internal (little-endian) byte order.
pub type BlockHash = [u8; 32];

/// 20-byte RIPEMD160(SHA256(pubkey)) destination hash.
pub type Rmd160 = [u8; 20];

/// 33-byte compressed secp256k1 public key.
pub type PubKey33 = [u8; 33];

/// Amount in the smallest unit of a chain (base units or pegged units).
pub type Amount = u64;

/// Block height.
pub type Height = u32;

/// Number of smallest units in one whole coin.
pub const COIN: Amount = 100_000_000;

/// A transaction output as seen by the consensus code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOut {
    pub value: Amount,
    pub script_pubkey: Vec<u8>,
}

impl TxOut {
    pub fn new(value: Amount, script_pubkey: Vec<u8>) -> Self {
        Self {
            value,
            script_pubkey,
        }
    }
}

fn decode_hash(s: &str) -> Result<[u8; 32], DpowError> {
    let bytes = hex::decode(s).map_err(|e| DpowError::InvalidHex {
        reason: e.to_string(),
    })?;
    bytes
        .try_into()
        .map_err(|v: Vec<u8>| DpowError::InvalidLength {
            expected: 32,
            actual: v.len(),
        })
}

/// Parse a txid from RPC hex. Bytes are kept in the order written, which is
/// also the order proof payloads carry them in.
pub fn txid_from_hex(s: &str) -> Result<Txid, DpowError> {
    decode_hash(s)
}

/// Render a txid as hex, inverse of [`txid_from_hex`].
pub fn txid_to_hex(txid: &Txid) -> String {
    hex::encode(txid)
}

/// Parse a block hash from its display (byte-reversed) hex form into
/// internal order, so it compares numerically against a target.
pub fn block_hash_from_hex(s: &str) -> Result<BlockHash, DpowError> {
    let mut hash = decode_hash(s)?;
    hash.reverse();
    Ok(hash)
}

/// Parse a 33-byte public key from hex.
pub fn pubkey_from_hex(s: &str) -> Result<PubKey33, DpowError> {
    let bytes = hex::decode(s).map_err(|e| DpowError::InvalidHex {
        reason: e.to_string(),
    })?;
    bytes
        .try_into()
        .map_err(|v: Vec<u8>| DpowError::InvalidLength {
            expected: 33,
            actual: v.len(),
        })
}

/// True if every byte of the key is zero (producer not yet known).
pub fn is_zero_pubkey(pubkey: &PubKey33) -> bool {
    pubkey.iter().all(|b| *b == 0)
}

/// Convert a decimal coin value from an RPC reply into smallest units.
///
/// Rounds to the nearest unit; negative and non-finite values map to zero.
pub fn coins_to_amount(coins: f64) -> Amount {
    if !coins.is_finite() || coins <= 0.0 {
        return 0;
    }
    (coins * COIN as f64).round() as Amount
}

/// Format an amount as a decimal coin string for logs.
pub fn format_amount(amount: Amount) -> String {
    format!("{}.{:08}", amount / COIN, amount % COIN)
}

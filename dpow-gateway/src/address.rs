//! Conversion between base58check addresses and destination hashes.

use bitcoin::base58;
use dpow_types::primitives::Rmd160;

/// Address version byte of base-chain pay-to-pubkey-hash addresses.
pub const PUBKEY_ADDRESS_VERSION: u8 = 60;

/// Address encoding collaborator used by the gateway.
pub trait AddressCodec: Send + Sync {
    /// Decode an address into its 20-byte destination hash.
    fn address_to_hash(&self, address: &str) -> Option<Rmd160>;

    /// Encode a destination hash with the given version byte.
    fn hash_to_address(&self, version: u8, hash: &Rmd160) -> String;
}

/// Base58check with a one-byte version prefix.
#[derive(Debug, Clone, Copy, Default)]
pub struct Base58AddressCodec;

impl AddressCodec for Base58AddressCodec {
    fn address_to_hash(&self, address: &str) -> Option<Rmd160> {
        let payload = base58::decode_check(address).ok()?;
        if payload.len() != 21 {
            return None;
        }
        payload[1..].try_into().ok()
    }

    fn hash_to_address(&self, version: u8, hash: &Rmd160) -> String {
        let mut payload = Vec::with_capacity(21);
        payload.push(version);
        payload.extend_from_slice(hash);
        base58::encode_check(&payload)
    }
}

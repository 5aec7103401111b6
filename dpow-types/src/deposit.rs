use serde::{Deserialize, Serialize};

use crate::constants::MAX_SYMBOL_LEN;
use crate::error::DpowError;
use crate::primitives::{txid_to_hex, Amount, Height, Rmd160, Txid};

/// Compound key of a deposit: the creating transaction and its output index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DepositKey {
    pub txid: Txid,
    pub vout: u16,
}

impl DepositKey {
    pub fn new(txid: Txid, vout: u16) -> Self {
        Self { txid, vout }
    }
}

impl std::fmt::Display for DepositKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/v{}", txid_to_hex(&self.txid), self.vout)
    }
}

/// The mutable payload of a deposit, filled in once full data is known.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositDetails {
    /// Chain the value originated on; empty for the base chain.
    pub origin_chain_symbol: String,
    pub is_short_form: bool,
    /// Value in base-chain smallest units.
    pub primary_amount: Amount,
    /// Value in pegged-asset smallest units.
    pub pegged_amount: Amount,
    /// Pay-to-hash target of the payout.
    pub destination_hash: Rmd160,
    /// Textual address the hash came from, when known.
    pub destination_address: Option<String>,
    pub origin_height: Height,
    pub destination_height: Height,
}

/// One pending or consumed cross-chain value transfer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositRecord {
    pub transaction_id: Txid,
    pub output_index: u16,
    pub origin_chain_symbol: String,
    pub is_short_form: bool,
    pub primary_amount: Amount,
    pub pegged_amount: Amount,
    pub destination_hash: Rmd160,
    pub destination_address: Option<String>,
    pub origin_height: Height,
    pub destination_height: Height,
    /// 0 while pending, otherwise the height that consumed the deposit.
    pub mark: Height,
}

impl DepositRecord {
    /// A record known only by its key, before any details arrive.
    pub fn placeholder(key: DepositKey) -> Self {
        Self {
            transaction_id: key.txid,
            output_index: key.vout,
            ..Default::default()
        }
    }

    pub fn with_details(key: DepositKey, details: DepositDetails) -> Self {
        let mut record = Self::placeholder(key);
        record.apply(details);
        record
    }

    pub fn key(&self) -> DepositKey {
        DepositKey::new(self.transaction_id, self.output_index)
    }

    pub fn is_consumed(&self) -> bool {
        self.mark != 0
    }

    /// Overwrite the payload fields, leaving key and mark untouched.
    pub fn apply(&mut self, details: DepositDetails) {
        self.origin_chain_symbol = details.origin_chain_symbol;
        self.is_short_form = details.is_short_form;
        self.primary_amount = details.primary_amount;
        self.pegged_amount = details.pegged_amount;
        self.destination_hash = details.destination_hash;
        self.destination_address = details.destination_address;
        self.origin_height = details.origin_height;
        self.destination_height = details.destination_height;
    }

    pub fn details(&self) -> DepositDetails {
        DepositDetails {
            origin_chain_symbol: self.origin_chain_symbol.clone(),
            is_short_form: self.is_short_form,
            primary_amount: self.primary_amount,
            pegged_amount: self.pegged_amount,
            destination_hash: self.destination_hash,
            destination_address: self.destination_address.clone(),
            origin_height: self.origin_height,
            destination_height: self.destination_height,
        }
    }
}

/// Validate a symbol carried inside a proof: up to 3 ASCII alphanumerics.
pub fn validate_proof_symbol(symbol: &str) -> Result<(), DpowError> {
    if symbol.len() > MAX_SYMBOL_LEN {
        return Err(DpowError::InvalidSymbol {
            symbol: symbol.to_string(),
            reason: format!("at most {} characters", MAX_SYMBOL_LEN),
        });
    }
    if !symbol.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Err(DpowError::InvalidSymbol {
            symbol: symbol.to_string(),
            reason: "only ASCII letters and digits are allowed".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_details() -> DepositDetails {
        DepositDetails {
            origin_chain_symbol: "EUR".to_string(),
            is_short_form: false,
            primary_amount: 78_329_000,
            pegged_amount: 10_000_000,
            destination_hash: [7u8; 20],
            destination_address: Some("RDhEGYScNQYetCyG75Kf8Fg61UWPdwc1C5".to_string()),
            origin_height: 57_930,
            destination_height: 153,
        }
    }

    #[test]
    fn test_placeholder_is_pending_and_empty() {
        let key = DepositKey::new([1u8; 32], 2);
        let record = DepositRecord::placeholder(key);
        assert_eq!(record.key(), key);
        assert!(!record.is_consumed());
        assert_eq!(record.primary_amount, 0);
        assert!(record.origin_chain_symbol.is_empty());
    }

    #[test]
    fn test_apply_keeps_key_and_mark() {
        let key = DepositKey::new([1u8; 32], 2);
        let mut record = DepositRecord::placeholder(key);
        record.mark = 500;
        record.apply(sample_details());
        assert_eq!(record.key(), key);
        assert_eq!(record.mark, 500);
        assert_eq!(record.details(), sample_details());
    }

    #[test]
    fn test_key_display() {
        let mut txid = [0u8; 32];
        txid[0] = 0xab;
        let key = DepositKey::new(txid, 3);
        let shown = key.to_string();
        assert!(shown.starts_with("ab00"));
        assert!(shown.ends_with("/v3"));
    }

    #[test]
    fn test_validate_proof_symbol() {
        assert!(validate_proof_symbol("").is_ok());
        assert!(validate_proof_symbol("EUR").is_ok());
        assert!(validate_proof_symbol("EURO").is_err());
        assert!(validate_proof_symbol("E-R").is_err());
        assert!(validate_proof_symbol("E\0R").is_err());
    }

    #[test]
    fn test_record_json_roundtrip() {
        let record = DepositRecord::with_details(DepositKey::new([9u8; 32], 1), sample_details());
        let json = serde_json::to_string(&record).unwrap();
        let back: DepositRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record, back);
    }
}

//! Binary proof payloads carried in data-carrier outputs.
//!
//! Issuance/redemption batch (`'I'` or `'X'`):
//!
//! ```text
//! opcode
//! repeated, at most 64 times:
//!     txid[32] vout:u16le
//!     'X' only: amount:u64le origin_height:u32le destination_height:u32le ['-'] symbol NUL
//! ['-'] destination_symbol[3] NUL
//! ```
//!
//! Direct deposit (`'D'`, exactly 38 bytes):
//!
//! ```text
//! 'D' (0x02|short) fiat[3] amount:i64le address_version hash[20] origin_height:u32le
//! ```

use dpow_types::constants::{
    MAX_PROOF_ENTRIES, OPCODE_DIRECT_DEPOSIT, OPCODE_ISSUE, OPCODE_REDEEM, SHORT_MARKER,
};
use dpow_types::context::ChainContext;
use dpow_types::deposit::{validate_proof_symbol, DepositKey, DepositRecord};
use dpow_types::primitives::{Amount, Height, Rmd160, Txid};

use crate::error::CodecError;
use crate::script::encode_opreturn_script;

/// Size of one issuance entry: txid plus output index.
pub const ISSUE_ENTRY_LEN: usize = 34;

/// Size of the batch tail: three symbol bytes plus NUL.
pub const TAIL_LEN: usize = 4;

/// Size of a direct-deposit payload including its marker.
pub const DIRECT_DEPOSIT_LEN: usize = 38;

/// Direction of a proof batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Pegged units issued on an asset chain.
    Issue,
    /// Value redeemed back to the base chain.
    Redeem,
}

impl Direction {
    pub fn opcode(self) -> u8 {
        match self {
            Direction::Issue => OPCODE_ISSUE,
            Direction::Redeem => OPCODE_REDEEM,
        }
    }

    /// Direction of the proofs carried by this chain's own coinbase.
    pub fn of_chain(ctx: &ChainContext) -> Self {
        if ctx.is_issuer() {
            Direction::Issue
        } else {
            Direction::Redeem
        }
    }

    pub fn from_opcode(opcode: u8) -> Option<Self> {
        match opcode {
            OPCODE_ISSUE => Some(Direction::Issue),
            OPCODE_REDEEM => Some(Direction::Redeem),
            _ => None,
        }
    }
}

/// Extra fields carried per entry by redemption batches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedeemDetail {
    pub pegged_amount: Amount,
    pub origin_height: Height,
    pub destination_height: Height,
    pub is_short_form: bool,
    pub symbol: String,
}

/// One deposit referenced by a proof batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofEntry {
    pub txid: Txid,
    pub vout: u16,
    /// Present exactly when the batch direction is [`Direction::Redeem`].
    pub redeem: Option<RedeemDetail>,
}

impl ProofEntry {
    pub fn key(&self) -> DepositKey {
        DepositKey::new(self.txid, self.vout)
    }

    /// The wire entry for a ledger record in the given direction.
    pub fn from_record(direction: Direction, record: &DepositRecord) -> Self {
        let redeem = match direction {
            Direction::Issue => None,
            Direction::Redeem => Some(RedeemDetail {
                pegged_amount: record.pegged_amount,
                origin_height: record.origin_height,
                destination_height: record.destination_height,
                is_short_form: record.is_short_form,
                symbol: record.origin_chain_symbol.clone(),
            }),
        };
        Self {
            txid: record.transaction_id,
            vout: record.output_index,
            redeem,
        }
    }
}

/// A decoded issuance or redemption batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofBatch {
    pub direction: Direction,
    pub short_flag: bool,
    /// Destination chain symbol from the batch tail.
    pub symbol: String,
    pub entries: Vec<ProofEntry>,
}

/// Bounds-checked reader over an untrusted byte slice.
struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn peek(&self) -> Option<u8> {
        self.buf.get(self.pos).copied()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        let available = self.buf.len().saturating_sub(self.pos);
        if n > available {
            return Err(CodecError::Truncated {
                offset: self.pos,
                needed: n,
                available,
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    fn u16_le(&mut self) -> Result<u16, CodecError> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    fn u32_le(&mut self) -> Result<u32, CodecError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn u64_le(&mut self) -> Result<u64, CodecError> {
        Ok(u64::from_le_bytes(self.array()?))
    }
}

fn invalid_symbol(reason: impl Into<String>) -> CodecError {
    CodecError::InvalidSymbol {
        reason: reason.into(),
    }
}

/// The destination symbol in a batch tail is exactly three characters.
fn check_tail_symbol(symbol: &str) -> Result<(), CodecError> {
    if symbol.len() != TAIL_LEN - 1 || !symbol.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Err(invalid_symbol(format!(
            "destination symbol '{}' must be 3 ASCII alphanumerics",
            symbol
        )));
    }
    Ok(())
}

/// Encode a batch into its payload (marker byte included).
pub fn encode_proof_payload(batch: &ProofBatch) -> Result<Vec<u8>, CodecError> {
    if batch.entries.is_empty() {
        return Err(CodecError::Empty);
    }
    if batch.entries.len() > MAX_PROOF_ENTRIES {
        return Err(CodecError::TooManyEntries {
            max: MAX_PROOF_ENTRIES,
        });
    }
    check_tail_symbol(&batch.symbol)?;

    let mut out = Vec::with_capacity(1 + batch.entries.len() * 64 + TAIL_LEN + 1);
    out.push(batch.direction.opcode());
    for entry in &batch.entries {
        out.extend_from_slice(&entry.txid);
        out.extend_from_slice(&entry.vout.to_le_bytes());
        match (batch.direction, &entry.redeem) {
            (Direction::Issue, None) => {}
            (Direction::Redeem, Some(detail)) => {
                validate_proof_symbol(&detail.symbol)
                    .map_err(|e| invalid_symbol(e.to_string()))?;
                out.extend_from_slice(&detail.pegged_amount.to_le_bytes());
                out.extend_from_slice(&detail.origin_height.to_le_bytes());
                out.extend_from_slice(&detail.destination_height.to_le_bytes());
                if detail.is_short_form {
                    out.push(SHORT_MARKER);
                }
                out.extend_from_slice(detail.symbol.as_bytes());
                out.push(0);
            }
            _ => return Err(CodecError::EntryShape),
        }
    }
    if batch.short_flag {
        out.push(SHORT_MARKER);
    }
    out.extend_from_slice(batch.symbol.as_bytes());
    out.push(0);
    Ok(out)
}

/// Encode a batch as a complete data-carrier script.
pub fn encode_proof_script(batch: &ProofBatch) -> Result<Vec<u8>, CodecError> {
    let payload = encode_proof_payload(batch)?;
    encode_opreturn_script(payload[0], &payload[1..])
}

/// Decode a batch payload (marker byte included).
///
/// The marker must match `direction` and the tail must carry
/// `expected_symbol`.
pub fn decode_proof_batch(
    payload: &[u8],
    direction: Direction,
    expected_symbol: &str,
) -> Result<ProofBatch, CodecError> {
    let (&opcode, rest) = payload.split_first().ok_or(CodecError::Truncated {
        offset: 0,
        needed: 1,
        available: 0,
    })?;
    if opcode != direction.opcode() {
        return Err(CodecError::DirectionMismatch {
            expected: direction.opcode() as char,
            found: opcode as char,
        });
    }
    if rest.len() < TAIL_LEN {
        return Err(CodecError::Truncated {
            offset: 1,
            needed: TAIL_LEN,
            available: rest.len(),
        });
    }

    let (body, tail) = rest.split_at(rest.len() - TAIL_LEN);
    if tail[TAIL_LEN - 1] != 0 {
        return Err(CodecError::MissingTerminator);
    }
    let symbol = std::str::from_utf8(&tail[..TAIL_LEN - 1])
        .map_err(|_| invalid_symbol("destination symbol is not ASCII"))?;
    check_tail_symbol(symbol)?;
    if symbol != expected_symbol {
        return Err(CodecError::SymbolMismatch {
            expected: expected_symbol.to_string(),
            found: symbol.to_string(),
        });
    }

    let (short_flag, body) = split_short_marker(direction, body)?;
    if body.is_empty() {
        return Err(CodecError::Empty);
    }
    let entries = match direction {
        Direction::Issue => decode_issue_entries(body)?,
        Direction::Redeem => decode_redeem_entries(body)?,
    };
    Ok(ProofBatch {
        direction,
        short_flag,
        symbol: symbol.to_string(),
        entries,
    })
}

/// Strip the batch short marker that sits right before the tail.
///
/// Issuance entries are fixed-size, so the marker is only accepted where it
/// restores the 34-byte stride. Redemption entries end with NUL, so a
/// trailing `'-'` can only be the marker.
fn split_short_marker(direction: Direction, body: &[u8]) -> Result<(bool, &[u8]), CodecError> {
    let marked = body.last() == Some(&SHORT_MARKER);
    match direction {
        Direction::Issue => {
            if body.len() % ISSUE_ENTRY_LEN == 0 {
                Ok((false, body))
            } else if marked && (body.len() - 1) % ISSUE_ENTRY_LEN == 0 {
                Ok((true, &body[..body.len() - 1]))
            } else {
                Err(CodecError::BadStride {
                    len: body.len(),
                    stride: ISSUE_ENTRY_LEN,
                })
            }
        }
        Direction::Redeem if marked => Ok((true, &body[..body.len() - 1])),
        Direction::Redeem => Ok((false, body)),
    }
}

fn decode_issue_entries(body: &[u8]) -> Result<Vec<ProofEntry>, CodecError> {
    if body.len() / ISSUE_ENTRY_LEN > MAX_PROOF_ENTRIES {
        return Err(CodecError::TooManyEntries {
            max: MAX_PROOF_ENTRIES,
        });
    }
    let mut cursor = Cursor::new(body);
    let mut entries = Vec::with_capacity(body.len() / ISSUE_ENTRY_LEN);
    while !cursor.is_empty() {
        entries.push(ProofEntry {
            txid: cursor.array()?,
            vout: cursor.u16_le()?,
            redeem: None,
        });
    }
    Ok(entries)
}

fn decode_redeem_entries(body: &[u8]) -> Result<Vec<ProofEntry>, CodecError> {
    let mut cursor = Cursor::new(body);
    let mut entries = Vec::new();
    while !cursor.is_empty() {
        if entries.len() == MAX_PROOF_ENTRIES {
            return Err(CodecError::TooManyEntries {
                max: MAX_PROOF_ENTRIES,
            });
        }
        let txid = cursor.array()?;
        let vout = cursor.u16_le()?;
        let pegged_amount = cursor.u64_le()?;
        let origin_height = cursor.u32_le()?;
        let destination_height = cursor.u32_le()?;
        let is_short_form = cursor.peek() == Some(SHORT_MARKER);
        if is_short_form {
            cursor.u8()?;
        }
        let symbol = read_entry_symbol(&mut cursor)?;
        entries.push(ProofEntry {
            txid,
            vout,
            redeem: Some(RedeemDetail {
                pegged_amount,
                origin_height,
                destination_height,
                is_short_form,
                symbol,
            }),
        });
    }
    Ok(entries)
}

/// Read a NUL-terminated symbol of at most three characters.
fn read_entry_symbol(cursor: &mut Cursor<'_>) -> Result<String, CodecError> {
    let mut symbol = String::with_capacity(3);
    loop {
        let b = cursor.u8().map_err(|_| CodecError::MissingTerminator)?;
        if b == 0 {
            return Ok(symbol);
        }
        if symbol.len() == 3 {
            return Err(invalid_symbol("entry symbol longer than 3 characters"));
        }
        if !b.is_ascii_alphanumeric() {
            return Err(invalid_symbol(format!("byte 0x{:02x} in entry symbol", b)));
        }
        symbol.push(b as char);
    }
}

/// A single externally attested deposit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectDeposit {
    pub is_short_form: bool,
    /// Fiat symbol of the pegged asset, up to three characters.
    pub symbol: String,
    /// Absolute fiat amount in pegged units.
    pub fiat_amount: Amount,
    pub address_version: u8,
    pub destination_hash: Rmd160,
    /// Height on the origin chain the attestation refers to.
    pub origin_height: Height,
}

impl DirectDeposit {
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        if self.symbol.is_empty() {
            return Err(invalid_symbol("direct deposit symbol is empty"));
        }
        validate_proof_symbol(&self.symbol).map_err(|e| invalid_symbol(e.to_string()))?;
        let amount = i64::try_from(self.fiat_amount).map_err(|_| {
            CodecError::InvalidDirectDeposit {
                reason: format!("amount {} does not fit in 63 bits", self.fiat_amount),
            }
        })?;

        let mut out = Vec::with_capacity(DIRECT_DEPOSIT_LEN);
        out.push(OPCODE_DIRECT_DEPOSIT);
        out.push(0x02 | self.is_short_form as u8);
        let mut fiat = [0u8; 3];
        fiat[..self.symbol.len()].copy_from_slice(self.symbol.as_bytes());
        out.extend_from_slice(&fiat);
        out.extend_from_slice(&amount.to_le_bytes());
        out.push(self.address_version);
        out.extend_from_slice(&self.destination_hash);
        out.extend_from_slice(&self.origin_height.to_le_bytes());
        Ok(out)
    }

    pub fn decode(payload: &[u8]) -> Result<Self, CodecError> {
        if payload.len() != DIRECT_DEPOSIT_LEN {
            return Err(CodecError::InvalidDirectDeposit {
                reason: format!(
                    "expected {} bytes, got {}",
                    DIRECT_DEPOSIT_LEN,
                    payload.len()
                ),
            });
        }
        let mut cursor = Cursor::new(payload);
        let marker = cursor.u8()?;
        if marker != OPCODE_DIRECT_DEPOSIT {
            return Err(CodecError::DirectionMismatch {
                expected: OPCODE_DIRECT_DEPOSIT as char,
                found: marker as char,
            });
        }
        let is_short_form = match cursor.u8()? {
            0x02 => false,
            0x03 => true,
            other => {
                return Err(CodecError::InvalidDirectDeposit {
                    reason: format!("descriptor prefix 0x{:02x}", other),
                })
            }
        };
        let fiat: [u8; 3] = cursor.array()?;
        let len = fiat.iter().position(|b| *b == 0).unwrap_or(fiat.len());
        if len == 0 || fiat[len..].iter().any(|b| *b != 0) {
            return Err(invalid_symbol("malformed direct deposit symbol"));
        }
        let symbol = std::str::from_utf8(&fiat[..len])
            .map_err(|_| invalid_symbol("direct deposit symbol is not ASCII"))?
            .to_string();
        validate_proof_symbol(&symbol).map_err(|e| invalid_symbol(e.to_string()))?;
        let fiat_amount = i64::from_le_bytes(cursor.array()?).unsigned_abs();
        let address_version = cursor.u8()?;
        let destination_hash = cursor.array()?;
        let origin_height = cursor.u32_le()?;
        Ok(Self {
            is_short_form,
            symbol,
            fiat_amount,
            address_version,
            destination_hash,
            origin_height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::parse_opreturn_script;
    use proptest::prelude::*;

    fn issue_entry(byte: u8, vout: u16) -> ProofEntry {
        ProofEntry {
            txid: [byte; 32],
            vout,
            redeem: None,
        }
    }

    fn redeem_entry(byte: u8, vout: u16, symbol: &str, short: bool) -> ProofEntry {
        ProofEntry {
            txid: [byte; 32],
            vout,
            redeem: Some(RedeemDetail {
                pegged_amount: 10_000_000,
                origin_height: 57_930,
                destination_height: 153,
                is_short_form: short,
                symbol: symbol.to_string(),
            }),
        }
    }

    fn issue_batch(n: usize, short: bool) -> ProofBatch {
        ProofBatch {
            direction: Direction::Issue,
            short_flag: short,
            symbol: "EUR".to_string(),
            entries: (0..n).map(|i| issue_entry(i as u8, i as u16)).collect(),
        }
    }

    fn redeem_batch(entries: Vec<ProofEntry>, short: bool) -> ProofBatch {
        ProofBatch {
            direction: Direction::Redeem,
            short_flag: short,
            symbol: "KMD".to_string(),
            entries,
        }
    }

    #[test]
    fn test_issue_layout() {
        let payload = encode_proof_payload(&issue_batch(2, false)).unwrap();
        assert_eq!(payload.len(), 1 + 2 * ISSUE_ENTRY_LEN + TAIL_LEN);
        assert_eq!(payload[0], b'I');
        // Output index is little-endian.
        assert_eq!(&payload[1 + 32 + 34..1 + 34 + 34], &[1, 0]);
        assert_eq!(&payload[payload.len() - 4..], b"EUR\0");
    }

    #[test]
    fn test_rpc_txid_written_in_hex_order() {
        let txid_hex = format!("{}ff", "00".repeat(31));
        let record = DepositRecord {
            transaction_id: dpow_types::primitives::txid_from_hex(&txid_hex).unwrap(),
            output_index: 1,
            ..Default::default()
        };
        let batch = ProofBatch {
            direction: Direction::Issue,
            short_flag: false,
            symbol: "EUR".to_string(),
            entries: vec![ProofEntry::from_record(Direction::Issue, &record)],
        };
        let payload = encode_proof_payload(&batch).unwrap();
        assert_eq!(hex::encode(&payload[1..33]), txid_hex);
        assert_eq!(
            hex::encode(&payload),
            format!("49{}ff0100{}", "00".repeat(31), hex::encode(b"EUR\0"))
        );
    }

    #[test]
    fn test_issue_roundtrip_with_short_flag() {
        let batch = issue_batch(3, true);
        let payload = encode_proof_payload(&batch).unwrap();
        assert_eq!(payload[payload.len() - 5], b'-');
        let decoded = decode_proof_batch(&payload, Direction::Issue, "EUR").unwrap();
        assert_eq!(decoded, batch);
    }

    #[test]
    fn test_issue_short_flag_with_dash_valued_vout() {
        // High byte of the last output index equals '-', without the short flag.
        let mut batch = issue_batch(1, false);
        batch.entries[0].vout = u16::from_le_bytes([0x01, b'-']);
        let payload = encode_proof_payload(&batch).unwrap();
        let decoded = decode_proof_batch(&payload, Direction::Issue, "EUR").unwrap();
        assert_eq!(decoded, batch);
    }

    #[test]
    fn test_redeem_layout() {
        let batch = redeem_batch(vec![redeem_entry(1, 2, "EUR", false)], false);
        let payload = encode_proof_payload(&batch).unwrap();
        // opcode + 32 + 2 + 8 + 4 + 4 + "EUR\0" + "KMD\0"
        assert_eq!(payload.len(), 1 + 50 + 4 + 4);
        assert_eq!(&payload[35..43], &10_000_000u64.to_le_bytes());
        assert_eq!(&payload[43..47], &57_930u32.to_le_bytes());
        assert_eq!(&payload[payload.len() - 8..], b"EUR\0KMD\0");
    }

    #[test]
    fn test_redeem_roundtrip_mixed_entries() {
        let batch = redeem_batch(
            vec![
                redeem_entry(1, 0, "EUR", false),
                redeem_entry(2, 5, "USD", true),
                redeem_entry(3, 1, "", false),
            ],
            true,
        );
        let payload = encode_proof_payload(&batch).unwrap();
        let decoded = decode_proof_batch(&payload, Direction::Redeem, "KMD").unwrap();
        assert_eq!(decoded, batch);
    }

    #[test]
    fn test_full_batch_through_script() {
        let batch = issue_batch(MAX_PROOF_ENTRIES, false);
        let script = encode_proof_script(&batch).unwrap();
        let payload = parse_opreturn_script(&script).unwrap();
        let decoded = decode_proof_batch(payload, Direction::Issue, "EUR").unwrap();
        assert_eq!(decoded.entries.len(), MAX_PROOF_ENTRIES);
    }

    #[test]
    fn test_encode_rejects_bad_batches() {
        assert_eq!(
            encode_proof_payload(&issue_batch(0, false)),
            Err(CodecError::Empty)
        );
        assert!(matches!(
            encode_proof_payload(&issue_batch(65, false)),
            Err(CodecError::TooManyEntries { .. })
        ));
        let mut batch = issue_batch(1, false);
        batch.symbol = "EU".to_string();
        assert!(matches!(
            encode_proof_payload(&batch),
            Err(CodecError::InvalidSymbol { .. })
        ));
        let mut batch = issue_batch(1, false);
        batch.entries.push(redeem_entry(9, 9, "EUR", false));
        assert_eq!(encode_proof_payload(&batch), Err(CodecError::EntryShape));
        let batch = redeem_batch(vec![redeem_entry(1, 0, "EURO", false)], false);
        assert!(matches!(
            encode_proof_payload(&batch),
            Err(CodecError::InvalidSymbol { .. })
        ));
    }

    #[test]
    fn test_decode_wrong_direction() {
        let payload = encode_proof_payload(&issue_batch(1, false)).unwrap();
        assert_eq!(
            decode_proof_batch(&payload, Direction::Redeem, "EUR"),
            Err(CodecError::DirectionMismatch {
                expected: 'X',
                found: 'I'
            })
        );
    }

    #[test]
    fn test_decode_wrong_tail_symbol() {
        let payload = encode_proof_payload(&issue_batch(1, false)).unwrap();
        assert!(matches!(
            decode_proof_batch(&payload, Direction::Issue, "USD"),
            Err(CodecError::SymbolMismatch { .. })
        ));
    }

    #[test]
    fn test_decode_malformed_inputs() {
        let good = encode_proof_payload(&issue_batch(2, false)).unwrap();

        // Empty and tail-only payloads.
        assert!(decode_proof_batch(&[], Direction::Issue, "EUR").is_err());
        assert!(decode_proof_batch(b"IEU", Direction::Issue, "EUR").is_err());
        assert_eq!(
            decode_proof_batch(b"IEUR\0", Direction::Issue, "EUR"),
            Err(CodecError::Empty)
        );

        // Stride broken by dropping one byte of the body.
        let mut bad_stride = good.clone();
        bad_stride.remove(10);
        assert!(matches!(
            decode_proof_batch(&bad_stride, Direction::Issue, "EUR"),
            Err(CodecError::BadStride { .. })
        ));

        // Tail without NUL terminator.
        let mut no_nul = good.clone();
        let last = no_nul.len() - 1;
        no_nul[last] = b'X';
        assert_eq!(
            decode_proof_batch(&no_nul, Direction::Issue, "EUR"),
            Err(CodecError::MissingTerminator)
        );
    }

    #[test]
    fn test_decode_truncated_redeem_symbol() {
        let batch = redeem_batch(vec![redeem_entry(1, 0, "EUR", false)], false);
        let payload = encode_proof_payload(&batch).unwrap();
        // Remove the entry symbol's NUL: "EUR" now runs into the tail.
        let mut truncated = payload.clone();
        truncated.remove(payload.len() - 5);
        assert!(decode_proof_batch(&truncated, Direction::Redeem, "KMD").is_err());

        // Cut inside the fixed-size fields.
        let mut cut = payload[..20].to_vec();
        cut.extend_from_slice(b"KMD\0");
        assert!(matches!(
            decode_proof_batch(&cut, Direction::Redeem, "KMD"),
            Err(CodecError::Truncated { .. })
        ));
    }

    #[test]
    fn test_decode_too_many_entries() {
        let mut payload = vec![b'I'];
        for i in 0..65u8 {
            payload.extend_from_slice(&[i; 32]);
            payload.extend_from_slice(&[0, 0]);
        }
        payload.extend_from_slice(b"EUR\0");
        assert!(matches!(
            decode_proof_batch(&payload, Direction::Issue, "EUR"),
            Err(CodecError::TooManyEntries { max: 64 })
        ));

        let entries: Vec<ProofEntry> = (0..64).map(|i| redeem_entry(i, 0, "EUR", false)).collect();
        let mut payload = encode_proof_payload(&redeem_batch(entries, false)).unwrap();
        let extra = encode_proof_payload(&redeem_batch(vec![redeem_entry(99, 0, "EUR", false)], false))
            .unwrap();
        let tail = payload.split_off(payload.len() - TAIL_LEN);
        payload.extend_from_slice(&extra[1..extra.len() - TAIL_LEN]);
        payload.extend_from_slice(&tail);
        assert!(matches!(
            decode_proof_batch(&payload, Direction::Redeem, "KMD"),
            Err(CodecError::TooManyEntries { max: 64 })
        ));
    }

    #[test]
    fn test_direct_deposit_roundtrip() {
        let deposit = DirectDeposit {
            is_short_form: false,
            symbol: "EUR".to_string(),
            fiat_amount: 10_000_000,
            address_version: 60,
            destination_hash: [0x30; 20],
            origin_height: 57_930,
        };
        let payload = deposit.encode().unwrap();
        assert_eq!(payload.len(), DIRECT_DEPOSIT_LEN);
        assert_eq!(payload[0], b'D');
        assert_eq!(payload[1], 0x02);
        assert_eq!(DirectDeposit::decode(&payload).unwrap(), deposit);
    }

    #[test]
    fn test_direct_deposit_short_and_negative_amount() {
        let mut payload = DirectDeposit {
            is_short_form: true,
            symbol: "USD".to_string(),
            fiat_amount: 5,
            address_version: 60,
            destination_hash: [1; 20],
            origin_height: 1,
        }
        .encode()
        .unwrap();
        assert_eq!(payload[1], 0x03);
        payload[5..13].copy_from_slice(&(-5i64).to_le_bytes());
        let decoded = DirectDeposit::decode(&payload).unwrap();
        assert!(decoded.is_short_form);
        assert_eq!(decoded.fiat_amount, 5);
    }

    #[test]
    fn test_direct_deposit_malformed() {
        assert!(DirectDeposit::decode(&[b'D'; 37]).is_err());
        let mut payload = DirectDeposit {
            is_short_form: false,
            symbol: "EU".to_string(),
            fiat_amount: 1,
            address_version: 60,
            destination_hash: [1; 20],
            origin_height: 1,
        }
        .encode()
        .unwrap();
        assert_eq!(DirectDeposit::decode(&payload).unwrap().symbol, "EU");
        payload[1] = 0x04;
        assert!(DirectDeposit::decode(&payload).is_err());
        payload[1] = 0x02;
        payload[0] = b'I';
        assert!(DirectDeposit::decode(&payload).is_err());
    }

    fn arb_symbol() -> impl Strategy<Value = String> {
        "[A-Z0-9]{0,3}"
    }

    fn arb_redeem_entry() -> impl Strategy<Value = ProofEntry> {
        (
            any::<[u8; 32]>(),
            any::<u16>(),
            any::<u64>(),
            any::<u32>(),
            any::<u32>(),
            any::<bool>(),
            arb_symbol(),
        )
            .prop_map(|(txid, vout, amount, h1, h2, short, symbol)| ProofEntry {
                txid,
                vout,
                redeem: Some(RedeemDetail {
                    pegged_amount: amount,
                    origin_height: h1,
                    destination_height: h2,
                    is_short_form: short,
                    symbol,
                }),
            })
    }

    proptest! {
        #[test]
        fn prop_issue_roundtrip(
            entries in proptest::collection::vec((any::<[u8; 32]>(), any::<u16>()), 1..=64),
            short in any::<bool>(),
        ) {
            let batch = ProofBatch {
                direction: Direction::Issue,
                short_flag: short,
                symbol: "EUR".to_string(),
                entries: entries
                    .into_iter()
                    .map(|(txid, vout)| ProofEntry { txid, vout, redeem: None })
                    .collect(),
            };
            let payload = encode_proof_payload(&batch).unwrap();
            prop_assert_eq!(decode_proof_batch(&payload, Direction::Issue, "EUR").unwrap(), batch);
        }

        #[test]
        fn prop_redeem_roundtrip(
            entries in proptest::collection::vec(arb_redeem_entry(), 1..=64),
            short in any::<bool>(),
        ) {
            let batch = redeem_batch(entries, short);
            let payload = encode_proof_payload(&batch).unwrap();
            prop_assert_eq!(decode_proof_batch(&payload, Direction::Redeem, "KMD").unwrap(), batch);
        }

        #[test]
        fn prop_decode_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..512)) {
            let _ = decode_proof_batch(&bytes, Direction::Issue, "EUR");
            let _ = decode_proof_batch(&bytes, Direction::Redeem, "KMD");
            let _ = DirectDeposit::decode(&bytes);
        }
    }
}

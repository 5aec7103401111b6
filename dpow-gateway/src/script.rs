//! Script templates used by the gateway: pay-to-pubkey-hash payouts,
//! single-push data carriers, and the notary verification key.

use dpow_types::constants::{NOTARY_VERIFIER_PUBKEY_HEX, NOTARY_VERIFIER_RMD160_HEX, OP_RETURN};
use dpow_types::primitives::Rmd160;

use crate::error::CodecError;

const OP_DUP: u8 = 0x76;
const OP_HASH160: u8 = 0xa9;
const OP_EQUALVERIFY: u8 = 0x88;
const OP_CHECKSIG: u8 = 0xac;
const OP_PUSHDATA1: u8 = 0x4c;
const OP_PUSHDATA2: u8 = 0x4d;

/// Length of a standard pay-to-pubkey-hash script.
pub const P2PKH_SCRIPT_LEN: usize = 25;

/// Length of a pay-to-pubkey script for a compressed key.
pub const P2PK_SCRIPT_LEN: usize = 35;

/// `OP_DUP OP_HASH160 <20> OP_EQUALVERIFY OP_CHECKSIG`
pub fn p2pkh_script(hash: &Rmd160) -> Vec<u8> {
    let mut script = Vec::with_capacity(P2PKH_SCRIPT_LEN);
    script.extend_from_slice(&[OP_DUP, OP_HASH160, 20]);
    script.extend_from_slice(hash);
    script.extend_from_slice(&[OP_EQUALVERIFY, OP_CHECKSIG]);
    script
}

/// Extract the destination hash from a pay-to-pubkey-hash script.
pub fn p2pkh_hash(script: &[u8]) -> Option<Rmd160> {
    if script.len() != P2PKH_SCRIPT_LEN
        || script[..3] != [OP_DUP, OP_HASH160, 20]
        || script[23..] != [OP_EQUALVERIFY, OP_CHECKSIG]
    {
        return None;
    }
    script[3..23].try_into().ok()
}

/// Build `OP_RETURN <push(opcode || body)>`.
///
/// The push is at most `u16::MAX` bytes (PUSHDATA2).
pub fn encode_opreturn_script(opcode: u8, body: &[u8]) -> Result<Vec<u8>, CodecError> {
    let len = body.len() + 1;
    let push_len = u16::try_from(len).map_err(|_| CodecError::PayloadTooLarge {
        len,
        max: u16::MAX as usize,
    })?;
    let mut script = Vec::with_capacity(len + 4);
    script.push(OP_RETURN);
    if len < OP_PUSHDATA1 as usize {
        script.push(len as u8);
    } else if len <= 0xff {
        script.push(OP_PUSHDATA1);
        script.push(len as u8);
    } else {
        script.push(OP_PUSHDATA2);
        script.extend_from_slice(&push_len.to_le_bytes());
    }
    script.push(opcode);
    script.extend_from_slice(body);
    Ok(script)
}

/// Return the pushed payload of a data-carrier script.
///
/// The payload starts with the marker byte. Bytes after the push are ignored.
pub fn parse_opreturn_script(script: &[u8]) -> Result<&[u8], CodecError> {
    if script.first() != Some(&OP_RETURN) {
        return Err(CodecError::NotDataCarrier);
    }
    let truncated = |needed: usize| CodecError::Truncated {
        offset: 1,
        needed,
        available: script.len().saturating_sub(1),
    };
    let (len, header) = match *script.get(1).ok_or_else(|| truncated(1))? {
        OP_PUSHDATA1 => (*script.get(2).ok_or_else(|| truncated(2))? as usize, 3),
        OP_PUSHDATA2 => {
            let bytes = script.get(2..4).ok_or_else(|| truncated(3))?;
            (u16::from_le_bytes([bytes[0], bytes[1]]) as usize, 4)
        }
        n if n < OP_PUSHDATA1 => (n as usize, 2),
        _ => return Err(CodecError::NotDataCarrier),
    };
    script
        .get(header..header + len)
        .ok_or(CodecError::BadPushLength {
            declared: len,
            available: script.len() - header.min(script.len()),
        })
}

/// True if the script pays the well-known notary verification key, either
/// directly (P2PK) or by hash (P2PKH).
pub fn is_notary_verifier_script(script: &[u8]) -> bool {
    match script.len() {
        P2PK_SCRIPT_LEN => {
            script[0] == 33
                && script[34] == OP_CHECKSIG
                && hex::encode(&script[1..34]) == NOTARY_VERIFIER_PUBKEY_HEX
        }
        P2PKH_SCRIPT_LEN => p2pkh_hash(script)
            .map(|hash| hex::encode(hash) == NOTARY_VERIFIER_RMD160_HEX)
            .unwrap_or(false),
        _ => false,
    }
}

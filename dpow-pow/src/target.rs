//! Compact ("nBits") encoding of 256-bit targets.

use alloy_primitives::U256;

/// Sign bit of the compact mantissa.
const COMPACT_SIGN_BIT: u32 = 0x0080_0000;

/// A decoded compact target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactTarget {
    pub target: U256,
    pub negative: bool,
    pub overflow: bool,
}

/// Decode `bits`: the high byte is the size in bytes, the low 23 bits the
/// mantissa, bit 23 the sign.
pub fn set_compact(bits: u32) -> CompactTarget {
    let size = bits >> 24;
    let mut word = bits & 0x007f_ffff;
    let target = if size <= 3 {
        word >>= 8 * (3 - size);
        U256::from(word)
    } else {
        let shift = 8 * (size as usize - 3);
        if shift >= 256 {
            U256::ZERO
        } else {
            U256::from(word) << shift
        }
    };
    let negative = word != 0 && bits & COMPACT_SIGN_BIT != 0;
    let overflow =
        word != 0 && (size > 34 || (word > 0xff && size > 33) || (word > 0xffff && size > 32));
    CompactTarget {
        target,
        negative,
        overflow,
    }
}

/// Encode `target` into compact form.
pub fn get_compact(target: U256, negative: bool) -> u32 {
    let mut size = (target.bit_len() as u32 + 7) / 8;
    let mut compact = if size <= 3 {
        (target.as_limbs()[0] << (8 * (3 - size))) as u32
    } else {
        (target >> (8 * (size as usize - 3))).as_limbs()[0] as u32
    };
    // The sign bit is reserved; move the mantissa down a byte instead.
    if compact & COMPACT_SIGN_BIT != 0 {
        compact >>= 8;
        size += 1;
    }
    compact |= size << 24;
    if negative && compact & 0x007f_ffff != 0 {
        compact |= COMPACT_SIGN_BIT;
    }
    compact
}

/// Target of the big-endian byte representation used in parameters.
pub fn target_from_be_bytes(bytes: [u8; 32]) -> U256 {
    U256::from_be_bytes(bytes)
}

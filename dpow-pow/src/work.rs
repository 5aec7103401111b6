//! Chain-work arithmetic.

use alloy_primitives::U256;
use dpow_types::context::PowParams;

use crate::target::set_compact;

/// Expected hashes to meet `bits`: `2^256 / (target + 1)`.
///
/// Invalid targets contribute no work.
pub fn block_proof(bits: u32) -> U256 {
    let decoded = set_compact(bits);
    if decoded.negative || decoded.overflow || decoded.target.is_zero() {
        return U256::ZERO;
    }
    // 2^256 does not fit; (~target / (target + 1)) + 1 is equal.
    (!decoded.target / (decoded.target + U256::from(1u8))) + U256::from(1u8)
}

/// Seconds of block production at the tip's difficulty that separate two
/// cumulative work values. Negative when `to_work` is behind `from_work`.
pub fn proof_equivalent_time(
    to_work: U256,
    from_work: U256,
    tip_bits: u32,
    params: &PowParams,
) -> i64 {
    let (delta, sign) = if to_work > from_work {
        (to_work - from_work, 1)
    } else {
        (from_work - to_work, -1)
    };
    let proof = block_proof(tip_bits);
    if proof.is_zero() {
        return sign * i64::MAX;
    }
    let seconds = delta.saturating_mul(U256::from(params.target_spacing.max(0) as u64)) / proof;
    if seconds.bit_len() > 63 {
        return sign * i64::MAX;
    }
    sign * seconds.as_limbs()[0] as i64
}

//! Proof-of-work check with the notary difficulty override.

use std::sync::Arc;

use alloy_primitives::U256;
use dpow_types::context::{NotaryParams, PowParams};
use dpow_types::primitives::{is_zero_pubkey, BlockHash, Height, PubKey33};
use tracing::debug;

use crate::error::PowError;
use crate::roster::NotaryRoster;
use crate::target::{set_compact, target_from_be_bytes};

/// Outcome of a successful proof-of-work check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowVerdict {
    /// No producer key yet; the block is checked again once it is known.
    Deferred,
    Accepted {
        target: U256,
        /// The notary minimum-difficulty target was applied.
        overridden: bool,
    },
}

/// Height 0 refers to the block after `tip`.
pub fn resolve_height(height: Height, tip: Height) -> Height {
    if height == 0 {
        tip.saturating_add(1)
    } else {
        height
    }
}

/// Proof-of-work validation with the notary override.
pub struct NotaryPolicy {
    notary: NotaryParams,
    pow: PowParams,
    roster: Arc<dyn NotaryRoster>,
}

impl NotaryPolicy {
    pub fn new(notary: NotaryParams, pow: PowParams, roster: Arc<dyn NotaryRoster>) -> Self {
        Self {
            notary,
            pow,
            roster,
        }
    }

    /// Whether a roster member at `height` gets the minimum-difficulty
    /// target.
    fn override_applies(&self, height: Height, rotation_selected: bool, broadly_eligible: bool) -> bool {
        if height < self.notary.tightening_height {
            rotation_selected || broadly_eligible
        } else {
            broadly_eligible
        }
    }

    /// Check `block_hash` against `bits`, substituting the minimum-difficulty
    /// target for eligible notaries above the activation height.
    ///
    /// `height` 0 means the block after `tip`.
    pub fn check_proof_of_work(
        &self,
        block_hash: &BlockHash,
        bits: u32,
        pubkey: &PubKey33,
        height: Height,
        tip: Height,
    ) -> Result<PowVerdict, PowError> {
        let height = resolve_height(height, tip);
        let mut effective_bits = bits;
        let mut overridden = false;

        if height > self.notary.activation_height {
            if is_zero_pubkey(pubkey) {
                return Ok(PowVerdict::Deferred);
            }
            let status = self.roster.status(height, pubkey)?;
            if let Some(notary_id) = status.notary_id {
                if self.override_applies(height, status.rotation_selected, status.broadly_eligible) {
                    debug!(height, notary_id, "notary minimum difficulty applied");
                    effective_bits = self.notary.min_diff_bits;
                    overridden = true;
                }
            }
        }

        let decoded = set_compact(effective_bits);
        if decoded.negative {
            return Err(PowError::NegativeTarget { bits: effective_bits });
        }
        if decoded.overflow {
            return Err(PowError::TargetOverflow { bits: effective_bits });
        }
        if decoded.target.is_zero() {
            return Err(PowError::ZeroTarget { bits: effective_bits });
        }
        if decoded.target > target_from_be_bytes(self.pow.pow_limit) {
            return Err(PowError::AboveLimit { bits: effective_bits });
        }
        if U256::from_le_bytes(*block_hash) > decoded.target {
            return Err(PowError::HashAboveTarget { bits: effective_bits });
        }
        Ok(PowVerdict::Accepted {
            target: decoded.target,
            overridden,
        })
    }
}

use dpow_types::primitives::Height;
use thiserror::Error;

/// A roster whose recorded history contradicts its membership.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RosterError {
    #[error("roster inconsistent at height {height}: {reason}")]
    Inconsistent { height: Height, reason: String },
}

/// Consensus-fatal proof-of-work failures. Any of these rejects the block.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PowError {
    #[error("compact target 0x{bits:08x} is negative")]
    NegativeTarget { bits: u32 },

    #[error("compact target 0x{bits:08x} is zero")]
    ZeroTarget { bits: u32 },

    #[error("compact target 0x{bits:08x} overflows 256 bits")]
    TargetOverflow { bits: u32 },

    #[error("compact target 0x{bits:08x} is above the proof-of-work limit")]
    AboveLimit { bits: u32 },

    #[error("block hash is above target 0x{bits:08x}")]
    HashAboveTarget { bits: u32 },

    #[error("roster error: {0}")]
    Roster(#[from] RosterError),
}

//! Proof-of-work rules: compact targets, the averaging-window retarget, and
//! the notary difficulty override.

pub mod error;
pub mod notary;
pub mod retarget;
pub mod roster;
pub mod target;
pub mod work;

pub use alloy_primitives::U256;

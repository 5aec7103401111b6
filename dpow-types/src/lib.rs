//! Shared type definitions for the dPoW node core.
//!
//! Holds the primitives, the deposit record that flows between the gateway
//! and the ledger, and the process-wide chain context.

pub mod constants;
pub mod context;
pub mod deposit;
pub mod error;
pub mod primitives;

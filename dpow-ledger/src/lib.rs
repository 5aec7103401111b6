//! Deposit ledger for the dPoW node core.
//!
//! A single keyed store of deposit records shared between block validation
//! and the gateway sync task. Records are never removed; consumption is
//! recorded by marking them with the height that consumed them.

pub mod ledger;

pub use ledger::{DepositLedger, LedgerStats, UpsertOutcome};

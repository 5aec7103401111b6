//! Cross-chain deposit gateway for the dPoW node core.
//!
//! Decodes and encodes the compact proof payloads carried in data-carrier
//! outputs, checks a block's issuance/redemption outputs against the deposit
//! ledger, builds redemption outputs for new blocks, and keeps the ledger fed
//! by replaying an external chain and polling the deposit aggregator.

pub mod address;
pub mod aggregator;
pub mod codec;
pub mod error;
pub mod matcher;
pub mod opreturn;
pub mod oracle;
pub mod redemption;
pub mod rpc;
pub mod script;
pub mod service;
pub mod sync;

//! Node process for the dPoW core.
//!
//! Loads configuration, builds the chain context and deposit ledger, runs
//! the gateway service against the external chain and serves a JSON-RPC
//! surface for block validation and status.

pub mod aggregator_client;
pub mod banner;
pub mod chain_client;
pub mod cli;
pub mod config;
pub mod error;
pub mod metrics;
pub mod node;
pub mod rpc;

//! Pending deposits reported by the off-chain aggregator.

use async_trait::async_trait;
use dpow_ledger::{DepositLedger, UpsertOutcome};
use dpow_types::context::ChainContext;
use dpow_types::deposit::{DepositDetails, DepositKey};
use dpow_types::primitives::{coins_to_amount, format_amount, txid_from_hex, Amount, Height};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::address::AddressCodec;
use crate::error::GatewayError;

/// One descriptor from an aggregator `pending` reply.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingDeposit {
    pub address: Option<String>,
    /// Base-chain value.
    pub base_amount: Amount,
    pub fiat: Option<String>,
    /// Pegged value, read from the field named after the fiat symbol.
    pub fiat_amount: Amount,
    pub is_short_form: bool,
    pub prev_vout: u16,
    pub prev_hash: Option<String>,
    /// Base-chain height of the deposit.
    pub origin_height: Height,
    /// Asset-chain height reported alongside.
    pub fiat_height: Height,
}

fn height_field(item: &Value, name: &str) -> Height {
    item.get(name)
        .and_then(Value::as_i64)
        .and_then(|h| Height::try_from(h).ok())
        .unwrap_or(0)
}

impl PendingDeposit {
    pub fn from_json(item: &Value) -> Self {
        let fiat = item.get("fiat").and_then(Value::as_str).map(str::to_string);
        let fiat_amount = fiat
            .as_deref()
            .and_then(|symbol| item.get(symbol))
            .and_then(Value::as_f64)
            .map(coins_to_amount)
            .unwrap_or(0);
        Self {
            address: item.get("address").and_then(Value::as_str).map(str::to_string),
            base_amount: item
                .get("KMD")
                .and_then(Value::as_f64)
                .map(coins_to_amount)
                .unwrap_or(0),
            fiat,
            fiat_amount,
            is_short_form: item.get("short").and_then(Value::as_u64).unwrap_or(0) != 0,
            prev_vout: item
                .get("prev_vout")
                .and_then(Value::as_u64)
                .and_then(|v| u16::try_from(v).ok())
                .unwrap_or(0),
            prev_hash: item.get("prev_hash").and_then(Value::as_str).map(str::to_string),
            origin_height: height_field(item, "kmdheight"),
            fiat_height: height_field(item, "height"),
        }
    }
}

/// Parse the array reply of a `pending` request. Non-array replies carry
/// no deposits.
pub fn parse_pending(reply: &Value) -> Vec<PendingDeposit> {
    reply
        .as_array()
        .map(|items| items.iter().map(PendingDeposit::from_json).collect())
        .unwrap_or_default()
}

/// Source of pending deposits per fiat symbol.
#[async_trait]
pub trait AggregatorClient: Send + Sync {
    async fn fetch_pending(&self, fiat: &str) -> Result<Vec<PendingDeposit>, GatewayError>;
}

/// Upsert complete descriptors into the ledger. Only the base chain
/// ingests aggregator data; returns the number of new records.
pub fn ingest_pending(
    ctx: &ChainContext,
    ledger: &DepositLedger,
    addresses: &dyn AddressCodec,
    deposits: &[PendingDeposit],
) -> usize {
    if ctx.is_issuer() {
        return 0;
    }
    let mut created = 0;
    for deposit in deposits {
        let (Some(address), Some(fiat)) = (&deposit.address, &deposit.fiat) else {
            continue;
        };
        if deposit.base_amount == 0 || deposit.origin_height == 0 {
            continue;
        }
        let Some(txid) = deposit
            .prev_hash
            .as_deref()
            .and_then(|h| txid_from_hex(h).ok())
        else {
            debug!(address = %address, "pending deposit without a valid prev_hash");
            continue;
        };
        let Some(destination_hash) = addresses.address_to_hash(address) else {
            warn!(address = %address, "pending deposit with undecodable address");
            continue;
        };

        let key = DepositKey::new(txid, deposit.prev_vout);
        let details = DepositDetails {
            origin_chain_symbol: fiat.clone(),
            is_short_form: deposit.is_short_form,
            primary_amount: deposit.base_amount,
            pegged_amount: deposit.fiat_amount,
            destination_hash,
            destination_address: Some(address.clone()),
            origin_height: deposit.origin_height,
            destination_height: deposit.fiat_height,
        };
        if ledger.upsert(key, details) == UpsertOutcome::Created {
            created += 1;
            info!(
                %key,
                fiat = %fiat,
                amount = %format_amount(deposit.fiat_amount),
                address = %address,
                total = %format_amount(ledger.total(ctx.role())),
                "add deposit"
            );
        }
    }
    created
}

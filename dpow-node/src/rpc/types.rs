use serde::{Deserialize, Serialize};

use dpow_gateway::matcher::{MatchOutcome, MatchReport};
use dpow_gateway::redemption::RedemptionBatch;
use dpow_types::deposit::DepositRecord;
use dpow_types::primitives::{txid_to_hex, TxOut};

/// Node and gateway status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusInfo {
    /// Display symbol of the local chain ("KMD" on the base chain).
    pub symbol: String,
    /// "base" or "issuer".
    pub role: String,
    pub short_flag: bool,
    pub ledger_records: usize,
    pub pending_records: usize,
    pub consumed_records: usize,
    /// Sum of the role-appropriate amount over pending records.
    pub pending_total: u64,
    /// Next external height, absent when the gateway is disabled.
    pub sync_cursor: Option<u32>,
    /// Unix time of the last catch-up with the external tip, 0 if never.
    pub realtime: Option<u64>,
    pub version: String,
}

/// A deposit record as exposed over RPC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositInfo {
    /// Transaction id hex, in the byte order proofs carry it.
    pub txid: String,
    pub vout: u16,
    pub origin_chain_symbol: String,
    pub is_short_form: bool,
    pub primary_amount: u64,
    pub pegged_amount: u64,
    /// Destination RIPEMD160 as hex.
    pub destination_hash: String,
    pub destination_address: Option<String>,
    pub origin_height: u32,
    pub destination_height: u32,
    /// 0 while pending.
    pub mark: u32,
}

impl From<&DepositRecord> for DepositInfo {
    fn from(record: &DepositRecord) -> Self {
        Self {
            txid: txid_to_hex(&record.transaction_id),
            vout: record.output_index,
            origin_chain_symbol: record.origin_chain_symbol.clone(),
            is_short_form: record.is_short_form,
            primary_amount: record.primary_amount,
            pegged_amount: record.pegged_amount,
            destination_hash: hex::encode(record.destination_hash),
            destination_address: record.destination_address.clone(),
            origin_height: record.origin_height,
            destination_height: record.destination_height,
            mark: record.mark,
        }
    }
}

/// A transaction output with a hex script, used in both directions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputInfo {
    pub value: u64,
    pub script: String,
}

impl From<&TxOut> for OutputInfo {
    fn from(out: &TxOut) -> Self {
        Self {
            value: out.value,
            script: hex::encode(&out.script_pubkey),
        }
    }
}

/// Outputs to append to a new block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedemptionInfo {
    pub outputs: Vec<OutputInfo>,
    pub appended: usize,
    pub pending_total: u64,
}

impl From<&RedemptionBatch> for RedemptionInfo {
    fn from(batch: &RedemptionBatch) -> Self {
        Self {
            outputs: batch.outputs.iter().map(OutputInfo::from).collect(),
            appended: batch.appended,
            pending_total: batch.pending_total,
        }
    }
}

/// Result for one proof entry of a deposit check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryOutcomeInfo {
    pub txid: String,
    pub vout: u16,
    /// "matched", "duplicate", "amount_mismatch", "unverified" or "rejected".
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<u64>,
}

/// Result of checking a coinbase against the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositCheckInfo {
    pub decoded: usize,
    pub matched: usize,
    pub errors: usize,
    pub entries: Vec<EntryOutcomeInfo>,
}

impl From<&MatchReport> for DepositCheckInfo {
    fn from(report: &MatchReport) -> Self {
        let entries = report
            .outcomes
            .iter()
            .map(|(key, outcome)| {
                let (name, expected, actual) = match outcome {
                    MatchOutcome::Matched => ("matched", None, None),
                    MatchOutcome::Duplicate => ("duplicate", None, None),
                    MatchOutcome::AmountMismatch { expected, actual } => {
                        ("amount_mismatch", Some(*expected), Some(*actual))
                    }
                    MatchOutcome::Unverified => ("unverified", None, None),
                    MatchOutcome::Rejected => ("rejected", None, None),
                };
                EntryOutcomeInfo {
                    txid: txid_to_hex(&key.txid),
                    vout: key.vout,
                    outcome: name.to_string(),
                    expected,
                    actual,
                }
            })
            .collect();
        Self {
            decoded: report.decoded,
            matched: report.matched,
            errors: report.errors,
            entries,
        }
    }
}

/// Result of a proof-of-work check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowCheckInfo {
    /// Height the check ran at, after resolving 0 to the next block.
    pub height: u32,
    /// "accepted", "deferred" or "rejected".
    pub verdict: String,
    pub overridden: bool,
    /// Effective target as big-endian hex, when accepted.
    pub target: Option<String>,
    pub error: Option<String>,
}

/// Header fields consumed by the retarget.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HeaderInfo {
    pub bits: u32,
    pub median_time_past: i64,
}

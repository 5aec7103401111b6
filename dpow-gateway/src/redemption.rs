//! Builds the payout outputs and proof output appended to a new block.

use dpow_ledger::DepositLedger;
use dpow_types::constants::MAX_PROOF_ENTRIES;
use dpow_types::context::ChainContext;
use dpow_types::primitives::{Amount, TxOut};
use tracing::debug;

use crate::codec::{encode_proof_script, Direction, ProofBatch, ProofEntry};
use crate::error::CodecError;
use crate::script::p2pkh_script;

/// Outputs to append to a block template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RedemptionBatch {
    /// Payouts followed by the proof output, empty when nothing is pending.
    pub outputs: Vec<TxOut>,
    /// Number of deposits paid out.
    pub appended: usize,
    /// Value committed by the payouts.
    pub pending_total: Amount,
}

/// Pay out up to 64 unconsumed deposits in ledger order.
pub fn build_redemption_outputs(
    ctx: &ChainContext,
    ledger: &DepositLedger,
) -> Result<RedemptionBatch, CodecError> {
    let direction = Direction::of_chain(ctx);
    let records = ledger.pending(MAX_PROOF_ENTRIES);
    if records.is_empty() {
        return Ok(RedemptionBatch::default());
    }

    let mut batch = RedemptionBatch::default();
    let mut entries = Vec::with_capacity(records.len());
    for record in &records {
        let value = ctx.authoritative_amount(record);
        batch
            .outputs
            .push(TxOut::new(value, p2pkh_script(&record.destination_hash)));
        batch.pending_total = batch.pending_total.saturating_add(value);
        entries.push(ProofEntry::from_record(direction, record));
    }
    batch.appended = entries.len();

    let proof = ProofBatch {
        direction,
        short_flag: ctx.short_flag(),
        symbol: ctx.expected_tail_symbol().to_string(),
        entries,
    };
    batch.outputs.push(TxOut::new(0, encode_proof_script(&proof)?));
    debug!(
        appended = batch.appended,
        total = batch.pending_total,
        "redemption outputs built"
    );
    Ok(batch)
}

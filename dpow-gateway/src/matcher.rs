//! Checks a candidate block's issuance/redemption outputs against the ledger.

use dpow_ledger::DepositLedger;
use dpow_types::context::ChainContext;
use dpow_types::deposit::DepositKey;
use dpow_types::primitives::{Amount, BlockHash, Height, TxOut};
use tracing::{debug, warn};

use crate::codec::{decode_proof_batch, Direction, ProofEntry};
use crate::script::parse_opreturn_script;

/// Verdict of an external verifier on a deposit the ledger does not know.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    Verified,
    Rejected,
    /// No opinion yet; the entry stays provisionally matched.
    Deferred,
}

/// Confirms deposits that have not reached the local ledger.
pub trait DepositVerifier: Send + Sync {
    fn verify(&self, entry: &ProofEntry, value: Amount, height: Height) -> Verification;
}

/// Verifier that defers every decision.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeferredVerifier;

impl DepositVerifier for DeferredVerifier {
    fn verify(&self, _entry: &ProofEntry, _value: Amount, _height: Height) -> Verification {
        Verification::Deferred
    }
}

/// What happened to one proof entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    Matched,
    /// Amounts agree but the record was already consumed.
    Duplicate,
    AmountMismatch { expected: Amount, actual: Amount },
    /// Not in the ledger and the verifier deferred.
    Unverified,
    Rejected,
}

/// Summary of one deposit check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchReport {
    pub decoded: usize,
    pub matched: usize,
    pub errors: usize,
    pub outcomes: Vec<(DepositKey, MatchOutcome)>,
}

/// Match the proof batch in a coinbase's final output against the ledger.
///
/// Entry `i` pairs with value output `i + 1`. Every processed entry is
/// marked consumed at `height`. Blocks without a decodable batch yield an
/// empty report; this check never rejects a block.
pub fn check_deposit(
    ctx: &ChainContext,
    ledger: &DepositLedger,
    verifier: &dyn DepositVerifier,
    height: Height,
    block_hash: &BlockHash,
    coinbase: &[TxOut],
) -> MatchReport {
    let mut report = MatchReport::default();
    let n = coinbase.len();
    if n <= 2 {
        return report;
    }
    let payload = match parse_opreturn_script(&coinbase[n - 1].script_pubkey) {
        Ok(payload) => payload,
        Err(_) => return report,
    };
    let direction = Direction::of_chain(ctx);
    let batch = match decode_proof_batch(payload, direction, ctx.expected_tail_symbol()) {
        Ok(batch) => batch,
        Err(e) => {
            debug!(height, error = %e, "coinbase proof not decodable, skipping");
            return report;
        }
    };
    report.decoded = batch.entries.len();

    for (entry, output) in batch.entries.iter().zip(&coinbase[1..n - 1]) {
        let key = entry.key();
        let outcome = match ledger.find(&key) {
            Some(record) => {
                let expected = ctx.authoritative_amount(&record);
                if expected != output.value {
                    warn!(
                        height,
                        block = %hex::encode(block_hash),
                        %key,
                        expected,
                        actual = output.value,
                        "deposit amount mismatch"
                    );
                    MatchOutcome::AmountMismatch {
                        expected,
                        actual: output.value,
                    }
                } else if record.is_consumed() {
                    MatchOutcome::Duplicate
                } else {
                    MatchOutcome::Matched
                }
            }
            None => match verifier.verify(entry, output.value, height) {
                Verification::Verified => MatchOutcome::Matched,
                Verification::Rejected => MatchOutcome::Rejected,
                Verification::Deferred => {
                    debug!(height, %key, "deposit not in ledger, provisionally matched");
                    MatchOutcome::Unverified
                }
            },
        };
        match outcome {
            MatchOutcome::Matched | MatchOutcome::Unverified => report.matched += 1,
            MatchOutcome::Duplicate | MatchOutcome::Rejected => report.errors += 1,
            MatchOutcome::AmountMismatch { .. } => {}
        }
        ledger.mark(key, height);
        report.outcomes.push((key, outcome));
    }

    if report.matched != report.decoded && height > ctx.notary.deposit_warning_height {
        warn!(
            height,
            opcode = %(direction.opcode() as char),
            matched = report.matched,
            decoded = report.decoded,
            "matched deposits differ from proof entries"
        );
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{encode_proof_script, ProofBatch};
    use crate::script::p2pkh_script;
    use dpow_types::deposit::{DepositDetails, DepositRecord};

    fn details(primary: Amount, pegged: Amount) -> DepositDetails {
        DepositDetails {
            origin_chain_symbol: "EUR".to_string(),
            is_short_form: false,
            primary_amount: primary,
            pegged_amount: pegged,
            destination_hash: [7; 20],
            destination_address: None,
            origin_height: 57_930,
            destination_height: 0,
        }
    }

    fn coinbase_for(ctx: &ChainContext, records: &[DepositRecord], values: &[Amount]) -> Vec<TxOut> {
        let direction = Direction::of_chain(ctx);
        let batch = ProofBatch {
            direction,
            short_flag: ctx.short_flag(),
            symbol: ctx.expected_tail_symbol().to_string(),
            entries: records
                .iter()
                .map(|r| ProofEntry::from_record(direction, r))
                .collect(),
        };
        let mut outputs = vec![TxOut::new(1_000, vec![0x51])];
        for value in values {
            outputs.push(TxOut::new(*value, p2pkh_script(&[7; 20])));
        }
        outputs.push(TxOut::new(0, encode_proof_script(&batch).unwrap()));
        outputs
    }

    struct FixedVerifier(Verification);

    impl DepositVerifier for FixedVerifier {
        fn verify(&self, _entry: &ProofEntry, _value: Amount, _height: Height) -> Verification {
            self.0
        }
    }

    #[test]
    fn test_issuer_match_and_mark() {
        let ctx = ChainContext::new("EUR", false).unwrap();
        let ledger = DepositLedger::new();
        let key = DepositKey::new([1; 32], 0);
        ledger.upsert(key, details(5_000_000, 10_000_000));
        let record = ledger.find(&key).unwrap();

        let coinbase = coinbase_for(&ctx, &[record], &[10_000_000]);
        let report = check_deposit(&ctx, &ledger, &DeferredVerifier, 153, &[0; 32], &coinbase);
        assert_eq!(report.decoded, 1);
        assert_eq!(report.matched, 1);
        assert_eq!(report.errors, 0);
        assert_eq!(report.outcomes, vec![(key, MatchOutcome::Matched)]);
        assert_eq!(ledger.find(&key).unwrap().mark, 153);
        assert_eq!(ledger.total(ctx.role()), 0);
    }

    #[test]
    fn test_duplicate_counts_as_error() {
        let ctx = ChainContext::new("EUR", false).unwrap();
        let ledger = DepositLedger::new();
        let key = DepositKey::new([1; 32], 0);
        ledger.upsert(key, details(5_000_000, 10_000_000));
        let record = ledger.find(&key).unwrap();
        let coinbase = coinbase_for(&ctx, &[record], &[10_000_000]);

        check_deposit(&ctx, &ledger, &DeferredVerifier, 153, &[0; 32], &coinbase);
        let again = check_deposit(&ctx, &ledger, &DeferredVerifier, 154, &[0; 32], &coinbase);
        assert_eq!(again.matched, 0);
        assert_eq!(again.errors, 1);
        assert_eq!(again.outcomes[0].1, MatchOutcome::Duplicate);
        // First mark wins.
        assert_eq!(ledger.find(&key).unwrap().mark, 153);
    }

    #[test]
    fn test_base_chain_compares_primary_amount() {
        let ctx = ChainContext::base();
        let ledger = DepositLedger::new();
        let key = DepositKey::new([2; 32], 1);
        ledger.upsert(key, details(5_000_000, 10_000_000));
        let record = ledger.find(&key).unwrap();

        let coinbase = coinbase_for(&ctx, &[record.clone()], &[10_000_000]);
        let report = check_deposit(&ctx, &ledger, &DeferredVerifier, 200, &[0; 32], &coinbase);
        assert_eq!(report.matched, 0);
        assert_eq!(
            report.outcomes[0].1,
            MatchOutcome::AmountMismatch {
                expected: 5_000_000,
                actual: 10_000_000
            }
        );
        // Mismatches are still marked.
        assert_eq!(ledger.find(&key).unwrap().mark, 200);
    }

    #[test]
    fn test_unknown_deposit_uses_verifier() {
        let ctx = ChainContext::new("EUR", false).unwrap();
        let unknown = DepositRecord::with_details(DepositKey::new([9; 32], 3), details(1, 2));

        let ledger = DepositLedger::new();
        let coinbase = coinbase_for(&ctx, &[unknown.clone()], &[2]);
        let report = check_deposit(&ctx, &ledger, &DeferredVerifier, 10, &[0; 32], &coinbase);
        assert_eq!(report.matched, 1);
        assert_eq!(report.outcomes[0].1, MatchOutcome::Unverified);
        // Placeholder created by the mark.
        assert_eq!(ledger.find(&unknown.key()).unwrap().mark, 10);

        let ledger = DepositLedger::new();
        let rejecting = FixedVerifier(Verification::Rejected);
        let report = check_deposit(&ctx, &ledger, &rejecting, 10, &[0; 32], &coinbase);
        assert_eq!(report.matched, 0);
        assert_eq!(report.errors, 1);

        let ledger = DepositLedger::new();
        let verifying = FixedVerifier(Verification::Verified);
        let report = check_deposit(&ctx, &ledger, &verifying, 10, &[0; 32], &coinbase);
        assert_eq!(report.outcomes[0].1, MatchOutcome::Matched);
    }

    #[test]
    fn test_non_proof_coinbase_is_noop() {
        let ctx = ChainContext::new("EUR", false).unwrap();
        let ledger = DepositLedger::new();

        let two = vec![TxOut::new(1, vec![0x51]), TxOut::new(0, vec![0x6a, 0x01, b'I'])];
        assert_eq!(
            check_deposit(&ctx, &ledger, &DeferredVerifier, 1, &[0; 32], &two),
            MatchReport::default()
        );

        let no_carrier = vec![
            TxOut::new(1, vec![0x51]),
            TxOut::new(1, vec![0x51]),
            TxOut::new(1, vec![0x51]),
        ];
        assert_eq!(
            check_deposit(&ctx, &ledger, &DeferredVerifier, 1, &[0; 32], &no_carrier),
            MatchReport::default()
        );
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_wrong_direction_is_skipped() {
        let issuer = ChainContext::new("EUR", false).unwrap();
        let base = ChainContext::base();
        let ledger = DepositLedger::new();
        let record = DepositRecord::with_details(DepositKey::new([1; 32], 0), details(1, 2));
        let coinbase = coinbase_for(&base, &[record], &[1]);
        let report = check_deposit(&issuer, &ledger, &DeferredVerifier, 1, &[0; 32], &coinbase);
        assert_eq!(report, MatchReport::default());
        assert!(ledger.is_empty());
    }
}

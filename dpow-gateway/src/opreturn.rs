//! Handling of proof payloads observed on the external chain.

use std::sync::Arc;

use dpow_ledger::DepositLedger;
use dpow_types::constants::{
    BASE_CHAIN_SYMBOL, OPCODE_DIRECT_DEPOSIT, OPCODE_ISSUE, OPCODE_REDEEM,
};
use dpow_types::context::ChainContext;
use dpow_types::deposit::{DepositDetails, DepositKey, DepositRecord};
use dpow_types::primitives::{format_amount, Amount, Height, Txid};
use tracing::{debug, info};

use crate::address::AddressCodec;
use crate::codec::{decode_proof_batch, DirectDeposit, Direction, DIRECT_DEPOSIT_LEN};
use crate::error::GatewayError;
use crate::oracle::{settles, PriceOracle};

/// A data-carrier output seen while replaying the external chain.
#[derive(Debug, Clone, Copy)]
pub struct ObservedPayload<'a> {
    pub txid: Txid,
    pub vout: u16,
    pub value: Amount,
    /// External chain height of the containing block.
    pub height: Height,
    /// Pushed bytes, marker included.
    pub payload: &'a [u8],
}

impl ObservedPayload<'_> {
    fn key(&self) -> DepositKey {
        DepositKey::new(self.txid, self.vout)
    }
}

/// Effect of one observed payload on the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpReturnOutcome {
    DepositAdded(DepositKey),
    DuplicateDeposit(DepositKey),
    DepositRejected { reason: String },
    IssuanceMarked { entries: usize },
    RedemptionObserved { entries: usize },
    Ignored,
}

/// Applies direct deposits and issuance proofs to the ledger.
pub struct OpReturnHandler {
    ctx: Arc<ChainContext>,
    ledger: Arc<DepositLedger>,
    oracle: Arc<dyn PriceOracle>,
    addresses: Arc<dyn AddressCodec>,
}

impl OpReturnHandler {
    pub fn new(
        ctx: Arc<ChainContext>,
        ledger: Arc<DepositLedger>,
        oracle: Arc<dyn PriceOracle>,
        addresses: Arc<dyn AddressCodec>,
    ) -> Self {
        Self {
            ctx,
            ledger,
            oracle,
            addresses,
        }
    }

    pub fn handle(&self, observed: &ObservedPayload<'_>) -> Result<OpReturnOutcome, GatewayError> {
        match observed.payload.first() {
            Some(&OPCODE_DIRECT_DEPOSIT) if observed.payload.len() == DIRECT_DEPOSIT_LEN => {
                self.direct_deposit(observed)
            }
            Some(&OPCODE_ISSUE) if self.ctx.is_issuer() => Ok(self.issuance(observed)),
            Some(&OPCODE_REDEEM) if !self.ctx.is_issuer() => Ok(self.redemption(observed)),
            _ => Ok(OpReturnOutcome::Ignored),
        }
    }

    fn direct_deposit(&self, observed: &ObservedPayload<'_>) -> Result<OpReturnOutcome, GatewayError> {
        let deposit = match DirectDeposit::decode(observed.payload) {
            Ok(deposit) => deposit,
            Err(e) => {
                debug!(height = observed.height, error = %e, "undecodable direct deposit");
                return Ok(OpReturnOutcome::Ignored);
            }
        };
        let rejected = |reason: &str| -> Result<OpReturnOutcome, GatewayError> {
            debug!(key = %observed.key(), reason, "direct deposit not accepted");
            Ok(OpReturnOutcome::DepositRejected {
                reason: reason.to_string(),
            })
        };

        if !self.ctx.is_issuer() {
            return rejected("not an issuer chain");
        }
        if deposit.origin_height > observed.height {
            return rejected("origin height above observed height");
        }
        if deposit.symbol != self.ctx.symbol() {
            return rejected("symbol differs from local chain");
        }
        if deposit.is_short_form != self.ctx.short_flag() {
            return rejected("short flag differs from local chain");
        }
        if deposit.is_short_form {
            return Err(GatewayError::ShortPositionUnsupported {
                symbol: deposit.symbol,
            });
        }

        let Some(quote) = self
            .oracle
            .quote(&deposit.symbol, deposit.fiat_amount, deposit.origin_height)
        else {
            return rejected("no price available");
        };
        if !settles(observed.value, &quote) {
            debug!(
                value = observed.value,
                expected = quote.expected,
                "direct deposit value below quote"
            );
            return rejected("value below quote");
        }

        let key = observed.key();
        let details = DepositDetails {
            origin_chain_symbol: deposit.symbol.clone(),
            is_short_form: false,
            primary_amount: observed.value,
            pegged_amount: deposit.fiat_amount,
            destination_hash: deposit.destination_hash,
            destination_address: Some(
                self.addresses
                    .hash_to_address(deposit.address_version, &deposit.destination_hash),
            ),
            origin_height: deposit.origin_height,
            destination_height: observed.height,
        };
        if self
            .ledger
            .insert_if_absent(DepositRecord::with_details(key, details))
        {
            info!(
                %key,
                symbol = %deposit.symbol,
                amount = %format_amount(deposit.fiat_amount),
                total = %format_amount(self.ledger.total(self.ctx.role())),
                "add deposit"
            );
            Ok(OpReturnOutcome::DepositAdded(key))
        } else {
            debug!(%key, "duplicate deposit");
            Ok(OpReturnOutcome::DuplicateDeposit(key))
        }
    }

    fn issuance(&self, observed: &ObservedPayload<'_>) -> OpReturnOutcome {
        let batch = match decode_proof_batch(observed.payload, Direction::Issue, self.ctx.symbol()) {
            Ok(batch) => batch,
            Err(e) => {
                debug!(height = observed.height, error = %e, "undecodable issuance proof");
                return OpReturnOutcome::Ignored;
            }
        };
        if batch.short_flag != self.ctx.short_flag() {
            return OpReturnOutcome::Ignored;
        }
        for entry in &batch.entries {
            let record = self.ledger.mark(entry.key(), observed.height);
            if record.mark != observed.height {
                debug!(key = %entry.key(), mark = record.mark, "issuance already marked");
            }
        }
        OpReturnOutcome::IssuanceMarked {
            entries: batch.entries.len(),
        }
    }

    fn redemption(&self, observed: &ObservedPayload<'_>) -> OpReturnOutcome {
        match decode_proof_batch(observed.payload, Direction::Redeem, BASE_CHAIN_SYMBOL) {
            Ok(batch) => {
                debug!(
                    height = observed.height,
                    entries = batch.entries.len(),
                    "redemption proof observed"
                );
                OpReturnOutcome::RedemptionObserved {
                    entries: batch.entries.len(),
                }
            }
            Err(_) => OpReturnOutcome::Ignored,
        }
    }
}

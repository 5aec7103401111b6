use std::sync::Arc;

use jsonrpsee::core::async_trait;
use jsonrpsee::proc_macros::rpc;
use jsonrpsee::types::ErrorObjectOwned;

use dpow_gateway::matcher::{check_deposit, DepositVerifier};
use dpow_gateway::redemption::build_redemption_outputs;
use dpow_gateway::sync::SyncStatus;
use dpow_ledger::DepositLedger;
use dpow_pow::notary::{resolve_height, NotaryPolicy, PowVerdict};
use dpow_pow::retarget::{next_work_required, HeaderSummary};
use dpow_pow::roster::{NotaryRoster, StaticRoster};
use dpow_types::constants::MAX_PROOF_ENTRIES;
use dpow_types::context::{ChainContext, ChainRole};
use dpow_types::deposit::DepositKey;
use dpow_types::primitives::{block_hash_from_hex, pubkey_from_hex, txid_from_hex, BlockHash, TxOut};

use super::types::{
    DepositCheckInfo, DepositInfo, HeaderInfo, OutputInfo, PowCheckInfo, RedemptionInfo,
    StatusInfo,
};
use crate::metrics::NodeMetrics;

/// JSON-RPC trait for the dPoW node.
#[rpc(server)]
pub trait DpowRpc {
    /// Node role, ledger counts and gateway progress.
    #[method(name = "dpow_getStatus")]
    async fn get_status(&self) -> Result<StatusInfo, ErrorObjectOwned>;

    /// Look up a deposit by txid hex and output index.
    #[method(name = "dpow_getDeposit")]
    async fn get_deposit(
        &self,
        txid: String,
        vout: u16,
    ) -> Result<Option<DepositInfo>, ErrorObjectOwned>;

    /// Unconsumed deposits in ledger order (default and maximum 64).
    #[method(name = "dpow_pendingDeposits")]
    async fn pending_deposits(
        &self,
        limit: Option<usize>,
    ) -> Result<Vec<DepositInfo>, ErrorObjectOwned>;

    /// Payout and proof outputs for the next block template.
    #[method(name = "dpow_buildRedemption")]
    async fn build_redemption(&self) -> Result<RedemptionInfo, ErrorObjectOwned>;

    /// Match a coinbase's proof batch against the ledger, marking entries.
    #[method(name = "dpow_checkDeposit")]
    async fn check_deposit(
        &self,
        height: u32,
        block_hash: String,
        coinbase: Vec<OutputInfo>,
    ) -> Result<DepositCheckInfo, ErrorObjectOwned>;

    /// Proof-of-work check with the notary override. Height 0 means the
    /// block after `tip`.
    #[method(name = "dpow_checkProofOfWork")]
    async fn check_proof_of_work(
        &self,
        block_hash: String,
        bits: u32,
        pubkey: String,
        height: u32,
        tip: u32,
    ) -> Result<PowCheckInfo, ErrorObjectOwned>;

    /// Record the producer of a block; returns its notary id, if any.
    #[method(name = "dpow_recordNotaryBlock")]
    async fn record_notary_block(
        &self,
        height: u32,
        pubkey: String,
    ) -> Result<Option<usize>, ErrorObjectOwned>;

    /// Compact target for the block after the newest header (oldest first).
    #[method(name = "dpow_nextWorkRequired")]
    async fn next_work_required(&self, headers: Vec<HeaderInfo>) -> Result<u32, ErrorObjectOwned>;

    /// Prometheus text exposition of the node metrics.
    #[method(name = "dpow_getMetrics")]
    async fn get_metrics(&self) -> Result<String, ErrorObjectOwned>;
}

/// Implementation of the DpowRpc trait.
pub struct DpowRpcImpl {
    pub ctx: Arc<ChainContext>,
    pub ledger: Arc<DepositLedger>,
    pub roster: Arc<StaticRoster>,
    pub policy: Arc<NotaryPolicy>,
    pub verifier: Arc<dyn DepositVerifier>,
    pub sync_status: Option<Arc<SyncStatus>>,
    pub metrics: Arc<NodeMetrics>,
}

fn invalid_params(msg: impl Into<String>) -> ErrorObjectOwned {
    ErrorObjectOwned::owned(-32602, msg.into(), None::<()>)
}

fn internal_error(msg: impl Into<String>) -> ErrorObjectOwned {
    ErrorObjectOwned::owned(-32603, msg.into(), None::<()>)
}

/// Block hashes arrive in display order.
fn parse_block_hash(hex_str: &str) -> Result<BlockHash, ErrorObjectOwned> {
    block_hash_from_hex(hex_str).map_err(|e| invalid_params(format!("block hash: {}", e)))
}

#[async_trait]
impl DpowRpcServer for DpowRpcImpl {
    async fn get_status(&self) -> Result<StatusInfo, ErrorObjectOwned> {
        let stats = self.ledger.stats();
        Ok(StatusInfo {
            symbol: self.ctx.display_symbol().to_string(),
            role: match self.ctx.role() {
                ChainRole::Base => "base",
                ChainRole::Issuer => "issuer",
            }
            .to_string(),
            short_flag: self.ctx.short_flag(),
            ledger_records: stats.total,
            pending_records: stats.pending,
            consumed_records: stats.consumed,
            pending_total: self.ledger.total(self.ctx.role()),
            sync_cursor: self.sync_status.as_ref().map(|s| s.cursor()),
            realtime: self.sync_status.as_ref().map(|s| s.realtime()),
            version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }

    async fn get_deposit(
        &self,
        txid: String,
        vout: u16,
    ) -> Result<Option<DepositInfo>, ErrorObjectOwned> {
        let txid = txid_from_hex(&txid).map_err(|e| invalid_params(format!("txid: {}", e)))?;
        Ok(self
            .ledger
            .find(&DepositKey::new(txid, vout))
            .as_ref()
            .map(DepositInfo::from))
    }

    async fn pending_deposits(
        &self,
        limit: Option<usize>,
    ) -> Result<Vec<DepositInfo>, ErrorObjectOwned> {
        let limit = limit.unwrap_or(MAX_PROOF_ENTRIES).min(MAX_PROOF_ENTRIES);
        Ok(self
            .ledger
            .pending(limit)
            .iter()
            .map(DepositInfo::from)
            .collect())
    }

    async fn build_redemption(&self) -> Result<RedemptionInfo, ErrorObjectOwned> {
        let batch = build_redemption_outputs(&self.ctx, &self.ledger)
            .map_err(|e| internal_error(format!("failed to build redemption: {}", e)))?;
        Ok(RedemptionInfo::from(&batch))
    }

    async fn check_deposit(
        &self,
        height: u32,
        block_hash: String,
        coinbase: Vec<OutputInfo>,
    ) -> Result<DepositCheckInfo, ErrorObjectOwned> {
        let block_hash = parse_block_hash(&block_hash)?;
        let outputs = coinbase
            .iter()
            .enumerate()
            .map(|(i, out)| {
                hex::decode(&out.script)
                    .map(|script| TxOut::new(out.value, script))
                    .map_err(|e| invalid_params(format!("output {} script: {}", i, e)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        self.metrics.deposit_checks.inc();
        let report = check_deposit(
            &self.ctx,
            &self.ledger,
            self.verifier.as_ref(),
            height,
            &block_hash,
            &outputs,
        );
        self.metrics.observe_ledger(&self.ledger);
        Ok(DepositCheckInfo::from(&report))
    }

    async fn check_proof_of_work(
        &self,
        block_hash: String,
        bits: u32,
        pubkey: String,
        height: u32,
        tip: u32,
    ) -> Result<PowCheckInfo, ErrorObjectOwned> {
        let block_hash = parse_block_hash(&block_hash)?;
        let pubkey =
            pubkey_from_hex(&pubkey).map_err(|e| invalid_params(format!("pubkey: {}", e)))?;

        self.metrics.pow_checks.inc();
        let height_checked = resolve_height(height, tip);
        let info = match self
            .policy
            .check_proof_of_work(&block_hash, bits, &pubkey, height, tip)
        {
            Ok(PowVerdict::Deferred) => PowCheckInfo {
                height: height_checked,
                verdict: "deferred".to_string(),
                overridden: false,
                target: None,
                error: None,
            },
            Ok(PowVerdict::Accepted { target, overridden }) => {
                if overridden {
                    self.metrics.pow_overrides.inc();
                }
                PowCheckInfo {
                    height: height_checked,
                    verdict: "accepted".to_string(),
                    overridden,
                    target: Some(hex::encode(target.to_be_bytes::<32>())),
                    error: None,
                }
            }
            Err(e) => {
                self.metrics.pow_rejections.inc();
                tracing::debug!(height = height_checked, bits, error = %e, "proof of work rejected");
                PowCheckInfo {
                    height: height_checked,
                    verdict: "rejected".to_string(),
                    overridden: false,
                    target: None,
                    error: Some(e.to_string()),
                }
            }
        };
        Ok(info)
    }

    async fn record_notary_block(
        &self,
        height: u32,
        pubkey: String,
    ) -> Result<Option<usize>, ErrorObjectOwned> {
        let pubkey =
            pubkey_from_hex(&pubkey).map_err(|e| invalid_params(format!("pubkey: {}", e)))?;
        let status = self
            .roster
            .status(height, &pubkey)
            .map_err(|e| internal_error(e.to_string()))?;
        if let Some(notary_id) = status.notary_id {
            self.roster.record_miner(height, notary_id);
            // Only the lookback window is ever consulted.
            let keep_from = height.saturating_sub(self.ctx.notary.eligibility_lookback.saturating_mul(2));
            self.roster.prune_below(keep_from);
        }
        Ok(status.notary_id)
    }

    async fn next_work_required(&self, headers: Vec<HeaderInfo>) -> Result<u32, ErrorObjectOwned> {
        let summaries: Vec<HeaderSummary> = headers
            .iter()
            .map(|h| HeaderSummary {
                bits: h.bits,
                median_time_past: h.median_time_past,
            })
            .collect();
        Ok(next_work_required(&summaries, &self.ctx.pow))
    }

    async fn get_metrics(&self) -> Result<String, ErrorObjectOwned> {
        self.metrics
            .encode()
            .map_err(|e| internal_error(format!("failed to encode metrics: {}", e)))
    }
}

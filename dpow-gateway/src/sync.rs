//! Replays an external chain block by block and feeds the ledger.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use dpow_types::constants::{
    ENDPOINT_ERROR_BACKOFF, INTER_BLOCK_DELAY, MAX_BLOCKS_PER_ITERATION, MIN_RATIFY_OUTPUTS,
    PRICE_FEED_PAYLOAD_LEN,
};
use dpow_types::context::ChainContext;
use dpow_types::primitives::{txid_from_hex, Height};
use tracing::{debug, info, warn};

use crate::error::GatewayError;
use crate::opreturn::{ObservedPayload, OpReturnHandler, OpReturnOutcome};
use crate::rpc::ChainRpc;
use crate::script::{is_notary_verifier_script, parse_opreturn_script};

/// Offset of the chain symbol inside a notarization payload.
const NOTARIZATION_SYMBOL_OFFSET: usize = 68;

/// Pacing of the sync engine.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub max_blocks_per_iteration: u32,
    pub inter_block_delay: Duration,
    /// Pause after the endpoint fails to report its height.
    pub error_backoff: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            max_blocks_per_iteration: MAX_BLOCKS_PER_ITERATION,
            inter_block_delay: INTER_BLOCK_DELAY,
            error_backoff: ENDPOINT_ERROR_BACKOFF,
        }
    }
}

/// Sync progress shared with the rest of the node.
#[derive(Debug, Default)]
pub struct SyncStatus {
    realtime: AtomicU64,
    cursor: AtomicU64,
}

impl SyncStatus {
    /// Unix time at which the engine last caught up with the tip, 0 if never.
    pub fn realtime(&self) -> u64 {
        self.realtime.load(Ordering::Acquire)
    }

    pub fn is_realtime(&self) -> bool {
        self.realtime() != 0
    }

    /// Next external height to be processed.
    pub fn cursor(&self) -> Height {
        self.cursor.load(Ordering::Acquire) as Height
    }

    fn mark_realtime(&self) {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(1)
            .max(1);
        self.realtime.store(now, Ordering::Release);
    }
}

/// Role of one transaction output in the external chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputClass {
    Notarization,
    PriceFeed,
    Proof,
    Ratify,
    Ordinary,
}

/// Classify an output. `special` is set when output 0 of the same
/// transaction pays the notary verification key.
pub fn classify_output(
    ctx: &ChainContext,
    special: bool,
    tx_index: usize,
    vout: usize,
    num_outputs: usize,
    script: &[u8],
) -> OutputClass {
    match parse_opreturn_script(script) {
        Ok(payload) => {
            if special && carries_symbol(payload, ctx.display_symbol()) {
                OutputClass::Notarization
            } else if tx_index == 0 && vout == 1 && payload.len() == PRICE_FEED_PAYLOAD_LEN {
                OutputClass::PriceFeed
            } else {
                OutputClass::Proof
            }
        }
        Err(_) if num_outputs >= MIN_RATIFY_OUTPUTS => OutputClass::Ratify,
        Err(_) => OutputClass::Ordinary,
    }
}

/// NUL-terminated `symbol` at the notarization offset.
fn carries_symbol(payload: &[u8], symbol: &str) -> bool {
    let start = NOTARIZATION_SYMBOL_OFFSET;
    let end = start + symbol.len();
    payload.get(start..end) == Some(symbol.as_bytes()) && payload.get(end) == Some(&0)
}

/// Counters for one sync iteration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub heights: u32,
    pub transactions: usize,
    pub shielded: usize,
    pub notarizations: usize,
    pub price_feeds: usize,
    pub proofs: usize,
    pub ratify: usize,
    pub deposits_added: usize,
    pub reached_tip: bool,
}

/// Sync engine for one external chain.
pub struct GatewaySync {
    ctx: Arc<ChainContext>,
    rpc: Arc<dyn ChainRpc>,
    handler: OpReturnHandler,
    status: Arc<SyncStatus>,
    settings: SyncSettings,
    cursor: Height,
}

impl GatewaySync {
    pub fn new(
        ctx: Arc<ChainContext>,
        rpc: Arc<dyn ChainRpc>,
        handler: OpReturnHandler,
        settings: SyncSettings,
    ) -> Self {
        let status = Arc::new(SyncStatus::default());
        status.cursor.store(1, Ordering::Release);
        Self {
            ctx,
            rpc,
            handler,
            status,
            settings,
            cursor: 1,
        }
    }

    pub fn status(&self) -> Arc<SyncStatus> {
        self.status.clone()
    }

    pub fn cursor(&self) -> Height {
        self.cursor
    }

    fn advance(&mut self) {
        self.cursor += 1;
        self.status.cursor.store(self.cursor as u64, Ordering::Release);
    }

    /// Process up to `max_blocks_per_iteration` heights below the tip.
    ///
    /// A failing height leaves the cursor in place and ends the iteration
    /// with the error.
    pub async fn iterate(&mut self) -> Result<SyncReport, GatewayError> {
        let info = match self.rpc.get_info().await {
            Ok(info) => info,
            Err(e) => {
                warn!(symbol = %self.ctx.display_symbol(), error = %e, "endpoint unavailable, backing off");
                tokio::time::sleep(self.settings.error_backoff).await;
                return Err(e);
            }
        };
        let mut report = SyncReport::default();
        if info.blocks == 0 {
            return Ok(report);
        }
        let tip = Height::try_from(info.blocks).unwrap_or(Height::MAX);

        while report.heights < self.settings.max_blocks_per_iteration && self.cursor < tip {
            let height = self.cursor;
            if height % 100 == 0 {
                info!(symbol = %self.ctx.display_symbol(), height, tip, "gateway sync progress");
            }
            if let Err(e) = self.sync_block(height, &mut report).await {
                warn!(height, error = %e, "gateway block failed");
                return Err(e);
            }
            self.advance();
            report.heights += 1;
            tokio::time::sleep(self.settings.inter_block_delay).await;
        }

        if self.cursor >= tip {
            self.status.mark_realtime();
            report.reached_tip = true;
        }
        Ok(report)
    }

    /// Process every transaction of the block at `height`.
    pub async fn sync_block(&self, height: Height, report: &mut SyncReport) -> Result<(), GatewayError> {
        let hash = self.rpc.get_block_hash(height).await?;
        if hash.len() != 64 || !hash.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(GatewayError::MalformedReply {
                method: "getblockhash".to_string(),
                reason: format!("'{}' is not a block hash", hash),
            });
        }
        let block = self.rpc.get_block(&hash).await?;
        for (tx_index, txid) in block.tx.iter().enumerate() {
            self.sync_tx(height, tx_index, txid, report).await?;
        }
        Ok(())
    }

    async fn sync_tx(
        &self,
        height: Height,
        tx_index: usize,
        txid: &str,
        report: &mut SyncReport,
    ) -> Result<(), GatewayError> {
        let tx = self.rpc.get_raw_transaction(txid).await?;
        report.transactions += 1;
        if tx.is_shielded() {
            report.shielded += 1;
            return Ok(());
        }
        let txid = txid_from_hex(&tx.txid)?;

        let mut special = false;
        for (vout, output) in tx.vout.iter().enumerate() {
            let Some(script_hex) = output.script_hex() else {
                continue;
            };
            let script = hex::decode(script_hex).map_err(|e| GatewayError::MalformedReply {
                method: "getrawtransaction".to_string(),
                reason: format!("output {} script: {}", vout, e),
            })?;
            if vout == 0 && is_notary_verifier_script(&script) {
                special = true;
                continue;
            }
            match classify_output(&self.ctx, special, tx_index, vout, tx.vout.len(), &script) {
                OutputClass::Notarization => {
                    debug!(height, vout, "notarization observed");
                    report.notarizations += 1;
                }
                OutputClass::PriceFeed => {
                    debug!(height, "price feed observed");
                    report.price_feeds += 1;
                }
                OutputClass::Ratify => report.ratify += 1,
                OutputClass::Ordinary => {}
                OutputClass::Proof => {
                    report.proofs += 1;
                    let (Ok(vout), Ok(payload)) = (u16::try_from(vout), parse_opreturn_script(&script))
                    else {
                        continue;
                    };
                    let observed = ObservedPayload {
                        txid,
                        vout,
                        value: output.amount(),
                        height,
                        payload,
                    };
                    match self.handler.handle(&observed) {
                        Ok(OpReturnOutcome::DepositAdded(_)) => report.deposits_added += 1,
                        Ok(_) => {}
                        // Chain data stays valid; the payload is skipped.
                        Err(e) => warn!(height, vout, error = %e, "proof payload not applied"),
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{Base58AddressCodec, PUBKEY_ADDRESS_VERSION};
    use crate::codec::DirectDeposit;
    use crate::oracle::FixedRateOracle;
    use crate::rpc::{MemoryChain, RawOutput, RawTransaction};
    use crate::script::{encode_opreturn_script, p2pkh_script};
    use dpow_ledger::DepositLedger;
    use dpow_types::constants::{NOTARY_VERIFIER_PUBKEY_HEX, OP_RETURN};
    use dpow_types::deposit::DepositKey;
    use dpow_types::primitives::COIN;

    fn quick() -> SyncSettings {
        SyncSettings {
            max_blocks_per_iteration: MAX_BLOCKS_PER_ITERATION,
            inter_block_delay: Duration::ZERO,
            error_backoff: Duration::ZERO,
        }
    }

    fn engine(
        ctx: ChainContext,
        chain: Arc<MemoryChain>,
        settings: SyncSettings,
    ) -> (GatewaySync, Arc<DepositLedger>) {
        let ctx = Arc::new(ctx);
        let ledger = Arc::new(DepositLedger::new());
        let handler = OpReturnHandler::new(
            ctx.clone(),
            ledger.clone(),
            Arc::new(FixedRateOracle::new().with_rate("EUR", COIN / 2)),
            Arc::new(Base58AddressCodec),
        );
        (GatewaySync::new(ctx, chain, handler, settings), ledger)
    }

    fn txid(n: u8) -> String {
        hex::encode([n; 32])
    }

    fn plain_tx(n: u8) -> RawTransaction {
        RawTransaction::new(txid(n), vec![RawOutput::new(COIN, &p2pkh_script(&[n; 20]))])
    }

    fn deposit_tx(n: u8) -> RawTransaction {
        let payload = DirectDeposit {
            is_short_form: false,
            symbol: "EUR".to_string(),
            fiat_amount: 10_000_000,
            address_version: PUBKEY_ADDRESS_VERSION,
            destination_hash: [n; 20],
            origin_height: 1,
        }
        .encode()
        .unwrap();
        RawTransaction::new(
            txid(n),
            vec![
                RawOutput::new(1_000, &p2pkh_script(&[1; 20])),
                RawOutput::new(
                    5_000_000,
                    &encode_opreturn_script(payload[0], &payload[1..]).unwrap(),
                ),
            ],
        )
    }

    fn notary_p2pk() -> Vec<u8> {
        let mut script = vec![33];
        script.extend(hex::decode(NOTARY_VERIFIER_PUBKEY_HEX).unwrap());
        script.push(0xac);
        script
    }

    #[test]
    fn test_classify_output() {
        let ctx = ChainContext::new("EUR", false).unwrap();
        let mut notarization = vec![b'N'; NOTARIZATION_SYMBOL_OFFSET];
        notarization.extend_from_slice(b"EUR\0");
        let script = encode_opreturn_script(notarization[0], &notarization[1..]).unwrap();
        assert_eq!(classify_output(&ctx, true, 3, 1, 2, &script), OutputClass::Notarization);
        assert_eq!(classify_output(&ctx, false, 3, 1, 2, &script), OutputClass::Proof);

        let feed = vec![0u8; PRICE_FEED_PAYLOAD_LEN];
        let script = encode_opreturn_script(feed[0], &feed[1..]).unwrap();
        assert_eq!(classify_output(&ctx, false, 0, 1, 2, &script), OutputClass::PriceFeed);
        assert_eq!(classify_output(&ctx, false, 1, 1, 2, &script), OutputClass::Proof);

        let payout = p2pkh_script(&[1; 20]);
        assert_eq!(classify_output(&ctx, false, 1, 1, 11, &payout), OutputClass::Ratify);
        assert_eq!(classify_output(&ctx, false, 1, 1, 10, &payout), OutputClass::Ordinary);
        assert_eq!(classify_output(&ctx, false, 1, 1, 2, &[OP_RETURN]), OutputClass::Ordinary);
    }

    #[tokio::test]
    async fn test_iterate_stops_below_tip_and_goes_realtime() {
        let chain = Arc::new(MemoryChain::new());
        for n in 1..=3 {
            chain.push_block(vec![plain_tx(n)]);
        }
        let (mut sync, _) = engine(ChainContext::new("EUR", false).unwrap(), chain.clone(), quick());
        let status = sync.status();
        assert!(!status.is_realtime());

        let report = sync.iterate().await.unwrap();
        assert_eq!(report.heights, 2);
        assert_eq!(report.transactions, 2);
        assert!(report.reached_tip);
        assert_eq!(sync.cursor(), 3);
        assert_eq!(status.cursor(), 3);
        assert!(status.is_realtime());

        // Nothing new until the tip moves.
        assert_eq!(sync.iterate().await.unwrap().heights, 0);
        chain.push_block(vec![plain_tx(4)]);
        assert_eq!(sync.iterate().await.unwrap().heights, 1);
        assert_eq!(sync.cursor(), 4);
    }

    #[tokio::test]
    async fn test_iterate_respects_block_budget() {
        let chain = Arc::new(MemoryChain::new());
        for n in 1..=6 {
            chain.push_block(vec![plain_tx(n)]);
        }
        let settings = SyncSettings {
            max_blocks_per_iteration: 2,
            ..quick()
        };
        let (mut sync, _) = engine(ChainContext::new("EUR", false).unwrap(), chain, settings);
        let report = sync.iterate().await.unwrap();
        assert_eq!(report.heights, 2);
        assert!(!report.reached_tip);
        assert!(!sync.status().is_realtime());
        assert_eq!(sync.cursor(), 3);
    }

    #[tokio::test]
    async fn test_failed_height_keeps_cursor() {
        let chain = Arc::new(MemoryChain::new());
        for n in 1..=4 {
            chain.push_block(vec![plain_tx(n)]);
        }
        chain.fail_at(2);
        let (mut sync, _) = engine(ChainContext::new("EUR", false).unwrap(), chain.clone(), quick());
        assert!(sync.iterate().await.is_err());
        assert_eq!(sync.cursor(), 2);
        assert!(!sync.status().is_realtime());

        chain.clear_failures();
        let report = sync.iterate().await.unwrap();
        assert_eq!(report.heights, 2);
        assert_eq!(sync.cursor(), 4);
    }

    #[tokio::test]
    async fn test_empty_chain_is_noop() {
        let chain = Arc::new(MemoryChain::new());
        let (mut sync, _) = engine(ChainContext::base(), chain, quick());
        assert_eq!(sync.iterate().await.unwrap(), SyncReport::default());
        assert_eq!(sync.cursor(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unavailable_endpoint_backs_off() {
        let chain = Arc::new(MemoryChain::new());
        chain.set_info_unavailable(true);
        let settings = SyncSettings {
            error_backoff: Duration::from_secs(30),
            ..quick()
        };
        let (mut sync, _) = engine(ChainContext::base(), chain, settings);
        let start = tokio::time::Instant::now();
        assert!(matches!(sync.iterate().await, Err(GatewayError::Rpc { .. })));
        assert!(start.elapsed() >= Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_direct_deposit_reaches_ledger() {
        let chain = Arc::new(MemoryChain::new());
        chain.push_block(vec![plain_tx(1)]);
        chain.push_block(vec![plain_tx(2), deposit_tx(7)]);
        chain.push_block(vec![plain_tx(3)]);
        let (mut sync, ledger) = engine(ChainContext::new("EUR", false).unwrap(), chain, quick());

        let report = sync.iterate().await.unwrap();
        assert_eq!(report.proofs, 1);
        assert_eq!(report.deposits_added, 1);
        let key = DepositKey::new(txid_from_hex(&txid(7)).unwrap(), 1);
        let record = ledger.find(&key).unwrap();
        assert_eq!(record.primary_amount, 5_000_000);
        assert_eq!(record.pegged_amount, 10_000_000);
        assert_eq!(record.destination_height, 2);
    }

    #[tokio::test]
    async fn test_special_and_shielded_transactions() {
        let mut notarization = vec![b'N'; NOTARIZATION_SYMBOL_OFFSET];
        notarization.extend_from_slice(b"EUR\0");
        let special = RawTransaction::new(
            txid(5),
            vec![
                RawOutput::new(0, &notary_p2pk()),
                RawOutput::new(
                    0,
                    &encode_opreturn_script(notarization[0], &notarization[1..]).unwrap(),
                ),
            ],
        );
        let mut shielded = deposit_tx(6);
        shielded.vpub_old = Some(serde_json::json!(0.0));

        let chain = Arc::new(MemoryChain::new());
        chain.push_block(vec![plain_tx(1), special, shielded]);
        chain.push_block(vec![]);
        let (mut sync, ledger) = engine(ChainContext::new("EUR", false).unwrap(), chain, quick());

        let report = sync.iterate().await.unwrap();
        assert_eq!(report.transactions, 3);
        assert_eq!(report.shielded, 1);
        assert_eq!(report.notarizations, 1);
        assert_eq!(report.proofs, 0);
        assert!(ledger.is_empty());
    }
}

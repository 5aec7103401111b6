//! End-to-end flow on an issuer chain:
//! direct deposit on the external chain → gateway sync → ledger total →
//! redemption outputs → coinbase check → deposit consumed.

use std::sync::Arc;
use std::time::Duration;

use jsonrpsee::core::client::ClientT;
use jsonrpsee::http_client::HttpClientBuilder;
use jsonrpsee::rpc_params;
use serde_json::Value;

use dpow_gateway::address::PUBKEY_ADDRESS_VERSION;
use dpow_gateway::codec::DirectDeposit;
use dpow_gateway::matcher::{check_deposit, DeferredVerifier, MatchOutcome};
use dpow_gateway::redemption::build_redemption_outputs;
use dpow_gateway::rpc::{MemoryChain, RawOutput, RawTransaction};
use dpow_gateway::script::{encode_opreturn_script, p2pkh_script};
use dpow_ledger::DepositLedger;
use dpow_node::config::NodeConfig;
use dpow_node::node::Node;
use dpow_types::context::{ChainContext, ChainRole};
use dpow_types::deposit::{DepositDetails, DepositKey};
use dpow_types::primitives::{txid_from_hex, TxOut, COIN};

const DEPOSIT_TXID: &str = "5e1f0000000000000000000000000000000000000000000000000000000000aa";

/// A base-chain transaction paying 2.5M units with a direct deposit of
/// 5M pegged EUR units.
fn direct_deposit_tx() -> RawTransaction {
    let payload = DirectDeposit {
        is_short_form: false,
        symbol: "EUR".to_string(),
        fiat_amount: 5_000_000,
        address_version: PUBKEY_ADDRESS_VERSION,
        destination_hash: [0x42; 20],
        origin_height: 1,
    }
    .encode()
    .unwrap();
    RawTransaction::new(
        DEPOSIT_TXID,
        vec![
            RawOutput::new(10_000, &p2pkh_script(&[0x11; 20])),
            RawOutput::new(2_500_000, &encode_opreturn_script(payload[0], &payload[1..]).unwrap()),
        ],
    )
}

fn issuer_config() -> NodeConfig {
    let mut config = NodeConfig::default();
    config.chain.symbol = "EUR".to_string();
    config.gateway.poll_interval_ms = 10;
    config.gateway.inter_block_delay_ms = 0;
    config.gateway.fiat_rates.insert("EUR".to_string(), COIN / 2);
    config.rpc.listen_addr = "127.0.0.1:0".to_string();
    config
}

async fn wait_for_realtime(node: &Node) {
    let status = node.sync_status().unwrap().clone();
    for _ in 0..300 {
        if status.is_realtime() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("gateway never caught up");
}

#[tokio::test]
async fn test_e2e_direct_deposit_issued_and_consumed() {
    let chain = Arc::new(MemoryChain::new());
    chain.push_block(vec![direct_deposit_tx()]);
    chain.push_block(Vec::new());

    let mut node = Node::with_chain_rpc(issuer_config(), chain).unwrap();
    node.start().await.unwrap();
    wait_for_realtime(&node).await;

    let ctx = node.context().clone();
    let ledger = node.ledger().clone();
    let key = DepositKey::new(txid_from_hex(DEPOSIT_TXID).unwrap(), 1);

    let record = ledger.find(&key).expect("deposit synced into ledger");
    assert_eq!(record.pegged_amount, 5_000_000);
    assert_eq!(record.primary_amount, 2_500_000);
    assert_eq!(record.origin_chain_symbol, "EUR");
    assert_eq!(record.destination_height, 1);
    assert_eq!(ledger.total(ChainRole::Issuer), 5_000_000);

    // The status RPC sees the same ledger.
    let url = format!("http://{}", node.rpc_addr().unwrap());
    let client = HttpClientBuilder::default().build(&url).unwrap();
    let status: Value = client.request("dpow_getStatus", rpc_params![]).await.unwrap();
    assert_eq!(status["symbol"], "EUR");
    assert_eq!(status["role"], "issuer");
    assert_eq!(status["pending_total"], 5_000_000);
    let deposit: Value = client
        .request("dpow_getDeposit", rpc_params![DEPOSIT_TXID, 1])
        .await
        .unwrap();
    assert_eq!(deposit["pegged_amount"], 5_000_000);
    assert_eq!(deposit["mark"], 0);

    // Issue the pegged units in the next block and validate that block.
    let batch = build_redemption_outputs(&ctx, &ledger).unwrap();
    assert_eq!(batch.appended, 1);
    assert_eq!(batch.pending_total, 5_000_000);
    assert_eq!(batch.outputs[0].script_pubkey, p2pkh_script(&[0x42; 20]));

    let mut coinbase = vec![TxOut::new(3 * COIN, p2pkh_script(&[0x99; 20]))];
    coinbase.extend(batch.outputs);
    let report = check_deposit(&ctx, &ledger, &DeferredVerifier, 1000, &[0u8; 32], &coinbase);
    assert_eq!(report.decoded, 1);
    assert_eq!(report.matched, 1);
    assert_eq!(report.outcomes, vec![(key, MatchOutcome::Matched)]);

    assert_eq!(ledger.find(&key).unwrap().mark, 1000);
    assert_eq!(ledger.total(ChainRole::Issuer), 0);

    // A replayed block is flagged, not re-counted.
    let replay = check_deposit(&ctx, &ledger, &DeferredVerifier, 1001, &[0u8; 32], &coinbase);
    assert_eq!(replay.outcomes, vec![(key, MatchOutcome::Duplicate)]);
    assert_eq!(ledger.find(&key).unwrap().mark, 1000);

    node.shutdown().await.unwrap();
}

#[test]
fn test_e2e_issuance_total_then_mark() {
    let ctx = ChainContext::new("EUR", false).unwrap();
    let ledger = DepositLedger::new();
    let key = DepositKey::new([0xab; 32], 0);
    ledger.upsert(
        key,
        DepositDetails {
            origin_chain_symbol: "EUR".to_string(),
            pegged_amount: 5_000_000,
            primary_amount: 2_500_000,
            ..Default::default()
        },
    );
    assert_eq!(ledger.total(ctx.role()), 5_000_000);

    ledger.mark(key, 1000);
    assert_eq!(ledger.total(ctx.role()), 0);
}

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use dpow_gateway::address::{AddressCodec, Base58AddressCodec};
use dpow_gateway::matcher::DeferredVerifier;
use dpow_gateway::opreturn::OpReturnHandler;
use dpow_gateway::oracle::{FixedRateOracle, PriceOracle};
use dpow_gateway::rpc::ChainRpc;
use dpow_gateway::service::{AggregatorPoller, GatewayService};
use dpow_gateway::sync::{GatewaySync, SyncStatus};
use dpow_ledger::DepositLedger;
use dpow_pow::notary::NotaryPolicy;
use dpow_pow::roster::StaticRoster;
use dpow_types::context::ChainContext;

use crate::aggregator_client::HttpAggregatorClient;
use crate::chain_client::JsonRpcChainClient;
use crate::config::NodeConfig;
use crate::error::NodeError;
use crate::metrics::NodeMetrics;
use crate::rpc::handlers::DpowRpcImpl;

/// The node process: owns the chain context, the ledger and the gateway
/// service task.
pub struct Node {
    config: NodeConfig,
    ctx: Arc<ChainContext>,
    ledger: Arc<DepositLedger>,
    roster: Arc<StaticRoster>,
    policy: Arc<NotaryPolicy>,
    metrics: Arc<NodeMetrics>,
    service: Option<GatewayService>,
    sync_status: Option<Arc<SyncStatus>>,
    service_task: Option<JoinHandle<()>>,
    shutdown_tx: watch::Sender<bool>,
    rpc_handle: Option<jsonrpsee::server::ServerHandle>,
    rpc_addr: Option<SocketAddr>,
}

impl Node {
    /// Create a node that syncs from the configured JSON-RPC endpoint.
    pub async fn new(config: NodeConfig) -> Result<Self, NodeError> {
        let chain: Option<Arc<dyn ChainRpc>> = if config.gateway.enabled {
            let client = JsonRpcChainClient::new(
                &config.gateway.rpc_url,
                &config.gateway.rpc_user,
                &config.gateway.rpc_password,
                Duration::from_secs(config.gateway.request_timeout_secs),
            )?;
            Some(Arc::new(client))
        } else {
            None
        };
        Self::build(config, chain)
    }

    /// Create a node that syncs from the given chain, regardless of
    /// `gateway.enabled`.
    pub fn with_chain_rpc(config: NodeConfig, chain: Arc<dyn ChainRpc>) -> Result<Self, NodeError> {
        Self::build(config, Some(chain))
    }

    fn build(config: NodeConfig, chain: Option<Arc<dyn ChainRpc>>) -> Result<Self, NodeError> {
        let ctx = Arc::new(config.chain_context()?);
        let ledger = Arc::new(DepositLedger::new());
        let roster = Arc::new(
            StaticRoster::new(config.notary_keys()?).with_lookback(ctx.notary.eligibility_lookback),
        );
        let policy = Arc::new(NotaryPolicy::new(
            ctx.notary.clone(),
            ctx.pow.clone(),
            roster.clone(),
        ));
        let metrics = Arc::new(NodeMetrics::new());
        let addresses: Arc<dyn AddressCodec> = Arc::new(Base58AddressCodec);

        let mut service = None;
        let mut sync_status = None;

        if let Some(chain) = chain {
            let oracle: Arc<dyn PriceOracle> = Arc::new(
                config
                    .gateway
                    .fiat_rates
                    .iter()
                    .fold(FixedRateOracle::new(), |oracle, (symbol, rate)| {
                        oracle.with_rate(symbol, *rate)
                    }),
            );
            let handler = OpReturnHandler::new(ctx.clone(), ledger.clone(), oracle, addresses.clone());
            let sync = GatewaySync::new(ctx.clone(), chain, handler, config.sync_settings());
            sync_status = Some(sync.status());
            service = Some(
                GatewayService::new(ctx.clone(), ledger.clone(), config.poll_interval())
                    .with_sync(sync)
                    .with_observer(metrics.clone()),
            );
        }

        if config.aggregator.enabled {
            if ctx.is_issuer() {
                tracing::warn!(symbol = %ctx.symbol(), "aggregator polling only runs on the base chain, ignoring");
            } else {
                let client = HttpAggregatorClient::new(
                    &config.aggregator.url,
                    Duration::from_secs(config.aggregator.request_timeout_secs),
                )?;
                let poller = AggregatorPoller {
                    client: Arc::new(client),
                    addresses,
                    fiats: config.aggregator.fiats.clone(),
                };
                let base = service.take().unwrap_or_else(|| {
                    GatewayService::new(ctx.clone(), ledger.clone(), config.poll_interval())
                });
                service = Some(base.with_aggregator(poller));
            }
        }

        tracing::info!(
            symbol = %ctx.display_symbol(),
            issuer = ctx.is_issuer(),
            notaries = config.chain.notaries.len(),
            gateway = service.is_some(),
            "node initialized"
        );

        let (shutdown_tx, _) = watch::channel(false);
        Ok(Self {
            config,
            ctx,
            ledger,
            roster,
            policy,
            metrics,
            service,
            sync_status,
            service_task: None,
            shutdown_tx,
            rpc_handle: None,
            rpc_addr: None,
        })
    }

    /// Spawn the gateway service and start the RPC server.
    pub async fn start(&mut self) -> Result<(), NodeError> {
        if let Some(service) = self.service.take() {
            let shutdown_rx = self.shutdown_tx.subscribe();
            self.service_task = Some(tokio::spawn(service.run(shutdown_rx)));
        }

        if self.config.rpc.enabled {
            let rpc_impl = DpowRpcImpl {
                ctx: self.ctx.clone(),
                ledger: self.ledger.clone(),
                roster: self.roster.clone(),
                policy: self.policy.clone(),
                verifier: Arc::new(DeferredVerifier),
                sync_status: self.sync_status.clone(),
                metrics: self.metrics.clone(),
            };
            let (handle, addr) =
                crate::rpc::server::start_rpc_server(&self.config.rpc.listen_addr, rpc_impl).await?;
            self.rpc_handle = Some(handle);
            self.rpc_addr = Some(addr);
        }
        Ok(())
    }

    /// Run until Ctrl+C, then shut down.
    pub async fn run(&mut self) -> Result<(), NodeError> {
        self.start().await?;
        tokio::signal::ctrl_c().await?;
        tracing::info!("Received shutdown signal");
        self.shutdown().await
    }

    /// Stop the gateway service between rounds, then the RPC server.
    pub async fn shutdown(&mut self) -> Result<(), NodeError> {
        tracing::info!("Shutting down node...");

        let _ = self.shutdown_tx.send(true);
        if let Some(task) = self.service_task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "gateway service task ended abnormally");
            }
        }

        if let Some(handle) = self.rpc_handle.take() {
            handle.stop().map_err(|e| NodeError::RpcError {
                reason: format!("failed to stop RPC server: {}", e),
            })?;
        }

        tracing::info!("Node shutdown complete");
        Ok(())
    }

    pub fn context(&self) -> &Arc<ChainContext> {
        &self.ctx
    }

    pub fn ledger(&self) -> &Arc<DepositLedger> {
        &self.ledger
    }

    pub fn metrics(&self) -> &Arc<NodeMetrics> {
        &self.metrics
    }

    pub fn sync_status(&self) -> Option<&Arc<SyncStatus>> {
        self.sync_status.as_ref()
    }

    /// Bound RPC address once started.
    pub fn rpc_addr(&self) -> Option<SocketAddr> {
        self.rpc_addr
    }
}

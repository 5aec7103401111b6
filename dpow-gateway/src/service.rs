//! Long-running supervisor that drives gateway sync and aggregator polling.

use std::sync::Arc;
use std::time::Duration;

use dpow_ledger::DepositLedger;
use dpow_types::context::ChainContext;
use tokio::sync::watch;

use crate::address::AddressCodec;
use crate::aggregator::{ingest_pending, AggregatorClient};
use crate::sync::GatewaySync;

/// Aggregator polling for the base chain.
pub struct AggregatorPoller {
    pub client: Arc<dyn AggregatorClient>,
    pub addresses: Arc<dyn AddressCodec>,
    /// Fiat symbols polled each round.
    pub fiats: Vec<String>,
}

/// Observer of each completed round, used for metrics.
pub trait RoundObserver: Send + Sync {
    fn round_completed(&self, ledger: &DepositLedger, sync: &GatewaySync);
}

pub struct GatewayService {
    ctx: Arc<ChainContext>,
    ledger: Arc<DepositLedger>,
    sync: Option<GatewaySync>,
    aggregator: Option<AggregatorPoller>,
    observer: Option<Arc<dyn RoundObserver>>,
    poll_interval: Duration,
}

impl GatewayService {
    pub fn new(ctx: Arc<ChainContext>, ledger: Arc<DepositLedger>, poll_interval: Duration) -> Self {
        Self {
            ctx,
            ledger,
            sync: None,
            aggregator: None,
            observer: None,
            poll_interval,
        }
    }

    pub fn with_sync(mut self, sync: GatewaySync) -> Self {
        self.sync = Some(sync);
        self
    }

    pub fn with_aggregator(mut self, poller: AggregatorPoller) -> Self {
        self.aggregator = Some(poller);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn RoundObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// One round: a sync iteration, then one aggregator poll per fiat symbol
    /// on the base chain. Failures are logged and retried next round.
    pub async fn round(&mut self) {
        if let Some(sync) = self.sync.as_mut() {
            match sync.iterate().await {
                Ok(report) if report.heights > 0 => tracing::debug!(
                    heights = report.heights,
                    cursor = sync.cursor(),
                    deposits = report.deposits_added,
                    "gateway iteration complete"
                ),
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "gateway iteration failed"),
            }
        }

        if !self.ctx.is_issuer() {
            if let Some(poller) = self.aggregator.as_ref() {
                for fiat in &poller.fiats {
                    match poller.client.fetch_pending(fiat).await {
                        Ok(pending) => {
                            let added = ingest_pending(
                                &self.ctx,
                                &self.ledger,
                                poller.addresses.as_ref(),
                                &pending,
                            );
                            if added > 0 {
                                tracing::info!(fiat = %fiat, added, "aggregator deposits ingested");
                            }
                        }
                        Err(e) => tracing::warn!(fiat = %fiat, error = %e, "aggregator poll failed"),
                    }
                }
            }
        }

        if let (Some(observer), Some(sync)) = (self.observer.as_ref(), self.sync.as_ref()) {
            observer.round_completed(&self.ledger, sync);
        }
    }

    /// Run rounds until `shutdown` carries `true` or its sender is dropped.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            symbol = %self.ctx.display_symbol(),
            interval_ms = self.poll_interval.as_millis() as u64,
            "gateway service started"
        );
        let mut interval = tokio::time::interval(self.poll_interval);
        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = interval.tick() => self.round().await,
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        tracing::info!("gateway service stopped");
    }
}

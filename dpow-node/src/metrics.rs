use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;

use dpow_gateway::service::RoundObserver;
use dpow_gateway::sync::GatewaySync;
use dpow_ledger::DepositLedger;

/// Node-wide Prometheus metrics.
pub struct NodeMetrics {
    pub ledger_records: Gauge,
    pub ledger_pending: Gauge,
    pub ledger_consumed: Gauge,
    pub sync_cursor: Gauge,
    pub sync_realtime: Gauge,
    pub gateway_rounds: Counter,
    pub pow_checks: Counter,
    pub pow_overrides: Counter,
    pub pow_rejections: Counter,
    pub deposit_checks: Counter,
    pub registry: Registry,
}

impl NodeMetrics {
    /// Create a new metrics registry with all node metrics registered.
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let ledger_records = Gauge::default();
        let ledger_pending = Gauge::default();
        let ledger_consumed = Gauge::default();
        let sync_cursor = Gauge::default();
        let sync_realtime = Gauge::default();
        let gateway_rounds = Counter::default();
        let pow_checks = Counter::default();
        let pow_overrides = Counter::default();
        let pow_rejections = Counter::default();
        let deposit_checks = Counter::default();

        registry.register(
            "dpow_ledger_records",
            "Deposit records in the ledger",
            ledger_records.clone(),
        );
        registry.register(
            "dpow_ledger_pending",
            "Deposit records not yet consumed",
            ledger_pending.clone(),
        );
        registry.register(
            "dpow_ledger_consumed",
            "Deposit records marked as consumed",
            ledger_consumed.clone(),
        );
        registry.register(
            "dpow_sync_cursor",
            "Next external height the gateway will process",
            sync_cursor.clone(),
        );
        registry.register(
            "dpow_sync_realtime",
            "Unix time the gateway last caught up with the external tip",
            sync_realtime.clone(),
        );
        registry.register(
            "dpow_gateway_rounds",
            "Gateway service rounds completed",
            gateway_rounds.clone(),
        );
        registry.register(
            "dpow_pow_checks",
            "Proof-of-work checks requested",
            pow_checks.clone(),
        );
        registry.register(
            "dpow_pow_overrides",
            "Checks that applied the notary minimum difficulty",
            pow_overrides.clone(),
        );
        registry.register(
            "dpow_pow_rejections",
            "Proof-of-work checks that failed",
            pow_rejections.clone(),
        );
        registry.register(
            "dpow_deposit_checks",
            "Coinbase deposit checks requested",
            deposit_checks.clone(),
        );

        Self {
            ledger_records,
            ledger_pending,
            ledger_consumed,
            sync_cursor,
            sync_realtime,
            gateway_rounds,
            pow_checks,
            pow_overrides,
            pow_rejections,
            deposit_checks,
            registry,
        }
    }

    /// Refresh the ledger gauges from a snapshot of its counts.
    pub fn observe_ledger(&self, ledger: &DepositLedger) {
        let stats = ledger.stats();
        self.ledger_records.set(stats.total as i64);
        self.ledger_pending.set(stats.pending as i64);
        self.ledger_consumed.set(stats.consumed as i64);
    }

    /// Encode all metrics in Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, std::fmt::Error> {
        let mut buf = String::new();
        prometheus_client::encoding::text::encode(&mut buf, &self.registry)?;
        Ok(buf)
    }
}

impl Default for NodeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl RoundObserver for NodeMetrics {
    fn round_completed(&self, ledger: &DepositLedger, sync: &GatewaySync) {
        self.gateway_rounds.inc();
        self.observe_ledger(ledger);
        self.sync_cursor.set(sync.cursor() as i64);
        self.sync_realtime.set(sync.status().realtime() as i64);
    }
}

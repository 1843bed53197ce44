//! Wires the pipeline together from a validated [`RiskwatchConfig`].

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use riskwatch_events::InMemoryEventBus;
use riskwatch_monitor::{
    AlertDeliveryError, AlertSink, InMemoryTrendStore, RiskAggregator, TrendEnvelope, TrendStore,
    TrendStoreError,
};
use riskwatch_signals::SourceKind;

use crate::alerts::{FanoutAlertSink, LogAlertSink, WebhookAlertSink};
use crate::collector::SignalCollector;
use crate::config::{ConfigError, RiskwatchConfig};
use crate::external::{FetchError, HttpSourceClient, SourceClient};
use crate::pipeline::SupplierPipeline;
use crate::runner::RiskMonitorRunner;
use crate::signal_log::SignalLog;
use crate::trend_store::JsonFileTrendStore;

pub type TrendBus = Arc<InMemoryEventBus<TrendEnvelope>>;
pub type Pipeline = SupplierPipeline<TrendBus>;

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Source(#[from] FetchError),

    #[error("trend store: {0}")]
    Store(#[from] TrendStoreError),

    #[error("webhook sink: {0}")]
    Webhook(#[from] AlertDeliveryError),
}

/// Everything a running process needs, built once at startup.
pub struct RiskwatchServices {
    pub pipeline: Arc<Pipeline>,
    pub bus: TrendBus,
    pub runner: RiskMonitorRunner,
}

impl RiskwatchServices {
    /// HTTP clients for every source with a configured endpoint.
    pub fn http_clients(config: &RiskwatchConfig) -> Result<Vec<Arc<dyn SourceClient>>, BootstrapError> {
        let mut clients: Vec<Arc<dyn SourceClient>> = Vec::new();
        for kind in SourceKind::ALL {
            let Some(endpoint) = config.sources.endpoint(kind) else {
                tracing::info!(source = ?kind, "no endpoint configured; source disabled");
                continue;
            };
            let key = config.api_keys.get(kind).map(str::to_string);
            clients.push(Arc::new(HttpSourceClient::new(kind, endpoint, key)?));
        }
        Ok(clients)
    }

    pub fn build(config: &RiskwatchConfig) -> Result<Self, BootstrapError> {
        let clients = Self::http_clients(config)?;
        Self::build_with(config, clients, Vec::new())
    }

    /// Build with explicit source clients and extra alert sinks.
    ///
    /// Log delivery is always on; the webhook is added when `webhook_url` is set.
    pub fn build_with(
        config: &RiskwatchConfig,
        clients: Vec<Arc<dyn SourceClient>>,
        extra_sinks: Vec<Arc<dyn AlertSink>>,
    ) -> Result<Self, BootstrapError> {
        config.validate()?;

        let store: Arc<dyn TrendStore> = match &config.data_dir {
            Some(dir) => Arc::new(JsonFileTrendStore::open(dir.join("trends"))?),
            None => {
                tracing::warn!("no data_dir configured; trends are kept in memory only");
                Arc::new(InMemoryTrendStore::new())
            }
        };

        let mut sinks = FanoutAlertSink::new(vec![Arc::new(LogAlertSink)]);
        if let Some(url) = &config.webhook_url {
            sinks.push(Arc::new(WebhookAlertSink::new(url.clone(), WEBHOOK_TIMEOUT, config.retry.clone())?));
        }
        for sink in extra_sinks {
            sinks.push(sink);
        }

        let bus: TrendBus = Arc::new(InMemoryEventBus::new());
        let aggregator = RiskAggregator::new(config.alert_policy()?, store, bus.clone(), Arc::new(sinks))
            .with_history_limit(config.history_limit)
            .with_retry(config.retry.clone());

        let pipeline = SupplierPipeline::new(
            config.suppliers()?,
            SignalCollector::new(clients, config.retry.clone()),
            Arc::new(SignalLog::new(config.signal_retention())),
            config.extractor()?,
            config.weights()?,
            Arc::new(aggregator),
        );

        let runner = RiskMonitorRunner {
            interval: config.poll_interval(),
            max_concurrent_suppliers: config.max_concurrent_suppliers,
            ..RiskMonitorRunner::default()
        };

        Ok(Self {
            pipeline: Arc::new(pipeline),
            bus,
            runner,
        })
    }
}

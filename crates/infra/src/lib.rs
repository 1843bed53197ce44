//! Infrastructure layer: configuration, external sources, the per-supplier
//! pipeline, the background runner and durable adapters.

pub mod alerts;
pub mod bootstrap;
pub mod collector;
pub mod config;
pub mod external;
pub mod pipeline;
pub mod projection_worker;
pub mod runner;
pub mod signal_log;
pub mod trend_store;

pub use alerts::{FanoutAlertSink, LogAlertSink, WebhookAlertSink};
pub use bootstrap::{BootstrapError, Pipeline, RiskwatchServices, TrendBus};
pub use collector::{CollectionFailure, CollectionReport, SignalCollector};
pub use config::{ConfigError, RiskwatchConfig};
pub use external::{FetchError, HttpSourceClient, SourceClient, StaticSourceClient, fetch_with_retry};
pub use pipeline::{CycleOutcome, PipelineError, SupplierPipeline};
pub use projection_worker::{ProjectionWorker, WorkerHandle};
pub use runner::{PassSummary, RiskMonitorHandle, RiskMonitorRunner};
pub use signal_log::{SignalLog, SignalLogError};
pub use trend_store::JsonFileTrendStore;

//! `riskwatch-monitor`
//!
//! Per-supplier risk trends with a hysteresis-based NORMAL / WATCH / ALERT
//! state machine, their persistence seam, alert delivery seam, and the
//! dashboard read model.

pub mod aggregator;
pub mod board;
pub mod policy;
pub mod sink;
pub mod store;
pub mod trend;

pub use aggregator::{AggregatorError, RecordOutcome, RiskAggregator, TrendEnvelope};
pub use board::{BoardRow, RiskBoard};
pub use policy::AlertPolicy;
pub use sink::{AlertDeliveryError, AlertSink, InMemoryAlertSink};
pub use store::{InMemoryTrendStore, TrendStore, TrendStoreError};
pub use trend::{
    AlertTransition, DEFAULT_HISTORY_LIMIT, RecordScore, RiskTrend, ScoreRecorded, Streaks,
    TrendCommand, TrendEvent, TrendState,
};

//! One scoring cycle for one supplier: collect → append → window → score → aggregate.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use thiserror::Error;

use riskwatch_core::{Supplier, SupplierId, SupplierLocation};
use riskwatch_events::EventBus;
use riskwatch_monitor::{AggregatorError, RecordOutcome, RiskAggregator, TrendEnvelope};
use riskwatch_scoring::{
    CategoryWeights, FeatureExtractor, LocalScoringScheduler, RiskAssessment, ScoringError,
    ScoringScheduler, SignalWindow, SupplierRiskJob,
};
use riskwatch_signals::Signal;

use crate::collector::{CollectionFailure, SignalCollector};
use crate::signal_log::{SignalLog, SignalLogError};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Scoring(#[from] ScoringError),

    #[error(transparent)]
    Aggregation(#[from] AggregatorError),

    #[error(transparent)]
    SignalLog(#[from] SignalLogError),

    #[error("assessment cache lock poisoned")]
    AssessmentsPoisoned,

    #[error("unknown supplier {0}")]
    UnknownSupplier(SupplierId),
}

impl PipelineError {
    /// No signals in any category yet: nothing to score, not a fault.
    pub fn is_insufficient_data(&self) -> bool {
        matches!(self, PipelineError::Scoring(ScoringError::InsufficientData { .. }))
    }
}

#[derive(Debug, Clone)]
pub struct CycleOutcome {
    pub supplier_id: SupplierId,
    /// Signals appended to the log this cycle (duplicates excluded).
    pub new_signals: usize,
    pub failures: Vec<CollectionFailure>,
    pub assessment: RiskAssessment,
    pub record: RecordOutcome,
}

pub struct SupplierPipeline<B>
where
    B: EventBus<TrendEnvelope>,
{
    suppliers: BTreeMap<SupplierId, Supplier>,
    collector: SignalCollector,
    log: Arc<SignalLog>,
    extractor: FeatureExtractor,
    weights: CategoryWeights,
    aggregator: Arc<RiskAggregator<B>>,
    assessments: RwLock<HashMap<SupplierId, RiskAssessment>>,
}

impl<B> SupplierPipeline<B>
where
    B: EventBus<TrendEnvelope>,
{
    pub fn new(
        suppliers: Vec<Supplier>,
        collector: SignalCollector,
        log: Arc<SignalLog>,
        extractor: FeatureExtractor,
        weights: CategoryWeights,
        aggregator: Arc<RiskAggregator<B>>,
    ) -> Self {
        Self {
            suppliers: suppliers.into_iter().map(|s| (s.id, s)).collect(),
            collector,
            log,
            extractor,
            weights,
            aggregator,
            assessments: RwLock::new(HashMap::new()),
        }
    }

    pub fn suppliers(&self) -> impl Iterator<Item = &Supplier> {
        self.suppliers.values()
    }

    pub fn supplier(&self, supplier_id: SupplierId) -> Option<&Supplier> {
        self.suppliers.get(&supplier_id)
    }

    pub fn signal_log(&self) -> &SignalLog {
        &self.log
    }

    pub fn aggregator(&self) -> &RiskAggregator<B> {
        &self.aggregator
    }

    pub fn latest_assessment(&self, supplier_id: SupplierId) -> Option<RiskAssessment> {
        self.assessments.read().ok()?.get(&supplier_id).cloned()
    }

    /// Append a signal that arrived outside the polling cycle.
    pub fn ingest(&self, signal: Signal) -> Result<bool, PipelineError> {
        if !self.suppliers.contains_key(&signal.supplier_id()) {
            return Err(PipelineError::UnknownSupplier(signal.supplier_id()));
        }
        Ok(self.log.append(signal)?)
    }

    pub fn run_cycle(
        &self,
        location: &SupplierLocation,
        as_of: DateTime<Utc>,
    ) -> Result<CycleOutcome, PipelineError> {
        let supplier_id = location.supplier_id;
        let report = self.collector.collect_at(location, as_of);
        let new_signals = self.log.append_all(report.signals)?;

        let window = SignalWindow {
            supplier_id,
            as_of,
            signals: self.log.snapshot(supplier_id, as_of)?,
        };
        let job = SupplierRiskJob::new(window, self.extractor.clone(), self.weights.clone());
        let assessment = LocalScoringScheduler::for_supplier(supplier_id).run(job)?;

        let record = self.aggregator.record(assessment.score.clone())?;

        self.assessments
            .write()
            .map_err(|_| PipelineError::AssessmentsPoisoned)?
            .insert(supplier_id, assessment.clone());

        tracing::info!(
            supplier = %supplier_id,
            score = assessment.score.score(),
            category = assessment.category.as_str(),
            state = %record.state,
            new_signals,
            source_failures = report.failures.len(),
            stale = report.stale,
            "scoring cycle complete"
        );

        Ok(CycleOutcome {
            supplier_id,
            new_signals,
            failures: report.failures,
            assessment,
            record,
        })
    }
}

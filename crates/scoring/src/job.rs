use chrono::{DateTime, Utc};

use riskwatch_core::SupplierId;
use riskwatch_signals::{Signal, SignalPayload};

use crate::assessment::RiskAssessment;
use crate::features::FeatureExtractor;
use crate::result::ScoringError;
use crate::scorer::RiskScorer;
use crate::weights::CategoryWeights;

/// A supplier-scoped scoring unit.
///
/// Inputs are snapshots handed in by the caller; jobs never read storage and
/// never mutate trend state.
pub trait ScoringJob: Send + Sync + 'static {
    type Input: Send + Sync + 'static;

    fn supplier_id(&self) -> SupplierId;

    fn input(&self) -> &Self::Input;

    fn run(&self) -> Result<RiskAssessment, ScoringError>;
}

/// Signals collected for one supplier, evaluated at `as_of`.
#[derive(Debug, Clone)]
pub struct SignalWindow {
    pub supplier_id: SupplierId,
    pub as_of: DateTime<Utc>,
    pub signals: Vec<Signal>,
}

/// Extract features from a [`SignalWindow`] and score them.
#[derive(Debug, Clone)]
pub struct SupplierRiskJob {
    window: SignalWindow,
    extractor: FeatureExtractor,
    weights: CategoryWeights,
}

impl SupplierRiskJob {
    pub fn new(window: SignalWindow, extractor: FeatureExtractor, weights: CategoryWeights) -> Self {
        Self {
            window,
            extractor,
            weights,
        }
    }
}

impl ScoringJob for SupplierRiskJob {
    type Input = SignalWindow;

    fn supplier_id(&self) -> SupplierId {
        self.window.supplier_id
    }

    fn input(&self) -> &Self::Input {
        &self.window
    }

    fn run(&self) -> Result<RiskAssessment, ScoringError> {
        let features = self.extractor.extract(
            self.window.supplier_id,
            &self.window.signals,
            self.window.as_of,
        )?;
        let score = RiskScorer::new().score(&features, &self.weights)?;

        tracing::debug!(
            supplier_id = %self.window.supplier_id,
            score = score.score(),
            signals = self.window.signals.len(),
            degraded = features.is_degraded(),
            "supplier scored"
        );

        Ok(RiskAssessment::with_weather_alerts(
            score,
            features,
            self.active_weather_alerts(),
        ))
    }
}

impl SupplierRiskJob {
    /// Alert events of the newest weather report inside the lookback window.
    fn active_weather_alerts(&self) -> Vec<String> {
        let as_of = self.window.as_of;
        let window_start = as_of - self.extractor.lookback();
        self.window
            .signals
            .iter()
            .filter(|s| s.observed_at() > window_start && s.observed_at() <= as_of)
            .filter_map(|s| match s.payload() {
                SignalPayload::Weather(report) => Some((s.observed_at(), report)),
                _ => None,
            })
            .max_by_key(|(at, _)| *at)
            .map(|(_, report)| report.alerts.iter().map(|a| a.event.clone()).collect())
            .unwrap_or_default()
    }
}

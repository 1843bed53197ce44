//! Feature extraction: a supplier's signals in a lookback window → one numeric
//! feature per source kind.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use riskwatch_core::SupplierId;
use riskwatch_signals::{Signal, SourceKind};

use crate::result::ScoringError;

/// Fallback feature value for a category with no signals in the window.
pub const DEFAULT_FEATURE: f64 = 0.5;

/// How the severities of one category inside the window are reduced.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowAggregation {
    /// Worst signal in the window.
    #[default]
    Max,
    Mean,
}

impl WindowAggregation {
    fn reduce(self, values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        Some(match self {
            WindowAggregation::Max => values.iter().copied().fold(0.0, f64::max),
            WindowAggregation::Mean => values.iter().sum::<f64>() / values.len() as f64,
        })
    }
}

/// Per-category fallback values used when a category has no data.
///
/// Every value lies in `(0, 1]`: a missing category must never read as "no risk".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<SourceKind, f64>", into = "BTreeMap<SourceKind, f64>")]
pub struct CategoryDefaults(BTreeMap<SourceKind, f64>);

impl CategoryDefaults {
    /// Categories absent from `values` fall back to [`DEFAULT_FEATURE`].
    pub fn new(values: BTreeMap<SourceKind, f64>) -> Result<Self, ScoringError> {
        let mut out = BTreeMap::new();
        for kind in SourceKind::ALL {
            let v = values.get(&kind).copied().unwrap_or(DEFAULT_FEATURE);
            if !v.is_finite() || v <= 0.0 || v > 1.0 {
                return Err(ScoringError::InvalidInput(format!(
                    "default for {kind} must be in (0, 1], got {v}"
                )));
            }
            out.insert(kind, v);
        }
        Ok(Self(out))
    }

    pub fn get(&self, kind: SourceKind) -> f64 {
        self.0.get(&kind).copied().unwrap_or(DEFAULT_FEATURE)
    }
}

impl Default for CategoryDefaults {
    fn default() -> Self {
        Self(SourceKind::ALL.iter().map(|k| (*k, DEFAULT_FEATURE)).collect())
    }
}

impl TryFrom<BTreeMap<SourceKind, f64>> for CategoryDefaults {
    type Error = ScoringError;

    fn try_from(value: BTreeMap<SourceKind, f64>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CategoryDefaults> for BTreeMap<SourceKind, f64> {
    fn from(value: CategoryDefaults) -> Self {
        value.0
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Completeness {
    Observed { signals: usize },
    Defaulted,
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub category: SourceKind,
    pub value: f64,
}

/// Fixed-schema numeric summary of a supplier's current signals.
///
/// `features` always has exactly one entry per [`SourceKind`], in
/// [`SourceKind::ALL`] order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub supplier_id: SupplierId,
    pub as_of: DateTime<Utc>,
    pub features: Vec<Feature>,
    pub completeness: BTreeMap<SourceKind, Completeness>,
}

impl FeatureVector {
    pub fn value(&self, kind: SourceKind) -> f64 {
        self.features
            .iter()
            .find(|f| f.category == kind)
            .map(|f| f.value)
            .unwrap_or(0.0)
    }

    /// Categories filled from defaults.
    pub fn defaulted(&self) -> Vec<SourceKind> {
        self.completeness
            .iter()
            .filter(|(_, c)| matches!(c, Completeness::Defaulted))
            .map(|(k, _)| *k)
            .collect()
    }

    pub fn is_degraded(&self) -> bool {
        !self.defaulted().is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    lookback: Duration,
    defaults: CategoryDefaults,
    aggregation: WindowAggregation,
}

impl FeatureExtractor {
    pub fn new(
        lookback: Duration,
        defaults: CategoryDefaults,
        aggregation: WindowAggregation,
    ) -> Result<Self, ScoringError> {
        if lookback <= Duration::zero() {
            return Err(ScoringError::InvalidInput(
                "lookback window must be positive".to_string(),
            ));
        }
        Ok(Self {
            lookback,
            defaults,
            aggregation,
        })
    }

    pub fn lookback(&self) -> Duration {
        self.lookback
    }

    pub fn aggregation(&self) -> WindowAggregation {
        self.aggregation
    }

    /// Summarize `signals` over `(as_of - lookback, as_of]`.
    ///
    /// Signals outside the window are ignored. A signal for a different
    /// supplier is an input error rather than silently skipped.
    pub fn extract(
        &self,
        supplier_id: SupplierId,
        signals: &[Signal],
        as_of: DateTime<Utc>,
    ) -> Result<FeatureVector, ScoringError> {
        if let Some(foreign) = signals.iter().find(|s| s.supplier_id() != supplier_id) {
            return Err(ScoringError::InvalidInput(format!(
                "signal for supplier {} passed to extraction for supplier {supplier_id}",
                foreign.supplier_id()
            )));
        }

        let window_start = as_of - self.lookback;
        let mut by_kind: BTreeMap<SourceKind, Vec<f64>> = BTreeMap::new();
        for signal in signals
            .iter()
            .filter(|s| s.observed_at() > window_start && s.observed_at() <= as_of)
        {
            by_kind
                .entry(signal.source_kind())
                .or_default()
                .push(signal.severity().value());
        }

        if by_kind.is_empty() {
            return Err(ScoringError::InsufficientData { supplier_id });
        }

        let mut features = Vec::with_capacity(SourceKind::ALL.len());
        let mut completeness = BTreeMap::new();
        for kind in SourceKind::ALL {
            let values = by_kind.get(&kind).map(Vec::as_slice).unwrap_or(&[]);
            match self.aggregation.reduce(values) {
                Some(value) => {
                    features.push(Feature { category: kind, value });
                    completeness.insert(kind, Completeness::Observed { signals: values.len() });
                }
                None => {
                    features.push(Feature {
                        category: kind,
                        value: self.defaults.get(kind),
                    });
                    completeness.insert(kind, Completeness::Defaulted);
                }
            }
        }

        Ok(FeatureVector {
            supplier_id,
            as_of,
            features,
            completeness,
        })
    }
}

impl Default for FeatureExtractor {
    /// Seven-day lookback, 0.5 defaults, max aggregation.
    fn default() -> Self {
        Self {
            lookback: Duration::days(7),
            defaults: CategoryDefaults::default(),
            aggregation: WindowAggregation::Max,
        }
    }
}

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use riskwatch_core::SupplierId;
use riskwatch_signals::SourceKind;

/// Maximum deviation of an attribution total from 1.0.
pub const ATTRIBUTION_TOLERANCE: f64 = 1e-6;

/// Risk score for one supplier at one point in time.
///
/// Immutable. Invariants, checked on construction and on deserialization:
/// - `score` is finite and in `[0, 1]`
/// - every attribution is finite and non-negative
/// - attributions sum to `1.0 ± ATTRIBUTION_TOLERANCE`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RiskScoreRecord", into = "RiskScoreRecord")]
pub struct RiskScore {
    supplier_id: SupplierId,
    timestamp: DateTime<Utc>,
    score: f64,
    attributions: BTreeMap<SourceKind, f64>,
}

impl RiskScore {
    pub fn from_parts(
        supplier_id: SupplierId,
        timestamp: DateTime<Utc>,
        score: f64,
        attributions: BTreeMap<SourceKind, f64>,
    ) -> Result<Self, ScoringError> {
        if !score.is_finite() || !(0.0..=1.0).contains(&score) {
            return Err(ScoringError::InvalidInput(format!(
                "score must be in [0, 1], got {score}"
            )));
        }
        if attributions.is_empty() {
            return Err(ScoringError::InvalidInput("attributions must not be empty".to_string()));
        }
        if let Some((kind, w)) = attributions.iter().find(|(_, w)| !w.is_finite() || **w < 0.0) {
            return Err(ScoringError::InvalidInput(format!(
                "attribution for {kind} must be finite and non-negative, got {w}"
            )));
        }
        let total: f64 = attributions.values().sum();
        if (total - 1.0).abs() > ATTRIBUTION_TOLERANCE {
            return Err(ScoringError::InvalidInput(format!(
                "attributions must sum to 1.0, got {total}"
            )));
        }

        Ok(Self {
            supplier_id,
            timestamp,
            score,
            attributions,
        })
    }

    pub fn supplier_id(&self) -> SupplierId {
        self.supplier_id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn attributions(&self) -> &BTreeMap<SourceKind, f64> {
        &self.attributions
    }

    pub fn attribution(&self, kind: SourceKind) -> f64 {
        self.attributions.get(&kind).copied().unwrap_or(0.0)
    }

    /// Category with the largest attribution (ties resolve to the earliest category).
    pub fn top_factor(&self) -> Option<SourceKind> {
        self.attributions
            .iter()
            .fold(None, |best: Option<(SourceKind, f64)>, (kind, w)| match best {
                Some((_, bw)) if bw >= *w => best,
                _ => Some((*kind, *w)),
            })
            .map(|(kind, _)| kind)
    }
}

/// Wire shape of [`RiskScore`]; deserialization funnels through `from_parts`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RiskScoreRecord {
    supplier_id: SupplierId,
    timestamp: DateTime<Utc>,
    score: f64,
    attributions: BTreeMap<SourceKind, f64>,
}

impl TryFrom<RiskScoreRecord> for RiskScore {
    type Error = ScoringError;

    fn try_from(r: RiskScoreRecord) -> Result<Self, Self::Error> {
        RiskScore::from_parts(r.supplier_id, r.timestamp, r.score, r.attributions)
    }
}

impl From<RiskScore> for RiskScoreRecord {
    fn from(s: RiskScore) -> Self {
        Self {
            supplier_id: s.supplier_id,
            timestamp: s.timestamp,
            score: s.score,
            attributions: s.attributions,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScoringError {
    /// Category weights are incomplete, negative, or do not sum to 1.0.
    #[error("invalid category weights: {0}")]
    InvalidWeights(String),

    /// Every signal category is missing inside the lookback window.
    #[error("insufficient data for supplier {supplier_id}: no signals in any category")]
    InsufficientData { supplier_id: SupplierId },

    #[error("invalid scoring input: {0}")]
    InvalidInput(String),
}

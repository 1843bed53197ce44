use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use riskwatch_signals::SourceKind;

use crate::result::{ATTRIBUTION_TOLERANCE, ScoringError};

/// Per-category weights of the weighted-sum scorer.
///
/// Always holds one finite, non-negative weight per [`SourceKind`], summing to
/// `1.0 ± 1e-6`. Deserialization validates the same way as [`CategoryWeights::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<SourceKind, f64>", into = "BTreeMap<SourceKind, f64>")]
pub struct CategoryWeights(BTreeMap<SourceKind, f64>);

impl CategoryWeights {
    pub fn new(weights: BTreeMap<SourceKind, f64>) -> Result<Self, ScoringError> {
        for kind in SourceKind::ALL {
            match weights.get(&kind) {
                None => {
                    return Err(ScoringError::InvalidWeights(format!("missing weight for {kind}")));
                }
                Some(w) if !w.is_finite() || *w < 0.0 => {
                    return Err(ScoringError::InvalidWeights(format!(
                        "weight for {kind} must be finite and non-negative, got {w}"
                    )));
                }
                Some(_) => {}
            }
        }

        let total: f64 = weights.values().sum();
        if (total - 1.0).abs() > ATTRIBUTION_TOLERANCE {
            return Err(ScoringError::InvalidWeights(format!(
                "weights must sum to 1.0, got {total}"
            )));
        }

        Ok(Self(weights))
    }

    /// Equal weight for every category.
    pub fn uniform() -> Self {
        let w = 1.0 / SourceKind::ALL.len() as f64;
        Self(SourceKind::ALL.iter().map(|k| (*k, w)).collect())
    }

    pub fn get(&self, kind: SourceKind) -> f64 {
        self.0.get(&kind).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (SourceKind, f64)> + '_ {
        self.0.iter().map(|(k, w)| (*k, *w))
    }

    pub fn as_map(&self) -> &BTreeMap<SourceKind, f64> {
        &self.0
    }
}

impl Default for CategoryWeights {
    /// Weather 0.35, news 0.35, economic 0.30.
    fn default() -> Self {
        Self(BTreeMap::from([
            (SourceKind::Weather, 0.35),
            (SourceKind::News, 0.35),
            (SourceKind::Economic, 0.30),
        ]))
    }
}

impl TryFrom<BTreeMap<SourceKind, f64>> for CategoryWeights {
    type Error = ScoringError;

    fn try_from(value: BTreeMap<SourceKind, f64>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CategoryWeights> for BTreeMap<SourceKind, f64> {
    fn from(value: CategoryWeights) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_weights_are_valid() {
        let w = CategoryWeights::default();
        assert!(CategoryWeights::new(w.as_map().clone()).is_ok());
    }

    #[test]
    fn missing_category_is_rejected() {
        let weights = BTreeMap::from([(SourceKind::Weather, 0.5), (SourceKind::News, 0.5)]);
        let err = CategoryWeights::new(weights).unwrap_err();
        assert!(matches!(err, ScoringError::InvalidWeights(_)));
    }

    #[test]
    fn weights_must_sum_to_one() {
        let weights = BTreeMap::from([
            (SourceKind::Weather, 0.5),
            (SourceKind::News, 0.5),
            (SourceKind::Economic, 0.5),
        ]);
        assert!(CategoryWeights::new(weights).is_err());
    }

    #[test]
    fn negative_weight_is_rejected() {
        let weights = BTreeMap::from([
            (SourceKind::Weather, 1.2),
            (SourceKind::News, -0.2),
            (SourceKind::Economic, 0.0),
        ]);
        assert!(CategoryWeights::new(weights).is_err());
    }

    #[test]
    fn deserialization_validates() {
        let ok: CategoryWeights =
            serde_json::from_str(r#"{"weather":0.2,"news":0.3,"economic":0.5}"#).unwrap();
        assert_eq!(ok.get(SourceKind::Economic), 0.5);

        let bad = serde_json::from_str::<CategoryWeights>(r#"{"weather":0.2,"news":0.3}"#);
        assert!(bad.is_err());
    }
}

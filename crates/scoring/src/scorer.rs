use std::collections::BTreeMap;

use crate::features::FeatureVector;
use crate::result::{RiskScore, ScoringError};
use crate::weights::CategoryWeights;

/// Transparent weighted-sum scorer.
///
/// `s = Σ w_k · f_k`, score = `clamp(s, 0, 1)`, attribution_k = `w_k · f_k / s`.
/// A zero sum attributes by the weights themselves.
#[derive(Debug, Default, Copy, Clone)]
pub struct RiskScorer;

impl RiskScorer {
    pub fn new() -> Self {
        Self
    }

    pub fn score(
        &self,
        features: &FeatureVector,
        weights: &CategoryWeights,
    ) -> Result<RiskScore, ScoringError> {
        if let Some(bad) = features.features.iter().find(|f| !f.value.is_finite() || f.value < 0.0) {
            return Err(ScoringError::InvalidInput(format!(
                "feature {} must be finite and non-negative, got {}",
                bad.category, bad.value
            )));
        }

        let contributions: BTreeMap<_, _> = features
            .features
            .iter()
            .map(|f| (f.category, weights.get(f.category) * f.value))
            .collect();
        let sum: f64 = contributions.values().sum();

        let attributions = if sum > 0.0 {
            contributions.into_iter().map(|(k, c)| (k, c / sum)).collect()
        } else {
            weights.as_map().clone()
        };

        RiskScore::from_parts(
            features.supplier_id,
            features.as_of,
            sum.clamp(0.0, 1.0),
            attributions,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{Completeness, Feature};
    use crate::result::ATTRIBUTION_TOLERANCE;
    use chrono::Utc;
    use proptest::prelude::*;
    use riskwatch_core::SupplierId;
    use riskwatch_signals::SourceKind;

    fn vector(values: [f64; 3]) -> FeatureVector {
        FeatureVector {
            supplier_id: SupplierId::new(),
            as_of: Utc::now(),
            features: SourceKind::ALL
                .iter()
                .zip(values)
                .map(|(k, v)| Feature { category: *k, value: v })
                .collect(),
            completeness: SourceKind::ALL
                .iter()
                .map(|k| (*k, Completeness::Observed { signals: 1 }))
                .collect(),
        }
    }

    fn weights_from(raw: [f64; 3]) -> CategoryWeights {
        let total: f64 = raw.iter().sum();
        CategoryWeights::new(
            SourceKind::ALL
                .iter()
                .zip(raw)
                .map(|(k, w)| (*k, w / total))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn weighted_sum_and_attribution() {
        let score = RiskScorer::new()
            .score(&vector([0.8, 0.4, 0.2]), &CategoryWeights::default())
            .unwrap();

        let expected = 0.35 * 0.8 + 0.35 * 0.4 + 0.30 * 0.2;
        assert!((score.score() - expected).abs() < 1e-12);
        assert!((score.attribution(SourceKind::Weather) - 0.28 / expected).abs() < 1e-12);
        assert_eq!(score.top_factor(), Some(SourceKind::Weather));
    }

    #[test]
    fn all_zero_features_attribute_by_weight() {
        let weights = CategoryWeights::default();
        let score = RiskScorer::new().score(&vector([0.0, 0.0, 0.0]), &weights).unwrap();
        assert_eq!(score.score(), 0.0);
        assert_eq!(score.attributions(), weights.as_map());
    }

    #[test]
    fn non_finite_feature_is_rejected() {
        let err = RiskScorer::new()
            .score(&vector([f64::NAN, 0.1, 0.1]), &CategoryWeights::default())
            .unwrap_err();
        assert!(matches!(err, ScoringError::InvalidInput(_)));
    }

    proptest! {
        #[test]
        fn attributions_sum_to_one(
            raw in prop::array::uniform3(0.01f64..1.0),
            values in prop::array::uniform3(0.0f64..=1.0),
        ) {
            let score = RiskScorer::new().score(&vector(values), &weights_from(raw)).unwrap();
            let total: f64 = score.attributions().values().sum();
            prop_assert!((total - 1.0).abs() <= ATTRIBUTION_TOLERANCE);
            prop_assert!((0.0..=1.0).contains(&score.score()));
        }

        #[test]
        fn dominant_category_has_largest_attribution(
            dominant in 0usize..3,
            high in 0.6f64..=1.0,
            low in prop::array::uniform2(0.0f64..0.5),
        ) {
            let mut values = [0.0; 3];
            let mut rest = low.iter();
            for (i, v) in values.iter_mut().enumerate() {
                *v = if i == dominant { high } else { *rest.next().unwrap() };
            }

            let score = RiskScorer::new().score(&vector(values), &CategoryWeights::uniform()).unwrap();
            let top = SourceKind::ALL[dominant];
            for kind in SourceKind::ALL.iter().filter(|k| **k != top) {
                prop_assert!(score.attribution(top) > score.attribution(*kind));
            }
        }

        #[test]
        fn attribution_order_follows_weighted_severity(
            raw in prop::array::uniform3(0.0f64..1.0).prop_filter("needs a non-zero weight", |r| r.iter().sum::<f64>() > 0.01),
            values in prop::array::uniform3(0.0f64..=1.0),
        ) {
            let weights = weights_from(raw);
            let score = RiskScorer::new().score(&vector(values), &weights).unwrap();

            let total: f64 = score.attributions().values().sum();
            prop_assert!((total - 1.0).abs() <= ATTRIBUTION_TOLERANCE);

            let contribution = |i: usize| weights.get(SourceKind::ALL[i]) * values[i];
            // A zero sum attributes by weight instead.
            let sum: f64 = (0..3).map(contribution).sum();
            for i in (0..3).filter(|_| sum > 0.0) {
                for j in 0..3 {
                    let (a, b) = (SourceKind::ALL[i], SourceKind::ALL[j]);
                    if contribution(i) > contribution(j) + 1e-9 {
                        prop_assert!(score.attribution(a) > score.attribution(b));
                    } else if contribution(i) >= contribution(j) {
                        prop_assert!(score.attribution(a) >= score.attribution(b));
                    }
                }
            }
        }

        #[test]
        fn json_round_trip_preserves_bits(values in prop::array::uniform3(0.0f64..=1.0)) {
            let score = RiskScorer::new().score(&vector(values), &CategoryWeights::default()).unwrap();
            let back: RiskScore = serde_json::from_str(&serde_json::to_string(&score).unwrap()).unwrap();
            prop_assert_eq!(back.score().to_bits(), score.score().to_bits());
            for (kind, w) in score.attributions() {
                prop_assert_eq!(back.attribution(*kind).to_bits(), w.to_bits());
            }
        }
    }
}

use serde::{Deserialize, Serialize};

use riskwatch_signals::SourceKind;

use crate::features::FeatureVector;
use crate::result::RiskScore;

const MEDIUM_FROM: f64 = 0.3;
const HIGH_FROM: f64 = 0.6;

const WEATHER_CONCERN: f64 = 0.7;
const NEWS_CONCERN: f64 = 0.7;
const ECONOMIC_CONCERN: f64 = 0.6;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskCategory {
    Low,
    Medium,
    High,
}

impl RiskCategory {
    pub fn from_score(score: f64) -> Self {
        if score >= HIGH_FROM {
            RiskCategory::High
        } else if score >= MEDIUM_FROM {
            RiskCategory::Medium
        } else {
            RiskCategory::Low
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskCategory::Low => "low",
            RiskCategory::Medium => "medium",
            RiskCategory::High => "high",
        }
    }
}

/// A score with the inputs that produced it and human-readable advice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub score: RiskScore,
    pub features: FeatureVector,
    pub category: RiskCategory,
    pub recommendations: Vec<String>,
    /// Weather alerts in force at the site when the score was taken.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub weather_alerts: Vec<String>,
}

impl RiskAssessment {
    pub fn new(score: RiskScore, features: FeatureVector) -> Self {
        Self::with_weather_alerts(score, features, Vec::new())
    }

    pub fn with_weather_alerts(
        score: RiskScore,
        features: FeatureVector,
        weather_alerts: Vec<String>,
    ) -> Self {
        let category = RiskCategory::from_score(score.score());
        let recommendations = recommendations(&features, category, &weather_alerts);
        Self {
            score,
            features,
            category,
            recommendations,
            weather_alerts,
        }
    }

    /// Advice leads with an urgent item because alerts are in force.
    pub fn is_urgent(&self) -> bool {
        self.recommendations.first().is_some_and(|r| r.starts_with("Urgent:"))
    }
}

fn recommendations(
    features: &FeatureVector,
    category: RiskCategory,
    weather_alerts: &[String],
) -> Vec<String> {
    let mut out = Vec::new();

    if features.value(SourceKind::Weather) > WEATHER_CONCERN {
        if weather_alerts.is_empty() {
            out.push(
                "Severe weather expected at the supplier site: confirm shipment schedules and alternate routes."
                    .to_string(),
            );
        } else {
            out.push(format!(
                "Urgent: active weather alerts at the supplier site ({}): switch to alternate routes and engage backup suppliers now.",
                weather_alerts.join(", ")
            ));
        }
    }
    if features.value(SourceKind::News) > NEWS_CONCERN {
        out.push(
            "Negative supplier news detected: review contingency plans and secondary sources.".to_string(),
        );
    }
    if features.value(SourceKind::Economic) > ECONOMIC_CONCERN {
        out.push(
            "Economic conditions are deteriorating: revisit pricing and contract terms.".to_string(),
        );
    }
    if category == RiskCategory::High {
        out.push("Overall risk is high: consider raising safety stock for this supplier.".to_string());
    }

    let defaulted = features.defaulted();
    if !defaulted.is_empty() {
        let names: Vec<&str> = defaulted.iter().map(|k| k.as_str()).collect();
        out.push(format!(
            "No recent data for {}; score uses default values for these categories.",
            names.join(", ")
        ));
    }

    out
}

use serde::Deserialize;
use serde_json::{Value as JsonValue, json};

use riskwatch_core::{Supplier, SupplierId};
use riskwatch_monitor::{BoardRow, RiskTrend, TrendState};
use riskwatch_scoring::RiskAssessment;

// -------------------------
// Request DTOs
// -------------------------

/// A raw source payload pushed by a caller instead of fetched by the runner.
#[derive(Debug, Deserialize)]
pub struct IngestSignalRequest {
    pub supplier_id: String,
    pub source_kind: String,
    pub payload: JsonValue,
}

#[derive(Debug, Default, Deserialize)]
pub struct AlertsQuery {
    /// Only transitions into ALERT.
    #[serde(default)]
    pub only_alerts: bool,
    pub limit: Option<usize>,
}

// -------------------------
// Response mapping
// -------------------------

pub fn supplier_summary(supplier: &Supplier, row: Option<&BoardRow>) -> JsonValue {
    json!({
        "supplier_id": supplier.id.to_string(),
        "name": supplier.name,
        "tier": supplier.tier,
        "site": supplier.location.name,
        "country_code": supplier.location.country_code,
        "latest_score": row.and_then(|r| r.latest_score),
        "top_factor": row.and_then(|r| r.top_factor),
        "state": row.map_or(TrendState::Normal, |r| r.state),
        "transitions": row.map_or(0, |r| r.transitions),
        "updated_at": row.and_then(|r| r.updated_at),
    })
}

pub fn supplier_detail(supplier: &Supplier, state: TrendState, assessment: Option<&RiskAssessment>) -> JsonValue {
    let mut body = json!({
        "supplier_id": supplier.id.to_string(),
        "name": supplier.name,
        "tier": supplier.tier,
        "location": supplier.location,
        "state": state,
        "score": JsonValue::Null,
    });

    if let Some(a) = assessment {
        body["score"] = json!(a.score);
        body["category"] = json!(a.category);
        body["recommendations"] = json!(a.recommendations);
        body["weather_alerts"] = json!(a.weather_alerts);
        body["urgent"] = json!(a.is_urgent());
        body["features"] = json!(a.features.features);
        body["completeness"] = json!(a.features.completeness);
        body["degraded"] = json!(a.features.is_degraded());
    }
    body
}

pub fn trend_to_json(supplier_id: SupplierId, trend: Option<&RiskTrend>) -> JsonValue {
    match trend {
        Some(t) => json!({
            "supplier_id": supplier_id.to_string(),
            "state": t.state(),
            "transitions": t.transition_count(),
            "scores": t.scores().collect::<Vec<_>>(),
        }),
        None => json!({
            "supplier_id": supplier_id.to_string(),
            "state": TrendState::Normal,
            "transitions": 0,
            "scores": [],
        }),
    }
}

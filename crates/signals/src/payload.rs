//! Typed raw payloads, one per source kind.
//!
//! These are the inbound schemas. Optional fields default to "not reported";
//! required fields missing from the JSON make the payload invalid.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::signal::SourceKind;

/// Raw payload carried by a [`crate::Signal`], tagged by source kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source_kind", rename_all = "snake_case")]
pub enum SignalPayload {
    Weather(WeatherReport),
    News(NewsReport),
    Economic(EconomicReport),
}

impl SignalPayload {
    pub fn kind(&self) -> SourceKind {
        match self {
            SignalPayload::Weather(_) => SourceKind::Weather,
            SignalPayload::News(_) => SourceKind::News,
            SignalPayload::Economic(_) => SourceKind::Economic,
        }
    }
}

/// Current conditions and active alerts at a supplier site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    pub observed_at: DateTime<Utc>,
    pub wind_speed_kph: f64,
    #[serde(default)]
    pub precipitation_mm: Option<f64>,
    #[serde(default)]
    pub temperature_c: Option<f64>,
    /// Provider condition code, e.g. `storm_warning`.
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub alerts: Vec<WeatherAlert>,
    /// Daily outlook, today first.
    #[serde(default)]
    pub forecast: Vec<ForecastDay>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastDay {
    /// Provider's main condition, e.g. `Thunderstorm` or `Rain`.
    pub condition: String,
    #[serde(default)]
    pub temp_max_c: Option<f64>,
    #[serde(default)]
    pub temp_min_c: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherAlert {
    pub event: String,
    /// Provider severity label; `extreme` escalates to maximum severity.
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// A news article mentioning the supplier or its region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsReport {
    pub title: String,
    pub published_at: DateTime<Utc>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    /// Sentiment in `[-1, 1]` when the provider scores articles.
    #[serde(default)]
    pub sentiment: Option<f64>,
}

/// Country-level economic indicators for the supplier's location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EconomicReport {
    pub observed_at: DateTime<Utc>,
    #[serde(default)]
    pub inflation_pct: Option<f64>,
    #[serde(default)]
    pub gdp_growth_pct: Option<f64>,
    /// Trade as a share of GDP.
    #[serde(default)]
    pub trade_pct_gdp: Option<f64>,
    /// Logistics performance index, 1 (worst) to 5 (best).
    #[serde(default)]
    pub logistics_index: Option<f64>,
}

impl EconomicReport {
    pub fn indicators(&self) -> [(&'static str, Option<f64>); 4] {
        [
            ("inflation_pct", self.inflation_pct),
            ("gdp_growth_pct", self.gdp_growth_pct),
            ("trade_pct_gdp", self.trade_pct_gdp),
            ("logistics_index", self.logistics_index),
        ]
    }
}

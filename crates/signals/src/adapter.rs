//! Signal adapters: raw JSON payload → [`Signal`].

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use riskwatch_core::{Severity, SupplierLocation};

use crate::error::SignalError;
use crate::payload::{EconomicReport, NewsReport, SignalPayload, WeatherReport};
use crate::severity;
use crate::signal::{Signal, SourceKind};

/// Converts one source's raw payloads into signals.
///
/// Implementations are pure: the same payload and location always produce
/// the same signal.
pub trait SignalAdapter: Send + Sync {
    fn kind(&self) -> SourceKind;

    fn adapt(&self, raw: &JsonValue, location: &SupplierLocation) -> Result<Signal, SignalError>;
}

/// Normalize a raw payload for the supplier at `location`.
pub fn normalize(
    raw: &JsonValue,
    source_kind: SourceKind,
    location: &SupplierLocation,
) -> Result<Signal, SignalError> {
    adapter_for(source_kind).adapt(raw, location)
}

pub fn adapter_for(kind: SourceKind) -> &'static dyn SignalAdapter {
    match kind {
        SourceKind::Weather => &WeatherAdapter,
        SourceKind::News => &NewsAdapter,
        SourceKind::Economic => &EconomicAdapter,
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct WeatherAdapter;

#[derive(Debug, Default, Clone, Copy)]
pub struct NewsAdapter;

#[derive(Debug, Default, Clone, Copy)]
pub struct EconomicAdapter;

impl SignalAdapter for WeatherAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Weather
    }

    fn adapt(&self, raw: &JsonValue, location: &SupplierLocation) -> Result<Signal, SignalError> {
        let report: WeatherReport = parse(raw, self.kind())?;

        non_negative(self.kind(), "wind_speed_kph", report.wind_speed_kph)?;
        if let Some(mm) = report.precipitation_mm {
            non_negative(self.kind(), "precipitation_mm", mm)?;
        }
        if let Some(c) = report.temperature_c {
            finite(self.kind(), "temperature_c", c)?;
        }
        for day in &report.forecast {
            if day.condition.trim().is_empty() {
                return Err(SignalError::invalid(self.kind(), "forecast condition must not be empty"));
            }
        }

        let severity = severity::weather(&report);
        Ok(build(location, report.observed_at, SignalPayload::Weather(report), severity))
    }
}

impl SignalAdapter for NewsAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::News
    }

    fn adapt(&self, raw: &JsonValue, location: &SupplierLocation) -> Result<Signal, SignalError> {
        let report: NewsReport = parse(raw, self.kind())?;

        if report.title.trim().is_empty() {
            return Err(SignalError::invalid(self.kind(), "title must not be empty"));
        }
        if let Some(s) = report.sentiment {
            if !s.is_finite() || !(-1.0..=1.0).contains(&s) {
                return Err(SignalError::invalid(
                    self.kind(),
                    format!("sentiment must be in [-1, 1], got {s}"),
                ));
            }
        }

        let severity = severity::news(&report);
        Ok(build(location, report.published_at, SignalPayload::News(report), severity))
    }
}

impl SignalAdapter for EconomicAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Economic
    }

    fn adapt(&self, raw: &JsonValue, location: &SupplierLocation) -> Result<Signal, SignalError> {
        let report: EconomicReport = parse(raw, self.kind())?;

        let mut present = 0;
        for (name, value) in report.indicators() {
            if let Some(v) = value {
                finite(self.kind(), name, v)?;
                present += 1;
            }
        }
        if present == 0 {
            return Err(SignalError::invalid(
                self.kind(),
                "at least one of inflation_pct, gdp_growth_pct, trade_pct_gdp, logistics_index is required",
            ));
        }

        let severity = severity::economic(&report);
        Ok(build(location, report.observed_at, SignalPayload::Economic(report), severity))
    }
}

fn parse<T: DeserializeOwned>(raw: &JsonValue, kind: SourceKind) -> Result<T, SignalError> {
    if !raw.is_object() {
        return Err(SignalError::invalid(kind, "payload must be a JSON object"));
    }
    serde_json::from_value(raw.clone()).map_err(|e| SignalError::invalid(kind, e.to_string()))
}

fn finite(kind: SourceKind, field: &str, value: f64) -> Result<(), SignalError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(SignalError::invalid(kind, format!("{field} must be finite")))
    }
}

fn non_negative(kind: SourceKind, field: &str, value: f64) -> Result<(), SignalError> {
    finite(kind, field, value)?;
    if value < 0.0 {
        return Err(SignalError::invalid(kind, format!("{field} must not be negative, got {value}")));
    }
    Ok(())
}

fn build(
    location: &SupplierLocation,
    observed_at: DateTime<Utc>,
    payload: SignalPayload,
    severity: Severity,
) -> Signal {
    Signal::new(location.supplier_id, observed_at, payload, severity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use riskwatch_core::SupplierId;
    use serde_json::json;

    fn location() -> SupplierLocation {
        SupplierLocation {
            supplier_id: SupplierId::new(),
            name: "Suwon, South Korea".to_string(),
            latitude: 37.2636,
            longitude: 127.0286,
            country_code: "KOR".to_string(),
        }
    }

    #[test]
    fn weather_payload_becomes_signal() {
        let loc = location();
        let raw = json!({
            "observed_at": "2026-10-01T06:00:00Z",
            "wind_speed_kph": 95.0,
            "precipitation_mm": 12.0,
            "condition": "storm_warning"
        });

        let signal = normalize(&raw, SourceKind::Weather, &loc).unwrap();

        assert_eq!(signal.source_kind(), SourceKind::Weather);
        assert_eq!(signal.supplier_id(), loc.supplier_id);
        assert_eq!(signal.observed_at().to_rfc3339(), "2026-10-01T06:00:00+00:00");
        assert!((signal.severity().value() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn weather_forecast_is_read_from_payload() {
        let raw = json!({
            "observed_at": "2026-10-01T06:00:00Z",
            "wind_speed_kph": 10.0,
            "forecast": [
                { "condition": "Clear", "temp_max_c": 27.0, "temp_min_c": 18.0 },
                { "condition": "Clear" },
                { "condition": "Clear" },
                { "condition": "Thunderstorm", "temp_max_c": 25.0 }
            ]
        });
        let signal = normalize(&raw, SourceKind::Weather, &location()).unwrap();
        assert_eq!(signal.severity().value(), 0.9);

        let blank = json!({
            "observed_at": "2026-10-01T06:00:00Z",
            "wind_speed_kph": 10.0,
            "forecast": [{ "condition": " " }]
        });
        assert!(normalize(&blank, SourceKind::Weather, &location()).is_err());
    }

    #[test]
    fn missing_required_field_is_invalid_payload() {
        let raw = json!({ "observed_at": "2026-10-01T06:00:00Z" });
        let err = normalize(&raw, SourceKind::Weather, &location()).unwrap_err();
        match err {
            SignalError::InvalidPayload { kind, reason } => {
                assert_eq!(kind, SourceKind::Weather);
                assert!(reason.contains("wind_speed_kph"), "{reason}");
            }
        }
    }

    #[test]
    fn news_with_null_description_is_accepted() {
        let raw = json!({
            "title": "Chip shortage deepens",
            "description": null,
            "published_at": "2026-10-02T10:00:00Z"
        });
        let signal = normalize(&raw, SourceKind::News, &location()).unwrap();
        assert_eq!(signal.severity().value(), 0.7);
    }

    #[test]
    fn economic_payload_without_indicators_is_rejected() {
        let raw = json!({ "observed_at": "2026-10-01T00:00:00Z" });
        let err = normalize(&raw, SourceKind::Economic, &location()).unwrap_err();
        assert_eq!(err.kind(), SourceKind::Economic);
    }

    #[test]
    fn non_object_payload_is_rejected() {
        let err = normalize(&json!([1, 2, 3]), SourceKind::News, &location()).unwrap_err();
        assert!(matches!(err, SignalError::InvalidPayload { .. }));
    }

    #[test]
    fn negative_wind_is_rejected() {
        let raw = json!({ "observed_at": "2026-10-01T06:00:00Z", "wind_speed_kph": -3.0 });
        assert!(normalize(&raw, SourceKind::Weather, &location()).is_err());
    }

    #[test]
    fn signal_payload_is_tagged_by_source_kind() {
        let raw = json!({ "observed_at": "2026-10-01T00:00:00Z", "logistics_index": 3.5 });
        let signal = normalize(&raw, SourceKind::Economic, &location()).unwrap();
        let encoded = serde_json::to_value(signal.payload()).unwrap();
        assert_eq!(encoded["source_kind"], "economic");
    }
}

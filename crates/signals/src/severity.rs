//! Source-specific severity normalization.
//!
//! Every function is monotonic in its source's raw intensity and bounded to
//! `[0, 1]`.

use riskwatch_core::Severity;

use crate::payload::{EconomicReport, NewsReport, WeatherReport};

/// Wind below this speed carries no risk.
const CALM_WIND_KPH: f64 = 20.0;
/// Wind speed span from calm to maximum severity (hurricane force at 120 kph).
const WIND_SPAN_KPH: f64 = 100.0;
/// Daily precipitation that saturates severity.
const SATURATING_PRECIPITATION_MM: f64 = 100.0;
const COMFORT_MIN_C: f64 = 0.0;
const COMFORT_MAX_C: f64 = 35.0;
/// Degrees beyond the comfort band that saturate severity.
const TEMPERATURE_SPAN_C: f64 = 15.0;

const ACTIVE_ALERT: f64 = 0.8;
const EXTREME_ALERT: f64 = 1.0;

const CONDITIONS: &[(&str, f64)] = &[
    ("extreme_weather", 1.0),
    ("flood_risk", 0.8),
    ("storm_warning", 0.7),
];
const BASELINE_CONDITION: f64 = 0.1;

/// Forecast days that count toward severity.
const FORECAST_DAYS: usize = 5;
/// Forecast days inspected for an extreme outlook.
const OUTLOOK_DAYS: usize = 3;
const SEVERE_FORECAST: &[&str] = &["thunderstorm", "tornado", "hurricane"];
const SEVERE_FORECAST_RISK: f64 = 0.9;
const WET_FORECAST: &[&str] = &["rain", "snow", "storm"];
const WET_FORECAST_RISK: f64 = 0.6;
const EXTREME_OUTLOOK: f64 = 1.0;

/// Supply disruption vocabulary.
const SUPPLY_KEYWORDS: &[(&str, f64)] = &[
    ("bankruptcy", 0.9),
    ("disruption", 0.8),
    ("crisis", 0.8),
    ("shutdown", 0.8),
    ("shortage", 0.7),
    ("strike", 0.7),
    ("recall", 0.7),
    ("delay", 0.6),
    ("accident", 0.6),
    ("investigation", 0.5),
];

/// Trade policy vocabulary.
const POLITICAL_KEYWORDS: &[(&str, f64)] = &[
    ("sanction", 0.9),
    ("trade war", 0.8),
    ("tariff", 0.7),
    ("restriction", 0.7),
    ("regulation", 0.6),
    ("compliance", 0.6),
    ("policy change", 0.5),
];

/// Natural disaster vocabulary.
const DISASTER_KEYWORDS: &[(&str, f64)] = &[
    ("earthquake", 1.0),
    ("tsunami", 1.0),
    ("hurricane", 0.9),
    ("typhoon", 0.9),
    ("flood", 0.8),
    ("wildfire", 0.8),
    ("storm", 0.7),
    ("drought", 0.6),
];

/// Description-only keyword matches count for less than headline matches.
const DESCRIPTION_DISCOUNT: f64 = 0.7;

pub fn wind(kph: f64) -> f64 {
    ((kph - CALM_WIND_KPH) / WIND_SPAN_KPH).clamp(0.0, 1.0)
}

pub fn precipitation(mm: f64) -> f64 {
    (mm / SATURATING_PRECIPITATION_MM).clamp(0.0, 1.0)
}

pub fn temperature(celsius: f64) -> f64 {
    let excess = if celsius > COMFORT_MAX_C {
        celsius - COMFORT_MAX_C
    } else if celsius < COMFORT_MIN_C {
        COMFORT_MIN_C - celsius
    } else {
        0.0
    };
    (excess / TEMPERATURE_SPAN_C).clamp(0.0, 1.0)
}

pub fn weather(report: &WeatherReport) -> Severity {
    let mut level = wind(report.wind_speed_kph);

    if let Some(mm) = report.precipitation_mm {
        level = level.max(precipitation(mm));
    }
    if let Some(c) = report.temperature_c {
        level = level.max(temperature(c));
    }

    let condition = report
        .condition
        .as_deref()
        .map(|c| {
            let c = c.trim().to_ascii_lowercase();
            CONDITIONS
                .iter()
                .find(|(name, _)| *name == c)
                .map(|(_, w)| *w)
                .unwrap_or(BASELINE_CONDITION)
        })
        .unwrap_or(BASELINE_CONDITION);
    level = level.max(condition);

    for day in report.forecast.iter().take(FORECAST_DAYS) {
        level = level.max(forecast_day(&day.condition));
    }
    if extreme_outlook(report) {
        level = level.max(EXTREME_OUTLOOK);
    }

    for alert in &report.alerts {
        let extreme = alert
            .severity
            .as_deref()
            .is_some_and(|s| s.eq_ignore_ascii_case("extreme"));
        level = level.max(if extreme { EXTREME_ALERT } else { ACTIVE_ALERT });
    }

    Severity::clamped(level)
}

fn forecast_day(condition: &str) -> f64 {
    let c = condition.trim().to_ascii_lowercase();
    if SEVERE_FORECAST.contains(&c.as_str()) {
        SEVERE_FORECAST_RISK
    } else if WET_FORECAST.contains(&c.as_str()) {
        WET_FORECAST_RISK
    } else {
        0.0
    }
}

/// A severe storm, or a day outside the comfort band, within the next three days.
pub fn extreme_outlook(report: &WeatherReport) -> bool {
    report.forecast.iter().take(OUTLOOK_DAYS).any(|day| {
        let c = day.condition.trim().to_ascii_lowercase();
        SEVERE_FORECAST.contains(&c.as_str())
            || day.temp_max_c.is_some_and(|t| t > COMFORT_MAX_C)
            || day.temp_min_c.is_some_and(|t| t < COMFORT_MIN_C)
    })
}

/// Highest keyword weight found in `text` across every vocabulary.
pub fn keyword_weight(text: &str) -> f64 {
    let text = text.to_lowercase();
    [SUPPLY_KEYWORDS, POLITICAL_KEYWORDS, DISASTER_KEYWORDS]
        .iter()
        .flat_map(|table| table.iter())
        .filter(|(keyword, _)| text.contains(keyword))
        .map(|(_, w)| *w)
        .fold(0.0, f64::max)
}

pub fn news(report: &NewsReport) -> Severity {
    let headline = keyword_weight(&report.title);
    let body = report
        .description
        .as_deref()
        .map(|d| keyword_weight(d) * DESCRIPTION_DISCOUNT)
        .unwrap_or(0.0);
    let sentiment = report.sentiment.map(|s| (-s).max(0.0)).unwrap_or(0.0);

    Severity::clamped(headline.max(body).max(sentiment))
}

pub fn inflation(pct: f64) -> f64 {
    (pct / 10.0).clamp(0.0, 1.0)
}

pub fn gdp_growth(pct: f64) -> f64 {
    1.0 - (pct / 10.0).clamp(0.0, 1.0)
}

pub fn trade_openness(pct_gdp: f64) -> f64 {
    1.0 - (pct_gdp / 100.0).clamp(0.0, 1.0)
}

pub fn logistics(index: f64) -> f64 {
    1.0 - (index / 5.0).clamp(0.0, 1.0)
}

/// Mean of the indicator risks that are present. No indicators reads as zero;
/// the adapter rejects such payloads before this is called.
pub fn economic(report: &EconomicReport) -> Severity {
    let risks: Vec<f64> = [
        report.inflation_pct.map(inflation),
        report.gdp_growth_pct.map(gdp_growth),
        report.trade_pct_gdp.map(trade_openness),
        report.logistics_index.map(logistics),
    ]
    .into_iter()
    .flatten()
    .collect();

    if risks.is_empty() {
        return Severity::NONE;
    }
    Severity::clamped(risks.iter().sum::<f64>() / risks.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;

    use crate::payload::{ForecastDay, WeatherAlert};

    fn calm() -> WeatherReport {
        WeatherReport {
            observed_at: Utc::now(),
            wind_speed_kph: 5.0,
            precipitation_mm: None,
            temperature_c: Some(20.0),
            condition: None,
            alerts: Vec::new(),
            forecast: Vec::new(),
        }
    }

    fn day(condition: &str, max: f64, min: f64) -> ForecastDay {
        ForecastDay {
            condition: condition.to_string(),
            temp_max_c: Some(max),
            temp_min_c: Some(min),
        }
    }

    fn with_forecast(days: Vec<ForecastDay>) -> WeatherReport {
        WeatherReport { forecast: days, ..calm() }
    }

    fn article(title: &str, description: Option<&str>) -> NewsReport {
        NewsReport {
            title: title.to_string(),
            published_at: Utc::now(),
            description: description.map(str::to_string),
            source: None,
            url: None,
            sentiment: None,
        }
    }

    #[test]
    fn calm_weather_is_baseline() {
        assert_eq!(weather(&calm()).value(), BASELINE_CONDITION);
    }

    #[test]
    fn extreme_alert_saturates() {
        let mut report = calm();
        report.alerts.push(WeatherAlert {
            event: "Typhoon warning".to_string(),
            severity: Some("Extreme".to_string()),
            description: None,
        });
        assert_eq!(weather(&report).value(), 1.0);
    }

    #[test]
    fn forecast_conditions_map_to_fixed_levels() {
        let clear = || day("Clear", 24.0, 14.0);
        let later = |d: ForecastDay| with_forecast(vec![clear(), clear(), clear(), d]);

        assert_eq!(weather(&later(day("Thunderstorm", 24.0, 14.0))).value(), 0.9);
        assert_eq!(weather(&later(day("Tornado", 24.0, 14.0))).value(), 0.9);
        assert_eq!(weather(&later(day("Rain", 24.0, 14.0))).value(), 0.6);
        assert_eq!(weather(&later(day("snow", 24.0, 14.0))).value(), 0.6);
        assert_eq!(weather(&later(clear())).value(), BASELINE_CONDITION);
    }

    #[test]
    fn forecast_beyond_five_days_is_ignored() {
        let mut days = vec![day("Clear", 24.0, 14.0); 5];
        days.push(day("Hurricane", 24.0, 14.0));
        assert_eq!(weather(&with_forecast(days)).value(), BASELINE_CONDITION);
    }

    #[test]
    fn three_day_outlook_flags_storms_and_temperature_extremes() {
        let storm = with_forecast(vec![day("Clear", 24.0, 14.0), day("Hurricane", 24.0, 14.0)]);
        let heat = with_forecast(vec![day("Clear", 38.0, 26.0)]);
        let frost = with_forecast(vec![day("Clear", 24.0, 14.0), day("Clear", 3.0, -4.0)]);
        let rain = with_forecast(vec![day("Rain", 24.0, 14.0)]);
        let late_heat = with_forecast(vec![
            day("Clear", 24.0, 14.0),
            day("Clear", 24.0, 14.0),
            day("Clear", 24.0, 14.0),
            day("Clear", 40.0, 28.0),
        ]);

        for report in [&storm, &heat, &frost] {
            assert!(extreme_outlook(report));
            assert_eq!(weather(report).value(), 1.0);
        }
        assert!(!extreme_outlook(&rain));
        assert!(!extreme_outlook(&late_heat));
        assert_eq!(weather(&late_heat).value(), BASELINE_CONDITION);
    }

    #[test]
    fn headline_outweighs_description() {
        let headline = news(&article("Port strike halts exports", None));
        let body = news(&article("Quarterly update", Some("a strike is possible")));
        assert_eq!(headline.value(), 0.7);
        assert!((body.value() - 0.7 * DESCRIPTION_DISCOUNT).abs() < 1e-12);
    }

    #[test]
    fn negative_sentiment_raises_news_severity() {
        let mut report = article("Plant tour", None);
        report.sentiment = Some(-0.9);
        assert!((news(&report).value() - 0.9).abs() < 1e-12);
    }

    #[test]
    fn economic_severity_is_mean_of_present_indicators() {
        let report = EconomicReport {
            observed_at: Utc::now(),
            inflation_pct: Some(5.0),
            gdp_growth_pct: Some(5.0),
            trade_pct_gdp: None,
            logistics_index: None,
        };
        assert!((economic(&report).value() - 0.5).abs() < 1e-12);
    }

    proptest! {
        #[test]
        fn weather_severity_is_monotonic_in_wind(a in 0.0f64..300.0, b in 0.0f64..300.0) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let mut low = calm();
            low.wind_speed_kph = lo;
            let mut high = calm();
            high.wind_speed_kph = hi;
            prop_assert!(weather(&low).value() <= weather(&high).value());
        }

        #[test]
        fn economic_severity_is_monotonic_in_inflation(a in -5.0f64..30.0, b in -5.0f64..30.0) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let report = |pct| EconomicReport {
                observed_at: Utc::now(),
                inflation_pct: Some(pct),
                gdp_growth_pct: Some(2.0),
                trade_pct_gdp: None,
                logistics_index: Some(3.0),
            };
            prop_assert!(economic(&report(lo)).value() <= economic(&report(hi)).value());
        }

        #[test]
        fn temperature_severity_is_bounded(c in -100.0f64..100.0) {
            let s = temperature(c);
            prop_assert!((0.0..=1.0).contains(&s));
        }
    }
}

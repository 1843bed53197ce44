//! Runtime configuration.
//!
//! Loaded from a JSON file named by `RISKWATCH_CONFIG` (built-in defaults when
//! unset), then overridden by `RISKWATCH_*` environment variables:
//!
//! - `RISKWATCH_WATCH_THRESHOLD`, `RISKWATCH_ALERT_THRESHOLD`
//! - `RISKWATCH_HYSTERESIS_COUNT`
//! - `RISKWATCH_LOOKBACK_WINDOW` (seconds)
//! - `RISKWATCH_POLL_INTERVAL_SECS`
//! - `RISKWATCH_MAX_CONCURRENT_SUPPLIERS`
//! - `RISKWATCH_HISTORY_LIMIT`
//! - `RISKWATCH_WEBHOOK_URL`
//! - `RISKWATCH_BIND_ADDR`
//! - `RISKWATCH_DATA_DIR`
//!
//! API keys are only ever read from the environment:
//! `RISKWATCH_WEATHER_API_KEY`, `RISKWATCH_NEWS_API_KEY`,
//! `RISKWATCH_ECONOMIC_API_KEY`.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use riskwatch_core::{RetryPolicy, Supplier, SupplierId, SupplierLocation};
use riskwatch_monitor::{AlertPolicy, DEFAULT_HISTORY_LIMIT};
use riskwatch_scoring::{CategoryDefaults, CategoryWeights, FeatureExtractor, WindowAggregation};
use riskwatch_signals::SourceKind;

pub const CONFIG_PATH_VAR: &str = "RISKWATCH_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid value for {var}: {value:?}")]
    Env { var: &'static str, value: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// A monitored site as written in the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteConfig {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub country_code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplierConfig {
    pub id: SupplierId,
    pub name: String,
    #[serde(default = "default_tier")]
    pub tier: u8,
    pub location: SiteConfig,
}

fn default_tier() -> u8 {
    1
}

impl SupplierConfig {
    pub fn to_supplier(&self) -> Result<Supplier, ConfigError> {
        let location = SupplierLocation {
            supplier_id: self.id,
            name: self.location.name.clone(),
            latitude: self.location.latitude,
            longitude: self.location.longitude,
            country_code: self.location.country_code.clone(),
        };
        Supplier::new(self.id, self.name.clone(), location)
            .map(|s| s.with_tier(self.tier))
            .map_err(|e| ConfigError::Invalid(format!("supplier {}: {e}", self.name)))
    }
}

/// Endpoint of one external source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceEndpoint {
    pub url: String,
    /// Name of the query parameter carrying the API key.
    #[serde(default = "default_key_param")]
    pub key_param: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_key_param() -> String {
    "apikey".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default)]
    pub weather: Option<SourceEndpoint>,
    #[serde(default)]
    pub news: Option<SourceEndpoint>,
    #[serde(default)]
    pub economic: Option<SourceEndpoint>,
}

impl SourcesConfig {
    pub fn endpoint(&self, kind: SourceKind) -> Option<&SourceEndpoint> {
        match kind {
            SourceKind::Weather => self.weather.as_ref(),
            SourceKind::News => self.news.as_ref(),
            SourceKind::Economic => self.economic.as_ref(),
        }
    }
}

/// API keys, never part of the config file.
#[derive(Clone, Default, PartialEq)]
pub struct ApiKeys {
    pub weather: Option<String>,
    pub news: Option<String>,
    pub economic: Option<String>,
}

impl ApiKeys {
    pub fn get(&self, kind: SourceKind) -> Option<&str> {
        match kind {
            SourceKind::Weather => self.weather.as_deref(),
            SourceKind::News => self.news.as_deref(),
            SourceKind::Economic => self.economic.as_deref(),
        }
    }
}

impl core::fmt::Debug for ApiKeys {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mask = |k: &Option<String>| if k.is_some() { "<set>" } else { "<unset>" };
        f.debug_struct("ApiKeys")
            .field("weather", &mask(&self.weather))
            .field("news", &mask(&self.news))
            .field("economic", &mask(&self.economic))
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskwatchConfig {
    pub watch_threshold: f64,
    pub alert_threshold: f64,
    pub hysteresis_count: u32,
    /// Seconds.
    pub lookback_window: u64,
    pub category_weights: BTreeMap<SourceKind, f64>,
    pub category_defaults: BTreeMap<SourceKind, f64>,
    pub window_aggregation: WindowAggregation,
    pub history_limit: usize,
    pub poll_interval_secs: u64,
    pub max_concurrent_suppliers: usize,
    /// Seconds of signals kept in the signal log.
    pub signal_retention_secs: u64,
    pub retry: RetryPolicy,
    pub suppliers: Vec<SupplierConfig>,
    pub sources: SourcesConfig,
    pub webhook_url: Option<String>,
    pub bind_addr: String,
    /// Directory for persisted trends; in-memory when unset.
    pub data_dir: Option<PathBuf>,
    #[serde(skip)]
    pub api_keys: ApiKeys,
}

impl Default for RiskwatchConfig {
    fn default() -> Self {
        Self {
            watch_threshold: 0.5,
            alert_threshold: 0.8,
            hysteresis_count: 3,
            lookback_window: 7 * 24 * 3600,
            category_weights: CategoryWeights::default().as_map().clone(),
            category_defaults: BTreeMap::new(),
            window_aggregation: WindowAggregation::Max,
            history_limit: DEFAULT_HISTORY_LIMIT,
            poll_interval_secs: 300,
            max_concurrent_suppliers: 4,
            signal_retention_secs: 30 * 24 * 3600,
            retry: RetryPolicy::default(),
            suppliers: Vec::new(),
            sources: SourcesConfig::default(),
            webhook_url: None,
            bind_addr: "0.0.0.0:8080".to_string(),
            data_dir: None,
            api_keys: ApiKeys::default(),
        }
    }
}

impl RiskwatchConfig {
    /// Load from `RISKWATCH_CONFIG` and the process environment, then validate.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(|var| std::env::var(var).ok())
    }

    /// Same as [`RiskwatchConfig::load`] with an injectable variable lookup.
    pub fn load_with(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut cfg = match lookup(CONFIG_PATH_VAR) {
            Some(path) => Self::from_file(PathBuf::from(path))?,
            None => Self::default(),
        };
        cfg.apply_env(&lookup)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_file(path: PathBuf) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read { path, source })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    fn apply_env(&mut self, lookup: &impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        override_parsed(lookup, "RISKWATCH_WATCH_THRESHOLD", &mut self.watch_threshold)?;
        override_parsed(lookup, "RISKWATCH_ALERT_THRESHOLD", &mut self.alert_threshold)?;
        override_parsed(lookup, "RISKWATCH_HYSTERESIS_COUNT", &mut self.hysteresis_count)?;
        override_parsed(lookup, "RISKWATCH_LOOKBACK_WINDOW", &mut self.lookback_window)?;
        override_parsed(lookup, "RISKWATCH_POLL_INTERVAL_SECS", &mut self.poll_interval_secs)?;
        override_parsed(
            lookup,
            "RISKWATCH_MAX_CONCURRENT_SUPPLIERS",
            &mut self.max_concurrent_suppliers,
        )?;
        override_parsed(lookup, "RISKWATCH_HISTORY_LIMIT", &mut self.history_limit)?;

        if let Some(url) = lookup("RISKWATCH_WEBHOOK_URL") {
            self.webhook_url = Some(url).filter(|u| !u.trim().is_empty());
        }
        if let Some(addr) = lookup("RISKWATCH_BIND_ADDR") {
            self.bind_addr = addr;
        }
        if let Some(dir) = lookup("RISKWATCH_DATA_DIR") {
            self.data_dir = Some(PathBuf::from(dir));
        }

        self.api_keys = ApiKeys {
            weather: lookup("RISKWATCH_WEATHER_API_KEY"),
            news: lookup("RISKWATCH_NEWS_API_KEY"),
            economic: lookup("RISKWATCH_ECONOMIC_API_KEY"),
        };
        Ok(())
    }

    /// Check every derived domain value can be built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.alert_policy()?;
        self.weights()?;
        self.extractor()?;
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid("poll_interval_secs must be positive".to_string()));
        }
        if self.max_concurrent_suppliers == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrent_suppliers must be at least 1".to_string(),
            ));
        }
        if self.history_limit == 0 {
            return Err(ConfigError::Invalid("history_limit must be at least 1".to_string()));
        }
        if self.signal_retention_secs < self.lookback_window {
            return Err(ConfigError::Invalid(
                "signal_retention_secs must cover the lookback window".to_string(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for s in &self.suppliers {
            if !seen.insert(s.id) {
                return Err(ConfigError::Invalid(format!("duplicate supplier id {}", s.id)));
            }
            s.to_supplier()?;
        }
        Ok(())
    }

    pub fn alert_policy(&self) -> Result<AlertPolicy, ConfigError> {
        AlertPolicy::new(self.watch_threshold, self.alert_threshold, self.hysteresis_count)
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    pub fn weights(&self) -> Result<CategoryWeights, ConfigError> {
        CategoryWeights::new(self.category_weights.clone()).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    pub fn extractor(&self) -> Result<FeatureExtractor, ConfigError> {
        if self.lookback_window == 0 {
            return Err(ConfigError::Invalid("lookback_window must be positive".to_string()));
        }
        let lookback = i64::try_from(self.lookback_window)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .ok_or_else(|| ConfigError::Invalid("lookback_window is too large".to_string()))?;
        let defaults = CategoryDefaults::new(self.category_defaults.clone())
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        FeatureExtractor::new(lookback, defaults, self.window_aggregation)
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    pub fn suppliers(&self) -> Result<Vec<Supplier>, ConfigError> {
        self.suppliers.iter().map(SupplierConfig::to_supplier).collect()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn signal_retention(&self) -> chrono::Duration {
        i64::try_from(self.signal_retention_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or_else(|| chrono::Duration::weeks(52 * 100))
    }
}

fn override_parsed<T: core::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    slot: &mut T,
) -> Result<(), ConfigError> {
    if let Some(value) = lookup(var) {
        *slot = value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Env { var, value })?;
    }
    Ok(())
}

//! External source clients.
//!
//! Clients are built from configuration and handed to the collector; there are
//! no process-wide client singletons.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use serde_json::Value as JsonValue;
use thiserror::Error;

use riskwatch_core::{RetryPolicy, SupplierId, SupplierLocation};
use riskwatch_signals::SourceKind;

use crate::config::SourceEndpoint;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("{kind} source unreachable: {reason}")]
    Transport { kind: SourceKind, reason: String },

    #[error("{kind} source answered with status {status}")]
    Status { kind: SourceKind, status: u16 },

    #[error("{kind} source returned an undecodable body: {reason}")]
    Decode { kind: SourceKind, reason: String },

    #[error("{kind} source client misconfigured: {reason}")]
    Config { kind: SourceKind, reason: String },
}

impl FetchError {
    /// Network failures, throttling and server errors may succeed on retry.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Transport { .. } => true,
            FetchError::Status { status, .. } => *status >= 500 || *status == 429,
            FetchError::Decode { .. } | FetchError::Config { .. } => false,
        }
    }

    pub fn kind(&self) -> SourceKind {
        match self {
            FetchError::Transport { kind, .. }
            | FetchError::Status { kind, .. }
            | FetchError::Decode { kind, .. }
            | FetchError::Config { kind, .. } => *kind,
        }
    }
}

/// Fetches raw payloads of one source kind for a supplier location.
pub trait SourceClient: Send + Sync {
    fn kind(&self) -> SourceKind;

    fn fetch(&self, location: &SupplierLocation) -> Result<Vec<JsonValue>, FetchError>;
}

/// Fetch with bounded exponential backoff. Non-retriable failures return at once.
pub fn fetch_with_retry(
    client: &dyn SourceClient,
    location: &SupplierLocation,
    retry: &RetryPolicy,
) -> Result<Vec<JsonValue>, FetchError> {
    retry
        .run(
            |attempt| {
                client.fetch(location).inspect_err(|e| {
                    tracing::debug!(
                        supplier = %location.supplier_id,
                        source = ?client.kind(),
                        attempt,
                        error = %e,
                        "source fetch attempt failed"
                    );
                })
            },
            FetchError::is_transient,
        )
        .map_err(|exhausted| exhausted.last_error)
}

/// HTTP JSON source.
///
/// Sends `GET {url}?lat=..&lon=..&q=<site name>&country=<code>&<key_param>=<key>`
/// and accepts either a single payload object, an array of payloads, or an
/// object with an `items` array.
#[derive(Debug)]
pub struct HttpSourceClient {
    kind: SourceKind,
    url: String,
    key_param: String,
    api_key: Option<String>,
    http: reqwest::blocking::Client,
}

impl HttpSourceClient {
    pub fn new(kind: SourceKind, endpoint: &SourceEndpoint, api_key: Option<String>) -> Result<Self, FetchError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(endpoint.timeout_secs.max(1)))
            .build()
            .map_err(|e| FetchError::Config {
                kind,
                reason: e.to_string(),
            })?;
        Ok(Self {
            kind,
            url: endpoint.url.clone(),
            key_param: endpoint.key_param.clone(),
            api_key,
            http,
        })
    }
}

impl SourceClient for HttpSourceClient {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn fetch(&self, location: &SupplierLocation) -> Result<Vec<JsonValue>, FetchError> {
        let mut query: Vec<(&str, String)> = vec![
            ("lat", location.latitude.to_string()),
            ("lon", location.longitude.to_string()),
            ("q", location.name.clone()),
            ("country", location.country_code.clone()),
        ];
        if let Some(key) = &self.api_key {
            query.push((self.key_param.as_str(), key.clone()));
        }

        let response = self
            .http
            .get(&self.url)
            .query(&query)
            .send()
            .map_err(|e| FetchError::Transport {
                kind: self.kind,
                reason: e.without_url().to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                kind: self.kind,
                status: status.as_u16(),
            });
        }

        let body: JsonValue = response.json().map_err(|e| FetchError::Decode {
            kind: self.kind,
            reason: e.without_url().to_string(),
        })?;
        unwrap_payloads(self.kind, body)
    }
}

fn unwrap_payloads(kind: SourceKind, body: JsonValue) -> Result<Vec<JsonValue>, FetchError> {
    match body {
        JsonValue::Array(items) => Ok(items),
        JsonValue::Object(mut map) => match map.remove("items") {
            Some(JsonValue::Array(items)) => Ok(items),
            Some(_) => Err(FetchError::Decode {
                kind,
                reason: "`items` must be an array".to_string(),
            }),
            None => Ok(vec![JsonValue::Object(map)]),
        },
        _ => Err(FetchError::Decode {
            kind,
            reason: "expected a JSON object or array".to_string(),
        }),
    }
}

/// Fixed payloads per supplier, for tests, demos and replay.
#[derive(Debug)]
pub struct StaticSourceClient {
    kind: SourceKind,
    payloads: Mutex<HashMap<SupplierId, Vec<JsonValue>>>,
}

impl StaticSourceClient {
    pub fn new(kind: SourceKind) -> Self {
        Self {
            kind,
            payloads: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_payload(self, supplier_id: SupplierId, payload: JsonValue) -> Self {
        self.set(supplier_id, vec![payload]);
        self
    }

    /// Replace what the next fetches for `supplier_id` return.
    pub fn set(&self, supplier_id: SupplierId, payloads: Vec<JsonValue>) {
        if let Ok(mut map) = self.payloads.lock() {
            map.insert(supplier_id, payloads);
        }
    }
}

impl SourceClient for StaticSourceClient {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn fetch(&self, location: &SupplierLocation) -> Result<Vec<JsonValue>, FetchError> {
        let map = self.payloads.lock().map_err(|_| FetchError::Config {
            kind: self.kind,
            reason: "payload table lock poisoned".to_string(),
        })?;
        Ok(map.get(&location.supplier_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn location() -> SupplierLocation {
        SupplierLocation {
            supplier_id: SupplierId::new(),
            name: "Penang, Malaysia".to_string(),
            latitude: 5.4164,
            longitude: 100.3327,
            country_code: "MYS".to_string(),
        }
    }

    struct Scripted {
        calls: AtomicU32,
        fail_with: FetchError,
        failures: u32,
    }

    impl SourceClient for Scripted {
        fn kind(&self) -> SourceKind {
            SourceKind::News
        }

        fn fetch(&self, _: &SupplierLocation) -> Result<Vec<JsonValue>, FetchError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(self.fail_with.clone())
            } else {
                Ok(vec![json!({ "ok": true })])
            }
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy::fixed(3, Duration::ZERO)
    }

    #[test]
    fn transient_failures_are_retried() {
        let client = Scripted {
            calls: AtomicU32::new(0),
            fail_with: FetchError::Status {
                kind: SourceKind::News,
                status: 503,
            },
            failures: 2,
        };
        let out = fetch_with_retry(&client, &location(), &fast_retry()).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(client.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn client_errors_stop_early() {
        let client = Scripted {
            calls: AtomicU32::new(0),
            fail_with: FetchError::Status {
                kind: SourceKind::News,
                status: 401,
            },
            failures: 10,
        };
        let err = fetch_with_retry(&client, &location(), &fast_retry()).unwrap_err();
        assert_eq!(err, FetchError::Status { kind: SourceKind::News, status: 401 });
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn retry_budget_is_bounded() {
        let client = Scripted {
            calls: AtomicU32::new(0),
            fail_with: FetchError::Transport {
                kind: SourceKind::News,
                reason: "connection reset".to_string(),
            },
            failures: 100,
        };
        assert!(fetch_with_retry(&client, &location(), &fast_retry()).is_err());
        assert_eq!(client.calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn response_shapes_are_unwrapped() {
        let k = SourceKind::Weather;
        assert_eq!(unwrap_payloads(k, json!([{ "a": 1 }, { "a": 2 }])).unwrap().len(), 2);
        assert_eq!(unwrap_payloads(k, json!({ "items": [{ "a": 1 }] })).unwrap().len(), 1);
        assert_eq!(unwrap_payloads(k, json!({ "a": 1 })).unwrap(), vec![json!({ "a": 1 })]);
        assert!(unwrap_payloads(k, json!("nope")).is_err());
    }

    #[test]
    fn static_client_serves_per_supplier_payloads() {
        let loc = location();
        let client = StaticSourceClient::new(SourceKind::Economic)
            .with_payload(loc.supplier_id, json!({ "observed_at": "2026-10-01T00:00:00Z", "inflation_pct": 4.0 }));
        assert_eq!(client.fetch(&loc).unwrap().len(), 1);
        assert!(client.fetch(&location()).unwrap().is_empty());
    }
}

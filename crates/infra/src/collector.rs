//! Runs every configured source for a supplier and normalizes what comes back.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use riskwatch_core::{RetryPolicy, SupplierLocation};
use riskwatch_signals::{Signal, SignalError, SourceKind, normalize};

use crate::external::{FetchError, SourceClient, fetch_with_retry};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CollectionFailure {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Payload(#[from] SignalError),
}

impl CollectionFailure {
    pub fn kind(&self) -> SourceKind {
        match self {
            CollectionFailure::Fetch(e) => e.kind(),
            CollectionFailure::Payload(e) => e.kind(),
        }
    }
}

/// What one collection pass produced for one supplier.
#[derive(Debug, Clone, Default)]
pub struct CollectionReport {
    pub signals: Vec<Signal>,
    pub failures: Vec<CollectionFailure>,
    /// Items older than their source's recency window, dropped unlogged.
    pub stale: usize,
}

impl CollectionReport {
    /// Sources that produced nothing usable.
    pub fn failed_sources(&self) -> Vec<SourceKind> {
        let mut kinds: Vec<_> = self
            .failures
            .iter()
            .filter(|f| matches!(f, CollectionFailure::Fetch(_)))
            .map(CollectionFailure::kind)
            .collect();
        kinds.sort();
        kinds.dedup();
        kinds
    }
}

/// News and disaster feeds only count for a week after publication.
pub const NEWS_RECENCY_DAYS: i64 = 7;

pub struct SignalCollector {
    clients: Vec<Arc<dyn SourceClient>>,
    retry: RetryPolicy,
    recency: HashMap<SourceKind, Duration>,
}

impl SignalCollector {
    pub fn new(clients: Vec<Arc<dyn SourceClient>>, retry: RetryPolicy) -> Self {
        Self {
            clients,
            retry,
            recency: HashMap::from([(SourceKind::News, Duration::days(NEWS_RECENCY_DAYS))]),
        }
    }

    /// Drop `kind` items observed more than `max_age` before collection; `None` keeps all.
    pub fn with_recency(mut self, kind: SourceKind, max_age: Option<Duration>) -> Self {
        match max_age {
            Some(age) => self.recency.insert(kind, age),
            None => self.recency.remove(&kind),
        };
        self
    }

    pub fn sources(&self) -> Vec<SourceKind> {
        self.clients.iter().map(|c| c.kind()).collect()
    }

    pub fn collect(&self, location: &SupplierLocation) -> CollectionReport {
        self.collect_at(location, Utc::now())
    }

    /// One source failing, or one payload being malformed, never stops the rest.
    pub fn collect_at(&self, location: &SupplierLocation, now: DateTime<Utc>) -> CollectionReport {
        let mut report = CollectionReport::default();

        for client in &self.clients {
            let kind = client.kind();
            let oldest = self.recency.get(&kind).map(|age| now - *age);
            let payloads = match fetch_with_retry(client.as_ref(), location, &self.retry) {
                Ok(p) => p,
                Err(e) => {
                    tracing::warn!(supplier = %location.supplier_id, source = ?kind, error = %e, "source fetch failed");
                    report.failures.push(e.into());
                    continue;
                }
            };

            for raw in &payloads {
                match normalize(raw, kind, location) {
                    Ok(signal) if oldest.is_some_and(|t| signal.observed_at() < t) => {
                        tracing::debug!(supplier = %location.supplier_id, source = ?kind, observed_at = %signal.observed_at(), "stale item dropped");
                        report.stale += 1;
                    }
                    Ok(signal) => report.signals.push(signal),
                    Err(e) => {
                        tracing::warn!(supplier = %location.supplier_id, source = ?kind, error = %e, "malformed payload skipped");
                        report.failures.push(e.into());
                    }
                }
            }
        }

        report
    }
}

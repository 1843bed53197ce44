//! Append-only per-supplier signal log.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use riskwatch_core::SupplierId;
use riskwatch_signals::Signal;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignalLogError {
    /// A writer panicked while holding the log; its contents can no longer be trusted.
    #[error("signal log lock poisoned")]
    Poisoned,
}

type Entries = HashMap<SupplierId, Vec<Signal>>;

/// Signals are never modified once appended; only retention removes them.
///
/// Appending a signal identical to one already logged is a no-op, so sources
/// that keep reporting the same observation do not inflate the window.
#[derive(Debug)]
pub struct SignalLog {
    inner: RwLock<Entries>,
    retention: Duration,
}

impl SignalLog {
    pub fn new(retention: Duration) -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
            retention,
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Entries>, SignalLogError> {
        self.inner.read().map_err(|_| SignalLogError::Poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Entries>, SignalLogError> {
        self.inner.write().map_err(|_| SignalLogError::Poisoned)
    }

    /// Returns whether the signal was new.
    pub fn append(&self, signal: Signal) -> Result<bool, SignalLogError> {
        let mut map = self.write()?;
        let entries = map.entry(signal.supplier_id()).or_default();
        if entries.contains(&signal) {
            return Ok(false);
        }
        entries.push(signal);
        Ok(true)
    }

    /// Returns how many signals were new.
    pub fn append_all(&self, signals: impl IntoIterator<Item = Signal>) -> Result<usize, SignalLogError> {
        let mut fresh = 0;
        for signal in signals {
            if self.append(signal)? {
                fresh += 1;
            }
        }
        Ok(fresh)
    }

    /// Every signal for `supplier_id` observed at or before `as_of`, oldest first.
    pub fn snapshot(&self, supplier_id: SupplierId, as_of: DateTime<Utc>) -> Result<Vec<Signal>, SignalLogError> {
        let map = self.read()?;
        let mut out: Vec<Signal> = map
            .get(&supplier_id)
            .map(|v| v.iter().filter(|s| s.observed_at() <= as_of).cloned().collect())
            .unwrap_or_default();
        out.sort_by_key(|s| s.observed_at());
        Ok(out)
    }

    pub fn len(&self, supplier_id: SupplierId) -> Result<usize, SignalLogError> {
        Ok(self.read()?.get(&supplier_id).map_or(0, Vec::len))
    }

    /// Drop signals older than the retention period. Returns how many were removed.
    pub fn prune(&self, now: DateTime<Utc>) -> Result<usize, SignalLogError> {
        let cutoff = now - self.retention;
        let mut map = self.write()?;
        let mut removed = 0;
        for entries in map.values_mut() {
            let before = entries.len();
            entries.retain(|s| s.observed_at() > cutoff);
            removed += before - entries.len();
        }
        map.retain(|_, v| !v.is_empty());
        Ok(removed)
    }

    /// Poison the lock the way a panicking writer would.
    #[cfg(test)]
    pub(crate) fn poison(&self) {
        std::thread::scope(|s| {
            let _ = s
                .spawn(|| {
                    let _guard = self.inner.write();
                    panic!("writer died");
                })
                .join();
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use riskwatch_core::SupplierLocation;
    use riskwatch_signals::{SourceKind, normalize};
    use serde_json::json;

    fn location(supplier_id: SupplierId) -> SupplierLocation {
        SupplierLocation {
            supplier_id,
            name: "Monterrey, Mexico".to_string(),
            latitude: 25.6866,
            longitude: -100.3161,
            country_code: "MEX".to_string(),
        }
    }

    fn weather(supplier_id: SupplierId, at: &str, wind: f64) -> Signal {
        normalize(
            &json!({ "observed_at": at, "wind_speed_kph": wind }),
            SourceKind::Weather,
            &location(supplier_id),
        )
        .unwrap()
    }

    #[test]
    fn duplicates_are_ignored() {
        let log = SignalLog::new(Duration::days(30));
        let id = SupplierId::new();
        let s = weather(id, "2026-10-01T00:00:00Z", 40.0);

        assert!(log.append(s.clone()).unwrap());
        assert!(!log.append(s).unwrap());
        assert_eq!(log.len(id).unwrap(), 1);
    }

    #[test]
    fn snapshot_is_ordered_and_bounded_by_as_of() {
        let log = SignalLog::new(Duration::days(30));
        let id = SupplierId::new();
        log.append_all([
            weather(id, "2026-10-03T00:00:00Z", 30.0),
            weather(id, "2026-10-01T00:00:00Z", 50.0),
            weather(id, "2026-10-09T00:00:00Z", 70.0),
        ])
        .unwrap();

        let as_of = "2026-10-05T00:00:00Z".parse().unwrap();
        let snap = log.snapshot(id, as_of).unwrap();
        assert_eq!(snap.len(), 2);
        assert!(snap[0].observed_at() < snap[1].observed_at());
    }

    #[test]
    fn prune_drops_expired_signals() {
        let log = SignalLog::new(Duration::days(7));
        let id = SupplierId::new();
        log.append_all([
            weather(id, "2026-09-01T00:00:00Z", 30.0),
            weather(id, "2026-10-09T00:00:00Z", 30.0),
        ])
        .unwrap();

        let removed = log.prune("2026-10-10T00:00:00Z".parse().unwrap()).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(log.len(id).unwrap(), 1);
    }

    #[test]
    fn poisoned_log_reports_errors_instead_of_empty_results() {
        let log = SignalLog::new(Duration::days(30));
        let id = SupplierId::new();
        log.append(weather(id, "2026-10-01T00:00:00Z", 60.0)).unwrap();
        log.poison();

        let fresh = weather(id, "2026-10-02T00:00:00Z", 80.0);
        assert_eq!(log.append(fresh), Err(SignalLogError::Poisoned));
        assert_eq!(
            log.snapshot(id, "2026-10-05T00:00:00Z".parse().unwrap()),
            Err(SignalLogError::Poisoned)
        );
        assert_eq!(log.prune(Utc::now()), Err(SignalLogError::Poisoned));
    }
}

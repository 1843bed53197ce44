//! File-backed trend store: one JSON document per supplier.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use uuid::Uuid;

use riskwatch_core::SupplierId;
use riskwatch_monitor::{RiskTrend, TrendStore, TrendStoreError};

/// Stores each trend at `<dir>/<supplier_id>.json`.
///
/// Saves go through a temporary file in the same directory followed by a
/// rename, so a crash mid-write leaves the previous version intact.
#[derive(Debug, Clone)]
pub struct JsonFileTrendStore {
    dir: PathBuf,
}

impl JsonFileTrendStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, TrendStoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| unavailable(&dir, e))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, supplier_id: SupplierId) -> PathBuf {
        self.dir.join(format!("{supplier_id}.json"))
    }
}

fn unavailable(path: &Path, e: io::Error) -> TrendStoreError {
    TrendStoreError::Unavailable(format!("{}: {e}", path.display()))
}

impl TrendStore for JsonFileTrendStore {
    fn load(&self, supplier_id: SupplierId) -> Result<Option<RiskTrend>, TrendStoreError> {
        let path = self.path_for(supplier_id);
        let bytes = match fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(unavailable(&path, e)),
        };

        let trend: RiskTrend = serde_json::from_slice(&bytes).map_err(|e| TrendStoreError::Corrupt {
            supplier_id,
            reason: e.to_string(),
        })?;
        if trend.supplier_id() != supplier_id {
            return Err(TrendStoreError::Corrupt {
                supplier_id,
                reason: format!("file holds the trend of supplier {}", trend.supplier_id()),
            });
        }
        Ok(Some(trend))
    }

    fn save(&self, trend: &RiskTrend) -> Result<(), TrendStoreError> {
        let path = self.path_for(trend.supplier_id());
        let tmp = self.dir.join(format!(".{}.{}.tmp", trend.supplier_id(), Uuid::now_v7()));

        let bytes = serde_json::to_vec(trend).map_err(|e| TrendStoreError::Corrupt {
            supplier_id: trend.supplier_id(),
            reason: e.to_string(),
        })?;

        let write = || -> io::Result<()> {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
            fs::rename(&tmp, &path)
        };
        write().map_err(|e| {
            let _ = fs::remove_file(&tmp);
            unavailable(&path, e)
        })
    }

    fn suppliers(&self) -> Result<Vec<SupplierId>, TrendStoreError> {
        let entries = fs::read_dir(&self.dir).map_err(|e| unavailable(&self.dir, e))?;
        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| unavailable(&self.dir, e))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match stem.parse::<SupplierId>() {
                Ok(id) => ids.push(id),
                Err(_) => tracing::warn!(path = %path.display(), "ignoring unrecognized file in trend directory"),
            }
        }
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use riskwatch_core::Aggregate;
    use riskwatch_monitor::{AlertPolicy, RecordScore, TrendCommand, TrendState};
    use riskwatch_scoring::RiskScore;
    use riskwatch_signals::SourceKind;
    use std::collections::BTreeMap;

    fn scratch_dir() -> PathBuf {
        std::env::temp_dir().join(format!("riskwatch-trends-{}", Uuid::now_v7()))
    }

    fn score(supplier_id: SupplierId, minute: u32, value: f64) -> RiskScore {
        let mut attributions = BTreeMap::new();
        attributions.insert(SourceKind::Weather, 1.0);
        RiskScore::from_parts(
            supplier_id,
            format!("2026-10-10T00:{minute:02}:00Z").parse().unwrap(),
            value,
            attributions,
        )
        .unwrap()
    }

    fn trend_with(supplier_id: SupplierId, values: &[f64]) -> RiskTrend {
        let mut trend = RiskTrend::new(supplier_id, 100);
        let policy = AlertPolicy::default();
        for (i, v) in values.iter().enumerate() {
            trend
                .execute(&TrendCommand::RecordScore(RecordScore {
                    score: score(supplier_id, i as u32, *v),
                    policy,
                }))
                .unwrap();
        }
        trend
    }

    #[test]
    fn save_then_load_restores_the_trend() {
        let dir = scratch_dir();
        let store = JsonFileTrendStore::open(&dir).unwrap();
        let id = SupplierId::new();
        let trend = trend_with(id, &[0.9, 0.9, 0.9]);

        store.save(&trend).unwrap();
        let loaded = store.load(id).unwrap().unwrap();

        assert_eq!(loaded, trend);
        assert_eq!(loaded.state(), TrendState::Alert);
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn missing_trend_is_none_and_listing_is_sorted() {
        let dir = scratch_dir();
        let store = JsonFileTrendStore::open(&dir).unwrap();
        assert!(store.load(SupplierId::new()).unwrap().is_none());

        let mut ids: Vec<_> = (0..3).map(|_| SupplierId::new()).collect();
        for id in &ids {
            store.save(&trend_with(*id, &[0.2])).unwrap();
        }
        fs::write(dir.join("notes.txt"), b"ignored").unwrap();

        ids.sort();
        assert_eq!(store.suppliers().unwrap(), ids);
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn garbage_on_disk_is_reported_as_corrupt() {
        let dir = scratch_dir();
        let store = JsonFileTrendStore::open(&dir).unwrap();
        let id = SupplierId::new();
        fs::write(dir.join(format!("{id}.json")), b"{ not json").unwrap();

        let err = store.load(id).unwrap_err();
        assert!(matches!(err, TrendStoreError::Corrupt { supplier_id, .. } if supplier_id == id));
        assert!(!err.is_transient());
        let _ = fs::remove_dir_all(dir);
    }
}

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use thiserror::Error;

use riskwatch_core::SupplierId;

use crate::trend::RiskTrend;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TrendStoreError {
    /// Storage could not be reached or written; a retry may succeed.
    #[error("trend storage unavailable: {0}")]
    Unavailable(String),

    /// A stored record could not be decoded.
    #[error("stored trend for supplier {supplier_id} is corrupt: {reason}")]
    Corrupt { supplier_id: SupplierId, reason: String },

    #[error("trend store lock poisoned")]
    Poisoned,
}

impl TrendStoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, TrendStoreError::Unavailable(_))
    }
}

/// Durable home of every supplier's [`RiskTrend`].
///
/// `save` replaces the whole record; implementations must make it atomic so
/// a reader never sees a half-written trend.
pub trait TrendStore: Send + Sync {
    fn load(&self, supplier_id: SupplierId) -> Result<Option<RiskTrend>, TrendStoreError>;

    fn save(&self, trend: &RiskTrend) -> Result<(), TrendStoreError>;

    fn suppliers(&self) -> Result<Vec<SupplierId>, TrendStoreError>;
}

impl<S> TrendStore for Arc<S>
where
    S: TrendStore + ?Sized,
{
    fn load(&self, supplier_id: SupplierId) -> Result<Option<RiskTrend>, TrendStoreError> {
        (**self).load(supplier_id)
    }

    fn save(&self, trend: &RiskTrend) -> Result<(), TrendStoreError> {
        (**self).save(trend)
    }

    fn suppliers(&self) -> Result<Vec<SupplierId>, TrendStoreError> {
        (**self).suppliers()
    }
}

/// In-memory trend store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryTrendStore {
    inner: RwLock<HashMap<SupplierId, RiskTrend>>,
}

impl InMemoryTrendStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TrendStore for InMemoryTrendStore {
    fn load(&self, supplier_id: SupplierId) -> Result<Option<RiskTrend>, TrendStoreError> {
        let map = self.inner.read().map_err(|_| TrendStoreError::Poisoned)?;
        Ok(map.get(&supplier_id).cloned())
    }

    fn save(&self, trend: &RiskTrend) -> Result<(), TrendStoreError> {
        let mut map = self.inner.write().map_err(|_| TrendStoreError::Poisoned)?;
        map.insert(trend.supplier_id(), trend.clone());
        Ok(())
    }

    fn suppliers(&self) -> Result<Vec<SupplierId>, TrendStoreError> {
        let map = self.inner.read().map_err(|_| TrendStoreError::Poisoned)?;
        let mut ids: Vec<_> = map.keys().copied().collect();
        ids.sort();
        Ok(ids)
    }
}

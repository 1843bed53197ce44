use riskwatch_core::SupplierId;

use crate::assessment::RiskAssessment;
use crate::job::ScoringJob;
use crate::result::ScoringError;

/// Which suppliers a scheduler accepts jobs for.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SupplierScope {
    Any,
    Supplier(SupplierId),
}

impl SupplierScope {
    pub fn allows(&self, supplier_id: SupplierId) -> bool {
        match self {
            SupplierScope::Any => true,
            SupplierScope::Supplier(s) => *s == supplier_id,
        }
    }
}

pub trait ScoringScheduler: Send + Sync + 'static {
    fn scope(&self) -> SupplierScope;

    fn run<J: ScoringJob>(&self, job: J) -> Result<RiskAssessment, ScoringError> {
        if !self.scope().allows(job.supplier_id()) {
            return Err(ScoringError::InvalidInput(format!(
                "supplier {} is outside this scheduler's scope",
                job.supplier_id()
            )));
        }
        job.run()
    }
}

/// Runs jobs immediately on the calling thread.
#[derive(Debug, Copy, Clone)]
pub struct LocalScoringScheduler {
    scope: SupplierScope,
}

impl LocalScoringScheduler {
    pub fn new(scope: SupplierScope) -> Self {
        Self { scope }
    }

    pub fn for_supplier(supplier_id: SupplierId) -> Self {
        Self::new(SupplierScope::Supplier(supplier_id))
    }
}

impl Default for LocalScoringScheduler {
    fn default() -> Self {
        Self::new(SupplierScope::Any)
    }
}

impl ScoringScheduler for LocalScoringScheduler {
    fn scope(&self) -> SupplierScope {
        self.scope
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureExtractor;
    use crate::job::{SignalWindow, SupplierRiskJob};
    use crate::weights::CategoryWeights;
    use chrono::{DateTime, Utc};
    use riskwatch_core::SupplierLocation;
    use riskwatch_signals::{SourceKind, normalize};
    use serde_json::json;

    fn job(supplier_id: SupplierId) -> SupplierRiskJob {
        let location = SupplierLocation {
            supplier_id,
            name: "Shenzhen, China".to_string(),
            latitude: 22.5431,
            longitude: 114.0579,
            country_code: "CHN".to_string(),
        };
        let as_of: DateTime<Utc> = "2026-10-10T00:00:00Z".parse().unwrap();
        let signal = normalize(
            &json!({ "observed_at": "2026-10-09T12:00:00Z", "wind_speed_kph": 110.0 }),
            SourceKind::Weather,
            &location,
        )
        .unwrap();

        SupplierRiskJob::new(
            SignalWindow {
                supplier_id,
                as_of,
                signals: vec![signal],
            },
            FeatureExtractor::default(),
            CategoryWeights::default(),
        )
    }

    #[test]
    fn scoped_scheduler_runs_own_supplier() {
        let id = SupplierId::new();
        let assessment = LocalScoringScheduler::for_supplier(id).run(job(id)).unwrap();

        // 0.35 * 0.9 + 0.35 * 0.5 + 0.30 * 0.5
        assert!((assessment.score.score() - 0.64).abs() < 1e-9);
        assert_eq!(assessment.score.supplier_id(), id);
        assert!(assessment.features.is_degraded());
    }

    #[test]
    fn scoped_scheduler_rejects_other_supplier() {
        let scheduler = LocalScoringScheduler::for_supplier(SupplierId::new());
        let err = scheduler.run(job(SupplierId::new())).unwrap_err();
        assert!(matches!(err, ScoringError::InvalidInput(_)));
    }

    #[test]
    fn any_scope_accepts_everyone() {
        assert!(LocalScoringScheduler::default().run(job(SupplierId::new())).is_ok());
    }
}

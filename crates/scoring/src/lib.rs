//! `riskwatch-scoring`
//!
//! **Responsibility:** turn a supplier's signals into a risk score with
//! per-category attribution.
//!
//! - [`FeatureExtractor`]: signals in a lookback window → fixed-length [`FeatureVector`].
//! - [`RiskScorer`]: weighted sum of features → [`RiskScore`] in `[0, 1]`.
//! - [`ScoringJob`] / [`ScoringScheduler`]: supplier-scoped execution units.
//!
//! This crate is pure computation: it never mutates trend state and performs no IO.

pub mod assessment;
pub mod features;
pub mod job;
pub mod result;
pub mod scheduler;
pub mod scorer;
pub mod weights;

pub use assessment::{RiskAssessment, RiskCategory};
pub use features::{
    CategoryDefaults, Completeness, Feature, FeatureExtractor, FeatureVector, WindowAggregation,
};
pub use job::{ScoringJob, SignalWindow, SupplierRiskJob};
pub use result::{ATTRIBUTION_TOLERANCE, RiskScore, ScoringError};
pub use scheduler::{LocalScoringScheduler, ScoringScheduler, SupplierScope};
pub use scorer::RiskScorer;
pub use weights::CategoryWeights;

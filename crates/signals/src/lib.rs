//! `riskwatch-signals`
//!
//! **Responsibility:** turn raw payloads from weather, news and economic
//! sources into immutable [`Signal`]s with a normalized severity.
//!
//! Adapters are pure: no IO, no clients. Fetching lives in `riskwatch-infra`.

pub mod adapter;
pub mod error;
pub mod payload;
pub mod severity;
pub mod signal;

pub use adapter::{EconomicAdapter, NewsAdapter, SignalAdapter, WeatherAdapter, adapter_for, normalize};
pub use error::SignalError;
pub use payload::{
    EconomicReport, ForecastDay, NewsReport, SignalPayload, WeatherAlert, WeatherReport,
};
pub use signal::{Signal, SourceKind};

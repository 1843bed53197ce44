use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use riskwatch_core::{DomainError, Severity, SupplierId};

use crate::payload::SignalPayload;

/// Which kind of external source produced a signal.
///
/// Declaration order is the feature order used by the scoring crate.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Weather,
    News,
    Economic,
}

impl SourceKind {
    pub const ALL: [SourceKind; 3] = [SourceKind::Weather, SourceKind::News, SourceKind::Economic];

    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Weather => "weather",
            SourceKind::News => "news",
            SourceKind::Economic => "economic",
        }
    }
}

impl core::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "weather" => Ok(SourceKind::Weather),
            "news" => Ok(SourceKind::News),
            "economic" => Ok(SourceKind::Economic),
            other => Err(DomainError::validation(format!(
                "unknown source kind '{other}' (expected weather, news or economic)"
            ))),
        }
    }
}

/// A normalized unit of external risk-relevant data.
///
/// Immutable once created: fields are private and only readable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    supplier_id: SupplierId,
    observed_at: DateTime<Utc>,
    payload: SignalPayload,
    severity: Severity,
}

impl Signal {
    pub(crate) fn new(
        supplier_id: SupplierId,
        observed_at: DateTime<Utc>,
        payload: SignalPayload,
        severity: Severity,
    ) -> Self {
        Self {
            supplier_id,
            observed_at,
            payload,
            severity,
        }
    }

    pub fn source_kind(&self) -> SourceKind {
        self.payload.kind()
    }

    pub fn supplier_id(&self) -> SupplierId {
        self.supplier_id
    }

    pub fn observed_at(&self) -> DateTime<Utc> {
        self.observed_at
    }

    pub fn payload(&self) -> &SignalPayload {
        &self.payload
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }
}

use thiserror::Error;

use crate::signal::SourceKind;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SignalError {
    /// A required field is absent or a value is unusable.
    #[error("invalid {kind} payload: {reason}")]
    InvalidPayload { kind: SourceKind, reason: String },
}

impl SignalError {
    pub fn invalid(kind: SourceKind, reason: impl Into<String>) -> Self {
        Self::InvalidPayload {
            kind,
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> SourceKind {
        match self {
            SignalError::InvalidPayload { kind, .. } => *kind,
        }
    }
}

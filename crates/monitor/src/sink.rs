use std::sync::{Arc, Mutex};

use thiserror::Error;

use crate::trend::AlertTransition;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AlertDeliveryError {
    /// The receiver could not be reached; a retry may succeed.
    #[error("alert transport failed: {0}")]
    Transport(String),

    /// The receiver answered but refused the alert.
    #[error("alert rejected by receiver (status {status})")]
    Rejected { status: u16 },

    #[error("alert sink lock poisoned")]
    Poisoned,
}

impl AlertDeliveryError {
    pub fn is_transient(&self) -> bool {
        match self {
            AlertDeliveryError::Transport(_) => true,
            AlertDeliveryError::Rejected { status } => *status >= 500 || *status == 429,
            AlertDeliveryError::Poisoned => false,
        }
    }
}

/// Receives every state transition after it has been persisted.
///
/// Delivery is at-least-once; receivers should key on
/// `(supplier_id, timestamp, new_state)`.
pub trait AlertSink: Send + Sync {
    fn deliver(&self, transition: &AlertTransition) -> Result<(), AlertDeliveryError>;
}

impl<S> AlertSink for Arc<S>
where
    S: AlertSink + ?Sized,
{
    fn deliver(&self, transition: &AlertTransition) -> Result<(), AlertDeliveryError> {
        (**self).deliver(transition)
    }
}

/// In-memory sink for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryAlertSink {
    inner: Mutex<Vec<AlertTransition>>,
}

impl InMemoryAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<AlertTransition> {
        self.inner.lock().map(|v| v.clone()).unwrap_or_default()
    }

    /// Only transitions that entered ALERT.
    pub fn alerts(&self) -> Vec<AlertTransition> {
        self.all().into_iter().filter(AlertTransition::is_alert).collect()
    }
}

impl AlertSink for InMemoryAlertSink {
    fn deliver(&self, transition: &AlertTransition) -> Result<(), AlertDeliveryError> {
        self.inner
            .lock()
            .map_err(|_| AlertDeliveryError::Poisoned)?
            .push(transition.clone());
        Ok(())
    }
}

use serde::{Deserialize, Serialize};

use riskwatch_core::{EventId, SupplierId};

/// Envelope for an event, carrying the supplier stream metadata.
///
/// - `sequence_number` is monotonically increasing per supplier stream (it is
///   the trend version after the event was applied).
/// - `payload` is the domain event itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: EventId,
    supplier_id: SupplierId,
    stream_type: String,
    sequence_number: u64,
    payload: E,
}

impl<E> EventEnvelope<E> {
    pub fn new(
        event_id: EventId,
        supplier_id: SupplierId,
        stream_type: impl Into<String>,
        sequence_number: u64,
        payload: E,
    ) -> Self {
        Self {
            event_id,
            supplier_id,
            stream_type: stream_type.into(),
            sequence_number,
            payload,
        }
    }

    pub fn event_id(&self) -> EventId {
        self.event_id
    }

    pub fn supplier_id(&self) -> SupplierId {
        self.supplier_id
    }

    pub fn stream_type(&self) -> &str {
        &self.stream_type
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }
}

/// Messages that belong to a single supplier stream.
///
/// Lets consumers filter a shared subscription down to the suppliers they own.
pub trait SupplierScoped {
    fn supplier_id(&self) -> SupplierId;
}

impl<E> SupplierScoped for EventEnvelope<E> {
    fn supplier_id(&self) -> SupplierId {
        self.supplier_id
    }
}

//! Projection runner utilities (read model builders).
//!
//! Tracks the last applied sequence number per supplier stream so replays and
//! duplicate deliveries never double-apply an envelope.

use std::collections::HashMap;

use thiserror::Error;

use riskwatch_core::SupplierId;

use crate::{EventEnvelope, Projection};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProjectionError {
    /// The envelope was already applied (or an older one arrived late).
    #[error("stale envelope for supplier {supplier}: last applied {last}, found {found}")]
    NonMonotonicSequence {
        supplier: SupplierId,
        last: u64,
        found: u64,
    },
}

/// Runs envelopes through a projection and tracks progress per supplier.
#[derive(Debug)]
pub struct ProjectionRunner<P>
where
    P: Projection,
{
    projection: P,
    cursors: HashMap<SupplierId, u64>,
}

impl<P> ProjectionRunner<P>
where
    P: Projection,
{
    pub fn new(projection: P) -> Self {
        Self {
            projection,
            cursors: HashMap::new(),
        }
    }

    pub fn projection(&self) -> &P {
        &self.projection
    }

    pub fn into_projection(self) -> P {
        self.projection
    }

    /// Last applied sequence number for a supplier stream.
    pub fn cursor(&self, supplier: SupplierId) -> Option<u64> {
        self.cursors.get(&supplier).copied()
    }

    /// Apply a single envelope, enforcing monotonic sequencing per supplier.
    pub fn apply(&mut self, envelope: &EventEnvelope<P::Ev>) -> Result<(), ProjectionError> {
        let supplier = envelope.supplier_id();
        let found = envelope.sequence_number();

        if let Some(&last) = self.cursors.get(&supplier) {
            if found <= last {
                return Err(ProjectionError::NonMonotonicSequence {
                    supplier,
                    last,
                    found,
                });
            }
        }

        self.projection.apply(envelope);
        self.cursors.insert(supplier, found);
        Ok(())
    }

    /// Apply envelopes in order, skipping duplicates. Returns how many were applied.
    pub fn apply_all<'a>(&mut self, envelopes: impl IntoIterator<Item = &'a EventEnvelope<P::Ev>>) -> usize
    where
        P::Ev: 'a,
    {
        envelopes
            .into_iter()
            .filter(|env| self.apply(env).is_ok())
            .count()
    }

    /// Rebuild a projection from scratch by replaying the full history.
    pub fn rebuild_from_scratch<'a>(
        factory: impl FnOnce() -> P,
        envelopes: impl IntoIterator<Item = &'a EventEnvelope<P::Ev>>,
    ) -> Self
    where
        P::Ev: 'a,
    {
        let mut runner = ProjectionRunner::new(factory());
        runner.apply_all(envelopes);
        runner
    }
}

use crate::{Event, EventEnvelope};

/// A projection builds a read model from an append-only event stream.
///
/// Read models are **disposable**: they can be dropped and rebuilt by replaying
/// envelopes. `apply` must be idempotent because the bus delivers at least once;
/// [`crate::ProjectionRunner`] filters duplicates by sequence number before
/// they reach the projection.
///
/// `apply` does not return errors. An envelope the projection does not care
/// about is ignored.
pub trait Projection {
    type Ev: Event;

    /// Apply a single event, updating the read model.
    fn apply(&mut self, envelope: &EventEnvelope<Self::Ev>);
}

//! Event mechanics: envelopes, pub/sub bus and projections.
//!
//! Trend events are facts; the bus distributes them to consumers (alert
//! delivery, dashboard read models) after they were persisted.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;
pub mod projection;
pub mod runner;

pub use bus::{EventBus, Subscription};
pub use envelope::{EventEnvelope, SupplierScoped};
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
pub use projection::Projection;
pub use runner::{ProjectionError, ProjectionRunner};

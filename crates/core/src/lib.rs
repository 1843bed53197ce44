//! `riskwatch-core`: foundation building blocks shared by every riskwatch crate.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod aggregate;
pub mod error;
pub mod id;
pub mod retry;
pub mod supplier;
pub mod value_object;

pub use aggregate::{Aggregate, AggregateRoot};
pub use error::{DomainError, DomainResult};
pub use id::{EventId, SupplierId};
pub use retry::{BackoffStrategy, RetryExhausted, RetryPolicy};
pub use supplier::{Entity, Supplier, SupplierLocation};
pub use value_object::{Severity, ValueObject};

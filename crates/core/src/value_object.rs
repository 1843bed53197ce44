//! Value objects: equality by value, not identity.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**. To "modify" one,
/// build a new one.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}

/// A normalized risk intensity in `[0, 1]`.
///
/// `0.0` means no observed risk, `1.0` the most severe reading a source can
/// produce. NaN is never representable.
#[derive(Debug, Copy, Clone, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Severity(f64);

impl ValueObject for Severity {}

impl Severity {
    pub const NONE: Severity = Severity(0.0);
    pub const MAX: Severity = Severity(1.0);

    /// Strict constructor: the value must already be finite and in `[0, 1]`.
    pub fn new(value: f64) -> DomainResult<Self> {
        if !value.is_finite() || !(0.0..=1.0).contains(&value) {
            return Err(DomainError::validation(format!(
                "severity must be a finite number in [0, 1], got {value}"
            )));
        }
        Ok(Self(value))
    }

    /// Clamp any finite reading into `[0, 1]`. NaN maps to zero.
    pub fn clamped(value: f64) -> Self {
        if value.is_nan() {
            return Self::NONE;
        }
        Self(value.clamp(0.0, 1.0))
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// The more severe of two readings.
    pub fn max(self, other: Severity) -> Severity {
        if other.0 > self.0 { other } else { self }
    }
}

impl TryFrom<f64> for Severity {
    type Error = DomainError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Severity::new(value)
    }
}

impl From<Severity> for f64 {
    fn from(value: Severity) -> Self {
        value.0
    }
}

impl core::fmt::Display for Severity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:.3}", self.0)
    }
}

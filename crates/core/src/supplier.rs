//! Supplier entity and the location its signals are collected for.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::id::SupplierId;

/// Entity marker: identity + continuity across state changes.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;
}

/// Geographic site whose external signals are attributed to one supplier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplierLocation {
    pub supplier_id: SupplierId,
    /// Human-readable site name, also used as the news search term.
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    /// ISO 3166-1 alpha-3 country code (economic indicators are per country).
    pub country_code: String,
}

impl SupplierLocation {
    pub fn validate(&self) -> DomainResult<()> {
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(DomainError::validation(format!(
                "latitude {} out of range for {}",
                self.latitude, self.name
            )));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(DomainError::validation(format!(
                "longitude {} out of range for {}",
                self.longitude, self.name
            )));
        }
        if self.country_code.trim().is_empty() {
            return Err(DomainError::validation(format!(
                "country code missing for {}",
                self.name
            )));
        }
        Ok(())
    }
}

/// A monitored supplier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Supplier {
    pub id: SupplierId,
    pub name: String,
    /// Supply tier (1 = direct supplier).
    #[serde(default = "default_tier")]
    pub tier: u8,
    pub location: SupplierLocation,
}

fn default_tier() -> u8 {
    1
}

impl Supplier {
    pub fn new(id: SupplierId, name: impl Into<String>, location: SupplierLocation) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("supplier name must not be empty"));
        }
        if location.supplier_id != id {
            return Err(DomainError::invariant(format!(
                "location {} belongs to supplier {}, not {}",
                location.name, location.supplier_id, id
            )));
        }
        location.validate()?;
        Ok(Self {
            id,
            name,
            tier: default_tier(),
            location,
        })
    }

    pub fn with_tier(mut self, tier: u8) -> Self {
        self.tier = tier;
        self
    }
}

impl Entity for Supplier {
    type Id = SupplierId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

//! Driver registry: the known drivers and their availability flag.
//!
//! Drivers keep their insertion order for the lifetime of the registry. That
//! order is what "first free" matching walks, so it is stable but carries no
//! priority. The registry has no locking of its own; the engine owns it behind
//! the same lock as the request store so availability and request transitions
//! commit together.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DispatchError;
use crate::geo::GeoPoint;

/// Transport address of a driver (for example a chat phone id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DriverId(pub String);

impl DriverId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DriverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DriverId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for DriverId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Driver {
    pub id: DriverId,
    pub name: String,
    pub plate: String,
    pub location: Option<GeoPoint>,
    pub available: bool,
}

impl Driver {
    /// A new driver starts available.
    pub fn new(id: impl Into<DriverId>, name: impl Into<String>, plate: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            plate: plate.into(),
            location: None,
            available: true,
        }
    }

    pub fn with_location(mut self, location: GeoPoint) -> Self {
        self.location = Some(location);
        self
    }

    pub fn info(&self) -> DriverInfo {
        DriverInfo {
            id: self.id.clone(),
            name: self.name.clone(),
            plate: self.plate.clone(),
        }
    }
}

/// Display fields of a driver handed to clients and adapters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverInfo {
    pub id: DriverId,
    pub name: String,
    pub plate: String,
}

#[derive(Debug, Default)]
pub struct DriverRegistry {
    drivers: Vec<Driver>,
    index: HashMap<DriverId, usize>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from seed drivers, keeping their order.
    pub fn from_drivers(drivers: impl IntoIterator<Item = Driver>) -> Result<Self, DispatchError> {
        let mut registry = Self::new();
        for driver in drivers {
            registry.register(driver)?;
        }
        Ok(registry)
    }

    /// Append a driver to the registry.
    pub fn register(&mut self, driver: Driver) -> Result<(), DispatchError> {
        if self.index.contains_key(&driver.id) {
            return Err(DispatchError::DuplicateDriver(driver.id));
        }
        self.index.insert(driver.id.clone(), self.drivers.len());
        self.drivers.push(driver);
        Ok(())
    }

    /// Snapshot of available drivers in registry order.
    pub fn list_available(&self) -> Vec<Driver> {
        self.drivers.iter().filter(|d| d.available).cloned().collect()
    }

    pub fn mark_busy(&mut self, id: &DriverId) -> Result<(), DispatchError> {
        self.get_mut(id)?.available = false;
        Ok(())
    }

    pub fn mark_available(&mut self, id: &DriverId) -> Result<(), DispatchError> {
        self.get_mut(id)?.available = true;
        Ok(())
    }

    pub fn update_location(&mut self, id: &DriverId, location: GeoPoint) -> Result<(), DispatchError> {
        self.get_mut(id)?.location = Some(location);
        Ok(())
    }

    pub fn is_driver(&self, identity: &str) -> bool {
        self.index.contains_key(&DriverId::new(identity))
    }

    pub fn get(&self, id: &DriverId) -> Option<&Driver> {
        self.index.get(id).map(|&slot| &self.drivers[slot])
    }

    pub fn is_available(&self, id: &DriverId) -> Option<bool> {
        self.get(id).map(|d| d.available)
    }

    /// Snapshot of every driver in registry order.
    pub fn all(&self) -> Vec<Driver> {
        self.drivers.clone()
    }

    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }

    fn get_mut(&mut self, id: &DriverId) -> Result<&mut Driver, DispatchError> {
        let slot = *self
            .index
            .get(id)
            .ok_or_else(|| DispatchError::DriverNotFound(id.clone()))?;
        Ok(&mut self.drivers[slot])
    }
}

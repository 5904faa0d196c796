//! Dispatch configuration: offer timeout, reassignment cap, matching policy and
//! the driver seed list. Everything the engine needs is supplied here at
//! construction time.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::geo::GeoPoint;
use crate::matching::{FirstAvailable, MatchingPolicy, NearestDriver};
use crate::registry::Driver;

/// How long a driver has to answer an offer before it counts as a reject.
pub const DEFAULT_OFFER_TIMEOUT_SECS: u64 = 120;

/// Which matching policy the engine builds.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum MatchingPolicyKind {
    #[default]
    FirstAvailable,
    Nearest {
        #[serde(default)]
        max_radius_km: Option<f64>,
    },
}

impl MatchingPolicyKind {
    pub fn build(&self) -> Box<dyn MatchingPolicy> {
        match *self {
            Self::FirstAvailable => Box::new(FirstAvailable),
            Self::Nearest { max_radius_km } => Box::new(NearestDriver::new(max_radius_km)),
        }
    }
}

/// One driver from the seed list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverSeed {
    pub id: String,
    pub name: String,
    pub plate: String,
    #[serde(default)]
    pub location: Option<GeoPoint>,
}

impl DriverSeed {
    pub fn new(id: impl Into<String>, name: impl Into<String>, plate: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            plate: plate.into(),
            location: None,
        }
    }

    pub fn to_driver(&self) -> Driver {
        let driver = Driver::new(self.id.clone(), self.name.clone(), self.plate.clone());
        match self.location {
            Some(location) => driver.with_location(location),
            None => driver,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub offer_timeout_secs: u64,
    /// Total offers per request before it ends as `no_driver`. `None` = only
    /// bounded by the size of the driver pool.
    pub max_offer_attempts: Option<u32>,
    pub matching: MatchingPolicyKind,
    pub drivers: Vec<DriverSeed>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            offer_timeout_secs: DEFAULT_OFFER_TIMEOUT_SECS,
            max_offer_attempts: None,
            matching: MatchingPolicyKind::default(),
            drivers: Vec::new(),
        }
    }
}

impl DispatchConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.offer_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "offer_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.max_offer_attempts == Some(0) {
            return Err(ConfigError::Invalid(
                "max_offer_attempts must be at least 1".to_string(),
            ));
        }
        if let MatchingPolicyKind::Nearest {
            max_radius_km: Some(radius),
        } = self.matching
        {
            if !(radius.is_finite() && radius > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "max_radius_km must be a positive number, got {radius}"
                )));
            }
        }

        let mut seen = std::collections::HashSet::new();
        for seed in &self.drivers {
            if seed.id.trim().is_empty() {
                return Err(ConfigError::Invalid("driver id must not be empty".to_string()));
            }
            if !seen.insert(seed.id.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate driver id '{}'",
                    seed.id
                )));
            }
            if seed.location.is_some_and(|point| !point.is_valid()) {
                return Err(ConfigError::Invalid(format!(
                    "driver '{}' has out-of-range coordinates",
                    seed.id
                )));
            }
        }
        Ok(())
    }

    pub fn offer_timeout(&self) -> Duration {
        Duration::from_secs(self.offer_timeout_secs)
    }

    pub fn with_offer_timeout_secs(mut self, secs: u64) -> Self {
        self.offer_timeout_secs = secs;
        self
    }

    pub fn with_max_offer_attempts(mut self, attempts: u32) -> Self {
        self.max_offer_attempts = Some(attempts);
        self
    }

    pub fn with_matching(mut self, matching: MatchingPolicyKind) -> Self {
        self.matching = matching;
        self
    }

    /// Append a driver to the seed list (registry order follows list order).
    pub fn with_driver(mut self, seed: DriverSeed) -> Self {
        self.drivers.push(seed);
        self
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults_use_two_minute_timeout_and_first_available() {
        let config = DispatchConfig::default();
        assert_eq!(config.offer_timeout(), Duration::from_secs(120));
        assert_eq!(config.matching, MatchingPolicyKind::FirstAvailable);
        assert!(config.max_offer_attempts.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parses_json_with_partial_fields() {
        let config = DispatchConfig::from_json_str(
            r#"{
                "offer_timeout_secs": 45,
                "matching": { "policy": "nearest", "max_radius_km": 8.0 },
                "drivers": [
                    { "id": "593900000001", "name": "Ana", "plate": "PBA-1234",
                      "location": { "lat": -0.18, "lng": -78.47 } },
                    { "id": "593900000002", "name": "Luis", "plate": "PBC-5678" }
                ]
            }"#,
        )
        .expect("config");

        assert_eq!(config.offer_timeout_secs, 45);
        assert_eq!(
            config.matching,
            MatchingPolicyKind::Nearest {
                max_radius_km: Some(8.0)
            }
        );
        assert_eq!(config.drivers.len(), 2);
        assert!(config.drivers[0].location.is_some());
        assert!(config.drivers[1].to_driver().available);
    }

    #[test]
    fn rejects_invalid_values() {
        let zero_timeout = DispatchConfig::default().with_offer_timeout_secs(0);
        assert!(matches!(zero_timeout.validate(), Err(ConfigError::Invalid(_))));

        let zero_attempts = DispatchConfig::default().with_max_offer_attempts(0);
        assert!(matches!(zero_attempts.validate(), Err(ConfigError::Invalid(_))));

        let duplicate = DispatchConfig::default()
            .with_driver(DriverSeed::new("d1", "Ana", "A"))
            .with_driver(DriverSeed::new("d1", "Ana bis", "B"));
        assert!(matches!(duplicate.validate(), Err(ConfigError::Invalid(_))));

        let bad_location = DispatchConfig::default().with_driver(DriverSeed {
            location: Some(GeoPoint { lat: 120.0, lng: 0.0 }),
            ..DriverSeed::new("d1", "Ana", "A")
        });
        assert!(matches!(bad_location.validate(), Err(ConfigError::Invalid(_))));

        assert!(matches!(
            DispatchConfig::from_json_str("{ not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"{{ "max_offer_attempts": 3, "drivers": [{{ "id": "d1", "name": "Ana", "plate": "A" }}] }}"#
        )
        .expect("write config");

        let config = DispatchConfig::from_json_file(file.path()).expect("config");
        assert_eq!(config.max_offer_attempts, Some(3));
        assert_eq!(config.offer_timeout_secs, DEFAULT_OFFER_TIMEOUT_SECS);

        let missing = DispatchConfig::from_json_file("/definitely/not/here.json");
        assert!(matches!(missing, Err(ConfigError::Io { .. })));
    }
}

//! Geographic primitives: validated coordinates, pickup locations and
//! great-circle distance.
//!
//! Coordinates are optional everywhere in the dispatch core. A client that
//! cannot share a pin sends a free-text description instead, and drivers may
//! have no known position at all.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

const EARTH_RADIUS_KM: f64 = 6371.0;

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    /// Build a point, rejecting out-of-range or non-finite coordinates.
    pub fn new(lat: f64, lng: f64) -> Option<Self> {
        let valid = lat.is_finite()
            && lng.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lng);
        valid.then_some(Self { lat, lng })
    }

    pub fn is_valid(&self) -> bool {
        Self::new(self.lat, self.lng).is_some()
    }

    /// Haversine distance in kilometres.
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        let (lat1, lon1) = (self.lat.to_radians(), self.lng.to_radians());
        let (lat2, lon2) = (other.lat.to_radians(), other.lng.to_radians());
        let sin_dlat = ((lat2 - lat1) * 0.5).sin();
        let sin_dlon = ((lon2 - lon1) * 0.5).sin();
        let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;
        let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
        EARTH_RADIUS_KM * c
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6},{:.6}", self.lat, self.lng)
    }
}

impl FromStr for GeoPoint {
    type Err = String;

    /// Parses `"lat,lng"` (whitespace around either number is ignored).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (lat, lng) = s
            .split_once(',')
            .ok_or_else(|| format!("expected 'lat,lng', got '{s}'"))?;
        let lat: f64 = lat
            .trim()
            .parse()
            .map_err(|error| format!("invalid latitude '{}': {error}", lat.trim()))?;
        let lng: f64 = lng
            .trim()
            .parse()
            .map_err(|error| format!("invalid longitude '{}': {error}", lng.trim()))?;
        GeoPoint::new(lat, lng).ok_or_else(|| format!("coordinates out of range: {lat},{lng}"))
    }
}

/// Where the client wants to be picked up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PickupLocation {
    Coordinates(GeoPoint),
    /// Free text (street, landmark) when no coordinates were shared.
    Description(String),
}

impl PickupLocation {
    /// Interpret raw chat text: coordinates when it parses as `lat,lng`,
    /// otherwise a trimmed description. Blank text yields `None`.
    pub fn from_text(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        match trimmed.parse::<GeoPoint>() {
            Ok(point) => Some(Self::Coordinates(point)),
            Err(_) => Some(Self::Description(trimmed.to_string())),
        }
    }

    pub fn coordinates(&self) -> Option<&GeoPoint> {
        match self {
            Self::Coordinates(point) => Some(point),
            Self::Description(_) => None,
        }
    }
}

impl fmt::Display for PickupLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Coordinates(point) => write!(f, "{point}"),
            Self::Description(text) => f.write_str(text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_coordinates_with_whitespace() {
        let point: GeoPoint = " -0.180653 , -78.467834 ".parse().expect("coordinates");
        assert!((point.lat + 0.180653).abs() < 1e-9);
        assert!((point.lng + 78.467834).abs() < 1e-9);
    }

    #[test]
    fn rejects_out_of_range_coordinates() {
        assert!("91.0,10.0".parse::<GeoPoint>().is_err());
        assert!("10.0,181.0".parse::<GeoPoint>().is_err());
        assert!(GeoPoint::new(f64::NAN, 0.0).is_none());
    }

    #[test]
    fn pickup_text_falls_back_to_description() {
        assert_eq!(
            PickupLocation::from_text("  Av. Amazonas y Naciones Unidas "),
            Some(PickupLocation::Description(
                "Av. Amazonas y Naciones Unidas".to_string()
            ))
        );
        assert!(matches!(
            PickupLocation::from_text("-2.17,-79.92"),
            Some(PickupLocation::Coordinates(_))
        ));
        assert_eq!(PickupLocation::from_text("   "), None);
    }

    #[test]
    fn haversine_distance_is_symmetric_and_plausible() {
        let quito = GeoPoint::new(-0.1807, -78.4678).expect("quito");
        let guayaquil = GeoPoint::new(-2.1709, -79.9224).expect("guayaquil");
        let there = quito.distance_km(&guayaquil);
        let back = guayaquil.distance_km(&quito);
        assert!((there - back).abs() < 1e-9);
        // Roughly 270 km as the crow flies.
        assert!(there > 250.0 && there < 290.0, "distance {there}");
        assert_eq!(quito.distance_km(&quito), 0.0);
    }
}
